use slotmap::new_key_type;

new_key_type! {
    pub struct GfxTextureHandle;
    pub struct GfxBufferHandle;
}

/// 被追踪资源的稳定身份
///
/// 所有需要按资源加锁的地方都以它作为 key；`Ord` 用于给加锁顺序定序。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GfxResourceKey {
    Texture(GfxTextureHandle),
    Buffer(GfxBufferHandle),
}

impl From<GfxTextureHandle> for GfxResourceKey {
    #[inline]
    fn from(handle: GfxTextureHandle) -> Self {
        Self::Texture(handle)
    }
}

impl From<GfxBufferHandle> for GfxResourceKey {
    #[inline]
    fn from(handle: GfxBufferHandle) -> Self {
        Self::Buffer(handle)
    }
}
