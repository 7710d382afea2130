use crate::basic::resource_usage::ResourceUsage;
use crate::resources::handles::{GfxBufferHandle, GfxResourceKey, GfxTextureHandle};

/// 纹理的元数据
///
/// GFX 层只关心它的身份和初始状态，真正的显存由后端持有。
#[derive(Clone, Debug)]
pub struct GfxTexture {
    handle: GfxTextureHandle,
    name: String,
    initial_state: ResourceUsage,
}

// new & init
impl GfxTexture {
    pub(crate) fn new(handle: GfxTextureHandle, name: impl Into<String>, initial_state: ResourceUsage) -> Self {
        Self {
            handle,
            name: name.into(),
            initial_state,
        }
    }
}

// getters
impl GfxTexture {
    #[inline]
    pub fn handle(&self) -> GfxTextureHandle {
        self.handle
    }

    #[inline]
    pub fn key(&self) -> GfxResourceKey {
        GfxResourceKey::Texture(self.handle)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn initial_state(&self) -> ResourceUsage {
        self.initial_state
    }
}

#[derive(Clone, Debug)]
pub struct GfxBuffer {
    handle: GfxBufferHandle,
    name: String,
    size: u64,
    initial_state: ResourceUsage,
}

// new & init
impl GfxBuffer {
    pub(crate) fn new(handle: GfxBufferHandle, name: impl Into<String>, size: u64, initial_state: ResourceUsage) -> Self {
        Self {
            handle,
            name: name.into(),
            size,
            initial_state,
        }
    }
}

// getters
impl GfxBuffer {
    #[inline]
    pub fn handle(&self) -> GfxBufferHandle {
        self.handle
    }

    #[inline]
    pub fn key(&self) -> GfxResourceKey {
        GfxResourceKey::Buffer(self.handle)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn initial_state(&self) -> ResourceUsage {
        self.initial_state
    }
}
