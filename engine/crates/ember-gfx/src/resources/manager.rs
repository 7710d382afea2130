use slotmap::SlotMap;

use crate::basic::resource_usage::ResourceUsage;
use crate::resources::handles::{GfxBufferHandle, GfxResourceKey, GfxTextureHandle};
use crate::resources::resource_data::{GfxBuffer, GfxTexture};

/// 资源管理器
///
/// 负责分配资源句柄，并记录每个资源的名字和声明的初始状态。
/// 句柄使用 slotmap 的代际索引，资源销毁后旧句柄不会误指向新资源。
#[derive(Default)]
pub struct GfxResourceManager {
    textures: SlotMap<GfxTextureHandle, GfxTexture>,
    buffers: SlotMap<GfxBufferHandle, GfxBuffer>,
}

// new & init
impl GfxResourceManager {
    pub fn new() -> Self {
        Self::default()
    }
}

// register & unregister
impl GfxResourceManager {
    pub fn register_texture(&mut self, name: impl Into<String>, initial_state: ResourceUsage) -> GfxTextureHandle {
        let name = name.into();
        log::debug!("register texture: {} ({})", name, initial_state);
        self.textures.insert_with_key(|handle| GfxTexture::new(handle, name, initial_state))
    }

    pub fn register_buffer(&mut self, name: impl Into<String>, size: u64, initial_state: ResourceUsage) -> GfxBufferHandle {
        let name = name.into();
        log::debug!("register buffer: {} ({} bytes, {})", name, size, initial_state);
        self.buffers.insert_with_key(|handle| GfxBuffer::new(handle, name, size, initial_state))
    }

    pub fn destroy_texture(&mut self, handle: GfxTextureHandle) -> Option<GfxTexture> {
        self.textures.remove(handle)
    }

    pub fn destroy_buffer(&mut self, handle: GfxBufferHandle) -> Option<GfxBuffer> {
        self.buffers.remove(handle)
    }
}

// getters
impl GfxResourceManager {
    #[inline]
    pub fn get_texture(&self, handle: GfxTextureHandle) -> Option<&GfxTexture> {
        self.textures.get(handle)
    }

    #[inline]
    pub fn get_buffer(&self, handle: GfxBufferHandle) -> Option<&GfxBuffer> {
        self.buffers.get(handle)
    }

    /// 资源的名字，用于日志
    pub fn resource_name(&self, key: GfxResourceKey) -> Option<&str> {
        match key {
            GfxResourceKey::Texture(handle) => self.textures.get(handle).map(GfxTexture::name),
            GfxResourceKey::Buffer(handle) => self.buffers.get(handle).map(GfxBuffer::name),
        }
    }

    pub fn initial_state(&self, key: GfxResourceKey) -> Option<ResourceUsage> {
        match key {
            GfxResourceKey::Texture(handle) => self.textures.get(handle).map(GfxTexture::initial_state),
            GfxResourceKey::Buffer(handle) => self.buffers.get(handle).map(GfxBuffer::initial_state),
        }
    }

    #[inline]
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    #[inline]
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_destroy() {
        let mut manager = GfxResourceManager::new();
        let tex = manager.register_texture("albedo", ResourceUsage::Undefined);
        let buf = manager.register_buffer("vertices", 1024, ResourceUsage::CopyDst);

        assert_eq!(manager.get_texture(tex).map(|t| t.handle()), Some(tex));
        assert_eq!(manager.resource_name(GfxResourceKey::Buffer(buf)), Some("vertices"));
        assert_eq!(manager.initial_state(buf.into()), Some(ResourceUsage::CopyDst));

        assert!(manager.destroy_texture(tex).is_some());
        assert!(manager.get_texture(tex).is_none());

        // 代际索引：新资源不会复用旧句柄
        let tex2 = manager.register_texture("albedo", ResourceUsage::Undefined);
        assert_ne!(tex, tex2);
        assert!(manager.get_texture(tex).is_none());
        assert_eq!(manager.texture_count(), 1);
    }
}
