use ash::vk;

use crate::basic::queue_type::QueueType;
use crate::basic::resource_usage::ResourceUsage;
use crate::commands::resource_state::GfxResourceState;
use crate::resources::handles::{GfxBufferHandle, GfxTextureHandle};

/// barrier 使用的 src 和 dst 访问 mask
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GfxBarrierMask {
    pub src_stage: vk::PipelineStageFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_access: vk::AccessFlags2,
}

impl GfxBarrierMask {
    fn between(old_state: ResourceUsage, new_state: ResourceUsage) -> Self {
        let src = GfxResourceState::from_usage(old_state);
        let dst = GfxResourceState::from_usage(new_state);
        Self {
            src_stage: src.stage,
            dst_stage: dst.stage,
            src_access: src.src_access(),
            dst_access: dst.access,
        }
    }
}

/// 一个 texture 的状态转换
///
/// `enable_queue_barrier` 为 true 时表示同时进行队列所有权转移。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxTextureBarrierDesc {
    pub texture: GfxTextureHandle,
    pub old_state: ResourceUsage,
    pub new_state: ResourceUsage,
    pub enable_queue_barrier: bool,
    pub src_queue: QueueType,
    pub dst_queue: QueueType,
}

impl GfxTextureBarrierDesc {
    #[inline]
    pub fn new(texture: GfxTextureHandle, old_state: ResourceUsage, new_state: ResourceUsage) -> Self {
        Self {
            texture,
            old_state,
            new_state,
            enable_queue_barrier: false,
            src_queue: QueueType::Graphics,
            dst_queue: QueueType::Graphics,
        }
    }

    /// builder
    ///
    /// 队列不同时才会开启所有权转移
    #[inline]
    pub fn queue_transfer(mut self, src_queue: QueueType, dst_queue: QueueType) -> Self {
        self.src_queue = src_queue;
        self.dst_queue = dst_queue;
        self.enable_queue_barrier = src_queue != dst_queue;
        self
    }

    #[inline]
    pub fn layouts(&self) -> (vk::ImageLayout, vk::ImageLayout) {
        (GfxResourceState::from_usage(self.old_state).layout, GfxResourceState::from_usage(self.new_state).layout)
    }

    #[inline]
    pub fn mask(&self) -> GfxBarrierMask {
        GfxBarrierMask::between(self.old_state, self.new_state)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxBufferBarrierDesc {
    pub buffer: GfxBufferHandle,
    pub old_state: ResourceUsage,
    pub new_state: ResourceUsage,
    pub enable_queue_barrier: bool,
    pub src_queue: QueueType,
    pub dst_queue: QueueType,
}

impl GfxBufferBarrierDesc {
    #[inline]
    pub fn new(buffer: GfxBufferHandle, old_state: ResourceUsage, new_state: ResourceUsage) -> Self {
        Self {
            buffer,
            old_state,
            new_state,
            enable_queue_barrier: false,
            src_queue: QueueType::Graphics,
            dst_queue: QueueType::Graphics,
        }
    }

    /// builder
    #[inline]
    pub fn queue_transfer(mut self, src_queue: QueueType, dst_queue: QueueType) -> Self {
        self.src_queue = src_queue;
        self.dst_queue = dst_queue;
        self.enable_queue_barrier = src_queue != dst_queue;
        self
    }

    #[inline]
    pub fn mask(&self) -> GfxBarrierMask {
        GfxBarrierMask::between(self.old_state, self.new_state)
    }
}

/// 一次 pipeline barrier 命令中包含的所有转换
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GfxPipelineBarrierDesc {
    texture_barriers: Vec<GfxTextureBarrierDesc>,
    buffer_barriers: Vec<GfxBufferBarrierDesc>,
}

// new & init
impl GfxPipelineBarrierDesc {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// swapchain image 在 present 节点开始时的转换
    pub fn undefined_to_render_target(texture: GfxTextureHandle) -> Self {
        let mut desc = Self::new();
        desc.texture_barrier(GfxTextureBarrierDesc::new(texture, ResourceUsage::Undefined, ResourceUsage::RenderTarget));
        desc
    }

    /// swapchain image 在 present 之前的转换
    pub fn render_target_to_present(texture: GfxTextureHandle) -> Self {
        let mut desc = Self::new();
        desc.texture_barrier(GfxTextureBarrierDesc::new(texture, ResourceUsage::RenderTarget, ResourceUsage::Present));
        desc
    }
}

// builder
impl GfxPipelineBarrierDesc {
    #[inline]
    pub fn texture_barrier(&mut self, barrier: GfxTextureBarrierDesc) -> &mut Self {
        self.texture_barriers.push(barrier);
        self
    }

    #[inline]
    pub fn buffer_barrier(&mut self, barrier: GfxBufferBarrierDesc) -> &mut Self {
        self.buffer_barriers.push(barrier);
        self
    }
}

// getters
impl GfxPipelineBarrierDesc {
    #[inline]
    pub fn texture_barriers(&self) -> &[GfxTextureBarrierDesc] {
        &self.texture_barriers
    }

    #[inline]
    pub fn buffer_barriers(&self) -> &[GfxBufferBarrierDesc] {
        &self.buffer_barriers
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.texture_barriers.is_empty() && self.buffer_barriers.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.texture_barriers.len() + self.buffer_barriers.len()
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;

    #[test]
    fn test_present_barriers() {
        let mut handles = SlotMap::<GfxTextureHandle, ()>::with_key();
        let tex = handles.insert(());

        let begin = GfxPipelineBarrierDesc::undefined_to_render_target(tex);
        assert_eq!(begin.len(), 1);
        assert_eq!(begin.texture_barriers()[0].layouts(), (vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL));

        let end = GfxPipelineBarrierDesc::render_target_to_present(tex);
        let barrier = end.texture_barriers()[0];
        assert_eq!(barrier.old_state, ResourceUsage::RenderTarget);
        assert_eq!(barrier.new_state, ResourceUsage::Present);
        assert!(!barrier.enable_queue_barrier);
        assert_eq!(barrier.mask().src_access, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE);
    }

    #[test]
    fn test_queue_transfer() {
        let mut handles = SlotMap::<GfxBufferHandle, ()>::with_key();
        let buf = handles.insert(());

        let same = GfxBufferBarrierDesc::new(buf, ResourceUsage::CopyDst, ResourceUsage::ShaderResource)
            .queue_transfer(QueueType::Compute, QueueType::Compute);
        assert!(!same.enable_queue_barrier);

        let cross = GfxBufferBarrierDesc::new(buf, ResourceUsage::CopyDst, ResourceUsage::ShaderResource)
            .queue_transfer(QueueType::Copy, QueueType::Graphics);
        assert!(cross.enable_queue_barrier);
        assert_eq!(cross.src_queue, QueueType::Copy);
    }
}
