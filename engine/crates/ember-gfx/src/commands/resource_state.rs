//! 抽象资源状态到 Vulkan sync2 的映射
//!
//! 将 [`ResourceUsage`] 展开为 pipeline stage、access mask 和 image layout。

use ash::vk;

use crate::basic::resource_usage::ResourceUsage;

/// 资源在某个状态下的 stage / access / layout
///
/// 对 buffer 来说 layout 没有意义，固定为 `UNDEFINED`。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GfxResourceState {
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
    pub layout: vk::ImageLayout,
}

impl Default for GfxResourceState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

// new & 常量定义
impl GfxResourceState {
    #[inline]
    pub const fn new(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2, layout: vk::ImageLayout) -> Self {
        Self { stage, access, layout }
    }

    pub const UNDEFINED: Self =
        Self::new(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE, vk::ImageLayout::UNDEFINED);

    pub const PRESENT: Self =
        Self::new(vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::AccessFlags2::NONE, vk::ImageLayout::PRESENT_SRC_KHR);

    /// 写操作的 access flags
    const WRITE_ACCESS: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
        vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw()
            | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE.as_raw()
            | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw()
            | vk::AccessFlags2::TRANSFER_WRITE.as_raw()
            | vk::AccessFlags2::TRANSFORM_FEEDBACK_WRITE_EXT.as_raw()
            | vk::AccessFlags2::ACCELERATION_STRUCTURE_WRITE_KHR.as_raw()
            | vk::AccessFlags2::MEMORY_WRITE.as_raw(),
    );

    pub fn from_usage(usage: ResourceUsage) -> Self {
        use vk::AccessFlags2 as A;
        use vk::ImageLayout as L;
        use vk::PipelineStageFlags2 as S;

        match usage {
            ResourceUsage::Undefined => Self::UNDEFINED,
            ResourceUsage::VertexAndConstantBuffer => Self::new(
                S::VERTEX_INPUT | S::VERTEX_SHADER | S::FRAGMENT_SHADER | S::COMPUTE_SHADER,
                A::VERTEX_ATTRIBUTE_READ | A::UNIFORM_READ,
                L::UNDEFINED,
            ),
            ResourceUsage::IndexBuffer => Self::new(S::INDEX_INPUT, A::INDEX_READ, L::UNDEFINED),
            ResourceUsage::RenderTarget => Self::new(
                S::COLOR_ATTACHMENT_OUTPUT,
                A::COLOR_ATTACHMENT_READ | A::COLOR_ATTACHMENT_WRITE,
                L::COLOR_ATTACHMENT_OPTIMAL,
            ),
            ResourceUsage::UnorderedAccess => Self::new(
                S::COMPUTE_SHADER | S::FRAGMENT_SHADER | S::RAY_TRACING_SHADER_KHR,
                A::SHADER_STORAGE_READ | A::SHADER_STORAGE_WRITE,
                L::GENERAL,
            ),
            ResourceUsage::DepthWrite => Self::new(
                S::EARLY_FRAGMENT_TESTS | S::LATE_FRAGMENT_TESTS,
                A::DEPTH_STENCIL_ATTACHMENT_READ | A::DEPTH_STENCIL_ATTACHMENT_WRITE,
                L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ),
            ResourceUsage::DepthRead => Self::new(
                S::EARLY_FRAGMENT_TESTS | S::LATE_FRAGMENT_TESTS,
                A::DEPTH_STENCIL_ATTACHMENT_READ,
                L::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            ),
            ResourceUsage::ShaderResource => Self::new(
                S::VERTEX_SHADER | S::FRAGMENT_SHADER | S::COMPUTE_SHADER | S::RAY_TRACING_SHADER_KHR,
                A::SHADER_SAMPLED_READ,
                L::SHADER_READ_ONLY_OPTIMAL,
            ),
            ResourceUsage::PixelShaderResource => {
                Self::new(S::FRAGMENT_SHADER, A::SHADER_SAMPLED_READ, L::SHADER_READ_ONLY_OPTIMAL)
            }
            ResourceUsage::StreamOut => {
                Self::new(S::TRANSFORM_FEEDBACK_EXT, A::TRANSFORM_FEEDBACK_WRITE_EXT, L::UNDEFINED)
            }
            ResourceUsage::IndirectArgument => Self::new(S::DRAW_INDIRECT, A::INDIRECT_COMMAND_READ, L::UNDEFINED),
            ResourceUsage::CopyDst => Self::new(S::TRANSFER, A::TRANSFER_WRITE, L::TRANSFER_DST_OPTIMAL),
            ResourceUsage::CopySrc => Self::new(S::TRANSFER, A::TRANSFER_READ, L::TRANSFER_SRC_OPTIMAL),
            ResourceUsage::GenericRead => Self::new(S::ALL_COMMANDS, A::MEMORY_READ, L::GENERAL),
            ResourceUsage::Present => Self::PRESENT,
            ResourceUsage::Common => Self::new(S::ALL_COMMANDS, A::MEMORY_READ | A::MEMORY_WRITE, L::GENERAL),
            ResourceUsage::AccelerationStructureRead => Self::new(
                S::RAY_TRACING_SHADER_KHR | S::ACCELERATION_STRUCTURE_BUILD_KHR,
                A::ACCELERATION_STRUCTURE_READ_KHR,
                L::UNDEFINED,
            ),
            ResourceUsage::AccelerationStructureWrite => {
                Self::new(S::ACCELERATION_STRUCTURE_BUILD_KHR, A::ACCELERATION_STRUCTURE_WRITE_KHR, L::UNDEFINED)
            }
            ResourceUsage::AccelerationStructureGeometry => {
                Self::new(S::ACCELERATION_STRUCTURE_BUILD_KHR, A::SHADER_READ, L::UNDEFINED)
            }
            ResourceUsage::ShaderBindingTable => Self::new(S::RAY_TRACING_SHADER_KHR, A::SHADER_READ, L::UNDEFINED),
        }
    }
}

// tools
impl GfxResourceState {
    /// 用于 barrier src 的 access：只有写操作需要 make available
    #[inline]
    pub fn src_access(&self) -> vk::AccessFlags2 {
        self.access & Self::WRITE_ACCESS
    }
}

impl From<ResourceUsage> for GfxResourceState {
    #[inline]
    fn from(usage: ResourceUsage) -> Self {
        Self::from_usage(usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_to_layout() {
        assert_eq!(GfxResourceState::from_usage(ResourceUsage::Undefined).layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(
            GfxResourceState::from_usage(ResourceUsage::RenderTarget).layout,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        );
        assert_eq!(GfxResourceState::from_usage(ResourceUsage::CopyDst).layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(
            GfxResourceState::from_usage(ResourceUsage::ShaderResource).layout,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        );
        assert_eq!(GfxResourceState::from_usage(ResourceUsage::Present), GfxResourceState::PRESENT);
    }

    #[test]
    fn test_src_access_only_carries_writes() {
        assert_eq!(GfxResourceState::from_usage(ResourceUsage::CopyDst).src_access(), vk::AccessFlags2::TRANSFER_WRITE);
        assert_eq!(
            GfxResourceState::from_usage(ResourceUsage::UnorderedAccess).src_access(),
            vk::AccessFlags2::SHADER_STORAGE_WRITE
        );
        assert!(GfxResourceState::from_usage(ResourceUsage::ShaderResource).src_access().is_empty());
    }
}
