use std::fmt;

/// 抽象的 GPU 资源访问模式
///
/// 与具体后端无关；状态不同即意味着需要一个 pipeline barrier。
/// 到 Vulkan stage/access/layout 的映射见 [`crate::commands::resource_state::GfxResourceState`]。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceUsage {
    #[default]
    Undefined,
    VertexAndConstantBuffer,
    IndexBuffer,
    RenderTarget,
    UnorderedAccess,
    DepthWrite,
    DepthRead,
    ShaderResource,
    PixelShaderResource,
    StreamOut,
    IndirectArgument,
    CopyDst,
    CopySrc,
    GenericRead,
    Present,
    Common,
    AccelerationStructureRead,
    AccelerationStructureWrite,
    AccelerationStructureGeometry,
    ShaderBindingTable,
}

impl ResourceUsage {
    /// 只对 buffer 有意义的状态，texture 不能处于这些状态
    #[inline]
    pub const fn is_buffer_only(self) -> bool {
        matches!(
            self,
            ResourceUsage::VertexAndConstantBuffer
                | ResourceUsage::IndexBuffer
                | ResourceUsage::StreamOut
                | ResourceUsage::IndirectArgument
                | ResourceUsage::AccelerationStructureRead
                | ResourceUsage::AccelerationStructureWrite
                | ResourceUsage::AccelerationStructureGeometry
                | ResourceUsage::ShaderBindingTable
        )
    }
}

impl fmt::Display for ResourceUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
