use std::sync::Arc;

use crate::basic::queue_type::QueueType;
use crate::commands::barrier::GfxPipelineBarrierDesc;
use crate::commands::semaphore::GfxSemaphore;
use crate::commands::submit_info::GfxExecuteDesc;
use crate::error::GfxResult;
use crate::swapchain::swapchain::GfxSwapchain;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GfxPresentResult {
    Success,
    /// swapchain 仍然可用，但和 surface 不再完全匹配
    Suboptimal,
}

/// 命令列表
///
/// 所有方法都只需要 `&self`：同一个命令列表在同一时刻只会被一个线程录制，
/// 由调用方（render graph 的节点锁）保证。
pub trait GfxCommandList: Send + Sync {
    fn queue_type(&self) -> QueueType;

    fn debug_name(&self) -> &str;

    fn begin(&self) -> GfxResult<()>;

    fn end(&self) -> GfxResult<()>;

    fn pipeline_barrier(&self, barrier: &GfxPipelineBarrierDesc);

    fn begin_label(&self, label: &str);

    fn end_label(&self);

    /// 提交到该命令列表所属的队列，调用前需要先 `end`
    fn execute(&self, desc: &GfxExecuteDesc) -> GfxResult<()>;

    /// 在该命令列表所属的队列上 present
    fn present(
        &self,
        swapchain: &dyn GfxSwapchain,
        image_index: u32,
        wait_semaphores: &[Arc<dyn GfxSemaphore>],
    ) -> GfxResult<GfxPresentResult>;
}

#[derive(Clone, Debug)]
pub struct GfxCommandListPoolDesc {
    pub queue_type: QueueType,
    pub num_command_lists: u32,
    pub debug_name: String,
}

/// 同一个队列上、预先分配好的一组命令列表
pub trait GfxCommandListPool: Send + Sync {
    fn queue_type(&self) -> QueueType;

    fn command_lists(&self) -> &[Arc<dyn GfxCommandList>];
}
