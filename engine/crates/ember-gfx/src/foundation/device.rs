use std::sync::Arc;

use crate::commands::command_list::{GfxCommandListPool, GfxCommandListPoolDesc};
use crate::commands::fence::GfxFence;
use crate::commands::semaphore::GfxSemaphore;
use crate::error::GfxResult;

/// 设备：同步原语和命令列表的工厂
pub trait GfxDevice: Send + Sync {
    fn create_semaphore(&self, debug_name: &str) -> GfxResult<Arc<dyn GfxSemaphore>>;

    /// # Parameters
    /// - `signaled`: 创建时是否处于 signaled 状态
    fn create_fence(&self, signaled: bool, debug_name: &str) -> GfxResult<Arc<dyn GfxFence>>;

    fn create_command_list_pool(&self, desc: &GfxCommandListPoolDesc) -> GfxResult<Box<dyn GfxCommandListPool>>;

    /// 阻塞直到所有已提交的工作完成
    fn wait_idle(&self) -> GfxResult<()>;
}
