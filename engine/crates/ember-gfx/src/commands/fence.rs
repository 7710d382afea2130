use std::any::Any;

use crate::error::GfxResult;

/// GPU -> CPU 的同步原语
pub trait GfxFence: Send + Sync {
    /// 阻塞直到 fence 被 signal
    fn wait(&self) -> GfxResult<()>;

    /// 将 fence 重置为 unsignaled，提交前需要保证 fence 处于 unsignaled 状态
    fn reset(&self) -> GfxResult<()>;

    fn is_signaled(&self) -> bool;

    fn debug_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}
