use std::any::Any;

/// GPU -> GPU 的同步原语
///
/// 语义与 binary semaphore 相同：一次 signal 对应一次 wait。
pub trait GfxSemaphore: Send + Sync {
    fn debug_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}
