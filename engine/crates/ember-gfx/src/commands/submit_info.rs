use std::fmt;
use std::sync::Arc;

use crate::commands::fence::GfxFence;
use crate::commands::semaphore::GfxSemaphore;

/// 一次命令列表提交的同步信息
///
/// builder 风格：
/// ```ignore
/// let desc = GfxExecuteDesc::new().wait(image_ready).signal(image_rendered).fence(frame_fence);
/// ```
#[derive(Clone, Default)]
pub struct GfxExecuteDesc {
    pub wait_semaphores: Vec<Arc<dyn GfxSemaphore>>,
    pub signal_semaphores: Vec<Arc<dyn GfxSemaphore>>,
    pub signal_fence: Option<Arc<dyn GfxFence>>,
}

impl GfxExecuteDesc {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// builder
    #[inline]
    pub fn wait(mut self, semaphore: Arc<dyn GfxSemaphore>) -> Self {
        self.wait_semaphores.push(semaphore);
        self
    }

    /// builder
    #[inline]
    pub fn signal(mut self, semaphore: Arc<dyn GfxSemaphore>) -> Self {
        self.signal_semaphores.push(semaphore);
        self
    }

    /// builder
    #[inline]
    pub fn fence(mut self, fence: Arc<dyn GfxFence>) -> Self {
        self.signal_fence = Some(fence);
        self
    }
}

impl fmt::Debug for GfxExecuteDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GfxExecuteDesc")
            .field("wait_semaphores", &self.wait_semaphores.iter().map(|s| s.debug_name()).collect::<Vec<_>>())
            .field("signal_semaphores", &self.signal_semaphores.iter().map(|s| s.debug_name()).collect::<Vec<_>>())
            .field("signal_fence", &self.signal_fence.as_ref().map(|f| f.debug_name()))
            .finish()
    }
}
