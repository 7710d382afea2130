use std::any::Any;

use crate::commands::semaphore::GfxSemaphore;
use crate::error::GfxResult;
use crate::resources::handles::GfxTextureHandle;

pub trait GfxSwapchain: Send + Sync {
    /// 获取下一张可用的 image，`image_ready` 会在 image 可以被写入时由 GPU signal
    ///
    /// swapchain 需要重建时返回 [`crate::GfxError::SwapchainOutOfDate`]
    fn acquire_next_image(&self, image_ready: &dyn GfxSemaphore) -> GfxResult<u32>;

    fn render_target(&self, image_index: u32) -> GfxResult<GfxTextureHandle>;

    fn image_count(&self) -> u32;

    fn debug_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}
