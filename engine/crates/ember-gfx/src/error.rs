/// GFX 层的错误
///
/// `SwapchainOutOfDate` 是可恢复的：调用方需要重建 swapchain（通常是窗口尺寸变化）。
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GfxError {
    #[error("device lost: {0}")]
    DeviceLost(String),

    #[error("swapchain is out of date and must be recreated")]
    SwapchainOutOfDate,

    #[error("invalid usage: {0}")]
    InvalidUsage(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl GfxError {
    #[inline]
    pub fn is_device_lost(&self) -> bool {
        matches!(self, Self::DeviceLost(_))
    }
}

pub type GfxResult<T> = Result<T, GfxError>;
