use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::basic::resource_usage::ResourceUsage;
use crate::commands::semaphore::GfxSemaphore;
use crate::error::{GfxError, GfxResult};
use crate::headless::device::HeadlessDevice;
use crate::headless::gpu_queue::{GpuCommand, HeadlessShared};
use crate::headless::sync::headless_semaphore;
use crate::headless::timeline::HeadlessEvent;
use crate::resources::handles::GfxTextureHandle;
use crate::resources::manager::GfxResourceManager;
use crate::swapchain::swapchain::GfxSwapchain;

/// 轮流返回 N 张 image 的 swapchain
///
/// [`HeadlessSwapchain::invalidate`] 模拟窗口尺寸变化：之后 acquire 和 present 都会返回
/// [`GfxError::SwapchainOutOfDate`]，直到调用 [`HeadlessSwapchain::recreate`]。
pub struct HeadlessSwapchain {
    name: String,
    shared: Arc<HeadlessShared>,
    render_targets: Vec<GfxTextureHandle>,

    next_image: AtomicU32,
    out_of_date: AtomicBool,
    suboptimal: AtomicBool,
}

// new & init
impl HeadlessSwapchain {
    pub fn new(
        device: &HeadlessDevice,
        resource_manager: &mut GfxResourceManager,
        name: impl Into<String>,
        image_count: u32,
    ) -> Self {
        let name = name.into();
        let render_targets = (0..image_count)
            .map(|idx| resource_manager.register_texture(format!("{}-image-{}", name, idx), ResourceUsage::Undefined))
            .collect();
        log::info!("[headless] create swapchain `{}` with {} images", name, image_count);

        Self {
            name,
            shared: device.shared().clone(),
            render_targets,
            next_image: AtomicU32::new(0),
            out_of_date: AtomicBool::new(false),
            suboptimal: AtomicBool::new(false),
        }
    }
}

// tools
impl HeadlessSwapchain {
    pub fn invalidate(&self) {
        log::info!("[headless] swapchain `{}` is out of date", self.name);
        self.out_of_date.store(true, Ordering::Release);
    }

    pub fn recreate(&self) {
        self.next_image.store(0, Ordering::Release);
        self.out_of_date.store(false, Ordering::Release);
        self.suboptimal.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_out_of_date(&self) -> bool {
        self.out_of_date.load(Ordering::Acquire)
    }

    /// 之后的 present 仍然成功，但返回 [`crate::commands::command_list::GfxPresentResult::Suboptimal`]，直到 `recreate`
    pub fn set_suboptimal(&self, suboptimal: bool) {
        self.suboptimal.store(suboptimal, Ordering::Release);
    }

    #[inline]
    pub fn is_suboptimal(&self) -> bool {
        self.suboptimal.load(Ordering::Acquire)
    }
}

impl GfxSwapchain for HeadlessSwapchain {
    fn acquire_next_image(&self, image_ready: &dyn GfxSemaphore) -> GfxResult<u32> {
        if self.is_out_of_date() {
            return Err(GfxError::SwapchainOutOfDate);
        }
        if self.render_targets.is_empty() {
            return Err(GfxError::InvalidUsage(format!("swapchain `{}` has no images", self.name)));
        }

        let semaphore = headless_semaphore(image_ready)?;
        let image_index = self.next_image.fetch_add(1, Ordering::AcqRel) % self.render_targets.len() as u32;
        self.shared.timeline.record(HeadlessEvent::Acquire {
            swapchain: self.name.clone(),
            image_index,
            semaphore: semaphore.debug_name().to_string(),
        });
        self.shared.send(GpuCommand::Signal {
            semaphore: semaphore.state(),
        })?;
        Ok(image_index)
    }

    fn render_target(&self, image_index: u32) -> GfxResult<GfxTextureHandle> {
        self.render_targets.get(image_index as usize).copied().ok_or_else(|| {
            GfxError::InvalidUsage(format!("swapchain `{}` has no image {}", self.name, image_index))
        })
    }

    #[inline]
    fn image_count(&self) -> u32 {
        self.render_targets.len() as u32
    }

    #[inline]
    fn debug_name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }
}
