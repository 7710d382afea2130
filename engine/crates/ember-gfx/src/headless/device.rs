use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::commands::command_list::{GfxCommandListPool, GfxCommandListPoolDesc};
use crate::commands::fence::GfxFence;
use crate::commands::semaphore::GfxSemaphore;
use crate::error::{GfxError, GfxResult};
use crate::foundation::device::GfxDevice;
use crate::headless::command_list::HeadlessCommandListPool;
use crate::headless::gpu_queue::{GpuCommand, HeadlessShared, spawn_gpu_queue};
use crate::headless::sync::{HeadlessFence, HeadlessSemaphore};
use crate::headless::timeline::HeadlessTimeline;

#[derive(Clone, Debug)]
pub struct HeadlessDeviceDesc {
    /// 每次提交在 GPU 线程上额外消耗的时间，用于制造 CPU 领先 GPU 的情况
    pub gpu_latency: Duration,
    /// GPU 线程等待一个 semaphore 的最长时间，超时后记录诊断信息并继续执行
    pub semaphore_timeout: Duration,
}

impl Default for HeadlessDeviceDesc {
    fn default() -> Self {
        Self {
            gpu_latency: Duration::ZERO,
            semaphore_timeout: Duration::from_secs(2),
        }
    }
}

pub struct HeadlessDevice {
    shared: Arc<HeadlessShared>,
    gpu_thread: Option<thread::JoinHandle<()>>,
}

// new & init
impl HeadlessDevice {
    pub fn new(desc: HeadlessDeviceDesc) -> GfxResult<Self> {
        log::info!(
            "[headless] create device, gpu latency: {:?}, semaphore timeout: {:?}",
            desc.gpu_latency,
            desc.semaphore_timeout
        );
        let timeline = Arc::new(HeadlessTimeline::new());
        let (shared, gpu_thread) = spawn_gpu_queue(timeline, desc.gpu_latency, desc.semaphore_timeout)?;
        Ok(Self {
            shared,
            gpu_thread: Some(gpu_thread),
        })
    }
}

// getters
impl HeadlessDevice {
    #[inline]
    pub fn timeline(&self) -> Arc<HeadlessTimeline> {
        self.shared.timeline.clone()
    }

    #[inline]
    pub(crate) fn shared(&self) -> &Arc<HeadlessShared> {
        &self.shared
    }
}

// tools
impl HeadlessDevice {
    /// 模拟设备丢失：之后所有提交都会返回 [`GfxError::DeviceLost`]
    pub fn mark_lost(&self) {
        log::warn!("[headless] device marked as lost");
        self.shared.mark_lost();
    }
}

impl GfxDevice for HeadlessDevice {
    fn create_semaphore(&self, debug_name: &str) -> GfxResult<Arc<dyn GfxSemaphore>> {
        Ok(Arc::new(HeadlessSemaphore::new(debug_name)))
    }

    fn create_fence(&self, signaled: bool, debug_name: &str) -> GfxResult<Arc<dyn GfxFence>> {
        Ok(Arc::new(HeadlessFence::new(signaled, debug_name)))
    }

    fn create_command_list_pool(&self, desc: &GfxCommandListPoolDesc) -> GfxResult<Box<dyn GfxCommandListPool>> {
        log::debug!(
            "[headless] create command list pool `{}`: {} x {}",
            desc.debug_name,
            desc.num_command_lists,
            desc.queue_type
        );
        Ok(Box::new(HeadlessCommandListPool::new(desc, &self.shared)))
    }

    fn wait_idle(&self) -> GfxResult<()> {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        self.shared.send_unchecked(GpuCommand::Flush { done: done_tx })?;
        done_rx.recv().map_err(|_| GfxError::DeviceLost("gpu queue thread has exited".to_string()))
    }
}

impl Drop for HeadlessDevice {
    fn drop(&mut self) {
        // 命令列表可能比设备活得更久，它们持有的 sender 不会让线程退出，这里显式通知
        let _ = self.shared.send_unchecked(GpuCommand::Shutdown);
        if let Some(thread) = self.gpu_thread.take() {
            if thread.join().is_err() {
                log::error!("[headless] gpu queue thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;

    use super::*;
    use crate::basic::queue_type::QueueType;
    use crate::basic::resource_usage::ResourceUsage;
    use crate::commands::barrier::{GfxPipelineBarrierDesc, GfxTextureBarrierDesc};
    use crate::commands::command_list::GfxPresentResult;
    use crate::commands::submit_info::GfxExecuteDesc;
    use crate::headless::swapchain::HeadlessSwapchain;
    use crate::headless::timeline::HeadlessEvent;
    use crate::resources::manager::GfxResourceManager;
    use crate::swapchain::swapchain::GfxSwapchain;

    fn pool(device: &HeadlessDevice, queue_type: QueueType, count: u32) -> Box<dyn GfxCommandListPool> {
        device
            .create_command_list_pool(&GfxCommandListPoolDesc {
                queue_type,
                num_command_lists: count,
                debug_name: "test".to_string(),
            })
            .unwrap()
    }

    #[test]
    fn test_submit_signals_semaphore_then_fence() {
        ember_crate_tools::init_log::init_test_log();

        let device = HeadlessDevice::new(HeadlessDeviceDesc::default()).unwrap();
        let pool = pool(&device, QueueType::Graphics, 2);
        let producer = &pool.command_lists()[0];
        let consumer = &pool.command_lists()[1];

        let semaphore = device.create_semaphore("edge").unwrap();
        let fence = device.create_fence(false, "fence").unwrap();

        producer.begin().unwrap();
        producer.end().unwrap();
        producer.execute(&GfxExecuteDesc::new().signal(semaphore.clone())).unwrap();

        consumer.begin().unwrap();
        consumer.end().unwrap();
        consumer.execute(&GfxExecuteDesc::new().wait(semaphore.clone()).fence(fence.clone())).unwrap();

        fence.wait().unwrap();
        assert!(fence.is_signaled());
        assert!(device.timeline().diagnostics().is_empty());

        let events = device.timeline().events();
        let completed: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                HeadlessEvent::Completed { command_list } => Some(command_list.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(completed, vec!["test-0", "test-1"]);
    }

    #[test]
    fn test_invalid_recording_order() {
        let device = HeadlessDevice::new(HeadlessDeviceDesc::default()).unwrap();
        let pool = pool(&device, QueueType::Compute, 1);
        let cmd = &pool.command_lists()[0];

        assert!(matches!(cmd.end(), Err(GfxError::InvalidUsage(_))));
        cmd.begin().unwrap();
        assert!(matches!(cmd.begin(), Err(GfxError::InvalidUsage(_))));
        assert!(matches!(cmd.execute(&GfxExecuteDesc::new()), Err(GfxError::InvalidUsage(_))));
        cmd.end().unwrap();
        cmd.execute(&GfxExecuteDesc::new()).unwrap();
        device.wait_idle().unwrap();
    }

    #[test]
    fn test_reuse_while_pending_is_reported() {
        let device = HeadlessDevice::new(HeadlessDeviceDesc {
            gpu_latency: Duration::from_millis(50),
            ..Default::default()
        })
        .unwrap();
        let pool = pool(&device, QueueType::Graphics, 1);
        let cmd = &pool.command_lists()[0];

        cmd.begin().unwrap();
        cmd.end().unwrap();
        cmd.execute(&GfxExecuteDesc::new()).unwrap();
        cmd.begin().unwrap();
        cmd.end().unwrap();

        assert_eq!(
            device.timeline().diagnostics(),
            vec![HeadlessEvent::ReusedWhilePending {
                command_list: "test-0".to_string()
            }]
        );
    }

    #[test]
    fn test_unsignaled_semaphore_times_out() {
        let device = HeadlessDevice::new(HeadlessDeviceDesc {
            semaphore_timeout: Duration::from_millis(10),
            ..Default::default()
        })
        .unwrap();
        let pool = pool(&device, QueueType::Graphics, 1);
        let cmd = &pool.command_lists()[0];
        let orphan = device.create_semaphore("orphan").unwrap();

        cmd.begin().unwrap();
        cmd.end().unwrap();
        cmd.execute(&GfxExecuteDesc::new().wait(orphan)).unwrap();
        device.wait_idle().unwrap();

        assert_eq!(
            device.timeline().diagnostics(),
            vec![HeadlessEvent::SemaphoreWaitTimeout {
                submission: "test-0".to_string(),
                semaphore: "orphan".to_string()
            }]
        );
    }

    #[test]
    fn test_swapchain_acquire_and_invalidate() {
        let device = HeadlessDevice::new(HeadlessDeviceDesc::default()).unwrap();
        let mut manager = GfxResourceManager::new();
        let swapchain = HeadlessSwapchain::new(&device, &mut manager, "main", 2);
        let image_ready = device.create_semaphore("image-ready").unwrap();

        assert_eq!(swapchain.acquire_next_image(image_ready.as_ref()).unwrap(), 0);
        assert_eq!(swapchain.acquire_next_image(image_ready.as_ref()).unwrap(), 1);
        assert_eq!(swapchain.acquire_next_image(image_ready.as_ref()).unwrap(), 0);

        let rt = swapchain.render_target(1).unwrap();
        assert_eq!(manager.initial_state(rt.into()), Some(ResourceUsage::Undefined));
        assert!(swapchain.render_target(2).is_err());

        swapchain.invalidate();
        assert_eq!(swapchain.acquire_next_image(image_ready.as_ref()), Err(GfxError::SwapchainOutOfDate));

        let pool = pool(&device, QueueType::Graphics, 1);
        let cmd = &pool.command_lists()[0];
        cmd.begin().unwrap();
        cmd.pipeline_barrier(&GfxPipelineBarrierDesc::render_target_to_present(rt));
        cmd.end().unwrap();
        assert_eq!(cmd.present(&swapchain, 0, &[]), Err(GfxError::SwapchainOutOfDate));

        swapchain.recreate();
        assert_eq!(swapchain.acquire_next_image(image_ready.as_ref()).unwrap(), 0);
    }

    #[test]
    fn test_layout_mismatch_is_reported() {
        let device = HeadlessDevice::new(HeadlessDeviceDesc::default()).unwrap();
        let mut manager = GfxResourceManager::new();
        let tex = manager.register_texture("gbuffer", ResourceUsage::Undefined);
        let pool = pool(&device, QueueType::Graphics, 1);
        let cmd = &pool.command_lists()[0];

        let barrier = |old_state, new_state| {
            let mut desc = GfxPipelineBarrierDesc::new();
            desc.texture_barrier(GfxTextureBarrierDesc::new(tex, old_state, new_state));
            desc
        };

        cmd.begin().unwrap();
        cmd.pipeline_barrier(&barrier(ResourceUsage::Undefined, ResourceUsage::CopyDst));
        cmd.pipeline_barrier(&barrier(ResourceUsage::CopyDst, ResourceUsage::ShaderResource));
        assert!(device.timeline().diagnostics().is_empty());

        // 声明的旧状态与实际的 layout 不一致
        cmd.pipeline_barrier(&barrier(ResourceUsage::RenderTarget, ResourceUsage::CopySrc));
        // Undefined 不关心之前的内容
        cmd.pipeline_barrier(&barrier(ResourceUsage::Undefined, ResourceUsage::RenderTarget));
        cmd.end().unwrap();

        assert_eq!(
            device.timeline().diagnostics(),
            vec![HeadlessEvent::LayoutMismatch {
                command_list: "test-0".to_string(),
                texture: tex,
                expected: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                found: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            }]
        );
    }

    #[test]
    fn test_suboptimal_present_until_recreate() {
        let device = HeadlessDevice::new(HeadlessDeviceDesc::default()).unwrap();
        let mut manager = GfxResourceManager::new();
        let swapchain = HeadlessSwapchain::new(&device, &mut manager, "main", 2);
        let image_ready = device.create_semaphore("image-ready").unwrap();
        let pool = pool(&device, QueueType::Graphics, 1);
        let cmd = &pool.command_lists()[0];

        assert_eq!(cmd.present(&swapchain, 0, &[]), Ok(GfxPresentResult::Success));

        swapchain.set_suboptimal(true);
        let image_index = swapchain.acquire_next_image(image_ready.as_ref()).unwrap();
        assert_eq!(cmd.present(&swapchain, image_index, &[]), Ok(GfxPresentResult::Suboptimal));

        swapchain.recreate();
        assert!(!swapchain.is_suboptimal());
        assert_eq!(cmd.present(&swapchain, 0, &[]), Ok(GfxPresentResult::Success));
    }

    #[test]
    fn test_lost_device_rejects_submission() {
        let device = HeadlessDevice::new(HeadlessDeviceDesc::default()).unwrap();
        let pool = pool(&device, QueueType::Copy, 1);
        let cmd = &pool.command_lists()[0];

        device.mark_lost();
        cmd.begin().unwrap();
        cmd.end().unwrap();
        let err = cmd.execute(&GfxExecuteDesc::new()).unwrap_err();
        assert!(err.is_device_lost());
        assert_eq!(cmd.queue_type(), QueueType::Copy);
    }
}
