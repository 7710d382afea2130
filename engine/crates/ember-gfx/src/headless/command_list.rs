use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::basic::queue_type::QueueType;
use crate::commands::barrier::GfxPipelineBarrierDesc;
use crate::commands::command_list::{GfxCommandList, GfxCommandListPool, GfxCommandListPoolDesc, GfxPresentResult};
use crate::commands::fence::GfxFence;
use crate::commands::semaphore::GfxSemaphore;
use crate::commands::submit_info::GfxExecuteDesc;
use crate::error::{GfxError, GfxResult};
use crate::headless::gpu_queue::{GpuCommand, GpuFenceSignal, GpuWait, HeadlessShared};
use crate::headless::swapchain::HeadlessSwapchain;
use crate::headless::sync::{headless_fence, headless_semaphore};
use crate::headless::timeline::HeadlessEvent;
use crate::swapchain::swapchain::GfxSwapchain;

pub struct HeadlessCommandList {
    name: String,
    queue_type: QueueType,
    shared: Arc<HeadlessShared>,

    recording: AtomicBool,
    /// 已提交但 GPU 线程还没有执行完的次数
    pending: Arc<AtomicU32>,
}

// new & init
impl HeadlessCommandList {
    pub(crate) fn new(name: String, queue_type: QueueType, shared: Arc<HeadlessShared>) -> Self {
        Self {
            name,
            queue_type,
            shared,
            recording: AtomicBool::new(false),
            pending: Arc::new(AtomicU32::new(0)),
        }
    }
}

// getters
impl HeadlessCommandList {
    #[inline]
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    #[inline]
    pub fn pending_submissions(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }
}

// tools
impl HeadlessCommandList {
    fn record(&self, event: HeadlessEvent) {
        self.shared.timeline.record(event);
    }

    fn collect_waits(semaphores: &[Arc<dyn GfxSemaphore>]) -> GfxResult<Vec<GpuWait>> {
        semaphores
            .iter()
            .map(|semaphore| {
                let semaphore = headless_semaphore(semaphore.as_ref())?;
                Ok(GpuWait {
                    name: semaphore.debug_name().to_string(),
                    state: semaphore.state(),
                })
            })
            .collect()
    }
}

impl GfxCommandList for HeadlessCommandList {
    #[inline]
    fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    #[inline]
    fn debug_name(&self) -> &str {
        &self.name
    }

    fn begin(&self) -> GfxResult<()> {
        if self.recording.swap(true, Ordering::AcqRel) {
            return Err(GfxError::InvalidUsage(format!("command list `{}` is already recording", self.name)));
        }
        if self.pending.load(Ordering::Acquire) > 0 {
            log::error!("[headless] command list `{}` is re-recorded while still pending on the gpu", self.name);
            self.record(HeadlessEvent::ReusedWhilePending {
                command_list: self.name.clone(),
            });
        }
        self.record(HeadlessEvent::Begin {
            command_list: self.name.clone(),
        });
        Ok(())
    }

    fn end(&self) -> GfxResult<()> {
        if !self.recording.swap(false, Ordering::AcqRel) {
            return Err(GfxError::InvalidUsage(format!("command list `{}` is not recording", self.name)));
        }
        self.record(HeadlessEvent::End {
            command_list: self.name.clone(),
        });
        Ok(())
    }

    fn pipeline_barrier(&self, barrier: &GfxPipelineBarrierDesc) {
        for texture_barrier in barrier.texture_barriers() {
            if texture_barrier.new_state.is_buffer_only() {
                log::warn!(
                    "[headless] `{}`: texture transitioned into buffer-only state {}",
                    self.name,
                    texture_barrier.new_state
                );
            }

            let mask = texture_barrier.mask();
            log::trace!(
                "[headless] `{}`: {:?} {:?}/{:?} -> {:?}/{:?}",
                self.name,
                texture_barrier.texture,
                mask.src_stage,
                mask.src_access,
                mask.dst_stage,
                mask.dst_access
            );

            let (old_layout, new_layout) = texture_barrier.layouts();
            if let Some(found) = self.shared.transition_layout(texture_barrier.texture, old_layout, new_layout) {
                log::error!(
                    "[headless] `{}`: barrier on {:?} expects layout {:?}, but the texture is in {:?}",
                    self.name,
                    texture_barrier.texture,
                    old_layout,
                    found
                );
                self.record(HeadlessEvent::LayoutMismatch {
                    command_list: self.name.clone(),
                    texture: texture_barrier.texture,
                    expected: old_layout,
                    found,
                });
            }
        }
        for buffer_barrier in barrier.buffer_barriers() {
            let mask = buffer_barrier.mask();
            log::trace!(
                "[headless] `{}`: {:?} {:?}/{:?} -> {:?}/{:?}",
                self.name,
                buffer_barrier.buffer,
                mask.src_stage,
                mask.src_access,
                mask.dst_stage,
                mask.dst_access
            );
        }

        self.record(HeadlessEvent::Barrier {
            command_list: self.name.clone(),
            barrier: barrier.clone(),
        });
    }

    fn begin_label(&self, label: &str) {
        self.record(HeadlessEvent::BeginLabel {
            command_list: self.name.clone(),
            label: label.to_string(),
        });
    }

    fn end_label(&self) {
        self.record(HeadlessEvent::EndLabel {
            command_list: self.name.clone(),
        });
    }

    fn execute(&self, desc: &GfxExecuteDesc) -> GfxResult<()> {
        if self.is_recording() {
            return Err(GfxError::InvalidUsage(format!("command list `{}` must be ended before execute", self.name)));
        }

        let waits = Self::collect_waits(&desc.wait_semaphores)?;
        let signals = desc
            .signal_semaphores
            .iter()
            .map(|semaphore| headless_semaphore(semaphore.as_ref()).map(|s| s.state()))
            .collect::<GfxResult<Vec<_>>>()?;
        let fence = match &desc.signal_fence {
            Some(fence) => {
                let fence = headless_fence(fence.as_ref())?;
                Some(GpuFenceSignal {
                    name: fence.debug_name().to_string(),
                    state: fence.state(),
                })
            }
            None => None,
        };

        self.record(HeadlessEvent::Submit {
            command_list: self.name.clone(),
            wait_semaphores: desc.wait_semaphores.iter().map(|s| s.debug_name().to_string()).collect(),
            signal_semaphores: desc.signal_semaphores.iter().map(|s| s.debug_name().to_string()).collect(),
            signal_fence: desc.signal_fence.as_ref().map(|f| f.debug_name().to_string()),
        });

        self.pending.fetch_add(1, Ordering::AcqRel);
        let result = self.shared.send(GpuCommand::Submit {
            command_list: self.name.clone(),
            pending: self.pending.clone(),
            waits,
            signals,
            fence,
        });
        if result.is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
        result
    }

    fn present(
        &self,
        swapchain: &dyn GfxSwapchain,
        image_index: u32,
        wait_semaphores: &[Arc<dyn GfxSemaphore>],
    ) -> GfxResult<GfxPresentResult> {
        let swapchain = swapchain.as_any().downcast_ref::<HeadlessSwapchain>().ok_or_else(|| {
            GfxError::InvalidUsage(format!("swapchain `{}` was not created by the headless device", swapchain.debug_name()))
        })?;

        // 即使 swapchain 已经过期，wait semaphore 也会被消耗
        let waits = Self::collect_waits(wait_semaphores)?;
        self.shared.send(GpuCommand::Present {
            swapchain: swapchain.debug_name().to_string(),
            waits,
        })?;

        if swapchain.is_out_of_date() {
            return Err(GfxError::SwapchainOutOfDate);
        }

        self.record(HeadlessEvent::Present {
            swapchain: swapchain.debug_name().to_string(),
            image_index,
            wait_semaphores: wait_semaphores.iter().map(|s| s.debug_name().to_string()).collect(),
        });
        if swapchain.is_suboptimal() {
            return Ok(GfxPresentResult::Suboptimal);
        }
        Ok(GfxPresentResult::Success)
    }
}

pub struct HeadlessCommandListPool {
    queue_type: QueueType,
    command_lists: Vec<Arc<dyn GfxCommandList>>,
}

impl HeadlessCommandListPool {
    pub(crate) fn new(desc: &GfxCommandListPoolDesc, shared: &Arc<HeadlessShared>) -> Self {
        let command_lists = (0..desc.num_command_lists)
            .map(|idx| {
                Arc::new(HeadlessCommandList::new(format!("{}-{}", desc.debug_name, idx), desc.queue_type, shared.clone()))
                    as Arc<dyn GfxCommandList>
            })
            .collect();
        Self {
            queue_type: desc.queue_type,
            command_lists,
        }
    }
}

impl GfxCommandListPool for HeadlessCommandListPool {
    #[inline]
    fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    #[inline]
    fn command_lists(&self) -> &[Arc<dyn GfxCommandList>] {
        &self.command_lists
    }
}
