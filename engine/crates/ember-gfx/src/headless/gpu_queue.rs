use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use ash::vk;
use crossbeam_channel::{Receiver, Sender};

use crate::error::{GfxError, GfxResult};
use crate::headless::lock;
use crate::resources::handles::GfxTextureHandle;
use crate::headless::sync::{FenceState, SemaphoreState};
use crate::headless::timeline::{HeadlessEvent, HeadlessTimeline};

pub(crate) struct GpuWait {
    pub name: String,
    pub state: Arc<SemaphoreState>,
}

pub(crate) struct GpuFenceSignal {
    pub name: String,
    pub state: Arc<FenceState>,
}

/// 发送给模拟 GPU 线程的命令
pub(crate) enum GpuCommand {
    Submit {
        command_list: String,
        pending: Arc<AtomicU32>,
        waits: Vec<GpuWait>,
        signals: Vec<Arc<SemaphoreState>>,
        fence: Option<GpuFenceSignal>,
    },
    /// swapchain acquire 完成后 signal image-ready
    Signal { semaphore: Arc<SemaphoreState> },
    /// present 只消耗 wait semaphore
    Present { swapchain: String, waits: Vec<GpuWait> },
    /// 之前的命令全部执行完后通知 CPU
    Flush { done: Sender<()> },
    Shutdown,
}

/// 设备和命令列表共享的状态
pub(crate) struct HeadlessShared {
    pub timeline: Arc<HeadlessTimeline>,
    sender: Sender<GpuCommand>,
    lost: AtomicBool,
    /// 按 barrier 的录制顺序，每个 texture 最后所处的 layout
    image_layouts: Mutex<HashMap<GfxTextureHandle, vk::ImageLayout>>,
}

impl HeadlessShared {
    pub fn send(&self, command: GpuCommand) -> GfxResult<()> {
        if self.lost.load(Ordering::Acquire) {
            return Err(GfxError::DeviceLost("headless device was marked as lost".to_string()));
        }
        self.send_unchecked(command)
    }

    pub fn send_unchecked(&self, command: GpuCommand) -> GfxResult<()> {
        self.sender.send(command).map_err(|_| GfxError::DeviceLost("gpu queue thread has exited".to_string()))
    }

    #[inline]
    pub fn mark_lost(&self) {
        self.lost.store(true, Ordering::Release);
    }

    /// 记录 texture 的 layout 转换
    ///
    /// barrier 声明的旧 layout 与上一次转换得到的 layout 不同时，返回上一次的 layout。
    /// 从 `UNDEFINED` 出发的转换会丢弃内容，对任何 layout 都成立。
    pub fn transition_layout(
        &self,
        texture: GfxTextureHandle,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) -> Option<vk::ImageLayout> {
        let previous = lock(&self.image_layouts).insert(texture, new_layout);
        match previous {
            Some(previous) if old_layout != vk::ImageLayout::UNDEFINED && previous != old_layout => Some(previous),
            _ => None,
        }
    }
}

/// 启动模拟 GPU 线程
///
/// 线程在收到 `Shutdown` 或者所有 sender 都被销毁后退出。
pub(crate) fn spawn_gpu_queue(
    timeline: Arc<HeadlessTimeline>,
    gpu_latency: Duration,
    semaphore_timeout: Duration,
) -> GfxResult<(Arc<HeadlessShared>, thread::JoinHandle<()>)> {
    let (sender, receiver) = crossbeam_channel::unbounded::<GpuCommand>();

    let thread_timeline = timeline.clone();
    let handle = thread::Builder::new()
        .name("Headless-GPU-Queue".to_string())
        .spawn(move || gpu_queue_loop(receiver, thread_timeline, gpu_latency, semaphore_timeout))
        .map_err(|e| GfxError::Backend(format!("failed to spawn headless gpu thread: {}", e)))?;

    let shared = Arc::new(HeadlessShared {
        timeline,
        sender,
        lost: AtomicBool::new(false),
        image_layouts: Mutex::new(HashMap::new()),
    });
    Ok((shared, handle))
}

fn gpu_queue_loop(
    receiver: Receiver<GpuCommand>,
    timeline: Arc<HeadlessTimeline>,
    gpu_latency: Duration,
    semaphore_timeout: Duration,
) {
    let wait_all = |submission: &str, waits: &[GpuWait]| {
        for wait in waits {
            if !wait.state.wait_timeout(semaphore_timeout) {
                log::error!("[headless] `{}` waits on semaphore `{}` which is never signaled", submission, wait.name);
                timeline.record(HeadlessEvent::SemaphoreWaitTimeout {
                    submission: submission.to_string(),
                    semaphore: wait.name.clone(),
                });
            }
        }
    };

    while let Ok(command) = receiver.recv() {
        match command {
            GpuCommand::Submit {
                command_list,
                pending,
                waits,
                signals,
                fence,
            } => {
                wait_all(&command_list, &waits);
                if !gpu_latency.is_zero() {
                    thread::sleep(gpu_latency);
                }

                // 先标记完成，再 signal：CPU 被 fence 唤醒时命令列表必然已经空闲
                pending.fetch_sub(1, Ordering::AcqRel);
                timeline.record(HeadlessEvent::Completed { command_list });
                for semaphore in signals {
                    semaphore.signal();
                }
                if let Some(fence) = fence {
                    timeline.record(HeadlessEvent::FenceSignaled { fence: fence.name });
                    fence.state.signal();
                }
            }
            GpuCommand::Signal { semaphore } => semaphore.signal(),
            GpuCommand::Present { swapchain, waits } => wait_all(&swapchain, &waits),
            GpuCommand::Flush { done } => {
                let _ = done.send(());
            }
            GpuCommand::Shutdown => break,
        }
    }
    log::debug!("[headless] gpu queue thread exit");
}
