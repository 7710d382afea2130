use std::sync::Mutex;

use ash::vk;
use itertools::Itertools;

use crate::commands::barrier::GfxPipelineBarrierDesc;
use crate::headless::lock;
use crate::resources::handles::GfxTextureHandle;

/// 时间线上的一条记录
///
/// CPU 侧的录制、提交和 GPU 线程的完成事件都写入同一条时间线，
/// 因此它们之间的先后关系就是真实发生的顺序。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeadlessEvent {
    Begin {
        command_list: String,
    },
    End {
        command_list: String,
    },
    Barrier {
        command_list: String,
        barrier: GfxPipelineBarrierDesc,
    },
    BeginLabel {
        command_list: String,
        label: String,
    },
    EndLabel {
        command_list: String,
    },
    Submit {
        command_list: String,
        wait_semaphores: Vec<String>,
        signal_semaphores: Vec<String>,
        signal_fence: Option<String>,
    },
    /// GPU 线程执行完一次提交
    Completed {
        command_list: String,
    },
    FenceSignaled {
        fence: String,
    },
    Acquire {
        swapchain: String,
        image_index: u32,
        semaphore: String,
    },
    Present {
        swapchain: String,
        image_index: u32,
        wait_semaphores: Vec<String>,
    },

    // 诊断信息
    /// GPU 线程等待某个 semaphore 超时，意味着它永远不会被 signal
    SemaphoreWaitTimeout {
        submission: String,
        semaphore: String,
    },
    /// 命令列表在上一次提交完成之前又开始录制
    ReusedWhilePending {
        command_list: String,
    },
    /// barrier 声明的旧 layout 与 texture 实际所处的 layout 不一致
    LayoutMismatch {
        command_list: String,
        texture: GfxTextureHandle,
        expected: vk::ImageLayout,
        found: vk::ImageLayout,
    },
}

impl HeadlessEvent {
    /// 事件所属的命令列表
    pub fn command_list(&self) -> Option<&str> {
        match self {
            HeadlessEvent::Begin { command_list }
            | HeadlessEvent::End { command_list }
            | HeadlessEvent::Barrier { command_list, .. }
            | HeadlessEvent::BeginLabel { command_list, .. }
            | HeadlessEvent::EndLabel { command_list }
            | HeadlessEvent::Submit { command_list, .. }
            | HeadlessEvent::Completed { command_list }
            | HeadlessEvent::ReusedWhilePending { command_list }
            | HeadlessEvent::LayoutMismatch { command_list, .. } => Some(command_list),
            _ => None,
        }
    }

    #[inline]
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            HeadlessEvent::SemaphoreWaitTimeout { .. }
                | HeadlessEvent::ReusedWhilePending { .. }
                | HeadlessEvent::LayoutMismatch { .. }
        )
    }
}

#[derive(Default)]
pub struct HeadlessTimeline {
    events: Mutex<Vec<HeadlessEvent>>,
}

impl HeadlessTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: HeadlessEvent) {
        log::trace!("[headless] {:?}", event);
        lock(&self.events).push(event);
    }

    /// 当前所有事件的快照
    pub fn events(&self) -> Vec<HeadlessEvent> {
        lock(&self.events).clone()
    }

    pub fn diagnostics(&self) -> Vec<HeadlessEvent> {
        lock(&self.events).iter().filter(|e| e.is_diagnostic()).cloned().collect()
    }

    /// 某个命令列表相关的所有事件，按发生顺序
    pub fn events_of(&self, command_list: &str) -> Vec<HeadlessEvent> {
        lock(&self.events).iter().filter(|e| e.command_list() == Some(command_list)).cloned().collect()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }

    /// 以多行文本的形式输出时间线，用于调试
    pub fn dump(&self) -> String {
        lock(&self.events).iter().enumerate().map(|(idx, event)| format!("{:>4}: {:?}", idx, event)).join("\n")
    }
}
