use std::sync::{Arc, Mutex, PoisonError};

use ember_gfx::GfxResult;
use ember_gfx::basic::queue_type::QueueType;
use ember_gfx::commands::command_list::GfxCommandList;
use ember_gfx::commands::submit_info::GfxExecuteDesc;

use crate::render_graph::node_desc::{RgNodeExecute, RgResourceUsage};
use crate::render_graph::resource_tracker::RgResourceTracker;
use crate::render_graph::sync_pool::{RgFrameFences, RgSemaphoreId, RgSemaphorePool};

/// node 在某一帧上的执行环境
pub struct RgNodeExecutionContext {
    pub(crate) command_list: Arc<dyn GfxCommandList>,
    pub(crate) wait_semaphores: Vec<RgSemaphoreId>,
    pub(crate) notify_semaphores: Vec<RgSemaphoreId>,
    pub(crate) resource_usages: Vec<RgResourceUsage>,
    /// 末端 node 需要 signal 的 fence，指向所在 frame slot 的 fence 列表
    pub(crate) signal_fence: Option<usize>,

    pub(crate) execute: Arc<dyn RgNodeExecute>,
    /// 录制和提交期间一直持有，防止同一个 context 被并发执行
    self_lock: Mutex<()>,
}

// new & init
impl RgNodeExecutionContext {
    pub(crate) fn new(
        command_list: Arc<dyn GfxCommandList>,
        resource_usages: Vec<RgResourceUsage>,
        execute: Arc<dyn RgNodeExecute>,
    ) -> Self {
        Self {
            command_list,
            wait_semaphores: Vec::new(),
            notify_semaphores: Vec::new(),
            resource_usages,
            signal_fence: None,
            execute,
            self_lock: Mutex::new(()),
        }
    }
}

// getters
impl RgNodeExecutionContext {
    #[inline]
    pub fn command_list(&self) -> &Arc<dyn GfxCommandList> {
        &self.command_list
    }

    #[inline]
    pub fn wait_semaphores(&self) -> &[RgSemaphoreId] {
        &self.wait_semaphores
    }

    #[inline]
    pub fn notify_semaphores(&self) -> &[RgSemaphoreId] {
        &self.notify_semaphores
    }

    #[inline]
    pub fn resource_usages(&self) -> &[RgResourceUsage] {
        &self.resource_usages
    }

    #[inline]
    pub fn signals_fence(&self) -> bool {
        self.signal_fence.is_some()
    }
}

/// 运行时一个 node 需要访问的 graph 共享状态
pub(crate) struct RgExecutionEnv<'a> {
    pub tracker: &'a RgResourceTracker,
    pub semaphores: &'a RgSemaphorePool,
    pub fences: &'a RgFrameFences,
}

/// 由 node 声明构建出的运行时节点，每一帧一个执行环境
pub struct RgGraphNode {
    name: String,
    queue_type: QueueType,
    contexts: Vec<RgNodeExecutionContext>,
}

// new & init
impl RgGraphNode {
    pub(crate) fn new(name: String, queue_type: QueueType, contexts: Vec<RgNodeExecutionContext>) -> Self {
        Self {
            name,
            queue_type,
            contexts,
        }
    }
}

// getters
impl RgGraphNode {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    #[inline]
    pub fn context(&self, frame_index: u32) -> Option<&RgNodeExecutionContext> {
        self.contexts.get(frame_index as usize)
    }

    #[inline]
    pub(crate) fn contexts_mut(&mut self) -> impl Iterator<Item = &mut RgNodeExecutionContext> {
        self.contexts.iter_mut()
    }
}

// execute
impl RgGraphNode {
    /// 录制并提交该 node 在 `frame_index` 上的命令
    ///
    /// 顺序：begin -> barrier -> 用户回调 -> end -> execute
    pub(crate) fn execute(&self, frame_index: u32, env: &RgExecutionEnv<'_>) -> GfxResult<()> {
        let context = &self.contexts[frame_index as usize];
        let _self_lock = context.self_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let cmd = context.command_list.as_ref();
        cmd.begin()?;
        cmd.begin_label(&self.name);
        env.tracker.issue_barriers(cmd, &context.resource_usages, self.queue_type);
        context.execute.execute(frame_index, cmd);
        cmd.end_label();
        cmd.end()?;

        let mut desc = GfxExecuteDesc::new();
        for &semaphore in &context.wait_semaphores {
            desc = desc.wait(env.semaphores.get(semaphore).clone());
        }
        for &semaphore in &context.notify_semaphores {
            desc = desc.signal(env.semaphores.get(semaphore).clone());
        }
        if let Some(fence) = context.signal_fence {
            desc = desc.fence(env.fences.fence(fence).clone());
        }
        cmd.execute(&desc)?;

        if let Some(fence) = context.signal_fence {
            env.fences.arm(fence);
        }
        log::trace!("node `{}` submitted for frame {}", self.name, frame_index);
        Ok(())
    }
}
