//! present node
//!
//! 每一帧固定的最后一个 task：获取 swapchain image、录制用户的 present 回调、
//! 转换到 present 状态、提交并 present。

use std::sync::{Arc, Mutex, PoisonError};

use ember_gfx::basic::queue_type::QueueType;
use ember_gfx::commands::barrier::GfxPipelineBarrierDesc;
use ember_gfx::commands::command_list::{GfxCommandList, GfxPresentResult};
use ember_gfx::commands::semaphore::GfxSemaphore;
use ember_gfx::commands::submit_info::GfxExecuteDesc;
use ember_gfx::foundation::device::GfxDevice;
use ember_gfx::swapchain::swapchain::GfxSwapchain;
use ember_gfx::{GfxError, GfxResult};

use crate::render_graph::graph_node::RgExecutionEnv;
use crate::render_graph::node_desc::{RgPresentExecute, RgResourceUsage};
use crate::render_graph::sync_pool::RgSemaphoreId;

/// present node 在某一帧上的执行环境
///
/// 两个 semaphore 在 graph 创建时生成，`reset` 不会重建它们。
pub struct RgPresentContext {
    pub(crate) image_ready: Arc<dyn GfxSemaphore>,
    pub(crate) image_rendered: Arc<dyn GfxSemaphore>,
    pub(crate) command_list: Arc<dyn GfxCommandList>,

    pub(crate) dependency_semaphores: Vec<RgSemaphoreId>,
    pub(crate) resource_usages: Vec<RgResourceUsage>,
    pub(crate) signal_fence: usize,

    self_lock: Mutex<()>,
}

// new & init
impl RgPresentContext {
    pub(crate) fn new(
        device: &dyn GfxDevice,
        frame_index: u32,
        command_list: Arc<dyn GfxCommandList>,
    ) -> GfxResult<Self> {
        Ok(Self {
            image_ready: device.create_semaphore(&format!("rg-image-ready-{}", frame_index))?,
            image_rendered: device.create_semaphore(&format!("rg-image-rendered-{}", frame_index))?,
            command_list,
            dependency_semaphores: Vec::new(),
            resource_usages: Vec::new(),
            signal_fence: 0,
            self_lock: Mutex::new(()),
        })
    }

    /// 清空本次构建的依赖，保留 semaphore 和命令列表
    pub(crate) fn reset(&mut self) {
        self.dependency_semaphores.clear();
        self.resource_usages.clear();
        self.signal_fence = 0;
    }
}

// getters
impl RgPresentContext {
    #[inline]
    pub fn image_ready(&self) -> &Arc<dyn GfxSemaphore> {
        &self.image_ready
    }

    #[inline]
    pub fn image_rendered(&self) -> &Arc<dyn GfxSemaphore> {
        &self.image_rendered
    }

    #[inline]
    pub fn command_list(&self) -> &Arc<dyn GfxCommandList> {
        &self.command_list
    }

    #[inline]
    pub fn dependency_semaphores(&self) -> &[RgSemaphoreId] {
        &self.dependency_semaphores
    }

    #[inline]
    pub fn resource_usages(&self) -> &[RgResourceUsage] {
        &self.resource_usages
    }
}

// execute
impl RgPresentContext {
    /// acquire -> begin -> barrier -> undefined→render-target -> 用户回调 -> render-target→present
    /// -> 提交 -> present
    ///
    /// swapchain 过期时返回 [`GfxError::SwapchainOutOfDate`]，此时依赖的 semaphore 仍然会被消耗，
    /// fence 仍然会被 signal，下一次使用这个 frame slot 时不会出现无人 signal 的等待。
    /// acquire 之后找不到 render target 时同样处理。
    pub(crate) fn execute(
        &self,
        frame_index: u32,
        swapchain: &dyn GfxSwapchain,
        execute: &dyn RgPresentExecute,
        env: &RgExecutionEnv<'_>,
    ) -> GfxResult<GfxPresentResult> {
        let _self_lock = self.self_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let image_index = match swapchain.acquire_next_image(self.image_ready.as_ref()) {
            Ok(image_index) => image_index,
            Err(GfxError::SwapchainOutOfDate) => {
                log::warn!("swapchain `{}` is out of date, skip present of frame {}", swapchain.debug_name(), frame_index);
                self.drain_dependencies(env, false)?;
                return Err(GfxError::SwapchainOutOfDate);
            }
            Err(e) => return Err(e),
        };
        let render_target = match swapchain.render_target(image_index) {
            Ok(render_target) => render_target,
            Err(e) => {
                log::error!("swapchain `{}` has no render target {}: {}", swapchain.debug_name(), image_index, e);
                self.drain_dependencies(env, true)?;
                return Err(e);
            }
        };

        let cmd = self.command_list.as_ref();
        cmd.begin()?;
        cmd.begin_label("present");
        env.tracker.issue_barriers(cmd, &self.resource_usages, QueueType::Graphics);
        cmd.pipeline_barrier(&GfxPipelineBarrierDesc::undefined_to_render_target(render_target));
        execute.execute(frame_index, cmd, render_target);
        cmd.end_label();
        cmd.pipeline_barrier(&GfxPipelineBarrierDesc::render_target_to_present(render_target));
        cmd.end()?;

        let mut desc = GfxExecuteDesc::new().wait(self.image_ready.clone());
        for &semaphore in &self.dependency_semaphores {
            desc = desc.wait(env.semaphores.get(semaphore).clone());
        }
        let desc = desc.signal(self.image_rendered.clone()).fence(env.fences.fence(self.signal_fence).clone());
        cmd.execute(&desc)?;
        env.fences.arm(self.signal_fence);

        cmd.present(swapchain, image_index, std::slice::from_ref(&self.image_rendered))
    }

    /// 提交一个空的命令列表，消耗依赖的 semaphore 并 signal fence
    ///
    /// `acquired` 为 true 时 image_ready 已经被 acquire signal，同样需要消耗
    fn drain_dependencies(&self, env: &RgExecutionEnv<'_>, acquired: bool) -> GfxResult<()> {
        let cmd = self.command_list.as_ref();
        cmd.begin()?;
        cmd.end()?;

        let mut desc = GfxExecuteDesc::new();
        if acquired {
            desc = desc.wait(self.image_ready.clone());
        }
        for &semaphore in &self.dependency_semaphores {
            desc = desc.wait(env.semaphores.get(semaphore).clone());
        }
        cmd.execute(&desc.fence(env.fences.fence(self.signal_fence).clone()))?;
        env.fences.arm(self.signal_fence);
        Ok(())
    }
}
