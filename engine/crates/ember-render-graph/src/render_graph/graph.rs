//! RenderGraph 的入口
//!
//! 生命周期：`new -> {add_node | set_present_node}* -> build_graph -> {update}* -> reset -> ...`

use std::collections::HashSet;
use std::sync::Arc;

use ember_gfx::GfxError;
use ember_gfx::commands::command_list::GfxPresentResult;
use ember_gfx::commands::semaphore::GfxSemaphore;
use ember_gfx::foundation::device::GfxDevice;
use ember_gfx::resources::handles::GfxResourceKey;
use itertools::Itertools;

use crate::render_graph::command_allocator::RgCommandListAllocator;
use crate::render_graph::dependency::{PRESENT_NODE_NAME, RgDependencyGraph, validate_nodes, wire_semaphores};
use crate::render_graph::error::{RgConfigError, RgError};
use crate::render_graph::frame_counter::RgFrameCounter;
use crate::render_graph::graph_desc::RgGraphDesc;
use crate::render_graph::graph_node::{RgExecutionEnv, RgGraphNode, RgNodeExecutionContext};
use crate::render_graph::node_desc::{RgNodeDesc, RgPresentNodeDesc, RgResourceUsage};
use crate::render_graph::present::RgPresentContext;
use crate::render_graph::resource_tracker::RgResourceTracker;
use crate::render_graph::sync_pool::{RgFrameFences, RgSemaphoreId, RgSemaphorePool};
use crate::render_graph::taskflow::{RgExecutor, RgTaskKind, RgTaskOutcome, RgTaskflow};

/// 一次 `update` 的结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RgFrameStatus {
    /// 没有 present node，所有 node 都已提交
    Completed,
    Presented,
    /// 已经 present，但 swapchain 建议重建
    Suboptimal,
    /// swapchain 需要重建，本帧没有 present
    SwapchainOutOfDate,
}

pub struct RenderGraph {
    device: Arc<dyn GfxDevice>,
    desc: RgGraphDesc,

    node_descs: Vec<RgNodeDesc>,
    present_desc: Option<RgPresentNodeDesc>,

    // build_graph 的产物
    nodes: Vec<RgGraphNode>,
    execution_order: Vec<usize>,
    taskflows: Vec<RgTaskflow>,
    present_contexts: Vec<RgPresentContext>,
    built: bool,

    resource_tracker: RgResourceTracker,
    command_allocator: RgCommandListAllocator,
    semaphore_pool: RgSemaphorePool,
    /// [frame] -> fences
    frame_fences: Vec<RgFrameFences>,
    executor: RgExecutor,

    frame_counter: RgFrameCounter,
}

// new & init
impl RenderGraph {
    pub fn new(device: Arc<dyn GfxDevice>, desc: RgGraphDesc) -> Result<Self, RgError> {
        desc.validate()?;
        log::info!(
            "create render graph: {} frames, command lists (graphics: {}, compute: {}, copy: {}, ray tracing: {})",
            desc.num_frames,
            desc.num_graphics_command_lists,
            desc.num_compute_command_lists,
            desc.num_copy_command_lists,
            desc.num_ray_tracing_command_lists
        );

        let command_allocator = RgCommandListAllocator::new(device.as_ref(), &desc)?;
        let present_contexts = (0..desc.num_frames)
            .map(|frame_index| {
                RgPresentContext::new(
                    device.as_ref(),
                    frame_index,
                    command_allocator.present_command_list(frame_index as usize),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let frame_fences = (0..desc.num_frames).map(|_| RgFrameFences::default()).collect();
        let executor = RgExecutor::new(desc.num_worker_threads)?;

        Ok(Self {
            device,
            frame_counter: RgFrameCounter::new(desc.num_frames),
            desc,

            node_descs: Vec::new(),
            present_desc: None,

            nodes: Vec::new(),
            execution_order: Vec::new(),
            taskflows: Vec::new(),
            present_contexts,
            built: false,

            resource_tracker: RgResourceTracker::new(),
            command_allocator,
            semaphore_pool: RgSemaphorePool::default(),
            frame_fences,
            executor,
        })
    }
}

// declare
impl RenderGraph {
    pub fn add_node(&mut self, desc: RgNodeDesc) -> Result<(), RgConfigError> {
        if desc.name.is_empty() {
            log::error!("node must have a name");
            return Err(RgConfigError::EmptyNodeName);
        }
        if self.node_descs.iter().any(|existing| existing.name == desc.name) {
            log::error!("node `{}` is declared more than once", desc.name);
            return Err(RgConfigError::DuplicateNodeName(desc.name));
        }

        self.node_descs.push(desc);
        self.built = false;
        Ok(())
    }

    /// 设置 present node，重复设置时覆盖之前的
    pub fn set_present_node(&mut self, desc: RgPresentNodeDesc) -> Result<(), RgConfigError> {
        if desc.swapchain.is_none() {
            log::error!("present node must have a valid swapchain");
            return Err(RgConfigError::MissingSwapchain);
        }

        self.present_desc = Some(desc);
        self.built = false;
        Ok(())
    }

    /// 清空所有声明和构建结果
    ///
    /// semaphore、fence、命令列表池会保留下来，供之后的构建复用
    pub fn reset(&mut self) {
        self.node_descs.clear();
        self.present_desc = None;
        self.clear_build_state();
        self.resource_tracker.clear();
    }

    fn clear_build_state(&mut self) {
        self.nodes.clear();
        self.execution_order.clear();
        self.taskflows.clear();
        for context in &mut self.present_contexts {
            context.reset();
        }
        self.command_allocator.reset();
        self.semaphore_pool.rewind();
        self.built = false;
    }
}

// build
impl RenderGraph {
    pub fn build_graph(&mut self) -> Result<(), RgError> {
        self.clear_build_state();
        match self.try_build() {
            Ok(()) => {
                self.built = true;
                log::info!(
                    "render graph built: {} nodes, {} semaphores, order: [{}]",
                    self.nodes.len(),
                    self.semaphore_pool.allocated(),
                    self.execution_order.iter().map(|&idx| self.nodes[idx].name()).join(" → ")
                );
                Ok(())
            }
            Err(e) => {
                log::error!("failed to build render graph: {}", e);
                self.clear_build_state();
                Err(e)
            }
        }
    }

    fn try_build(&mut self) -> Result<(), RgError> {
        self.init_all_nodes()?;

        let present_dependencies = self.present_desc.as_ref().map(|desc| desc.dependencies.as_slice());
        let name_to_index = validate_nodes(&self.node_descs, present_dependencies)?;

        self.register_resources();

        // configure graph
        let dependency_graph = RgDependencyGraph::new(&self.node_descs, &name_to_index);
        let order = dependency_graph.topological_sort(&self.node_descs)?;
        wire_semaphores(
            self.device.as_ref(),
            &order,
            &self.node_descs,
            &name_to_index,
            &mut self.nodes,
            present_dependencies,
            &mut self.present_contexts,
            &mut self.semaphore_pool,
        )?;

        // 末端 node 各自 signal 一个 fence；present node 的依赖由 present 的 fence 覆盖
        let present_fed: HashSet<&str> =
            present_dependencies.unwrap_or_default().iter().map(|name| name.as_str()).collect();
        let mut fence_count = 0;
        for (idx, node) in self.nodes.iter_mut().enumerate() {
            if !dependency_graph.is_sink(idx) || present_fed.contains(node.name()) {
                continue;
            }
            for context in node.contexts_mut() {
                context.signal_fence = Some(fence_count);
            }
            fence_count += 1;
        }
        if present_dependencies.is_some() {
            for context in &mut self.present_contexts {
                context.signal_fence = fence_count;
            }
            fence_count += 1;
        }
        for (frame_index, fences) in self.frame_fences.iter_mut().enumerate() {
            fences.ensure_size(self.device.as_ref(), frame_index, fence_count)?;
        }

        // build taskflow
        self.taskflows = (0..self.desc.num_frames)
            .map(|frame_index| RgTaskflow::build(frame_index, &self.node_descs, present_dependencies))
            .collect();
        self.execution_order = order;
        Ok(())
    }

    /// 为每个 node 分配命令列表，并按帧整理资源需求
    fn init_all_nodes(&mut self) -> Result<(), RgConfigError> {
        let num_frames = self.desc.num_frames;
        for desc in &self.node_descs {
            let command_list_index =
                self.command_allocator.allocate(desc.queue_type).ok_or_else(|| RgConfigError::OutOfCommandLists {
                    queue_type: desc.queue_type,
                    node: desc.name.clone(),
                    budget: self.command_allocator.budget(desc.queue_type),
                })?;
            let usages = Self::usages_per_frame(&desc.name, &desc.required_states, num_frames)?;

            let contexts = usages
                .into_iter()
                .enumerate()
                .map(|(frame_index, usages)| {
                    let command_list =
                        self.command_allocator.command_list(desc.queue_type, frame_index, command_list_index);
                    RgNodeExecutionContext::new(command_list, usages, desc.execute.clone())
                })
                .collect();
            self.nodes.push(RgGraphNode::new(desc.name.clone(), desc.queue_type, contexts));
        }

        if let Some(present_desc) = &self.present_desc {
            let usages = Self::usages_per_frame(PRESENT_NODE_NAME, &present_desc.required_states, num_frames)?;
            for (context, usages) in self.present_contexts.iter_mut().zip(usages) {
                context.resource_usages = usages;
            }
        }
        Ok(())
    }

    /// 按 frame 分组，同一帧内同一资源只能有一个状态
    fn usages_per_frame(
        node: &str,
        required_states: &[RgResourceUsage],
        num_frames: u32,
    ) -> Result<Vec<Vec<RgResourceUsage>>, RgConfigError> {
        let mut per_frame: Vec<Vec<RgResourceUsage>> = vec![Vec::new(); num_frames as usize];
        for usage in required_states {
            let frame = per_frame.get_mut(usage.frame_index as usize).ok_or_else(|| {
                RgConfigError::InvalidFrameIndex {
                    node: node.to_string(),
                    frame_index: usage.frame_index,
                    num_frames,
                }
            })?;

            match frame.iter().find(|existing| existing.resource == usage.resource) {
                Some(existing) if existing.state == usage.state => {
                    log::debug!("node `{}` declares {:?} twice in frame {}", node, usage.resource, usage.frame_index);
                }
                Some(_) => {
                    return Err(RgConfigError::ConflictingResourceUsage {
                        node: node.to_string(),
                        frame_index: usage.frame_index,
                        resource: usage.resource,
                    });
                }
                None => frame.push(*usage),
            }
        }
        Ok(per_frame)
    }

    /// 以声明的初始状态登记所有出现过的资源，已登记的资源保持当前状态
    fn register_resources(&self) {
        let node_states = self.node_descs.iter().flat_map(|desc| desc.required_states.iter());
        let present_states = self.present_desc.iter().flat_map(|desc| desc.required_states.iter());

        // 所属队列在第一次使用时确定，与声明顺序无关
        let mut registered = 0;
        for usage in node_states.chain(present_states) {
            if self.resource_tracker.register(usage.resource, usage.initial_state) {
                registered += 1;
            }
        }
        log::debug!("register {} resources, {} tracked", registered, self.resource_tracker.len());
    }
}

// update
impl RenderGraph {
    /// 执行一帧
    ///
    /// 先等待当前 frame slot 上一次提交的所有 fence，再运行这一帧的 task 图。
    /// swapchain 过期通过 [`RgFrameStatus::SwapchainOutOfDate`] 返回，而不是错误。
    pub fn update(&mut self) -> Result<RgFrameStatus, RgError> {
        if !self.built {
            return Err(RgError::GraphNotBuilt);
        }

        let frame_index = self.frame_counter.frame_slot();
        let fences = &self.frame_fences[frame_index as usize];
        log::debug!("{} update, wait {} fences", self.frame_counter.frame_label(), fences.armed_count());
        fences.wait_armed()?;

        let status = self.run_frame(frame_index)?;
        self.frame_counter.next_frame();
        Ok(status)
    }

    fn run_frame(&self, frame_index: u32) -> Result<RgFrameStatus, RgError> {
        let taskflow = &self.taskflows[frame_index as usize];
        log::trace!("run taskflow of frame {}: {} tasks", taskflow.frame_index(), taskflow.tasks().len());
        let env = RgExecutionEnv {
            tracker: &self.resource_tracker,
            semaphores: &self.semaphore_pool,
            fences: &self.frame_fences[frame_index as usize],
        };

        let outcomes = self.executor.run(taskflow, |task| match task.kind {
            RgTaskKind::Node(idx) => self.nodes[idx].execute(frame_index, &env).map(|_| None),
            RgTaskKind::Present => self.execute_present(frame_index, &env).map(Some),
        });

        let mut status = if self.present_desc.is_some() { RgFrameStatus::Presented } else { RgFrameStatus::Completed };
        let mut first_error = None;
        for (task, outcome) in taskflow.tasks().iter().zip(outcomes) {
            match outcome {
                RgTaskOutcome::Finished(Ok(Some(GfxPresentResult::Suboptimal))) => status = RgFrameStatus::Suboptimal,
                RgTaskOutcome::Finished(Ok(_)) => {}
                RgTaskOutcome::Finished(Err(GfxError::SwapchainOutOfDate)) if task.kind == RgTaskKind::Present => {
                    status = RgFrameStatus::SwapchainOutOfDate;
                }
                RgTaskOutcome::Finished(Err(source)) => {
                    log::error!("{} node `{}` failed: {}", self.frame_counter.frame_label(), task.name, source);
                    if first_error.is_none() {
                        first_error = Some(RgError::NodeExecution {
                            node: task.name.clone(),
                            source,
                        });
                    }
                }
                RgTaskOutcome::Skipped => {
                    log::warn!("{} node `{}` skipped", self.frame_counter.frame_label(), task.name);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(status),
        }
    }

    fn execute_present(&self, frame_index: u32, env: &RgExecutionEnv<'_>) -> Result<GfxPresentResult, GfxError> {
        let desc = self.present_desc.as_ref().ok_or_else(|| GfxError::InvalidUsage("no present node".to_string()))?;
        let swapchain = desc
            .swapchain
            .as_ref()
            .ok_or_else(|| GfxError::InvalidUsage("present node has no swapchain".to_string()))?;
        self.present_contexts[frame_index as usize].execute(frame_index, swapchain.as_ref(), desc.execute.as_ref(), env)
    }

    /// 等待当前 frame slot 上已经提交的工作完成
    ///
    /// 只覆盖当前 slot，其它 slot 的工作可能仍在执行
    pub fn wait_idle(&self) -> Result<(), RgError> {
        self.frame_fences[self.frame_counter.frame_slot() as usize].wait_armed()?;
        Ok(())
    }
}

// getters
impl RenderGraph {
    #[inline]
    pub fn resource_tracker(&self) -> &RgResourceTracker {
        &self.resource_tracker
    }

    #[inline]
    pub fn desc(&self) -> &RgGraphDesc {
        &self.desc
    }

    #[inline]
    pub fn is_built(&self) -> bool {
        self.built
    }

    #[inline]
    pub fn frame_counter(&self) -> &RgFrameCounter {
        &self.frame_counter
    }

    /// 下一次 `update` 使用的 frame slot
    #[inline]
    pub fn frame_index(&self) -> u32 {
        self.frame_counter.frame_slot()
    }

    pub fn node(&self, name: &str) -> Option<&RgGraphNode> {
        self.nodes.iter().find(|node| node.name() == name)
    }

    #[inline]
    pub fn nodes(&self) -> &[RgGraphNode] {
        &self.nodes
    }

    /// 拓扑序下的 node
    pub fn execution_order(&self) -> impl Iterator<Item = &RgGraphNode> {
        self.execution_order.iter().map(|&idx| &self.nodes[idx])
    }

    #[inline]
    pub fn present_context(&self, frame_index: u32) -> Option<&RgPresentContext> {
        self.present_contexts.get(frame_index as usize)
    }

    pub fn semaphore(&self, id: RgSemaphoreId) -> Option<&Arc<dyn GfxSemaphore>> {
        (id.index() < self.semaphore_pool.capacity()).then(|| self.semaphore_pool.get(id))
    }

    /// 已经创建的 semaphore 数量，包括 reset 之后等待复用的
    #[inline]
    pub fn semaphore_capacity(&self) -> usize {
        self.semaphore_pool.capacity()
    }
}

// debug
impl RenderGraph {
    /// 打印构建结果，便于调试依赖和同步关系
    pub fn print_execution_plan(&self) {
        let semaphore_names = |ids: &[RgSemaphoreId]| {
            ids.iter().filter_map(|&id| self.semaphore(id)).map(|s| s.debug_name()).join(", ")
        };
        let resource_label = |resource: GfxResourceKey| match resource {
            GfxResourceKey::Texture(handle) => format!("texture {:?}", handle),
            GfxResourceKey::Buffer(handle) => format!("buffer {:?}", handle),
        };

        log::info!("╔══════════════════════════════════════════════════════════════════╗");
        log::info!("║              RenderGraph Execution Plan                          ║");
        log::info!("╠══════════════════════════════════════════════════════════════════╣");
        log::info!(
            "║ Total Nodes: {}  |  Frames: {}  |  Built: {}",
            self.nodes.len(),
            self.desc.num_frames,
            self.built
        );
        log::info!("║ Execution Order: [{}]", self.execution_order().map(|node| node.name()).join(" → "));
        log::info!("╚══════════════════════════════════════════════════════════════════╝");

        for (order, node) in self.execution_order().enumerate() {
            let Some(context) = node.context(0) else {
                continue;
            };

            log::info!("");
            log::info!("┌─────────────────────────────────────────────────────────────────┐");
            log::info!("│ [{}/{}] Node: \"{}\" ({})", order + 1, self.nodes.len(), node.name(), node.queue_type());
            log::info!("├─────────────────────────────────────────────────────────────────┤");
            log::info!("│ Command List: {}", context.command_list().debug_name());
            if !context.wait_semaphores().is_empty() {
                log::info!("│ Wait:   [{}]", semaphore_names(context.wait_semaphores()));
            }
            if !context.notify_semaphores().is_empty() {
                log::info!("│ Notify: [{}]", semaphore_names(context.notify_semaphores()));
            }
            if context.signals_fence() {
                log::info!("│ Signals frame fence");
            }
            for usage in context.resource_usages() {
                log::info!("│   {} -> {} (initial: {})", resource_label(usage.resource), usage.state, usage.initial_state);
            }
            log::info!("└─────────────────────────────────────────────────────────────────┘");
        }

        if let (Some(desc), Some(context)) = (&self.present_desc, self.present_contexts.first()) {
            log::info!("");
            log::info!("┌─────────────────────────────────────────────────────────────────┐");
            log::info!("│ Present: depends on [{}]", desc.dependencies.join(", "));
            log::info!("├─────────────────────────────────────────────────────────────────┤");
            log::info!("│ Command List: {}", context.command_list().debug_name());
            log::info!("│ Wait:   [{}, {}]", context.image_ready().debug_name(), semaphore_names(context.dependency_semaphores()));
            log::info!("│ Signal: [{}]", context.image_rendered().debug_name());
            for usage in context.resource_usages() {
                log::info!("│   {} -> {} (initial: {})", resource_label(usage.resource), usage.state, usage.initial_state);
            }
            log::info!("└─────────────────────────────────────────────────────────────────┘");
        }
    }
}

impl Drop for RenderGraph {
    fn drop(&mut self) {
        // 销毁命令列表和同步原语之前，所有 slot 上已提交的工作必须完成
        for (frame_index, fences) in self.frame_fences.iter().enumerate() {
            if let Err(e) = fences.wait_armed() {
                log::error!("failed to wait frame {} before destroying render graph: {}", frame_index, e);
            }
        }
    }
}
