use std::fmt;
use std::sync::Arc;

use ember_gfx::basic::queue_type::QueueType;
use ember_gfx::basic::resource_usage::ResourceUsage;
use ember_gfx::commands::command_list::GfxCommandList;
use ember_gfx::resources::handles::{GfxResourceKey, GfxTextureHandle};
use ember_gfx::resources::resource_data::{GfxBuffer, GfxTexture};
use ember_gfx::swapchain::swapchain::GfxSwapchain;

/// node 在某一帧对某个资源的状态需求
///
/// `initial_state` 是资源声明时的状态，第一次追踪该资源时作为当前状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgResourceUsage {
    pub frame_index: u32,
    pub resource: GfxResourceKey,
    pub initial_state: ResourceUsage,
    pub state: ResourceUsage,
}

impl RgResourceUsage {
    #[inline]
    pub fn new(frame_index: u32, resource: GfxResourceKey, initial_state: ResourceUsage, state: ResourceUsage) -> Self {
        Self {
            frame_index,
            resource,
            initial_state,
            state,
        }
    }

    #[inline]
    pub fn texture_state(frame_index: u32, texture: &GfxTexture, state: ResourceUsage) -> Self {
        Self::new(frame_index, texture.key(), texture.initial_state(), state)
    }

    #[inline]
    pub fn buffer_state(frame_index: u32, buffer: &GfxBuffer, state: ResourceUsage) -> Self {
        Self::new(frame_index, buffer.key(), buffer.initial_state(), state)
    }
}

/// node 的执行回调
///
/// 闭包 `Fn(u32, &dyn GfxCommandList)` 自动实现该 trait。
pub trait RgNodeExecute: Send + Sync {
    fn execute(&self, frame_index: u32, cmd: &dyn GfxCommandList);
}

impl<F> RgNodeExecute for F
where
    F: Fn(u32, &dyn GfxCommandList) + Send + Sync,
{
    #[inline]
    fn execute(&self, frame_index: u32, cmd: &dyn GfxCommandList) {
        self(frame_index, cmd)
    }
}

/// present node 的执行回调，额外接收当前帧的 swapchain image
pub trait RgPresentExecute: Send + Sync {
    fn execute(&self, frame_index: u32, cmd: &dyn GfxCommandList, render_target: GfxTextureHandle);
}

impl<F> RgPresentExecute for F
where
    F: Fn(u32, &dyn GfxCommandList, GfxTextureHandle) + Send + Sync,
{
    #[inline]
    fn execute(&self, frame_index: u32, cmd: &dyn GfxCommandList, render_target: GfxTextureHandle) {
        self(frame_index, cmd, render_target)
    }
}

/// 普通 node 的声明
#[derive(Clone)]
pub struct RgNodeDesc {
    pub name: String,
    pub queue_type: QueueType,
    /// 依赖的 node 名字，在 `build_graph` 时解析
    pub dependencies: Vec<String>,
    pub required_states: Vec<RgResourceUsage>,
    pub execute: Arc<dyn RgNodeExecute>,
}

// new & init
impl RgNodeDesc {
    pub fn new<F>(name: impl Into<String>, queue_type: QueueType, execute: F) -> Self
    where
        F: Fn(u32, &dyn GfxCommandList) + Send + Sync + 'static,
    {
        Self::with_executor(name, queue_type, Arc::new(execute))
    }

    pub fn with_executor(name: impl Into<String>, queue_type: QueueType, execute: Arc<dyn RgNodeExecute>) -> Self {
        Self {
            name: name.into(),
            queue_type,
            dependencies: Vec::new(),
            required_states: Vec::new(),
            execute,
        }
    }
}

// builder
impl RgNodeDesc {
    #[inline]
    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    #[inline]
    pub fn with_state(mut self, usage: RgResourceUsage) -> Self {
        self.required_states.push(usage);
        self
    }

    #[inline]
    pub fn with_states(mut self, usages: impl IntoIterator<Item = RgResourceUsage>) -> Self {
        self.required_states.extend(usages);
        self
    }
}

impl fmt::Debug for RgNodeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RgNodeDesc")
            .field("name", &self.name)
            .field("queue_type", &self.queue_type)
            .field("dependencies", &self.dependencies)
            .field("required_states", &self.required_states)
            .finish_non_exhaustive()
    }
}

/// present node 的声明
///
/// 每个 graph 最多一个，重复设置时后一次覆盖前一次。
#[derive(Clone)]
pub struct RgPresentNodeDesc {
    pub dependencies: Vec<String>,
    pub required_states: Vec<RgResourceUsage>,
    pub swapchain: Option<Arc<dyn GfxSwapchain>>,
    pub execute: Arc<dyn RgPresentExecute>,
}

// new & init
impl RgPresentNodeDesc {
    pub fn new<F>(swapchain: Arc<dyn GfxSwapchain>, execute: F) -> Self
    where
        F: Fn(u32, &dyn GfxCommandList, GfxTextureHandle) + Send + Sync + 'static,
    {
        Self {
            dependencies: Vec::new(),
            required_states: Vec::new(),
            swapchain: Some(swapchain),
            execute: Arc::new(execute),
        }
    }
}

// builder
impl RgPresentNodeDesc {
    #[inline]
    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    #[inline]
    pub fn with_state(mut self, usage: RgResourceUsage) -> Self {
        self.required_states.push(usage);
        self
    }

    #[inline]
    pub fn with_states(mut self, usages: impl IntoIterator<Item = RgResourceUsage>) -> Self {
        self.required_states.extend(usages);
        self
    }
}

impl fmt::Debug for RgPresentNodeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RgPresentNodeDesc")
            .field("dependencies", &self.dependencies)
            .field("required_states", &self.required_states)
            .field("swapchain", &self.swapchain.as_ref().map(|s| s.debug_name()))
            .finish_non_exhaustive()
    }
}
