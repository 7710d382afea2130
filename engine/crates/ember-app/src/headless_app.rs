//! 在 headless 后端上运行的 RenderGraph 演示
//!
//! ```text
//! ┌──────────┐     ┌──────────┐
//! │  upload  │     │  shadow  │
//! └────┬─────┘     └────┬─────┘
//!      ▼                │
//! ┌──────────┐          │
//! │ skinning │          │
//! └────┬─────┘          │
//!      ▼                ▼
//! ┌───────────────────────┐
//! │        gbuffer        │
//! └───────────┬───────────┘
//!             ▼
//! ┌───────────────────────┐
//! │       lighting        │
//! └───────────┬───────────┘
//!             ▼
//!       [ present ]
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;
use ember_gfx::basic::queue_type::QueueType;
use ember_gfx::basic::resource_usage::ResourceUsage;
use ember_gfx::foundation::device::GfxDevice;
use ember_gfx::headless::{HeadlessDevice, HeadlessDeviceDesc, HeadlessSwapchain};
use ember_gfx::resources::handles::{GfxBufferHandle, GfxTextureHandle};
use ember_gfx::resources::manager::GfxResourceManager;
use ember_render_graph::render_graph::{RenderGraph, RgFrameStatus, RgNodeDesc, RgPresentNodeDesc, RgResourceUsage};

use crate::app_config::HeadlessAppConfig;

/// demo 用到的资源，所有帧共享
struct SceneResources {
    vertex_buffer: GfxBufferHandle,
    shadow_map: GfxTextureHandle,
    gbuffer: GfxTextureHandle,
    hdr_color: GfxTextureHandle,
}

/// 一次运行的统计
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeadlessRunStats {
    /// 包含 suboptimal 的帧
    pub presented: u32,
    pub suboptimal: u32,
    pub out_of_date: u32,
    /// 所有 node 回调被调用的总次数
    pub node_invocations: u64,
}

pub struct HeadlessGraphApp {
    config: HeadlessAppConfig,

    device: Arc<HeadlessDevice>,
    swapchain: Arc<HeadlessSwapchain>,
    /// 资源的所有权在 app，graph 只持有句柄
    resource_manager: GfxResourceManager,

    render_graph: RenderGraph,
    node_invocations: Arc<AtomicU64>,
}

// new & init
impl HeadlessGraphApp {
    pub fn new(config: HeadlessAppConfig) -> anyhow::Result<Self> {
        let device = Arc::new(HeadlessDevice::new(HeadlessDeviceDesc {
            gpu_latency: Duration::from_millis(config.gpu_latency_ms),
            ..Default::default()
        })?);

        let mut resource_manager = GfxResourceManager::new();
        let swapchain =
            Arc::new(HeadlessSwapchain::new(&device, &mut resource_manager, "main-swapchain", config.swapchain_images));
        let resources = SceneResources {
            vertex_buffer: resource_manager.register_buffer("vertex-buffer", 64 * 1024, ResourceUsage::Undefined),
            shadow_map: resource_manager.register_texture("shadow-map", ResourceUsage::Undefined),
            gbuffer: resource_manager.register_texture("gbuffer", ResourceUsage::Undefined),
            hdr_color: resource_manager.register_texture("hdr-color", ResourceUsage::Undefined),
        };

        let render_graph = RenderGraph::new(device.clone(), config.render_graph.clone())?;
        let mut app = Self {
            config,
            device,
            swapchain,
            resource_manager,
            render_graph,
            node_invocations: Arc::new(AtomicU64::new(0)),
        };
        app.declare_nodes(&resources)?;
        app.render_graph.build_graph().context("failed to build render graph")?;
        Ok(app)
    }

    fn declare_nodes(&mut self, resources: &SceneResources) -> anyhow::Result<()> {
        let manager = &self.resource_manager;
        let vertex_buffer = manager.get_buffer(resources.vertex_buffer).context("vertex buffer")?.clone();
        let shadow_map = manager.get_texture(resources.shadow_map).context("shadow map")?.clone();
        let gbuffer = manager.get_texture(resources.gbuffer).context("gbuffer")?.clone();
        let hdr_color = manager.get_texture(resources.hdr_color).context("hdr color")?.clone();
        let frames = 0..self.render_graph.desc().num_frames;

        let upload = self
            .node("upload", QueueType::Copy)
            .with_states(frames.clone().map(|f| RgResourceUsage::buffer_state(f, &vertex_buffer, ResourceUsage::CopyDst)));
        let skinning = self.node("skinning", QueueType::Compute).depends_on("upload").with_states(
            frames.clone().map(|f| RgResourceUsage::buffer_state(f, &vertex_buffer, ResourceUsage::UnorderedAccess)),
        );
        let shadow = self
            .node("shadow", QueueType::Graphics)
            .with_states(frames.clone().map(|f| RgResourceUsage::texture_state(f, &shadow_map, ResourceUsage::DepthWrite)));
        let gbuffer_pass = self
            .node("gbuffer", QueueType::Graphics)
            .depends_on("skinning")
            .depends_on("shadow")
            .with_states(frames.clone().flat_map(|f| {
                [
                    RgResourceUsage::buffer_state(f, &vertex_buffer, ResourceUsage::VertexAndConstantBuffer),
                    RgResourceUsage::texture_state(f, &shadow_map, ResourceUsage::PixelShaderResource),
                    RgResourceUsage::texture_state(f, &gbuffer, ResourceUsage::RenderTarget),
                ]
            }));
        let lighting = self.node("lighting", QueueType::Compute).depends_on("gbuffer").with_states(
            frames.clone().flat_map(|f| {
                [
                    RgResourceUsage::texture_state(f, &gbuffer, ResourceUsage::ShaderResource),
                    RgResourceUsage::texture_state(f, &hdr_color, ResourceUsage::UnorderedAccess),
                ]
            }),
        );

        for node in [upload, skinning, shadow, gbuffer_pass, lighting] {
            self.render_graph.add_node(node)?;
        }

        let present = RgPresentNodeDesc::new(self.swapchain.clone(), |frame_index, cmd, render_target| {
            cmd.begin_label("tonemap");
            log::trace!("[F#{}] tonemap into {:?}", frame_index, render_target);
            cmd.end_label();
        })
        .depends_on("lighting")
        .with_states(frames.map(|f| RgResourceUsage::texture_state(f, &hdr_color, ResourceUsage::PixelShaderResource)));
        self.render_graph.set_present_node(present)?;
        Ok(())
    }

    /// 每个 node 的回调只记录一个 label
    fn node(&self, name: &'static str, queue_type: QueueType) -> RgNodeDesc {
        let invocations = self.node_invocations.clone();
        RgNodeDesc::new(name, queue_type, move |frame_index, cmd| {
            cmd.begin_label(name);
            log::trace!("[F#{}] record `{}`", frame_index, name);
            cmd.end_label();
            invocations.fetch_add(1, Ordering::Relaxed);
        })
    }
}

// run
impl HeadlessGraphApp {
    pub fn run(&mut self) -> anyhow::Result<HeadlessRunStats> {
        self.render_graph.print_execution_plan();

        let mut stats = HeadlessRunStats::default();
        for frame in 0..self.config.frames {
            if self.config.resize_at_frame == Some(frame) {
                self.swapchain.invalidate();
            }
            if self.config.suboptimal_at_frame == Some(frame) {
                self.swapchain.set_suboptimal(true);
            }

            let status = self.render_graph.update().with_context(|| format!("frame {} failed", frame))?;
            match status {
                RgFrameStatus::Presented | RgFrameStatus::Completed => stats.presented += 1,
                // 已经 present，下一帧之前重建
                RgFrameStatus::Suboptimal => {
                    log::warn!("swapchain is suboptimal at frame {}, recreate", frame);
                    stats.presented += 1;
                    stats.suboptimal += 1;
                    self.swapchain.recreate();
                }
                RgFrameStatus::SwapchainOutOfDate => {
                    log::warn!("swapchain is out of date at frame {}, recreate", frame);
                    stats.out_of_date += 1;
                    self.swapchain.recreate();
                }
            }
        }
        self.render_graph.wait_idle()?;
        self.device.wait_idle()?;
        stats.node_invocations = self.node_invocations.load(Ordering::Relaxed);

        let diagnostics = self.device.timeline().diagnostics();
        for diagnostic in &diagnostics {
            log::error!("{:?}", diagnostic);
        }
        anyhow::ensure!(diagnostics.is_empty(), "{} synchronization diagnostics", diagnostics.len());

        log::info!(
            "finish {} frames: presented {} ({} suboptimal), out of date {}, {} node invocations",
            self.config.frames,
            stats.presented,
            stats.suboptimal,
            stats.out_of_date,
            stats.node_invocations
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_with_resize() {
        ember_crate_tools::init_log::init_test_log();
        let config = HeadlessAppConfig {
            frames: 6,
            resize_at_frame: Some(2),
            ..Default::default()
        };

        let mut app = HeadlessGraphApp::new(config).unwrap();
        let stats = app.run().unwrap();

        assert_eq!(stats.out_of_date, 1);
        assert_eq!(stats.presented, 5);
        assert_eq!(stats.suboptimal, 0);
        assert_eq!(stats.node_invocations, 5 * 6);
    }

    #[test]
    fn test_suboptimal_frame_is_presented() {
        ember_crate_tools::init_log::init_test_log();
        let config = HeadlessAppConfig {
            frames: 6,
            suboptimal_at_frame: Some(3),
            ..Default::default()
        };

        let mut app = HeadlessGraphApp::new(config).unwrap();
        let stats = app.run().unwrap();

        assert_eq!(stats.presented, 6);
        assert_eq!(stats.suboptimal, 1);
        assert_eq!(stats.out_of_date, 0);
        assert_eq!(stats.node_invocations, 5 * 6);
    }
}
