use std::path::Path;

use anyhow::Context;
use ember_render_graph::render_graph::RgGraphDesc;
use serde::Deserialize;

/// headless demo 的配置
///
/// ```toml
/// frames = 12
/// gpu_latency_ms = 2
/// resize_at_frame = 5
///
/// [render_graph]
/// num_frames = 2
/// num_worker_threads = 4
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HeadlessAppConfig {
    /// 总共运行多少帧
    pub frames: u32,
    /// 模拟 GPU 执行一次提交的耗时
    pub gpu_latency_ms: u64,
    pub swapchain_images: u32,
    /// 在这一帧之前让 swapchain 过期，模拟窗口尺寸变化
    pub resize_at_frame: Option<u32>,
    /// 从这一帧开始 present 返回 suboptimal，直到 swapchain 重建
    pub suboptimal_at_frame: Option<u32>,
    pub render_graph: RgGraphDesc,
}

impl Default for HeadlessAppConfig {
    fn default() -> Self {
        Self {
            frames: 12,
            gpu_latency_ms: 1,
            swapchain_images: 3,
            resize_at_frame: None,
            suboptimal_at_frame: None,
            render_graph: RgGraphDesc::default(),
        }
    }
}

impl HeadlessAppConfig {
    /// 没有给出路径时使用默认配置
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            log::info!("no config file, use default config");
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_toml_str(&text).with_context(|| format!("failed to parse {}", path.display()))?;
        log::info!("load config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.render_graph.validate()?;
        anyhow::ensure!(config.swapchain_images > 0, "swapchain must have at least one image");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let config = HeadlessAppConfig::from_toml_str(
            r#"
            frames = 4
            resize_at_frame = 2
            suboptimal_at_frame = 3

            [render_graph]
            num_frames = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.frames, 4);
        assert_eq!(config.resize_at_frame, Some(2));
        assert_eq!(config.suboptimal_at_frame, Some(3));
        assert_eq!(config.swapchain_images, 3);
        assert_eq!(config.render_graph.num_frames, 2);
        assert_eq!(config.render_graph.num_graphics_command_lists, RgGraphDesc::default().num_graphics_command_lists);
    }

    #[test]
    fn test_invalid_config() {
        assert!(HeadlessAppConfig::from_toml_str("swapchain_images = 0").is_err());
        assert!(HeadlessAppConfig::from_toml_str("[render_graph]\nnum_frames = 0").is_err());
        assert!(HeadlessAppConfig::load(Some(Path::new("/nonexistent/ember.toml"))).is_err());
    }
}
