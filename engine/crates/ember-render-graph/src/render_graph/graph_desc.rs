use ember_gfx::basic::queue_type::QueueType;
use serde::Deserialize;

use crate::render_graph::error::RgConfigError;

/// RenderGraph 的构造参数
///
/// 可以直接从 toml 读取，缺失的字段使用默认值：
/// ```toml
/// num_frames = 3
/// num_graphics_command_lists = 8
/// num_worker_threads = 4
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RgGraphDesc {
    /// 同时在飞的帧数
    pub num_frames: u32,

    /// 每一帧、每个队列上可以分配给 node 的命令列表数量
    ///
    /// graphics 队列会额外多分配一个，留给 present node
    pub num_graphics_command_lists: u32,
    pub num_compute_command_lists: u32,
    pub num_copy_command_lists: u32,
    pub num_ray_tracing_command_lists: u32,

    /// 执行 task 图的线程数，0 表示由 rayon 决定
    pub num_worker_threads: usize,
}

impl Default for RgGraphDesc {
    fn default() -> Self {
        Self {
            num_frames: 3,
            num_graphics_command_lists: 8,
            num_compute_command_lists: 2,
            num_copy_command_lists: 1,
            num_ray_tracing_command_lists: 1,
            num_worker_threads: 0,
        }
    }
}

impl RgGraphDesc {
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// 某个队列上可以分配给普通 node 的命令列表数量
    #[inline]
    pub fn command_list_budget(&self, queue_type: QueueType) -> u32 {
        match queue_type {
            QueueType::Graphics => self.num_graphics_command_lists,
            QueueType::Compute => self.num_compute_command_lists,
            QueueType::Copy => self.num_copy_command_lists,
            QueueType::RayTracing => self.num_ray_tracing_command_lists,
        }
    }

    pub fn validate(&self) -> Result<(), RgConfigError> {
        if self.num_frames == 0 {
            return Err(RgConfigError::ZeroFrames);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_toml() {
        let desc = RgGraphDesc::from_toml_str(
            r#"
            num_frames = 2
            num_compute_command_lists = 4
            "#,
        )
        .unwrap();

        assert_eq!(desc.num_frames, 2);
        assert_eq!(desc.command_list_budget(QueueType::Compute), 4);
        assert_eq!(desc.command_list_budget(QueueType::Graphics), 8);
        assert_eq!(desc.num_worker_threads, 0);
    }

    #[test]
    fn test_zero_frames_rejected() {
        let desc = RgGraphDesc::from_toml_str("num_frames = 0").unwrap();
        assert_eq!(desc.validate(), Err(RgConfigError::ZeroFrames));
        assert!(RgGraphDesc::from_toml_str("num_frames = \"three\"").is_err());
    }
}
