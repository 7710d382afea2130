//! GFX (Graphics) 抽象层
//!
//! 对 D3D12 / Vulkan 等后端的最小公共契约：设备负责创建 semaphore、fence、命令列表池；
//! 命令列表支持 `begin / end / pipeline_barrier / execute / present`；
//! 资源只以句柄的形式出现，初始状态保存在 [`resources::manager::GfxResourceManager`] 中。
//!
//! [`headless`] 模块提供一个不依赖 GPU 的后端：提交的命令由一个模拟 GPU 的线程按顺序消费，
//! 所有操作都会记录在时间线上，便于验证同步顺序。

pub mod basic;
pub mod commands;
pub mod error;
pub mod foundation;
pub mod headless;
pub mod resources;
pub mod swapchain;

pub use error::{GfxError, GfxResult};
