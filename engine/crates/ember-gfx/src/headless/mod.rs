//! headless 后端
//!
//! 不访问任何 GPU。命令列表的录制和提交都会写入共享的 [`HeadlessTimeline`]；
//! 提交由一个模拟 GPU 的线程按 FIFO 顺序消费：等待 semaphore、可选的模拟耗时、
//! 然后 signal semaphore 和 fence。
//!
//! 用于在没有显卡的环境下验证同步顺序。

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod command_list;
pub mod device;
mod gpu_queue;
pub mod swapchain;
pub mod sync;
pub mod timeline;

pub use command_list::{HeadlessCommandList, HeadlessCommandListPool};
pub use device::{HeadlessDevice, HeadlessDeviceDesc};
pub use swapchain::HeadlessSwapchain;
pub use sync::{HeadlessFence, HeadlessSemaphore};
pub use timeline::{HeadlessEvent, HeadlessTimeline};

/// 模拟 GPU 线程不会在持锁时 panic，这里直接忽略 poison
#[inline]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
