//! graph 拥有的同步原语
//!
//! - semaphore：每条依赖边一个，所有帧共享同一个；
//! - fence：每个 frame slot 一组，每个末端 node（以及 present）各一个。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ember_gfx::GfxResult;
use ember_gfx::commands::fence::GfxFence;
use ember_gfx::commands::semaphore::GfxSemaphore;
use ember_gfx::foundation::device::GfxDevice;

/// semaphore 在 pool 中的下标
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RgSemaphoreId(pub(crate) usize);

impl RgSemaphoreId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// 可增长的 semaphore 池
///
/// 一次 `build_graph` 中下标单调分配，不会重复；`reset` 之后从头开始复用已经创建的 semaphore。
#[derive(Default)]
pub(crate) struct RgSemaphorePool {
    semaphores: Vec<Arc<dyn GfxSemaphore>>,
    free_index: usize,
}

impl RgSemaphorePool {
    /// 开始新的一次分配，之前创建的 semaphore 都会被复用
    #[inline]
    pub fn rewind(&mut self) {
        self.free_index = 0;
    }

    pub fn allocate(&mut self, device: &dyn GfxDevice) -> GfxResult<RgSemaphoreId> {
        if self.free_index == self.semaphores.len() {
            let name = format!("rg-semaphore-{}", self.semaphores.len());
            self.semaphores.push(device.create_semaphore(&name)?);
        }
        let id = RgSemaphoreId(self.free_index);
        self.free_index += 1;
        Ok(id)
    }

    #[inline]
    pub fn get(&self, id: RgSemaphoreId) -> &Arc<dyn GfxSemaphore> {
        &self.semaphores[id.0]
    }

    /// 已经创建的 semaphore 数量
    #[inline]
    pub fn capacity(&self) -> usize {
        self.semaphores.len()
    }

    /// 本次构建分配出去的数量
    #[inline]
    pub fn allocated(&self) -> usize {
        self.free_index
    }
}

/// 一个 frame slot 的所有 fence
///
/// fence 被某次提交引用时标记为 armed；下一次使用这个 slot 之前，只等待 armed 的 fence。
#[derive(Default)]
pub(crate) struct RgFrameFences {
    fences: Vec<Arc<dyn GfxFence>>,
    armed: Vec<AtomicBool>,
}

impl RgFrameFences {
    /// 保证至少有 `count` 个 fence
    pub fn ensure_size(&mut self, device: &dyn GfxDevice, frame_index: usize, count: usize) -> GfxResult<()> {
        while self.fences.len() < count {
            let name = format!("rg-frame-fence-{}-{}", frame_index, self.fences.len());
            self.fences.push(device.create_fence(false, &name)?);
            self.armed.push(AtomicBool::new(false));
        }
        Ok(())
    }

    #[inline]
    pub fn fence(&self, index: usize) -> &Arc<dyn GfxFence> {
        &self.fences[index]
    }

    /// 提交成功之后调用
    #[inline]
    pub fn arm(&self, index: usize) {
        self.armed[index].store(true, Ordering::Release);
    }

    pub fn armed_count(&self) -> usize {
        self.armed.iter().filter(|armed| armed.load(Ordering::Acquire)).count()
    }

    /// 等待所有 armed 的 fence，然后将其重置
    pub fn wait_armed(&self) -> GfxResult<()> {
        for (fence, armed) in self.fences.iter().zip(&self.armed) {
            if !armed.load(Ordering::Acquire) {
                continue;
            }
            fence.wait()?;
            fence.reset()?;
            armed.store(false, Ordering::Release);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ember_gfx::basic::queue_type::QueueType;
    use ember_gfx::commands::command_list::GfxCommandListPoolDesc;
    use ember_gfx::commands::submit_info::GfxExecuteDesc;
    use ember_gfx::headless::{HeadlessDevice, HeadlessDeviceDesc};

    use super::*;

    #[test]
    fn test_semaphore_pool_reuse() {
        let device = HeadlessDevice::new(HeadlessDeviceDesc::default()).unwrap();
        let mut pool = RgSemaphorePool::default();

        let first: Vec<_> = (0..3).map(|_| pool.allocate(&device).unwrap()).collect();
        assert_eq!(first, vec![RgSemaphoreId(0), RgSemaphoreId(1), RgSemaphoreId(2)]);

        pool.rewind();
        let again = pool.allocate(&device).unwrap();
        assert_eq!(again, RgSemaphoreId(0));
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.allocated(), 1);
        assert_eq!(pool.get(again).debug_name(), "rg-semaphore-0");
    }

    #[test]
    fn test_only_armed_fences_are_waited() {
        let device = HeadlessDevice::new(HeadlessDeviceDesc::default()).unwrap();
        let mut fences = RgFrameFences::default();
        fences.ensure_size(&device, 0, 2).unwrap();
        fences.ensure_size(&device, 0, 1).unwrap();

        // 从未提交过的 fence 不会被等待，否则这里会永远阻塞
        fences.wait_armed().unwrap();

        let pool = device
            .create_command_list_pool(&GfxCommandListPoolDesc {
                queue_type: QueueType::Graphics,
                num_command_lists: 1,
                debug_name: "fence-test".to_string(),
            })
            .unwrap();
        let cmd = &pool.command_lists()[0];
        cmd.begin().unwrap();
        cmd.end().unwrap();
        cmd.execute(&GfxExecuteDesc::new().fence(fences.fence(1).clone())).unwrap();
        fences.arm(1);
        assert_eq!(fences.armed_count(), 1);

        fences.wait_armed().unwrap();
        assert_eq!(fences.armed_count(), 0);
        assert!(!fences.fence(1).is_signaled());
    }
}
