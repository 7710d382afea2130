use std::collections::HashMap;
use std::sync::Arc;

use ember_gfx::GfxResult;
use ember_gfx::basic::queue_type::QueueType;
use ember_gfx::commands::command_list::{GfxCommandList, GfxCommandListPool, GfxCommandListPoolDesc};
use ember_gfx::foundation::device::GfxDevice;

use crate::render_graph::graph_desc::RgGraphDesc;

/// graphics 池中的第 0 个命令列表留给 present node
const PRESENT_PADDING: usize = 1;

/// 每个队列、每一帧一个命令列表池
///
/// 池在 graph 创建时一次性分配，之后只移动分配下标；
/// 同一个下标在所有帧上对应同一个 node。
pub(crate) struct RgCommandListAllocator {
    /// queue -> [frame] -> pool
    pools: HashMap<QueueType, Vec<Box<dyn GfxCommandListPool>>>,
    budgets: HashMap<QueueType, u32>,
    next_index: HashMap<QueueType, usize>,
}

// new & init
impl RgCommandListAllocator {
    pub fn new(device: &dyn GfxDevice, desc: &RgGraphDesc) -> GfxResult<Self> {
        let mut pools = HashMap::new();
        let mut budgets = HashMap::new();
        for queue_type in QueueType::ALL {
            let budget = desc.command_list_budget(queue_type);
            let padding = if queue_type == QueueType::Graphics { PRESENT_PADDING } else { 0 };
            let num_command_lists = budget + padding as u32;
            budgets.insert(queue_type, budget);
            if num_command_lists == 0 {
                continue;
            }

            let frame_pools = (0..desc.num_frames)
                .map(|frame_index| {
                    device.create_command_list_pool(&GfxCommandListPoolDesc {
                        queue_type,
                        num_command_lists,
                        debug_name: format!("rg-{}-f{}", queue_type, frame_index),
                    })
                })
                .collect::<GfxResult<Vec<_>>>()?;
            pools.insert(queue_type, frame_pools);
        }

        Ok(Self {
            pools,
            budgets,
            next_index: HashMap::new(),
        })
    }
}

// tools
impl RgCommandListAllocator {
    /// 分配一个下标，预算用尽时返回 None
    pub fn allocate(&mut self, queue_type: QueueType) -> Option<usize> {
        let budget = self.budget(queue_type) as usize;
        let next = self.next_index.entry(queue_type).or_insert(0);
        if *next >= budget {
            return None;
        }
        let index = *next + if queue_type == QueueType::Graphics { PRESENT_PADDING } else { 0 };
        *next += 1;
        Some(index)
    }

    pub fn reset(&mut self) {
        self.next_index.clear();
    }

    #[inline]
    pub fn budget(&self, queue_type: QueueType) -> u32 {
        self.budgets.get(&queue_type).copied().unwrap_or(0)
    }

    /// 由 `allocate` 返回的下标保证存在
    pub fn command_list(&self, queue_type: QueueType, frame_index: usize, index: usize) -> Arc<dyn GfxCommandList> {
        self.pools[&queue_type][frame_index].command_lists()[index].clone()
    }

    pub fn present_command_list(&self, frame_index: usize) -> Arc<dyn GfxCommandList> {
        self.command_list(QueueType::Graphics, frame_index, 0)
    }
}

#[cfg(test)]
mod tests {
    use ember_gfx::headless::{HeadlessDevice, HeadlessDeviceDesc};

    use super::*;

    #[test]
    fn test_budget_and_present_padding() {
        let device = HeadlessDevice::new(HeadlessDeviceDesc::default()).unwrap();
        let desc = RgGraphDesc {
            num_frames: 2,
            num_graphics_command_lists: 2,
            num_copy_command_lists: 0,
            ..Default::default()
        };
        let mut allocator = RgCommandListAllocator::new(&device, &desc).unwrap();

        assert_eq!(allocator.allocate(QueueType::Graphics), Some(1));
        assert_eq!(allocator.allocate(QueueType::Graphics), Some(2));
        assert_eq!(allocator.allocate(QueueType::Graphics), None);
        assert_eq!(allocator.allocate(QueueType::Copy), None);
        assert_eq!(allocator.allocate(QueueType::Compute), Some(0));

        assert_eq!(allocator.present_command_list(1).debug_name(), "rg-graphics-f1-0");
        assert_eq!(allocator.command_list(QueueType::Compute, 0, 0).debug_name(), "rg-compute-f0-0");

        allocator.reset();
        assert_eq!(allocator.allocate(QueueType::Graphics), Some(1));
    }
}
