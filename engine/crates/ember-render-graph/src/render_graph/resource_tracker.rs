//! 资源状态追踪
//!
//! 整个 graph 共享一份：每个资源一个带锁的状态记录（当前状态 + 所属队列），
//! 是"是否需要 barrier"的唯一依据。

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use ember_gfx::basic::queue_type::QueueType;
use ember_gfx::basic::resource_usage::ResourceUsage;
use ember_gfx::commands::barrier::{GfxBufferBarrierDesc, GfxPipelineBarrierDesc, GfxTextureBarrierDesc};
use ember_gfx::commands::command_list::GfxCommandList;
use ember_gfx::resources::handles::{GfxBufferHandle, GfxResourceKey, GfxTextureHandle};
use itertools::Itertools;

use crate::render_graph::node_desc::RgResourceUsage;

/// 某个资源当前的状态
///
/// `queue` 为 `None` 表示资源还没有被任何队列使用过，第一次使用不需要所有权转移。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgTrackedState {
    pub usage: ResourceUsage,
    pub queue: Option<QueueType>,
}

/// 独立于 node 的状态转换请求
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgResourceTransition {
    pub resource: GfxResourceKey,
    pub usage: ResourceUsage,
    pub queue: QueueType,
}

type RgLockedState = Arc<Mutex<RgTrackedState>>;

/// 持锁期间 barrier 的录制不会 panic，忽略 poison
#[inline]
fn lock(state: &Mutex<RgTrackedState>) -> MutexGuard<'_, RgTrackedState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct RgResourceTracker {
    states: RwLock<HashMap<GfxResourceKey, RgLockedState>>,
}

// new & init
impl RgResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

// track & untrack
impl RgResourceTracker {
    /// 以资源的初始状态注册；已经存在时什么也不做
    ///
    /// 新记录不属于任何队列，返回是否新建了记录
    pub fn register(&self, resource: GfxResourceKey, initial_state: ResourceUsage) -> bool {
        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        match states.entry(resource) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Mutex::new(RgTrackedState {
                    usage: initial_state,
                    queue: None,
                })));
                true
            }
        }
    }

    /// 开始追踪一个 texture，已经追踪时覆盖其状态
    pub fn track_texture(&self, texture: GfxTextureHandle, usage: ResourceUsage, queue: QueueType) {
        self.track(GfxResourceKey::Texture(texture), usage, queue);
    }

    pub fn track_buffer(&self, buffer: GfxBufferHandle, usage: ResourceUsage, queue: QueueType) {
        self.track(GfxResourceKey::Buffer(buffer), usage, queue);
    }

    fn track(&self, resource: GfxResourceKey, usage: ResourceUsage, queue: QueueType) {
        let state = RgTrackedState {
            usage,
            queue: Some(queue),
        };
        *lock(&self.entry(resource, state)) = state;
    }

    pub fn untrack(&self, resource: GfxResourceKey) -> Option<RgTrackedState> {
        let removed = self.states.write().unwrap_or_else(PoisonError::into_inner).remove(&resource);
        removed.map(|state| *lock(&state))
    }

    pub fn clear(&self) {
        self.states.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

// getters
impl RgResourceTracker {
    pub fn current_state(&self, resource: GfxResourceKey) -> Option<RgTrackedState> {
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        states.get(&resource).map(|state| *lock(state))
    }

    pub fn len(&self) -> usize {
        self.states.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 一次待检查的状态转换
#[derive(Clone, Copy)]
struct RgPendingTransition {
    resource: GfxResourceKey,
    /// 资源未被追踪时使用的记录
    initial: RgTrackedState,
    usage: ResourceUsage,
    queue: QueueType,
}

// barrier
impl RgResourceTracker {
    /// 将 `usages` 中的资源转换到需要的状态
    ///
    /// 状态已经满足的资源不产生 barrier；其余资源合并为一次 `pipeline_barrier`。
    /// 状态变化的资源从修改状态开始一直持锁，直到 barrier 录制完成；
    /// 加锁按照资源 key 升序进行。
    ///
    /// 返回 barrier 中转换的数量
    pub fn issue_barriers(&self, cmd: &dyn GfxCommandList, usages: &[RgResourceUsage], queue: QueueType) -> usize {
        let pending = usages
            .iter()
            .map(|usage| RgPendingTransition {
                resource: usage.resource,
                initial: RgTrackedState {
                    usage: usage.initial_state,
                    queue: None,
                },
                usage: usage.state,
                queue,
            })
            .collect_vec();
        self.apply_transitions(cmd, pending, false)
    }

    /// 单个资源的转换，状态或所属队列改变时才会录制 barrier
    pub fn transition(&self, cmd: &dyn GfxCommandList, transition: RgResourceTransition) -> bool {
        self.batch_transition(cmd, &[transition]) > 0
    }

    /// 多个资源的转换，合并为一次 barrier
    ///
    /// 与 [`Self::issue_barriers`] 的区别：只改变所属队列也会产生 barrier（队列所有权转移）。
    /// 未被追踪的资源以目标状态开始追踪，不产生 barrier。
    pub fn batch_transition(&self, cmd: &dyn GfxCommandList, transitions: &[RgResourceTransition]) -> usize {
        let pending = transitions
            .iter()
            .map(|t| RgPendingTransition {
                resource: t.resource,
                initial: RgTrackedState {
                    usage: t.usage,
                    queue: Some(t.queue),
                },
                usage: t.usage,
                queue: t.queue,
            })
            .collect_vec();
        self.apply_transitions(cmd, pending, true)
    }

    fn apply_transitions(
        &self,
        cmd: &dyn GfxCommandList,
        mut pending: Vec<RgPendingTransition>,
        queue_change_needs_barrier: bool,
    ) -> usize {
        // std 的 Mutex 不可重入，同一个资源只能出现一次
        pending.sort_by_key(|t| t.resource);
        pending.dedup_by_key(|t| t.resource);

        let entries = pending
            .into_iter()
            .map(|t| (t, self.entry(t.resource, t.initial)))
            .collect_vec();

        let mut barrier = GfxPipelineBarrierDesc::new();
        let mut guards = Vec::with_capacity(entries.len());
        for (transition, entry) in &entries {
            let mut state = lock(entry);
            let queue_changed =
                queue_change_needs_barrier && state.queue.is_some() && state.queue != Some(transition.queue);
            if state.usage == transition.usage && !queue_changed {
                continue;
            }

            Self::push_barrier(&mut barrier, transition.resource, *state, transition.usage, transition.queue);
            *state = RgTrackedState {
                usage: transition.usage,
                queue: Some(transition.queue),
            };
            guards.push(state);
        }

        let count = barrier.len();
        if count > 0 {
            log::trace!("`{}`: {} transitions", cmd.debug_name(), count);
            cmd.pipeline_barrier(&barrier);
        }
        drop(guards);
        count
    }
}

// tools
impl RgResourceTracker {
    /// 找到资源的记录，不存在时以 `initial` 创建
    fn entry(&self, resource: GfxResourceKey, initial: RgTrackedState) -> RgLockedState {
        {
            let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(state) = states.get(&resource) {
                return state.clone();
            }
        }

        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        states
            .entry(resource)
            .or_insert_with(|| Arc::new(Mutex::new(initial)))
            .clone()
    }

    fn push_barrier(
        barrier: &mut GfxPipelineBarrierDesc,
        resource: GfxResourceKey,
        old: RgTrackedState,
        new_usage: ResourceUsage,
        new_queue: QueueType,
    ) {
        // Undefined 的内容不需要保留，没有所属队列时也无从释放
        let src_queue = match old.queue {
            Some(queue) if old.usage != ResourceUsage::Undefined => queue,
            _ => new_queue,
        };
        match resource {
            GfxResourceKey::Texture(texture) => {
                barrier.texture_barrier(
                    GfxTextureBarrierDesc::new(texture, old.usage, new_usage).queue_transfer(src_queue, new_queue),
                );
            }
            GfxResourceKey::Buffer(buffer) => {
                barrier.buffer_barrier(
                    GfxBufferBarrierDesc::new(buffer, old.usage, new_usage).queue_transfer(src_queue, new_queue),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use ember_gfx::commands::command_list::{GfxCommandListPool, GfxCommandListPoolDesc};
    use ember_gfx::foundation::device::GfxDevice;
    use ember_gfx::headless::{HeadlessDevice, HeadlessDeviceDesc, HeadlessEvent};
    use ember_gfx::resources::manager::GfxResourceManager;

    use super::*;

    struct Fixture {
        device: HeadlessDevice,
        pool: Box<dyn GfxCommandListPool>,
        manager: GfxResourceManager,
    }

    impl Fixture {
        fn new() -> Self {
            ember_crate_tools::init_log::init_test_log();
            let device = HeadlessDevice::new(HeadlessDeviceDesc::default()).unwrap();
            let pool = device
                .create_command_list_pool(&GfxCommandListPoolDesc {
                    queue_type: QueueType::Graphics,
                    num_command_lists: 4,
                    debug_name: "tracker".to_string(),
                })
                .unwrap();
            Self {
                device,
                pool,
                manager: GfxResourceManager::new(),
            }
        }

        fn cmd(&self) -> &dyn GfxCommandList {
            self.pool.command_lists()[0].as_ref()
        }

        fn barriers(&self) -> Vec<GfxPipelineBarrierDesc> {
            self.device
                .timeline()
                .events()
                .into_iter()
                .filter_map(|e| match e {
                    HeadlessEvent::Barrier { barrier, .. } => Some(barrier),
                    _ => None,
                })
                .collect()
        }

        fn usage(&self, texture: GfxTextureHandle, state: ResourceUsage) -> RgResourceUsage {
            RgResourceUsage::texture_state(0, self.manager.get_texture(texture).unwrap(), state)
        }
    }

    #[test]
    fn test_same_state_is_elided() {
        let mut fx = Fixture::new();
        let tex = fx.manager.register_texture("gbuffer", ResourceUsage::Undefined);
        let tracker = RgResourceTracker::new();

        let usages = [fx.usage(tex, ResourceUsage::CopyDst)];
        assert_eq!(tracker.issue_barriers(fx.cmd(), &usages, QueueType::Graphics), 1);
        assert_eq!(tracker.issue_barriers(fx.cmd(), &usages, QueueType::Graphics), 0);

        assert_eq!(fx.barriers().len(), 1);
        assert_eq!(tracker.current_state(tex.into()).map(|s| s.usage), Some(ResourceUsage::CopyDst));
    }

    #[test]
    fn test_changed_resources_are_batched() {
        let mut fx = Fixture::new();
        let a = fx.manager.register_texture("a", ResourceUsage::Undefined);
        let b = fx.manager.register_texture("b", ResourceUsage::ShaderResource);
        let c = fx.manager.register_buffer("c", 256, ResourceUsage::CopyDst);
        let tracker = RgResourceTracker::new();

        let usages = [
            fx.usage(a, ResourceUsage::RenderTarget),
            fx.usage(b, ResourceUsage::ShaderResource),
            RgResourceUsage::buffer_state(0, fx.manager.get_buffer(c).unwrap(), ResourceUsage::ShaderResource),
        ];
        assert_eq!(tracker.issue_barriers(fx.cmd(), &usages, QueueType::Graphics), 2);

        let barriers = fx.barriers();
        assert_eq!(barriers.len(), 1);
        assert_eq!(
            barriers[0].texture_barriers(),
            &[GfxTextureBarrierDesc::new(a, ResourceUsage::Undefined, ResourceUsage::RenderTarget)]
        );
        assert_eq!(
            barriers[0].buffer_barriers(),
            &[GfxBufferBarrierDesc::new(c, ResourceUsage::CopyDst, ResourceUsage::ShaderResource)]
        );
    }

    #[test]
    fn test_registration_is_idempotent() {
        let mut fx = Fixture::new();
        let tex = fx.manager.register_texture("rt", ResourceUsage::Undefined);
        let tracker = RgResourceTracker::new();

        assert!(tracker.register(tex.into(), ResourceUsage::Undefined));
        assert_eq!(tracker.current_state(tex.into()).and_then(|s| s.queue), None);
        tracker.issue_barriers(fx.cmd(), &[fx.usage(tex, ResourceUsage::RenderTarget)], QueueType::Graphics);
        assert!(!tracker.register(tex.into(), ResourceUsage::Undefined));
        assert_eq!(tracker.current_state(tex.into()).map(|s| s.usage), Some(ResourceUsage::RenderTarget));

        assert_eq!(
            tracker.untrack(tex.into()),
            Some(RgTrackedState {
                usage: ResourceUsage::RenderTarget,
                queue: Some(QueueType::Graphics)
            })
        );
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_queue_ownership_transfer() {
        let mut fx = Fixture::new();
        let tex = fx.manager.register_texture("shadow", ResourceUsage::Undefined);
        let tracker = RgResourceTracker::new();
        tracker.track_texture(tex, ResourceUsage::ShaderResource, QueueType::Graphics);

        let same = RgResourceTransition {
            resource: tex.into(),
            usage: ResourceUsage::ShaderResource,
            queue: QueueType::Graphics,
        };
        assert!(!tracker.transition(fx.cmd(), same));

        let to_compute = RgResourceTransition {
            queue: QueueType::Compute,
            ..same
        };
        assert!(tracker.transition(fx.cmd(), to_compute));

        let barrier = fx.barriers()[0].texture_barriers()[0];
        assert!(barrier.enable_queue_barrier);
        assert_eq!(barrier.src_queue, QueueType::Graphics);
        assert_eq!(barrier.dst_queue, QueueType::Compute);
        assert_eq!(barrier.old_state, barrier.new_state);
    }

    #[test]
    fn test_first_use_never_transfers_ownership() {
        let mut fx = Fixture::new();
        let fresh = fx.manager.register_texture("fresh", ResourceUsage::Undefined);
        let cleared = fx.manager.register_texture("cleared", ResourceUsage::Undefined);
        let tracker = RgResourceTracker::new();
        tracker.register(fresh.into(), ResourceUsage::ShaderResource);
        tracker.track_texture(cleared, ResourceUsage::Undefined, QueueType::Graphics);

        // 未被使用过的资源：没有所属队列
        tracker.issue_barriers(fx.cmd(), &[fx.usage(fresh, ResourceUsage::CopyDst)], QueueType::Copy);
        // 内容为 Undefined 的资源：不需要释放
        tracker.issue_barriers(fx.cmd(), &[fx.usage(cleared, ResourceUsage::CopyDst)], QueueType::Copy);

        let barriers = fx.barriers();
        assert_eq!(barriers.len(), 2);
        for barrier in &barriers {
            let texture_barrier = barrier.texture_barriers()[0];
            assert!(!texture_barrier.enable_queue_barrier);
            assert_eq!(texture_barrier.src_queue, QueueType::Copy);
            assert_eq!(texture_barrier.dst_queue, QueueType::Copy);
        }
        assert_eq!(tracker.current_state(fresh.into()).and_then(|s| s.queue), Some(QueueType::Copy));

        // 之后被其他队列使用时才需要转移
        tracker.issue_barriers(fx.cmd(), &[fx.usage(fresh, ResourceUsage::ShaderResource)], QueueType::Graphics);
        let texture_barrier = fx.barriers()[2].texture_barriers()[0];
        assert!(texture_barrier.enable_queue_barrier);
        assert_eq!(texture_barrier.src_queue, QueueType::Copy);
        assert_eq!(texture_barrier.dst_queue, QueueType::Graphics);
    }

    #[test]
    fn test_concurrent_nodes_do_not_deadlock() {
        let mut fx = Fixture::new();
        let a = fx.manager.register_texture("a", ResourceUsage::Undefined);
        let b = fx.manager.register_texture("b", ResourceUsage::Undefined);
        let tracker = RgResourceTracker::new();

        // 两个线程以相反的顺序声明同一组资源
        let forward = [fx.usage(a, ResourceUsage::CopyDst), fx.usage(b, ResourceUsage::CopySrc)];
        let backward = [fx.usage(b, ResourceUsage::CopyDst), fx.usage(a, ResourceUsage::CopySrc)];
        let plans = [forward, backward];

        thread::scope(|s| {
            for (idx, usages) in plans.iter().enumerate() {
                let tracker = &tracker;
                let cmd = fx.pool.command_lists()[idx + 1].clone();
                s.spawn(move || {
                    for _ in 0..500 {
                        tracker.issue_barriers(cmd.as_ref(), usages, QueueType::Graphics);
                    }
                });
            }
        });

        let state_a = tracker.current_state(a.into()).unwrap().usage;
        assert!(matches!(state_a, ResourceUsage::CopyDst | ResourceUsage::CopySrc));
        assert_eq!(tracker.len(), 2);
    }
}
