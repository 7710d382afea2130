use std::any::Any;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::commands::fence::GfxFence;
use crate::commands::semaphore::GfxSemaphore;
use crate::error::{GfxError, GfxResult};
use crate::headless::lock;

/// binary semaphore 的计数
///
/// 每次 signal 计数 +1，每次 wait 消耗一次计数。
#[derive(Default)]
pub(crate) struct SemaphoreState {
    count: Mutex<u64>,
    cond: Condvar,
}

impl SemaphoreState {
    pub(crate) fn signal(&self) {
        *lock(&self.count) += 1;
        self.cond.notify_all();
    }

    /// 超时返回 false
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = lock(&self.count);
        while *count == 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            count = match self.cond.wait_timeout(count, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        *count -= 1;
        true
    }

    fn count(&self) -> u64 {
        *lock(&self.count)
    }
}

pub struct HeadlessSemaphore {
    name: String,
    state: Arc<SemaphoreState>,
}

impl HeadlessSemaphore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(SemaphoreState::default()),
        }
    }

    /// 已经 signal 但还没有被 wait 消耗的次数
    #[inline]
    pub fn pending_signals(&self) -> u64 {
        self.state.count()
    }

    #[inline]
    pub(crate) fn state(&self) -> Arc<SemaphoreState> {
        self.state.clone()
    }
}

impl GfxSemaphore for HeadlessSemaphore {
    #[inline]
    fn debug_name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 只接受 headless 后端创建的 semaphore
pub(crate) fn headless_semaphore(semaphore: &dyn GfxSemaphore) -> GfxResult<&HeadlessSemaphore> {
    semaphore.as_any().downcast_ref::<HeadlessSemaphore>().ok_or_else(|| {
        GfxError::InvalidUsage(format!("semaphore `{}` was not created by the headless device", semaphore.debug_name()))
    })
}

#[derive(Default)]
pub(crate) struct FenceState {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl FenceState {
    pub(crate) fn signal(&self) {
        *lock(&self.signaled) = true;
        self.cond.notify_all();
    }
}

pub struct HeadlessFence {
    name: String,
    state: Arc<FenceState>,
}

impl HeadlessFence {
    pub fn new(signaled: bool, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(FenceState {
                signaled: Mutex::new(signaled),
                cond: Condvar::new(),
            }),
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> Arc<FenceState> {
        self.state.clone()
    }
}

impl GfxFence for HeadlessFence {
    fn wait(&self) -> GfxResult<()> {
        let mut signaled = lock(&self.state.signaled);
        while !*signaled {
            signaled = self.state.cond.wait(signaled).map_err(|_| GfxError::Backend(format!("fence `{}` poisoned", self.name)))?;
        }
        Ok(())
    }

    fn reset(&self) -> GfxResult<()> {
        *lock(&self.state.signaled) = false;
        Ok(())
    }

    #[inline]
    fn is_signaled(&self) -> bool {
        *lock(&self.state.signaled)
    }

    #[inline]
    fn debug_name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) fn headless_fence(fence: &dyn GfxFence) -> GfxResult<&HeadlessFence> {
    fence.as_any().downcast_ref::<HeadlessFence>().ok_or_else(|| {
        GfxError::InvalidUsage(format!("fence `{}` was not created by the headless device", fence.debug_name()))
    })
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_semaphore_counting() {
        let semaphore = HeadlessSemaphore::new("sem");
        assert!(!semaphore.state.wait_timeout(Duration::from_millis(1)));

        semaphore.state.signal();
        semaphore.state.signal();
        assert_eq!(semaphore.pending_signals(), 2);
        assert!(semaphore.state.wait_timeout(Duration::from_millis(1)));
        assert_eq!(semaphore.pending_signals(), 1);
    }

    #[test]
    fn test_fence_wait_across_threads() {
        let fence = HeadlessFence::new(false, "fence");
        assert!(!fence.is_signaled());

        let state = fence.state();
        let signaler = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            state.signal();
        });

        fence.wait().unwrap();
        assert!(fence.is_signaled());
        signaler.join().unwrap();

        fence.reset().unwrap();
        assert!(!fence.is_signaled());
    }
}
