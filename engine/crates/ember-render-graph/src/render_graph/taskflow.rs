//! 每一帧的 task 图与执行器
//!
//! task 之间的边与 node 的依赖一一对应；执行器在 rayon 线程池中运行 task 图，
//! 一个 task 的所有前驱完成之后才会被派发。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use itertools::Itertools;

use crate::render_graph::dependency::PRESENT_NODE_NAME;
use crate::render_graph::node_desc::RgNodeDesc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RgTaskKind {
    /// 普通 node，值为 node 的声明下标
    Node(usize),
    Present,
}

#[derive(Clone, Debug)]
pub(crate) struct RgTask {
    pub name: String,
    pub kind: RgTaskKind,
    pub successors: Vec<usize>,
    pub predecessor_count: usize,
}

/// 某一帧的 task 图
///
/// task 下标与 node 的声明下标相同，present task 在最后。
#[derive(Clone, Debug)]
pub(crate) struct RgTaskflow {
    frame_index: u32,
    tasks: Vec<RgTask>,
}

impl RgTaskflow {
    /// 依赖需要已经通过校验
    pub fn build(frame_index: u32, descs: &[RgNodeDesc], present_dependencies: Option<&[String]>) -> Self {
        let name_to_index: HashMap<&str, usize> =
            descs.iter().enumerate().map(|(idx, desc)| (desc.name.as_str(), idx)).collect();

        let mut tasks = descs
            .iter()
            .enumerate()
            .map(|(idx, desc)| RgTask {
                name: desc.name.clone(),
                kind: RgTaskKind::Node(idx),
                successors: Vec::new(),
                predecessor_count: 0,
            })
            .collect_vec();
        if present_dependencies.is_some() {
            tasks.push(RgTask {
                name: PRESENT_NODE_NAME.to_string(),
                kind: RgTaskKind::Present,
                successors: Vec::new(),
                predecessor_count: 0,
            });
        }

        let node_edges = descs.iter().enumerate().map(|(idx, desc)| (idx, desc.dependencies.as_slice()));
        let present_edges = present_dependencies.map(|deps| (descs.len(), deps));
        for (consumer, dependencies) in node_edges.chain(present_edges) {
            for dependency in dependencies {
                if let Some(&producer) = name_to_index.get(dependency.as_str()) {
                    tasks[producer].successors.push(consumer);
                    tasks[consumer].predecessor_count += 1;
                }
            }
        }

        Self { frame_index, tasks }
    }

    #[inline]
    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    #[inline]
    pub fn tasks(&self) -> &[RgTask] {
        &self.tasks
    }
}

/// 一个 task 的执行结果，前驱失败而被跳过的 task 为 `Skipped`
#[derive(Debug)]
pub(crate) enum RgTaskOutcome<T, E> {
    Finished(Result<T, E>),
    Skipped,
}

/// task 图执行器
pub(crate) struct RgExecutor {
    pool: rayon::ThreadPool,
}

impl RgExecutor {
    pub fn new(num_threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|index| format!("RenderGraph-Worker-{}", index))
            .build()?;
        log::info!("render graph worker pool: {} threads", pool.current_num_threads());
        Ok(Self { pool })
    }

    /// 运行整个 task 图，阻塞直到所有 task 完成或被跳过
    ///
    /// 返回值与 task 一一对应
    pub fn run<T, E, F>(&self, taskflow: &RgTaskflow, run_task: F) -> Vec<RgTaskOutcome<T, E>>
    where
        T: Send,
        E: Send,
        F: Fn(&RgTask) -> Result<T, E> + Sync,
    {
        let state = RgRunState {
            taskflow,
            run_task: &run_task,
            remaining: taskflow.tasks.iter().map(|task| AtomicUsize::new(task.predecessor_count)).collect(),
            poisoned: taskflow.tasks.iter().map(|_| AtomicBool::new(false)).collect(),
            outcomes: taskflow.tasks.iter().map(|_| Mutex::new(None)).collect(),
        };

        self.pool.scope(|scope| {
            for (index, task) in taskflow.tasks.iter().enumerate() {
                if task.predecessor_count == 0 {
                    let state = &state;
                    scope.spawn(move |scope| state.run(scope, index));
                }
            }
        });

        state
            .outcomes
            .into_iter()
            .map(|outcome| match outcome.into_inner().unwrap_or_else(PoisonError::into_inner) {
                Some(result) => RgTaskOutcome::Finished(result),
                None => RgTaskOutcome::Skipped,
            })
            .collect()
    }
}

struct RgRunState<'a, T, E, F> {
    taskflow: &'a RgTaskflow,
    run_task: &'a F,
    /// 还没有完成的前驱数量，归零时派发
    remaining: Vec<AtomicUsize>,
    /// 有前驱失败或被跳过
    poisoned: Vec<AtomicBool>,
    outcomes: Vec<Mutex<Option<Result<T, E>>>>,
}

impl<'a, T, E, F> RgRunState<'a, T, E, F>
where
    T: Send,
    E: Send,
    F: Fn(&RgTask) -> Result<T, E> + Sync,
{
    fn run<'s>(&'s self, scope: &rayon::Scope<'s>, index: usize) {
        let task = &self.taskflow.tasks[index];

        let failed = if self.poisoned[index].load(Ordering::Acquire) {
            log::debug!("task `{}` skipped, a dependency failed", task.name);
            true
        } else {
            let result = (self.run_task)(task);
            let failed = result.is_err();
            *self.outcomes[index].lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
            failed
        };

        for &successor in &task.successors {
            if failed {
                self.poisoned[successor].store(true, Ordering::Release);
            }
            // 最后一个完成的前驱负责派发
            if self.remaining[successor].fetch_sub(1, Ordering::AcqRel) == 1 {
                scope.spawn(move |scope| self.run(scope, successor));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use ember_gfx::basic::queue_type::QueueType;

    use super::*;

    fn node(name: &str, deps: &[&str]) -> RgNodeDesc {
        deps.iter().fold(RgNodeDesc::new(name, QueueType::Graphics, |_, _| {}), |desc, dep| desc.depends_on(*dep))
    }

    #[test]
    fn test_build_edges() {
        let descs = vec![node("A", &[]), node("B", &["A"]), node("C", &["A"])];
        let present = vec!["B".to_string(), "C".to_string()];
        let flow = RgTaskflow::build(1, &descs, Some(present.as_slice()));

        assert_eq!(flow.frame_index(), 1);
        assert_eq!(flow.tasks().len(), 4);
        assert_eq!(flow.tasks()[0].successors, vec![1, 2]);
        assert_eq!(flow.tasks()[3].kind, RgTaskKind::Present);
        assert_eq!(flow.tasks()[3].predecessor_count, 2);
    }

    #[test]
    fn test_dependencies_finish_first() {
        let descs = vec![node("D", &["B", "C"]), node("B", &["A"]), node("C", &["A"]), node("A", &[])];
        let flow = RgTaskflow::build(0, &descs, None);
        let executor = RgExecutor::new(4).unwrap();

        for _ in 0..20 {
            let finished = Mutex::new(Vec::new());
            let outcomes = executor.run(&flow, |task| {
                finished.lock().unwrap().push(task.name.clone());
                Ok::<_, ()>(())
            });
            assert!(outcomes.iter().all(|o| matches!(o, RgTaskOutcome::Finished(Ok(())))));

            let finished = finished.into_inner().unwrap();
            let position = |name: &str| finished.iter().position(|n| n == name).unwrap();
            assert_eq!(finished.len(), 4);
            assert!(position("A") < position("B"));
            assert!(position("A") < position("C"));
            assert!(position("B") < position("D"));
            assert!(position("C") < position("D"));
        }
    }

    #[test]
    fn test_failure_skips_successors() {
        let descs = vec![node("A", &[]), node("B", &["A"]), node("C", &["B"]), node("X", &[])];
        let flow = RgTaskflow::build(0, &descs, Some(["C".to_string()].as_slice()));
        let executor = RgExecutor::new(2).unwrap();

        let outcomes = executor.run(&flow, |task| if task.name == "A" { Err("boom") } else { Ok(()) });
        assert!(matches!(outcomes[0], RgTaskOutcome::Finished(Err("boom"))));
        assert!(matches!(outcomes[1], RgTaskOutcome::Skipped));
        assert!(matches!(outcomes[2], RgTaskOutcome::Skipped));
        assert!(matches!(outcomes[3], RgTaskOutcome::Finished(Ok(()))));
        assert!(matches!(outcomes[4], RgTaskOutcome::Skipped));
    }
}
