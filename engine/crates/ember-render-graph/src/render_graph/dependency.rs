//! 依赖解析
//!
//! 将 node 之间按名字声明的依赖解析为 DAG，拓扑排序后为每条边分配一个 semaphore。
//! 使用 petgraph 进行拓扑排序与环检测。

use std::collections::{HashMap, HashSet};

use ember_gfx::GfxResult;
use ember_gfx::foundation::device::GfxDevice;
use petgraph::Direction;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::render_graph::error::RgConfigError;
use crate::render_graph::graph_node::RgGraphNode;
use crate::render_graph::node_desc::RgNodeDesc;
use crate::render_graph::present::RgPresentContext;
use crate::render_graph::sync_pool::RgSemaphorePool;

/// present node 在错误信息中的名字
pub(crate) const PRESENT_NODE_NAME: &str = "present";

/// 检查名字和依赖列表，返回 name -> 声明下标
pub(crate) fn validate_nodes<'a>(
    descs: &'a [RgNodeDesc],
    present_dependencies: Option<&[String]>,
) -> Result<HashMap<&'a str, usize>, RgConfigError> {
    let mut name_to_index = HashMap::with_capacity(descs.len());
    for (idx, desc) in descs.iter().enumerate() {
        if desc.name.is_empty() {
            return Err(RgConfigError::EmptyNodeName);
        }
        if name_to_index.insert(desc.name.as_str(), idx).is_some() {
            return Err(RgConfigError::DuplicateNodeName(desc.name.clone()));
        }
    }

    let node_dependencies = descs.iter().map(|desc| (desc.name.as_str(), desc.dependencies.as_slice()));
    let present_dependencies = present_dependencies.map(|deps| (PRESENT_NODE_NAME, deps));
    for (node, dependencies) in node_dependencies.chain(present_dependencies) {
        let mut seen = HashSet::with_capacity(dependencies.len());
        for dependency in dependencies {
            if !name_to_index.contains_key(dependency.as_str()) {
                return Err(RgConfigError::UnknownDependency {
                    node: node.to_string(),
                    dependency: dependency.clone(),
                });
            }
            if !seen.insert(dependency.as_str()) {
                return Err(RgConfigError::DuplicateDependency {
                    node: node.to_string(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    Ok(name_to_index)
}

/// 依赖图
///
/// 节点存储 node 的声明下标，边从 producer 指向 consumer。
pub(crate) struct RgDependencyGraph {
    graph: DiGraph<usize, ()>,
    node_indices: Vec<NodeIndex>,
}

impl RgDependencyGraph {
    /// `name_to_index` 需要先经过 [`validate_nodes`]
    pub fn new(descs: &[RgNodeDesc], name_to_index: &HashMap<&str, usize>) -> Self {
        let mut graph = DiGraph::with_capacity(descs.len(), descs.len() * 2);
        let node_indices: Vec<NodeIndex> = (0..descs.len()).map(|idx| graph.add_node(idx)).collect();

        for (consumer, desc) in descs.iter().enumerate() {
            for dependency in &desc.dependencies {
                if let Some(&producer) = name_to_index.get(dependency.as_str()) {
                    graph.add_edge(node_indices[producer], node_indices[consumer], ());
                }
            }
        }

        Self { graph, node_indices }
    }

    /// 拓扑排序
    ///
    /// 存在环时返回环上所有 node 的名字
    pub fn topological_sort(&self, descs: &[RgNodeDesc]) -> Result<Vec<usize>, RgConfigError> {
        match toposort(&self.graph, None) {
            Ok(sorted) => Ok(sorted.into_iter().map(|n| self.graph[n]).collect()),
            Err(_) => {
                // toposort 只给出环上的一个节点，用强连通分量找出完整的环
                let mut cycle: Vec<usize> = tarjan_scc(&self.graph)
                    .into_iter()
                    .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
                    .flatten()
                    .map(|n| self.graph[n])
                    .collect();
                cycle.sort_unstable();
                Err(RgConfigError::CyclicDependency {
                    nodes: cycle.into_iter().map(|idx| descs[idx].name.clone()).collect(),
                })
            }
        }
    }

    /// 没有任何 node 依赖它
    pub fn is_sink(&self, node_index: usize) -> bool {
        self.graph.neighbors_directed(self.node_indices[node_index], Direction::Outgoing).next().is_none()
    }
}

/// 按拓扑序为每条依赖边分配 semaphore
///
/// 对每个 node 的每个依赖（声明顺序），semaphore 同时加入 consumer 的 wait 列表和
/// producer 的 notify 列表，所有帧共用同一个 semaphore。
/// present node 最后处理，它的每个依赖都会得到一个新的 semaphore。
#[allow(clippy::too_many_arguments)]
pub(crate) fn wire_semaphores(
    device: &dyn GfxDevice,
    order: &[usize],
    descs: &[RgNodeDesc],
    name_to_index: &HashMap<&str, usize>,
    nodes: &mut [RgGraphNode],
    present_dependencies: Option<&[String]>,
    present_contexts: &mut [RgPresentContext],
    semaphore_pool: &mut RgSemaphorePool,
) -> GfxResult<()> {
    for &consumer in order {
        for dependency in &descs[consumer].dependencies {
            let Some(&producer) = name_to_index.get(dependency.as_str()) else {
                continue;
            };
            let semaphore = semaphore_pool.allocate(device)?;
            for context in nodes[consumer].contexts_mut() {
                context.wait_semaphores.push(semaphore);
            }
            for context in nodes[producer].contexts_mut() {
                context.notify_semaphores.push(semaphore);
            }
        }
    }

    for dependency in present_dependencies.unwrap_or_default() {
        let Some(&producer) = name_to_index.get(dependency.as_str()) else {
            continue;
        };
        let semaphore = semaphore_pool.allocate(device)?;
        for context in present_contexts.iter_mut() {
            context.dependency_semaphores.push(semaphore);
        }
        for context in nodes[producer].contexts_mut() {
            context.notify_semaphores.push(semaphore);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use ember_gfx::basic::queue_type::QueueType;

    use super::*;

    fn node(name: &str, deps: &[&str]) -> RgNodeDesc {
        deps.iter().fold(RgNodeDesc::new(name, QueueType::Graphics, |_, _| {}), |desc, dep| desc.depends_on(*dep))
    }

    #[test]
    fn test_declaration_order_is_irrelevant() {
        // C -> B -> A，但声明顺序是反的
        let descs = vec![node("C", &["B"]), node("B", &["A"]), node("A", &[])];
        let name_to_index = validate_nodes(&descs, None).unwrap();
        let graph = RgDependencyGraph::new(&descs, &name_to_index);

        let order = graph.topological_sort(&descs).unwrap();
        let position = |name: &str| order.iter().position(|&idx| descs[idx].name == name).unwrap();
        assert!(position("A") < position("B"));
        assert!(position("B") < position("C"));

        assert!(graph.is_sink(0));
        assert!(!graph.is_sink(2));
    }

    #[test]
    fn test_cycle_names_every_member() {
        let descs = vec![node("A", &["C"]), node("B", &["A"]), node("C", &["B"]), node("D", &["A"])];
        let name_to_index = validate_nodes(&descs, None).unwrap();
        let graph = RgDependencyGraph::new(&descs, &name_to_index);

        assert_eq!(
            graph.topological_sort(&descs),
            Err(RgConfigError::CyclicDependency {
                nodes: vec!["A".to_string(), "B".to_string(), "C".to_string()]
            })
        );
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let descs = vec![node("A", &["A"])];
        let name_to_index = validate_nodes(&descs, None).unwrap();
        let graph = RgDependencyGraph::new(&descs, &name_to_index);
        assert!(matches!(graph.topological_sort(&descs), Err(RgConfigError::CyclicDependency { .. })));
    }

    #[test]
    fn test_invalid_dependency_lists() {
        let descs = vec![node("A", &[]), node("B", &["A", "A"])];
        assert_eq!(
            validate_nodes(&descs, None).unwrap_err(),
            RgConfigError::DuplicateDependency {
                node: "B".to_string(),
                dependency: "A".to_string()
            }
        );

        let descs = vec![node("A", &[])];
        let present = vec!["Z".to_string()];
        assert_eq!(
            validate_nodes(&descs, Some(present.as_slice())).unwrap_err(),
            RgConfigError::UnknownDependency {
                node: PRESENT_NODE_NAME.to_string(),
                dependency: "Z".to_string()
            }
        );

        let descs = vec![node("A", &[]), node("A", &[])];
        assert_eq!(validate_nodes(&descs, None).unwrap_err(), RgConfigError::DuplicateNodeName("A".to_string()));
    }
}
