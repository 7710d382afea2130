use ember_gfx::GfxError;
use ember_gfx::basic::queue_type::QueueType;
use ember_gfx::resources::handles::GfxResourceKey;

/// 构建阶段的配置错误
///
/// 由 `add_node` / `set_present_node` / `build_graph` 返回，出现时 graph 保持未构建状态。
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RgConfigError {
    #[error("node must have a name")]
    EmptyNodeName,

    #[error("node `{0}` is declared more than once")]
    DuplicateNodeName(String),

    #[error("present node must have a valid swapchain")]
    MissingSwapchain,

    #[error("node `{node}` has a dependency `{dependency}` that does not exist")]
    UnknownDependency { node: String, dependency: String },

    #[error("node `{node}` lists dependency `{dependency}` more than once")]
    DuplicateDependency { node: String, dependency: String },

    #[error("cyclic dependency between nodes: [{}]", .nodes.join(", "))]
    CyclicDependency { nodes: Vec<String> },

    #[error("not enough {queue_type} command lists for node `{node}` (budget: {budget}), raise it in `RgGraphDesc`")]
    OutOfCommandLists {
        queue_type: QueueType,
        node: String,
        budget: u32,
    },

    #[error("node `{node}` declares a resource state for frame {frame_index}, but the graph has {num_frames} frames")]
    InvalidFrameIndex {
        node: String,
        frame_index: u32,
        num_frames: u32,
    },

    #[error("node `{node}` requests conflicting states for resource {resource:?} in frame {frame_index}")]
    ConflictingResourceUsage {
        node: String,
        frame_index: u32,
        resource: GfxResourceKey,
    },

    #[error("render graph needs at least one frame in flight")]
    ZeroFrames,
}

#[derive(thiserror::Error, Debug)]
pub enum RgError {
    #[error(transparent)]
    Config(#[from] RgConfigError),

    #[error("render graph is not built, call `build_graph` first")]
    GraphNotBuilt,

    #[error("node `{node}` failed: {source}")]
    NodeExecution {
        node: String,
        #[source]
        source: GfxError,
    },

    #[error(transparent)]
    Gfx(#[from] GfxError),

    #[error("failed to create render graph worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl RgError {
    pub fn is_device_lost(&self) -> bool {
        match self {
            RgError::NodeExecution { source, .. } | RgError::Gfx(source) => source.is_device_lost(),
            _ => false,
        }
    }
}
