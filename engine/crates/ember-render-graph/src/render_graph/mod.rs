pub mod command_allocator;
pub mod dependency;
pub mod error;
pub mod frame_counter;
pub mod graph;
pub mod graph_desc;
pub mod graph_node;
pub mod node_desc;
pub mod present;
pub mod resource_tracker;
pub mod sync_pool;
pub mod taskflow;

pub use error::{RgConfigError, RgError};
pub use frame_counter::RgFrameCounter;
pub use graph::{RenderGraph, RgFrameStatus};
pub use graph_desc::RgGraphDesc;
pub use graph_node::{RgGraphNode, RgNodeExecutionContext};
pub use node_desc::{RgNodeDesc, RgNodeExecute, RgPresentExecute, RgPresentNodeDesc, RgResourceUsage};
pub use present::RgPresentContext;
pub use resource_tracker::{RgResourceTracker, RgResourceTransition, RgTrackedState};
pub use sync_pool::RgSemaphoreId;
