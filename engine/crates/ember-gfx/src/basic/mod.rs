pub mod queue_type;
pub mod resource_usage;
