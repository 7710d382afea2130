pub mod handles;
pub mod manager;
pub mod resource_data;
