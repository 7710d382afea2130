pub mod barrier;
pub mod command_list;
pub mod fence;
pub mod resource_state;
pub mod semaphore;
pub mod submit_info;
