//! RenderGraph 执行引擎
//!
//! 用户以名字声明 node 之间的依赖，以及每个 node 在每一帧需要的资源状态；
//! `build_graph` 之后，每次 `update` 会：
//! 1. 等待当前 frame slot 上一次提交的 fence
//! 2. 在线程池中并行执行这一帧的 task 图，每个 node 自动插入 barrier、录制、提交
//! 3. 最后由 present node 获取 swapchain image 并 present

pub mod render_graph;
