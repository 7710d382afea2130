use std::fmt;

/// 命令队列类型
///
/// 每个 node 都有一个队列亲和性，决定它的命令列表从哪个池子里分配、提交到哪个队列。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueueType {
    #[default]
    Graphics,
    Compute,
    Copy,
    RayTracing,
}

impl QueueType {
    pub const ALL: [QueueType; 4] = [QueueType::Graphics, QueueType::Compute, QueueType::Copy, QueueType::RayTracing];

    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            QueueType::Graphics => "graphics",
            QueueType::Compute => "compute",
            QueueType::Copy => "copy",
            QueueType::RayTracing => "ray-tracing",
        }
    }
}

impl fmt::Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
