//! 信号量核心依赖的外部子系统接口：线程、调度器、定时器

pub mod scheduler;
pub mod thread;
pub mod timer;

pub use scheduler::{Scheduler, Suspend};
pub use thread::{BlockRecord, SignalKind, TeamId, ThreadId};
pub use timer::{INFINITE_TIMEOUT, Ticks, TimeoutContext, Timer, TimerId};
