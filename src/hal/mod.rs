//! 硬件抽象层 (HAL)
//!
//! - `irq`: 关中断自旋锁，所有槽位锁和空闲链表锁都基于它
//! - `host`: 宿主机上的调度器与定时器实现（`host` feature）

pub mod irq;

#[cfg(any(test, feature = "host"))]
pub mod host;

pub use irq::IrqLock;
