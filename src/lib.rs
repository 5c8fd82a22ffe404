//! # neon-ksem
//!
//! 内核计数信号量：固定容量的句柄表、FIFO 等待队列，以及
//! acquire / release / switch / 删除 / 超时 / 打断协议。
//!
//! 调度器和定时器以 trait 的形式注入（见 [`kernel`]），`host` feature
//! 提供基于 std 线程的实现，用于在开发机上测试。

#![cfg_attr(not(test), no_std)]
#[cfg(any(test, feature = "host"))]
extern crate std;
extern crate alloc;

pub mod compat;
pub mod config;
pub mod error;
pub mod hal;
pub mod kernel;
pub mod klog;
pub mod sync;

pub use error::{Result, SemError};
pub use sync::sem::{AcquireFlags, Owner, ReleaseFlags, SemId, SemInfo, SemTable};
