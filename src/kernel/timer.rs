//! 单次定时器协作接口
//!
//! 核心在阻塞前用 `arm_oneshot` 布置超时；定时器到期时，定时器驱动
//! （通常在时钟中断里）调用 `SemTable::timeout_expired(context)`。

use crate::compat::Arc;
use crate::kernel::thread::ThreadId;
use crate::sync::sem::SemId;

/// 系统时间，单位微秒
pub type Ticks = i64;

/// 不限时等待
pub const INFINITE_TIMEOUT: Ticks = i64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// 布置定时器时捕获的上下文，到期时原样交回
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutContext {
    pub sem: SemId,
    pub thread: ThreadId,
    /// 对应等待的票号，用来识别已经过期的到期通知
    pub ticket: u64,
}

pub trait Timer: Send + Sync {
    fn now(&self) -> Ticks;

    /// 布置单次定时器。实现不得在本调用内同步回调（调用时持有槽位锁）。
    fn arm_oneshot(&self, deadline: Ticks, context: TimeoutContext) -> TimerId;

    /// 取消定时器；返回 `true` 表示回调不会再被触发
    fn cancel(&self, timer: TimerId) -> bool;
}

impl<T: Timer + ?Sized> Timer for Arc<T> {
    fn now(&self) -> Ticks {
        (**self).now()
    }

    fn arm_oneshot(&self, deadline: Ticks, context: TimeoutContext) -> TimerId {
        (**self).arm_oneshot(deadline, context)
    }

    fn cancel(&self, timer: TimerId) -> bool {
        (**self).cancel(timer)
    }
}

impl<T: Timer + ?Sized> Timer for &T {
    fn now(&self) -> Ticks {
        (**self).now()
    }

    fn arm_oneshot(&self, deadline: Ticks, context: TimeoutContext) -> TimerId {
        (**self).arm_oneshot(deadline, context)
    }

    fn cancel(&self, timer: TimerId) -> bool {
        (**self).cancel(timer)
    }
}
