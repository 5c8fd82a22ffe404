//! 调度器协作接口
//!
//! 信号量核心不实现调度，只通过这个 trait 挂起/唤醒线程。
//! 锁顺序约定：核心总是先释放槽位锁，再调用 `enqueue_ready` /
//! `suspend_current` / `reschedule_now`；`prepare_to_wait`、`signal_pending`
//! 和 `block_record` 可能在槽位锁内被调用，实现必须不阻塞。

use crate::compat::Arc;
use crate::kernel::thread::{BlockRecord, SignalKind, ThreadId};
use crate::sync::sem::AcquireFlags;

/// `suspend_current` 的返回原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspend {
    /// 被 `enqueue_ready` 唤醒（或在真正睡眠前就已被唤醒）
    Resumed,
    /// 真正睡眠前发现了能打断本次等待的挂起信号
    SignalPending(SignalKind),
}

pub trait Scheduler: Send + Sync {
    /// 当前运行的线程
    fn current_thread(&self) -> ThreadId;

    /// 线程的等待记录；线程已不存在时返回 `None`
    fn block_record(&self, thread: ThreadId) -> Option<&BlockRecord>;

    /// 线程上挂起且未屏蔽的信号（kill 类优先）
    fn signal_pending(&self, thread: ThreadId) -> Option<SignalKind>;

    /// 把线程标记为“即将等待”，在槽位锁内调用
    fn prepare_to_wait(&self, thread: ThreadId);

    /// 挂起当前线程直到被 `enqueue_ready`
    ///
    /// 真正让出 CPU 之前再检查一次挂起信号：若 `flags` 允许被该信号打断，
    /// 不睡眠，直接返回 `Suspend::SignalPending`。
    fn suspend_current(&self, flags: AcquireFlags) -> Suspend;

    /// 放入运行队列；`boost` 为真时以实时优先级入队，入队后恢复原优先级
    fn enqueue_ready(&self, thread: ThreadId, boost: bool);

    /// 立即做一次调度决策
    fn reschedule_now(&self);
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn current_thread(&self) -> ThreadId {
        (**self).current_thread()
    }

    fn block_record(&self, thread: ThreadId) -> Option<&BlockRecord> {
        (**self).block_record(thread)
    }

    fn signal_pending(&self, thread: ThreadId) -> Option<SignalKind> {
        (**self).signal_pending(thread)
    }

    fn prepare_to_wait(&self, thread: ThreadId) {
        (**self).prepare_to_wait(thread)
    }

    fn suspend_current(&self, flags: AcquireFlags) -> Suspend {
        (**self).suspend_current(flags)
    }

    fn enqueue_ready(&self, thread: ThreadId, boost: bool) {
        (**self).enqueue_ready(thread, boost)
    }

    fn reschedule_now(&self) {
        (**self).reschedule_now()
    }
}

impl<S: Scheduler + ?Sized> Scheduler for &S {
    fn current_thread(&self) -> ThreadId {
        (**self).current_thread()
    }

    fn block_record(&self, thread: ThreadId) -> Option<&BlockRecord> {
        (**self).block_record(thread)
    }

    fn signal_pending(&self, thread: ThreadId) -> Option<SignalKind> {
        (**self).signal_pending(thread)
    }

    fn prepare_to_wait(&self, thread: ThreadId) {
        (**self).prepare_to_wait(thread)
    }

    fn suspend_current(&self, flags: AcquireFlags) -> Suspend {
        (**self).suspend_current(flags)
    }

    fn enqueue_ready(&self, thread: ThreadId, boost: bool) {
        (**self).enqueue_ready(thread, boost)
    }

    fn reschedule_now(&self) {
        (**self).reschedule_now()
    }
}
