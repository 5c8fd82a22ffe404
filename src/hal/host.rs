//! 宿主机（std）上的协作者实现
//!
//! 在开发机上跑信号量核心用：每个内核线程对应一个 std 线程，挂起就是
//! 停在条件变量上；定时器是手动推进的虚拟时钟。
//!
//! - `HostScheduler`: 线程登记表 + 每线程运行状态，支持注入信号，
//!   统计优先级提升和调度请求次数
//! - `ManualTimer`: `advance` 推进时钟并触发到期的定时器

use core::cell::Cell;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::compat::{Box, Vec};
use crate::kernel::scheduler::{Scheduler, Suspend};
use crate::kernel::thread::{BlockRecord, SignalKind, ThreadId};
use crate::kernel::timer::{Ticks, TimeoutContext, Timer, TimerId};
use crate::sync::sem::AcquireFlags;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// 调度器
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Running,
    Waiting,
    Ready,
}

struct RunControl {
    state: RunState,
    signal: Option<SignalKind>,
}

struct HostThread {
    record: BlockRecord,
    control: Mutex<RunControl>,
    wakeup: Condvar,
}

impl HostThread {
    fn new() -> Self {
        Self {
            record: BlockRecord::new(),
            control: Mutex::new(RunControl {
                state: RunState::Running,
                signal: None,
            }),
            wakeup: Condvar::new(),
        }
    }
}

static NEXT_SCHEDULER: AtomicUsize = AtomicUsize::new(1);

std::thread_local! {
    /// (调度器编号, 线程) - 同一个 std 线程可能先后服务多个调度器
    static CURRENT: Cell<Option<(usize, ThreadId)>> = const { Cell::new(None) };
}

/// 以 std 线程为载体的调度器
///
/// 线程 ID 从 0 开始按登记顺序分配，容量在构造时固定。
pub struct HostScheduler {
    uid: usize,
    threads: Box<[HostThread]>,
    registered: AtomicUsize,
    boosted: AtomicUsize,
    reschedules: AtomicUsize,
}

impl HostScheduler {
    pub fn new(max_threads: usize) -> Self {
        let threads: Vec<HostThread> = (0..max_threads).map(|_| HostThread::new()).collect();
        Self {
            uid: NEXT_SCHEDULER.fetch_add(1, Ordering::Relaxed),
            threads: threads.into_boxed_slice(),
            registered: AtomicUsize::new(0),
            boosted: AtomicUsize::new(0),
            reschedules: AtomicUsize::new(0),
        }
    }

    /// 登记一个新线程，随后由某个 std 线程通过 `adopt` 认领
    ///
    /// # Panics
    /// 登记表已满
    pub fn create_thread(&self) -> ThreadId {
        let index = self.registered.fetch_add(1, Ordering::Relaxed);
        assert!(index < self.threads.len(), "host scheduler: thread table full");
        ThreadId(index as u32)
    }

    /// 让调用它的 std 线程成为 `thread`
    pub fn adopt(&self, thread: ThreadId) {
        CURRENT.with(|current| current.set(Some((self.uid, thread))));
    }

    fn thread(&self, thread: ThreadId) -> Option<&HostThread> {
        if (thread.0 as usize) < self.registered.load(Ordering::Relaxed) {
            self.threads.get(thread.0 as usize)
        } else {
            None
        }
    }

    /// 向线程投递一个信号，并叫醒它去检查
    pub fn deliver_signal(&self, thread: ThreadId, kind: SignalKind) {
        if let Some(entry) = self.thread(thread) {
            let mut control = lock(&entry.control);
            // kill 类信号优先
            if control.signal != Some(SignalKind::Kill) {
                control.signal = Some(kind);
            }
            entry.wakeup.notify_all();
        }
    }

    pub fn clear_signal(&self, thread: ThreadId) {
        if let Some(entry) = self.thread(thread) {
            lock(&entry.control).signal = None;
        }
    }

    /// 轮询直到线程在某个信号量上排队，超过 `limit` 返回 `false`
    pub fn wait_until_blocked(&self, thread: ThreadId, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        loop {
            if self.thread(thread).is_some_and(|entry| entry.record.is_waiting()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// 以提升优先级入队的次数
    pub fn boosted_wakeups(&self) -> usize {
        self.boosted.load(Ordering::Relaxed)
    }

    pub fn reschedules(&self) -> usize {
        self.reschedules.load(Ordering::Relaxed)
    }
}

impl Scheduler for HostScheduler {
    /// 未登记的 std 线程在第一次调用时自动登记
    fn current_thread(&self) -> ThreadId {
        let known = CURRENT.with(|current| current.get());
        match known {
            Some((uid, thread)) if uid == self.uid => thread,
            _ => {
                let thread = self.create_thread();
                self.adopt(thread);
                thread
            }
        }
    }

    fn block_record(&self, thread: ThreadId) -> Option<&BlockRecord> {
        self.thread(thread).map(|entry| &entry.record)
    }

    fn signal_pending(&self, thread: ThreadId) -> Option<SignalKind> {
        self.thread(thread)
            .and_then(|entry| lock(&entry.control).signal)
    }

    fn prepare_to_wait(&self, thread: ThreadId) {
        if let Some(entry) = self.thread(thread) {
            lock(&entry.control).state = RunState::Waiting;
        }
    }

    fn suspend_current(&self, flags: AcquireFlags) -> Suspend {
        let current = self.current_thread();
        let Some(entry) = self.thread(current) else {
            return Suspend::Resumed;
        };

        let mut control = lock(&entry.control);
        loop {
            if control.state == RunState::Ready {
                control.state = RunState::Running;
                return Suspend::Resumed;
            }
            if let Some(kind) = control.signal {
                if flags.interrupted_by(kind) {
                    return Suspend::SignalPending(kind);
                }
            }
            control = entry
                .wakeup
                .wait(control)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn enqueue_ready(&self, thread: ThreadId, boost: bool) {
        if let Some(entry) = self.thread(thread) {
            lock(&entry.control).state = RunState::Ready;
            entry.wakeup.notify_all();
            if boost {
                self.boosted.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn reschedule_now(&self) {
        self.reschedules.fetch_add(1, Ordering::Relaxed);
        std::thread::yield_now();
    }
}

// ============================================================================
// 定时器
// ============================================================================

struct TimerState {
    now: Ticks,
    next_id: u64,
    armed: BTreeMap<TimerId, (Ticks, TimeoutContext)>,
    fired: usize,
    cancelled: usize,
}

/// 手动推进的虚拟时钟
pub struct ManualTimer {
    state: Mutex<TimerState>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TimerState {
                now: 0,
                next_id: 1,
                armed: BTreeMap::new(),
                fired: 0,
                cancelled: 0,
            }),
        }
    }

    /// 推进时钟，按截止时间顺序对每个到期定时器调用 `on_expire`
    ///
    /// 回调在本定时器的锁外执行，返回触发的个数。
    pub fn advance(&self, delta: Ticks, mut on_expire: impl FnMut(TimeoutContext)) -> usize {
        let due = {
            let mut state = lock(&self.state);
            state.now = state.now.saturating_add(delta);
            let now = state.now;
            let mut due: Vec<(Ticks, TimerId, TimeoutContext)> = state
                .armed
                .iter()
                .filter(|(_, (deadline, _))| *deadline <= now)
                .map(|(id, (deadline, context))| (*deadline, *id, *context))
                .collect();
            due.sort_by_key(|(deadline, id, _)| (*deadline, *id));
            for (_, id, _) in &due {
                state.armed.remove(id);
            }
            state.fired += due.len();
            due
        };

        let fired = due.len();
        for (_, _, context) in due {
            on_expire(context);
        }
        fired
    }

    /// 仍在等待触发的定时器个数
    pub fn armed(&self) -> usize {
        lock(&self.state).armed.len()
    }

    pub fn fired(&self) -> usize {
        lock(&self.state).fired
    }

    pub fn cancelled(&self) -> usize {
        lock(&self.state).cancelled
    }
}

impl Default for ManualTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for ManualTimer {
    fn now(&self) -> Ticks {
        lock(&self.state).now
    }

    fn arm_oneshot(&self, deadline: Ticks, context: TimeoutContext) -> TimerId {
        let mut state = lock(&self.state);
        let id = TimerId(state.next_id);
        state.next_id += 1;
        state.armed.insert(id, (deadline, context));
        id
    }

    fn cancel(&self, timer: TimerId) -> bool {
        let mut state = lock(&self.state);
        let removed = state.armed.remove(&timer).is_some();
        if removed {
            state.cancelled += 1;
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::sem::SemId;

    fn context(ticket: u64) -> TimeoutContext {
        TimeoutContext {
            sem: SemId::new(0, 0),
            thread: ThreadId(0),
            ticket,
        }
    }

    #[test]
    fn test_timer_fires_in_deadline_order() {
        let timer = ManualTimer::new();
        timer.arm_oneshot(30, context(3));
        timer.arm_oneshot(10, context(1));
        timer.arm_oneshot(20, context(2));

        let mut order = Vec::new();
        assert_eq!(timer.advance(25, |ctx| order.push(ctx.ticket)), 2);
        assert_eq!(order, [1, 2]);
        assert_eq!(timer.armed(), 1);
        assert_eq!(timer.now(), 25);
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let timer = ManualTimer::new();
        let id = timer.arm_oneshot(5, context(1));
        assert!(timer.cancel(id));
        assert!(!timer.cancel(id));
        assert_eq!(timer.advance(100, |_| panic!("cancelled timer fired")), 0);
        assert_eq!(timer.cancelled(), 1);
        assert_eq!(timer.fired(), 0);
    }

    #[test]
    fn test_current_thread_registers_once() {
        let scheduler = HostScheduler::new(4);
        let me = scheduler.current_thread();
        assert_eq!(scheduler.current_thread(), me);
        assert!(scheduler.block_record(me).is_some());
        assert!(scheduler.block_record(ThreadId(3)).is_none());
    }

    #[test]
    fn test_ready_before_suspend_returns_immediately() {
        let scheduler = HostScheduler::new(2);
        let me = scheduler.current_thread();
        scheduler.prepare_to_wait(me);
        scheduler.enqueue_ready(me, true);
        assert_eq!(scheduler.suspend_current(AcquireFlags::empty()), Suspend::Resumed);
        assert_eq!(scheduler.boosted_wakeups(), 1);
    }

    #[test]
    fn test_signal_respects_flags() {
        let scheduler = HostScheduler::new(2);
        let me = scheduler.current_thread();
        scheduler.deliver_signal(me, SignalKind::Ordinary);
        scheduler.prepare_to_wait(me);
        assert_eq!(
            scheduler.suspend_current(AcquireFlags::CAN_INTERRUPT),
            Suspend::SignalPending(SignalKind::Ordinary)
        );
        scheduler.deliver_signal(me, SignalKind::Kill);
        assert_eq!(scheduler.signal_pending(me), Some(SignalKind::Kill));
        scheduler.clear_signal(me);
        assert_eq!(scheduler.signal_pending(me), None);
    }
}
