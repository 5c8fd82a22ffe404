//! 集成测试共用的宿主机内核环境
#![allow(dead_code)]

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use neon_ksem::config::TableConfig;
use neon_ksem::hal::host::{HostScheduler, ManualTimer};
use neon_ksem::kernel::{Scheduler, TeamId, ThreadId};
use neon_ksem::{Owner, SemTable};

pub type HostTable = SemTable<Arc<HostScheduler>, Arc<ManualTimer>>;

pub const TEAM: Owner = Owner::Team(TeamId(7));

/// 单个等待的上限；超过说明丢了唤醒
pub const LIMIT: Duration = Duration::from_secs(10);

pub fn host_table(capacity: usize, threads: usize) -> Arc<HostTable> {
    let table = SemTable::new(
        TableConfig::with_capacity(capacity).unwrap(),
        Arc::new(HostScheduler::new(threads)),
        Arc::new(ManualTimer::new()),
    )
    .unwrap();
    Arc::new(table)
}

/// 在新的 std 线程上运行一个内核线程
pub fn spawn<R, F>(table: &Arc<HostTable>, f: F) -> (ThreadId, JoinHandle<R>)
where
    R: Send + 'static,
    F: FnOnce(&HostTable) -> R + Send + 'static,
{
    let thread = table.scheduler().create_thread();
    let table = Arc::clone(table);
    let handle = thread::spawn(move || {
        table.scheduler().adopt(thread);
        f(&table)
    });
    (thread, handle)
}

/// 启动一个内核线程并等到它在信号量上排好队
pub fn spawn_blocked<R, F>(table: &Arc<HostTable>, f: F) -> (ThreadId, JoinHandle<R>)
where
    R: Send + 'static,
    F: FnOnce(&HostTable) -> R + Send + 'static,
{
    let (thread, handle) = spawn(table, f);
    assert!(
        table.scheduler().wait_until_blocked(thread, LIMIT),
        "{:?} never blocked",
        thread
    );
    (thread, handle)
}

/// 带截止时间的 join：线程卡死时让测试失败而不是挂住
pub fn join_within<R>(handle: JoinHandle<R>, limit: Duration) -> R {
    let deadline = Instant::now() + limit;
    while !handle.is_finished() {
        assert!(Instant::now() < deadline, "thread did not finish: lost wakeup?");
        thread::sleep(Duration::from_millis(1));
    }
    handle.join().unwrap()
}

pub fn join<R>(handle: JoinHandle<R>) -> R {
    join_within(handle, LIMIT)
}

/// 线程仍在等待（给它一点时间证明自己没被误唤醒）
pub fn assert_still_blocked(table: &HostTable, thread: ThreadId) {
    thread::sleep(Duration::from_millis(20));
    let record = table.scheduler().block_record(thread).unwrap();
    assert!(record.is_waiting(), "{:?} was woken unexpectedly", thread);
}

/// 推进虚拟时钟，到期的定时器交给信号量表处理
pub fn advance(table: &HostTable, delta: i64) -> usize {
    table
        .timer()
        .advance(delta, |context| {
            table.timeout_expired(context);
        })
}
