//! 线程侧的等待记录
//!
//! `BlockRecord` 归线程子系统所有（嵌在线程对象里），信号量核心只通过
//! `Scheduler::block_record` 借用它，等待队列里只保存 `ThreadId`。

use spin::Mutex;

use crate::error::Result;
use crate::sync::sem::{AcquireFlags, SemId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TeamId(pub u32);

impl TeamId {
    /// 内核自身的 team
    pub const KERNEL: TeamId = TeamId(1);
}

/// 等待期间挂起的信号类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// 普通信号，只打断 `CAN_INTERRUPT` 的等待
    Ordinary,
    /// kill 类信号，同时打断 `KILL_CAN_INTERRUPT` 的等待
    Kill,
}

#[derive(Debug, Clone, Copy)]
struct WaitState {
    blocking: Option<SemId>,
    flags: AcquireFlags,
    ticket: u64,
    status: Result<()>,
}

/// 线程在某个信号量上阻塞时的记录
///
/// 除了 `status()` 之外的写操作都在对应槽位锁内进行，内部这把锁是叶子锁。
pub struct BlockRecord {
    state: Mutex<WaitState>,
}

impl BlockRecord {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(WaitState {
                blocking: None,
                flags: AcquireFlags::empty(),
                ticket: 0,
                status: Ok(()),
            }),
        }
    }

    /// 开始一次新的等待，返回本次等待的票号
    pub(crate) fn begin_wait(&self, sem: SemId, flags: AcquireFlags) -> u64 {
        let mut state = self.state.lock();
        state.ticket = state.ticket.wrapping_add(1);
        state.blocking = Some(sem);
        state.flags = flags;
        state.status = Ok(());
        state.ticket
    }

    /// 写入唤醒原因，结束等待
    pub(crate) fn finish_wait(&self, status: Result<()>) {
        let mut state = self.state.lock();
        state.blocking = None;
        state.status = status;
    }

    /// 当前阻塞在哪个信号量上
    pub fn blocking(&self) -> Option<SemId> {
        self.state.lock().blocking
    }

    pub fn is_waiting(&self) -> bool {
        self.state.lock().blocking.is_some()
    }

    pub(crate) fn waiting_on(&self) -> Option<(SemId, AcquireFlags)> {
        let state = self.state.lock();
        state.blocking.map(|sem| (sem, state.flags))
    }

    pub(crate) fn is_waiting_for(&self, sem: SemId, ticket: u64) -> bool {
        let state = self.state.lock();
        state.blocking == Some(sem) && state.ticket == ticket
    }

    /// 最近一次等待的结果
    pub fn status(&self) -> Result<()> {
        self.state.lock().status
    }
}

impl Default for BlockRecord {
    fn default() -> Self {
        Self::new()
    }
}
