//! 单个信号量的等待队列
//!
//! 队列只保存线程 ID 和这次请求的记账，不拥有线程对象；
//! 所有访问都在所属槽位锁内进行。

use crate::compat::VecDeque;
use crate::kernel::thread::ThreadId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Waiter {
    pub thread: ThreadId,
    /// 尚未满足的欠账，阻塞时取 `min(新欠账, 请求数)`
    pub remaining: i32,
    /// 本次 acquire 的完整请求数
    pub requested: i32,
}

#[derive(Debug, Default)]
pub(crate) struct WaitQueue {
    waiters: VecDeque<Waiter>,
}

impl WaitQueue {
    pub const fn new() -> Self {
        Self {
            waiters: VecDeque::new(),
        }
    }

    /// 入队到尾部 - FIFO
    pub fn push(&mut self, waiter: Waiter) {
        self.waiters.push_back(waiter);
    }

    /// 查看队首（不出队）
    pub fn front_mut(&mut self) -> Option<&mut Waiter> {
        self.waiters.front_mut()
    }

    pub fn pop_front(&mut self) -> Option<Waiter> {
        self.waiters.pop_front()
    }

    /// 按线程移除，不一定是队首 - O(n)
    pub fn remove(&mut self, thread: ThreadId) -> Option<Waiter> {
        let pos = self.waiters.iter().position(|w| w.thread == thread)?;
        self.waiters.remove(pos)
    }

    pub fn contains(&self, thread: ThreadId) -> bool {
        self.waiters.iter().any(|w| w.thread == thread)
    }

    pub fn first_thread(&self) -> Option<ThreadId> {
        self.waiters.front().map(|w| w.thread)
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// 所有等待者尚未满足的欠账之和
    pub fn outstanding(&self) -> i64 {
        self.waiters.iter().map(|w| w.remaining as i64).sum()
    }

    /// 清空队列，按入队顺序交出所有等待者
    pub fn drain(&mut self) -> impl Iterator<Item = Waiter> + '_ {
        self.waiters.drain(..)
    }
}
