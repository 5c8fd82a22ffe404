//! # 内核计数信号量
//!
//! 固定容量的信号量表 + 空闲链表分配器 + 每个信号量的 FIFO 等待队列。
//! 上层的锁、条件变量、生产者/消费者队列都建立在它之上。
//!
//! ## 设计思路
//!
//! - 两级锁：一把表级锁保护空闲链表和使用计数；每个槽位一把锁保护
//!   计数、名称、所有者和等待队列。两级都是关中断的 `IrqLock`。
//! - 锁顺序：槽位锁 → 修改队列 → 释放槽位锁 → 调用调度器。唤醒的线程先
//!   收集到一个旁路列表里，放锁之后才交给调度器。
//! - 计数可以为负：负值的绝对值等于所有等待者尚未满足的欠账之和。
//! - 句柄带代数，删除后旧句柄永远不会与同一槽位上的新信号量混淆。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use neon_ksem::config::TableConfig;
//! use neon_ksem::kernel::TeamId;
//! use neon_ksem::sync::sem::{Owner, SemTable};
//!
//! let table = SemTable::new(TableConfig::default(), scheduler, timer)?;
//! let sem = table.create(0, Some("rx ready"), Owner::Team(TeamId(7)))?;
//!
//! // 中断处理程序里
//! table.release(sem)?;
//!
//! // 工作线程里
//! table.acquire(sem)?;
//! ```

mod flags;
mod free_list;
mod id;
mod info;
mod protocol;
mod wait_queue;

pub use flags::{AcquireFlags, ReleaseFlags};
pub use id::SemId;
pub use info::{SemInfo, SemInfos};

use log::{debug, warn};

use crate::compat::{Box, String, Vec};
use crate::config::{TableConfig, DEFAULT_NAME, NAME_LENGTH};
use crate::error::{Result, SemError};
use crate::hal::irq::IrqLock;
use crate::kernel::scheduler::Scheduler;
use crate::kernel::thread::{TeamId, ThreadId};
use crate::kernel::timer::Timer;

use free_list::FreeList;
use wait_queue::WaitQueue;

/// 被唤醒线程的旁路列表，放开槽位锁后再交给调度器
pub(crate) type WakeList = Vec<ThreadId>;

/// 信号量的所有者
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    /// 归某个 team，team 退出时被批量删除
    Team(TeamId),
    /// 归上层对象（消息端口）所有，不随 team 清理
    Port,
}

impl Owner {
    pub fn team(&self) -> Option<TeamId> {
        match self {
            Owner::Team(team) => Some(*team),
            Owner::Port => None,
        }
    }

    pub fn is_kernel(&self) -> bool {
        *self == Owner::Team(TeamId::KERNEL)
    }
}

/// 使用中的槽位
pub(crate) struct Semaphore {
    id: SemId,
    count: i32,
    name: String,
    owner: Owner,
    queue: WaitQueue,
}

type Slot = Option<Semaphore>;

/// 信号量表
///
/// 所有操作都通过 `&SemTable` 进行，没有全局单例；调度器和定时器
/// 作为协作者在构造时注入。
pub struct SemTable<S: Scheduler, T: Timer> {
    slots: Box<[IrqLock<Slot>]>,
    free_list: IrqLock<FreeList>,
    scheduler: S,
    timer: T,
}

/// 复制并截断名称，保证落在字符边界上
fn copy_name(name: &str) -> Result<String> {
    let mut end = name.len().min(NAME_LENGTH - 1);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    let mut copy = String::new();
    copy.try_reserve_exact(end).map_err(|_| SemError::NoMemory)?;
    copy.push_str(&name[..end]);
    Ok(copy)
}

impl<S: Scheduler, T: Timer> SemTable<S, T> {
    /// 按配置分配信号量表，所有槽位初始都在空闲链表上
    pub fn new(config: TableConfig, scheduler: S, timer: T) -> Result<Self> {
        let capacity = config.capacity();
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| SemError::NoMemory)?;
        slots.extend((0..capacity).map(|_| IrqLock::new(None)));

        debug!("semaphore table: {} slots", capacity);
        Ok(Self {
            slots: slots.into_boxed_slice(),
            free_list: IrqLock::new(FreeList::new(capacity)?),
            scheduler,
            timer,
        })
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 可同时存在的信号量上限
    pub fn max_sems(&self) -> usize {
        self.free_list.lock(|list| list.capacity())
    }

    /// 当前使用中的信号量数
    pub fn used_sems(&self) -> usize {
        self.free_list.lock(|list| list.used())
    }

    /// 把系统调用传入的整数句柄解码成 `SemId`
    pub fn id_from_raw(&self, raw: i32) -> Result<SemId> {
        SemId::from_raw(raw, self.capacity())
    }

    pub fn raw_id(&self, id: SemId) -> i32 {
        id.to_raw(self.capacity())
    }

    fn slot(&self, id: SemId) -> Result<&IrqLock<Slot>> {
        self.slots.get(id.index()).ok_or(SemError::BadHandle)
    }

    /// 校验句柄后在槽位锁内访问信号量
    pub(crate) fn with_sem<R>(&self, id: SemId, f: impl FnOnce(&mut Semaphore) -> R) -> Result<R> {
        self.slot(id)?.lock(|slot| match slot {
            Some(sem) if sem.id == id => Ok(f(sem)),
            _ => Err(SemError::BadHandle),
        })
    }

    // ========================================================================
    // 创建与删除
    // ========================================================================

    /// 创建信号量
    ///
    /// # 参数
    /// - `count`: 初始计数，可以为负（表示预先欠账）
    /// - `name`: 诊断用名称，超过 `NAME_LENGTH - 1` 字节会被截断
    /// - `owner`: 所有者
    ///
    /// # 返回值
    /// - `Ok(SemId)`: 新句柄
    /// - `Err(SemError::NoMemory)`: 名称复制失败
    /// - `Err(SemError::OutOfHandles)`: 表已满
    pub fn create(&self, count: i32, name: Option<&str>, owner: Owner) -> Result<SemId> {
        let name = copy_name(name.unwrap_or(DEFAULT_NAME))?;

        let id = self
            .free_list
            .lock(|list| list.pop())
            .ok_or(SemError::OutOfHandles)?;

        debug!("create_sem: {} \"{}\" count {} owner {:?}", id, name, count, owner);
        self.slots[id.index()].lock(|slot| {
            *slot = Some(Semaphore {
                id,
                count,
                name,
                owner,
                queue: WaitQueue::new(),
            });
        });
        Ok(id)
    }

    /// 删除信号量
    ///
    /// 所有等待者以 `BadHandle` 被唤醒；槽位带着新的代数回到空闲链表尾部。
    pub fn delete(&self, id: SemId) -> Result<()> {
        self.delete_internal(id, false)
    }

    /// 来自用户态的删除：不允许删除内核所有的信号量
    pub fn delete_checked(&self, id: SemId) -> Result<()> {
        self.delete_internal(id, true)
    }

    fn delete_internal(&self, id: SemId, check_permission: bool) -> Result<()> {
        let (sem, woken) = self.slot(id)?.lock(|slot| {
            let sem = match slot.take() {
                Some(sem) if sem.id == id => sem,
                other => {
                    *slot = other;
                    return Err(SemError::BadHandle);
                }
            };
            if check_permission && sem.owner.is_kernel() {
                *slot = Some(sem);
                return Err(SemError::NotAllowed);
            }

            let mut sem = sem;
            let mut woken = WakeList::new();
            for waiter in sem.queue.drain() {
                self.finish_wait(waiter.thread, Err(SemError::BadHandle));
                woken.push(waiter.thread);
            }
            Ok((sem, woken))
        })?;

        self.free_list.lock(|list| list.push(id));
        debug!("delete_sem: {} \"{}\", woke {} waiters", id, sem.name, woken.len());
        // 名称在锁外释放
        drop(sem);

        self.wake_threads(&woken, false, true);
        Ok(())
    }

    /// 删除某个 team 拥有的全部信号量，返回删除的个数
    ///
    /// team 退出时调用。扫描时每个槽位只短暂持锁，真正的删除在锁外进行。
    pub fn delete_owned(&self, team: TeamId) -> usize {
        let owner = Owner::Team(team);
        let mut deleted = 0;
        for slot in self.slots.iter() {
            let id = slot.lock(|slot| {
                slot.as_ref()
                    .filter(|sem| sem.owner == owner)
                    .map(|sem| sem.id)
            });
            if let Some(id) = id {
                match self.delete(id) {
                    Ok(()) => deleted += 1,
                    Err(err) => warn!("delete_owned: {} of team {:?}: {}", id, team, err),
                }
            }
        }
        deleted
    }

    // ========================================================================
    // 查询
    // ========================================================================

    /// 当前计数（负数表示有等待者）
    pub fn get_count(&self, id: SemId) -> Result<i32> {
        self.with_sem(id, |sem| sem.count)
    }

    pub fn get_info(&self, id: SemId) -> Result<SemInfo> {
        self.with_sem(id, |sem| SemInfo::from_sem(sem))
    }

    /// 按槽位顺序遍历某个 team 的信号量
    ///
    /// `cookie` 从 0 开始，每次调用后指向下一个待检查的槽位；
    /// 遍历结束返回 `BadValue`。
    pub fn next_info(&self, team: TeamId, cookie: &mut usize) -> Result<SemInfo> {
        let owner = Owner::Team(team);
        while *cookie < self.slots.len() {
            let index = *cookie;
            *cookie += 1;
            let info = self.slots[index].lock(|slot| {
                slot.as_ref()
                    .filter(|sem| sem.owner == owner)
                    .map(SemInfo::from_sem)
            });
            if let Some(info) = info {
                return Ok(info);
            }
        }
        Err(SemError::BadValue)
    }

    /// 转移所有权
    pub fn set_owner(&self, id: SemId, owner: Owner) -> Result<()> {
        self.with_sem(id, |sem| sem.owner = owner)
    }

    /// 只读诊断遍历，每个槽位单独短暂持锁
    pub fn infos(&self) -> SemInfos<'_, S, T> {
        SemInfos::new(self)
    }

    pub(crate) fn info_at(&self, index: usize) -> Option<Option<SemInfo>> {
        let slot = self.slots.get(index)?;
        Some(slot.lock(|slot| slot.as_ref().map(SemInfo::from_sem)))
    }

    // ========================================================================
    // 与调度器交互的公共步骤
    // ========================================================================

    /// 写入等待结果（在槽位锁内调用）
    pub(crate) fn finish_wait(&self, thread: ThreadId, status: Result<()>) {
        if let Some(record) = self.scheduler.block_record(thread) {
            record.finish_wait(status);
        }
    }

    /// 把旁路列表交给调度器（必须在槽位锁外调用）
    pub(crate) fn wake_threads(&self, woken: &[ThreadId], boost: bool, reschedule: bool) {
        for &thread in woken {
            self.scheduler.enqueue_ready(thread, boost);
        }
        if reschedule && !woken.is_empty() {
            self.scheduler.reschedule_now();
        }
    }
}
