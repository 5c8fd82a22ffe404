//! 阻塞协议：acquire / switch / release / 超时 / 打断
//!
//! 所有路径都遵循同一个模式：在槽位锁内修改计数和等待队列，把要唤醒的
//! 线程收集到旁路列表；放锁之后再交给调度器。
//!
//! 记账不变式：等待队列非空时，`count == -Σremaining`（初始计数为负的
//! 情况除外）。等待被放弃时，欠账和已经到手的部分都要还回去。

use log::{error, trace, warn};

use crate::error::{Result, SemError};
use crate::kernel::scheduler::{Scheduler, Suspend};
use crate::kernel::thread::{BlockRecord, SignalKind, ThreadId};
use crate::kernel::timer::{Ticks, TimeoutContext, Timer, TimerId, INFINITE_TIMEOUT};

use super::wait_queue::Waiter;
use super::{AcquireFlags, ReleaseFlags, SemId, SemTable, Semaphore, WakeList};

/// 槽位锁内 acquire 的结论
enum Admit {
    /// 快速路径，计数足够
    Acquired,
    /// 入队前就发现了挂起信号
    Interrupted,
    /// 已入队，需要挂起
    Blocked { timer: Option<TimerId> },
}

/// 定时器到期的处理结论
enum Expiry {
    Fired(WakeList),
    /// 线程已经因为别的原因醒来，或者已开始了新的等待
    Stale,
    /// 线程仍记录为阻塞在该句柄上，但槽位已经不是它
    Inconsistent,
}

fn would_block(flags: AcquireFlags, timeout: Ticks) -> bool {
    (flags.contains(AcquireFlags::RELATIVE_TIMEOUT) && timeout <= 0)
        || (flags.contains(AcquireFlags::ABSOLUTE_TIMEOUT) && timeout < 0)
}

impl<S: Scheduler, T: Timer> SemTable<S, T> {
    // ========================================================================
    // Acquire / Switch
    // ========================================================================

    /// 获取一个单位，不限时、不可打断
    pub fn acquire(&self, id: SemId) -> Result<()> {
        self.acquire_etc(id, 1, AcquireFlags::empty(), 0)
    }

    /// 获取 `count` 个单位
    ///
    /// # 参数
    /// - `count`: 必须大于 0
    /// - `flags`: 超时模式、可打断性、权限检查
    /// - `timeout`: 仅在设置了 `RELATIVE_TIMEOUT` / `ABSOLUTE_TIMEOUT` 时有效，
    ///   `INFINITE_TIMEOUT` 表示不限时
    ///
    /// # 返回值
    /// 成功，或 `BadHandle` / `BadValue` / `WouldBlock` / `TimedOut` /
    /// `Interrupted` / `NotAllowed`
    pub fn acquire_etc(
        &self,
        id: SemId,
        count: i32,
        flags: AcquireFlags,
        timeout: Ticks,
    ) -> Result<()> {
        self.switch_sem_etc(None, id, count, flags, timeout)
    }

    /// 释放 `to_release` 的同时获取 `id` 的一个单位
    pub fn switch_sem(&self, to_release: SemId, id: SemId) -> Result<()> {
        self.switch_sem_etc(Some(to_release), id, 1, AcquireFlags::empty(), 0)
    }

    /// 交接棒：先在 `id` 上就位（入队），再释放 `to_release`
    ///
    /// 释放发生在入队之后，所以 `to_release` 的释放唤醒的任何线程再回头
    /// 释放 `id`，都不会丢失对本线程的唤醒。
    pub fn switch_sem_etc(
        &self,
        to_release: Option<SemId>,
        id: SemId,
        count: i32,
        flags: AcquireFlags,
        timeout: Ticks,
    ) -> Result<()> {
        if count <= 0 || flags.timeout_conflict() {
            return Err(SemError::BadValue);
        }

        let thread = self.scheduler.current_thread();
        let record = self
            .scheduler
            .block_record(thread)
            .ok_or(SemError::BadValue)?;

        let admitted =
            self.with_sem(id, |sem| self.admit(sem, thread, record, count, flags, timeout))??;

        if let Some(other) = to_release {
            if let Err(err) = self.release_etc(other, 1, ReleaseFlags::DO_NOT_RESCHEDULE) {
                warn!("switch_sem: releasing {} failed: {}", other, err);
            }
        }

        match admitted {
            Admit::Acquired => Ok(()),
            Admit::Interrupted => Err(SemError::Interrupted),
            Admit::Blocked { timer } => self.wait(thread, record, id, flags, timer),
        }
    }

    /// 槽位锁内：快速获取，或者记账后入队
    fn admit(
        &self,
        sem: &mut Semaphore,
        thread: ThreadId,
        record: &BlockRecord,
        count: i32,
        flags: AcquireFlags,
        timeout: Ticks,
    ) -> Result<Admit> {
        if flags.contains(AcquireFlags::CHECK_PERMISSION) && sem.owner.is_kernel() {
            return Err(SemError::NotAllowed);
        }

        if sem.count >= count {
            sem.count -= count;
            return Ok(Admit::Acquired);
        }

        if would_block(flags, timeout) {
            return Err(SemError::WouldBlock);
        }

        // 第一次信号检查，覆盖最常见的“已有信号挂起”
        if let Some(kind) = self.scheduler.signal_pending(thread) {
            if flags.interrupted_by(kind) {
                return Ok(Admit::Interrupted);
            }
        }

        let new_count = sem.count.checked_sub(count).ok_or(SemError::BadValue)?;
        sem.count = new_count;
        let remaining = (-(new_count as i64)).min(count as i64) as i32;
        sem.queue.push(Waiter {
            thread,
            remaining,
            requested: count,
        });

        let ticket = record.begin_wait(sem.id, flags);
        self.scheduler.prepare_to_wait(thread);

        let timer = self.deadline(flags, timeout).map(|deadline| {
            self.timer.arm_oneshot(
                deadline,
                TimeoutContext {
                    sem: sem.id,
                    thread,
                    ticket,
                },
            )
        });

        trace!(
            "{:?} blocks on {} for {} (owes {}), count now {}",
            thread, sem.id, count, remaining, sem.count
        );
        Ok(Admit::Blocked { timer })
    }

    fn deadline(&self, flags: AcquireFlags, timeout: Ticks) -> Option<Ticks> {
        if timeout == INFINITE_TIMEOUT {
            return None;
        }
        if flags.contains(AcquireFlags::RELATIVE_TIMEOUT) {
            Some(self.timer.now().saturating_add(timeout))
        } else if flags.contains(AcquireFlags::ABSOLUTE_TIMEOUT) {
            Some(timeout)
        } else {
            None
        }
    }

    /// 锁外：挂起直到某条路径写入结果并唤醒本线程
    fn wait(
        &self,
        thread: ThreadId,
        record: &BlockRecord,
        id: SemId,
        flags: AcquireFlags,
        timer: Option<TimerId>,
    ) -> Result<()> {
        loop {
            if let Suspend::SignalPending(kind) = self.scheduler.suspend_current(flags) {
                // 第二次信号检查：信号在入队之后、睡眠之前到达
                if let Err(err) = self.interrupt_thread(thread, kind) {
                    trace!("{:?}: late signal on {} not applied: {}", thread, id, err);
                }
            }
            if !record.is_waiting() {
                break;
            }
        }

        let status = record.status();
        if let Some(timer) = timer {
            if status != Err(SemError::TimedOut) {
                self.timer.cancel(timer);
            }
        }
        trace!("{:?} resumes from {}: {:?}", thread, id, status);
        status
    }

    // ========================================================================
    // Release
    // ========================================================================

    /// 释放一个单位并立即调度
    pub fn release(&self, id: SemId) -> Result<()> {
        self.release_etc(id, 1, ReleaseFlags::empty())
    }

    /// 释放 `count` 个单位
    ///
    /// 严格按 FIFO 满足等待者：前面的等待者被完全满足之前，后面的等待者
    /// 拿不到任何部分释放。被唤醒的线程以临时提升的优先级入队。
    pub fn release_etc(&self, id: SemId, count: i32, flags: ReleaseFlags) -> Result<()> {
        if count <= 0 && !flags.contains(ReleaseFlags::RELEASE_ALL) {
            return Err(SemError::BadValue);
        }

        let woken = self.with_sem(id, |sem| {
            if flags.contains(ReleaseFlags::CHECK_PERMISSION) && sem.owner.is_kernel() {
                return Err(SemError::NotAllowed);
            }

            let mut woken = WakeList::new();
            if flags.contains(ReleaseFlags::RELEASE_IF_WAITING_ONLY) && sem.count >= 0 {
                return Ok(woken);
            }

            let count = if flags.contains(ReleaseFlags::RELEASE_ALL) {
                sem.count.saturating_neg().max(0)
            } else {
                count
            };
            sem.count.checked_add(count).ok_or(SemError::BadValue)?;

            self.hand_out(sem, count, &mut woken);
            trace!("release {} by {}: count now {}, woke {}", sem.id, count, sem.count, woken.len());
            Ok(woken)
        })??;

        self.wake_threads(
            &woken,
            true,
            !flags.contains(ReleaseFlags::DO_NOT_RESCHEDULE),
        );
        Ok(())
    }

    /// 释放循环：按队列顺序把 `count` 分给队首等待者
    fn hand_out(&self, sem: &mut Semaphore, mut count: i32, woken: &mut WakeList) {
        while count > 0 {
            let mut delta = count;
            if sem.count < 0 {
                if let Some(waiter) = sem.queue.front_mut() {
                    delta = delta.min(waiter.remaining);
                    waiter.remaining -= delta;
                    if waiter.remaining == 0 {
                        let thread = waiter.thread;
                        sem.queue.pop_front();
                        self.finish_wait(thread, Ok(()));
                        woken.push(thread);
                    }
                }
            }
            sem.count += delta;
            count -= delta;
        }
    }

    /// 按身份移除一个等待者（超时 / 打断）
    ///
    /// 先还回欠账，再把它已经拿到的部分经释放循环交给后面的等待者。
    fn remove_waiter(
        &self,
        sem: &mut Semaphore,
        thread: ThreadId,
        status: Result<()>,
        woken: &mut WakeList,
    ) -> bool {
        let Some(waiter) = sem.queue.remove(thread) else {
            return false;
        };
        sem.count += waiter.remaining;
        self.finish_wait(thread, status);
        woken.push(thread);

        let covered = waiter.requested - waiter.remaining;
        if covered > 0 {
            self.hand_out(sem, covered, woken);
        }
        true
    }

    // ========================================================================
    // 超时与打断（中断上下文入口）
    // ========================================================================

    /// 定时器驱动在超时到期时调用
    ///
    /// 返回 `true` 表示有线程被唤醒，调用方应在退出中断时调度一次。
    /// 已经过期的通知（线程早已醒来或开始了新的等待）被忽略。
    ///
    /// # Panics
    /// 线程仍记录为阻塞在 `context.sem` 上、但槽位已不再持有该句柄时 panic：
    /// 这说明句柄复用或锁纪律被破坏。
    pub fn timeout_expired(&self, context: TimeoutContext) -> bool {
        let Some(record) = self.scheduler.block_record(context.thread) else {
            return false;
        };

        let outcome = match self.slots.get(context.sem.index()) {
            Some(slot) => slot.lock(|slot| {
                if !record.is_waiting_for(context.sem, context.ticket) {
                    return Expiry::Stale;
                }
                let sem = match slot {
                    Some(sem) if sem.id == context.sem => sem,
                    _ => return Expiry::Inconsistent,
                };
                let mut woken = WakeList::new();
                if self.remove_waiter(sem, context.thread, Err(SemError::TimedOut), &mut woken) {
                    Expiry::Fired(woken)
                } else {
                    Expiry::Inconsistent
                }
            }),
            None => Expiry::Inconsistent,
        };

        match outcome {
            Expiry::Fired(woken) => {
                trace!("{:?} timed out on {}", context.thread, context.sem);
                self.wake_threads(&woken, false, false);
                true
            }
            Expiry::Stale => {
                trace!("stale timeout for {:?} on {}", context.thread, context.sem);
                false
            }
            Expiry::Inconsistent => {
                error!(
                    "timeout for {:?}: slot of {} no longer holds its waiter",
                    context.thread, context.sem
                );
                panic!(
                    "semaphore timeout: {:?} blocked on stale handle {}",
                    context.thread, context.sem
                );
            }
        }
    }

    /// 信号子系统强制唤醒一个阻塞中的线程
    ///
    /// # 返回值
    /// - `Ok(())`: 线程已以 `Interrupted` 出队
    /// - `Err(SemError::NotAllowed)`: 等待不允许被该类信号打断
    /// - `Err(SemError::BadValue)`: 线程不在任何信号量上等待
    pub fn interrupt_thread(&self, thread: ThreadId, kind: SignalKind) -> Result<()> {
        let record = self
            .scheduler
            .block_record(thread)
            .ok_or(SemError::BadValue)?;
        let (id, flags) = record.waiting_on().ok_or(SemError::BadValue)?;
        if !flags.interrupted_by(kind) {
            return Err(SemError::NotAllowed);
        }

        let removed = self.with_sem(id, |sem| {
            // 放锁期间线程可能已被唤醒并开始了新的等待
            match record.waiting_on() {
                Some((current, flags)) if current == id && flags.interrupted_by(kind) => {}
                _ => return Err(SemError::BadValue),
            }
            let mut woken = WakeList::new();
            if self.remove_waiter(sem, thread, Err(SemError::Interrupted), &mut woken) {
                Ok(woken)
            } else {
                Err(SemError::BadValue)
            }
        });
        let woken = match removed {
            Ok(result) => result?,
            Err(_) => return Err(SemError::BadValue),
        };

        trace!("{:?} interrupted on {} by {:?}", thread, id, kind);
        self.wake_threads(&woken, false, false);
        Ok(())
    }
}
