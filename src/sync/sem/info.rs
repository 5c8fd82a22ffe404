//! 诊断信息快照

use core::fmt;

use crate::compat::String;
use crate::kernel::scheduler::Scheduler;
use crate::kernel::thread::ThreadId;
use crate::kernel::timer::Timer;

use super::{Owner, SemId, SemTable, Semaphore};

/// 某一时刻单个信号量的只读快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemInfo {
    pub id: SemId,
    pub owner: Owner,
    pub name: String,
    pub count: i32,
    /// 队首等待者
    pub first_waiter: Option<ThreadId>,
    pub waiter_count: usize,
}

impl SemInfo {
    pub(crate) fn from_sem(sem: &Semaphore) -> Self {
        Self {
            id: sem.id,
            owner: sem.owner,
            name: sem.name.clone(),
            count: sem.count,
            first_waiter: sem.queue.first_thread(),
            waiter_count: sem.queue.len(),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Team(team) => write!(f, "team {}", team.0),
            Owner::Port => write!(f, "port"),
        }
    }
}

impl fmt::Display for SemInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>12} {:<31} {:>8} count {:>6}",
            self.id, self.name, self.owner, self.count
        )?;
        if let Some(first) = self.first_waiter {
            write!(f, " waiting {} (first {})", self.waiter_count, first.0)?;
        }
        Ok(())
    }
}

/// `SemTable::infos` 返回的遍历器，每次只短暂持有一个槽位锁
pub struct SemInfos<'a, S: Scheduler, T: Timer> {
    table: &'a SemTable<S, T>,
    index: usize,
}

impl<'a, S: Scheduler, T: Timer> SemInfos<'a, S, T> {
    pub(crate) fn new(table: &'a SemTable<S, T>) -> Self {
        Self { table, index: 0 }
    }
}

impl<S: Scheduler, T: Timer> Iterator for SemInfos<'_, S, T> {
    type Item = SemInfo;

    fn next(&mut self) -> Option<SemInfo> {
        loop {
            let info = self.table.info_at(self.index)?;
            self.index += 1;
            if info.is_some() {
                return info;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::Arc;
    use crate::config::TableConfig;
    use crate::hal::host::{HostScheduler, ManualTimer};
    use crate::kernel::thread::TeamId;

    #[test]
    fn test_display_line() {
        let table = SemTable::new(
            TableConfig::with_capacity(4).unwrap(),
            Arc::new(HostScheduler::new(2)),
            Arc::new(ManualTimer::new()),
        )
        .unwrap();
        let sem = table.create(-1, Some("disk io"), Owner::Team(TeamId(3))).unwrap();
        let line = format!("{}", table.get_info(sem).unwrap());
        assert!(line.contains("disk io"));
        assert!(line.contains("team 3"));
        assert!(line.contains("count     -1"));
        assert!(!line.contains("waiting"));
    }

    #[test]
    fn test_owner_display() {
        assert_eq!(format!("{}", Owner::Port), "port");
        assert_eq!(format!("{}", Owner::Team(TeamId(12))), "team 12");
    }
}
