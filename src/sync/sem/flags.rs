use bitflags::bitflags;

use crate::kernel::thread::SignalKind;

bitflags! {
    /// acquire / switch 的行为标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AcquireFlags: u32 {
        /// 普通信号可以打断等待
        const CAN_INTERRUPT = 1 << 0;
        /// 调用者来自用户态，不能碰内核所有的信号量
        const CHECK_PERMISSION = 1 << 2;
        /// 超时参数是相对时间（µs）
        const RELATIVE_TIMEOUT = 1 << 3;
        /// 超时参数是绝对时间（µs）
        const ABSOLUTE_TIMEOUT = 1 << 4;
        /// 只有 kill 类信号可以打断等待
        const KILL_CAN_INTERRUPT = 1 << 5;
    }
}

bitflags! {
    /// release 的行为标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ReleaseFlags: u32 {
        const DO_NOT_RESCHEDULE = 1 << 1;
        const CHECK_PERMISSION = 1 << 2;
        /// 释放当前所有欠账（计数为负时的绝对值）
        const RELEASE_ALL = 1 << 6;
        /// 没有等待者时什么都不做
        const RELEASE_IF_WAITING_ONLY = 1 << 7;
    }
}

impl AcquireFlags {
    /// 给定信号能否打断以这些标志进入的等待
    pub fn interrupted_by(self, kind: SignalKind) -> bool {
        match kind {
            SignalKind::Ordinary => self.contains(AcquireFlags::CAN_INTERRUPT),
            SignalKind::Kill => self
                .intersects(AcquireFlags::CAN_INTERRUPT | AcquireFlags::KILL_CAN_INTERRUPT),
        }
    }

    pub fn is_interruptible(self) -> bool {
        self.intersects(AcquireFlags::CAN_INTERRUPT | AcquireFlags::KILL_CAN_INTERRUPT)
    }

    pub(crate) fn timeout_conflict(self) -> bool {
        self.contains(AcquireFlags::RELATIVE_TIMEOUT | AcquireFlags::ABSOLUTE_TIMEOUT)
    }
}
