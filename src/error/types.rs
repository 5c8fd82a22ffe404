/// 信号量操作的错误码
///
/// 所有错误都同步返回给调用者。等待者在被 delete / 超时 / 中断唤醒时，
/// 对应的错误写入它自己的 `BlockRecord`，由等待线程在返回时取出。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemError {
    // 句柄相关
    BadHandle,
    BadValue,

    // 资源相关
    OutOfHandles,
    NoMemory,

    // 权限
    NotAllowed,

    // 等待结果
    WouldBlock,
    TimedOut,
    Interrupted,
}

// 与系统调用层约定的负数状态码
const STATUS_BAD_HANDLE: i32 = -2147483639;
const STATUS_BAD_VALUE: i32 = -2147483643;
const STATUS_OUT_OF_HANDLES: i32 = -2147481600;
const STATUS_NO_MEMORY: i32 = -2147483646;
const STATUS_NOT_ALLOWED: i32 = -2147483633;
const STATUS_WOULD_BLOCK: i32 = -2147483637;
const STATUS_TIMED_OUT: i32 = -2147483638;
const STATUS_INTERRUPTED: i32 = -2147483644;

impl SemError {
    /// 转换为系统调用层使用的负数状态码
    pub fn as_status(self) -> i32 {
        match self {
            SemError::BadHandle => STATUS_BAD_HANDLE,
            SemError::BadValue => STATUS_BAD_VALUE,
            SemError::OutOfHandles => STATUS_OUT_OF_HANDLES,
            SemError::NoMemory => STATUS_NO_MEMORY,
            SemError::NotAllowed => STATUS_NOT_ALLOWED,
            SemError::WouldBlock => STATUS_WOULD_BLOCK,
            SemError::TimedOut => STATUS_TIMED_OUT,
            SemError::Interrupted => STATUS_INTERRUPTED,
        }
    }

    /// 从状态码还原错误，非错误码返回 `None`
    pub fn from_status(status: i32) -> Option<Self> {
        match status {
            STATUS_BAD_HANDLE => Some(SemError::BadHandle),
            STATUS_BAD_VALUE => Some(SemError::BadValue),
            STATUS_OUT_OF_HANDLES => Some(SemError::OutOfHandles),
            STATUS_NO_MEMORY => Some(SemError::NoMemory),
            STATUS_NOT_ALLOWED => Some(SemError::NotAllowed),
            STATUS_WOULD_BLOCK => Some(SemError::WouldBlock),
            STATUS_TIMED_OUT => Some(SemError::TimedOut),
            STATUS_INTERRUPTED => Some(SemError::Interrupted),
            _ => None,
        }
    }
}

impl core::fmt::Display for SemError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SemError::BadHandle => write!(f, "Bad semaphore handle"),
            SemError::BadValue => write!(f, "Bad argument value"),
            SemError::OutOfHandles => write!(f, "No more semaphores"),
            SemError::NoMemory => write!(f, "Out of memory"),
            SemError::NotAllowed => write!(f, "Operation not allowed"),
            SemError::WouldBlock => write!(f, "Operation would block"),
            SemError::TimedOut => write!(f, "Operation timed out"),
            SemError::Interrupted => write!(f, "Interrupted"),
        }
    }
}

pub type Result<T> = core::result::Result<T, SemError>;

/// 把结果折叠成系统调用返回值：成功为 0，失败为负数状态码
pub fn to_status(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => err.as_status(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SemError; 8] = [
        SemError::BadHandle,
        SemError::BadValue,
        SemError::OutOfHandles,
        SemError::NoMemory,
        SemError::NotAllowed,
        SemError::WouldBlock,
        SemError::TimedOut,
        SemError::Interrupted,
    ];

    #[test]
    fn test_status_codes_are_negative_and_distinct() {
        for (i, a) in ALL.iter().enumerate() {
            assert!(a.as_status() < 0);
            for b in &ALL[i + 1..] {
                assert_ne!(a.as_status(), b.as_status());
            }
        }
    }

    #[test]
    fn test_from_status() {
        assert_eq!(SemError::from_status(STATUS_TIMED_OUT), Some(SemError::TimedOut));
        assert_eq!(SemError::from_status(0), None);
        assert_eq!(SemError::from_status(42), None);
    }

    #[test]
    fn test_to_status() {
        assert_eq!(to_status(Ok(())), 0);
        assert_eq!(to_status(Err(SemError::WouldBlock)), STATUS_WOULD_BLOCK);
    }
}
