//! 信号量句柄
//!
//! 句柄 = 槽位下标 + 代数。槽位每被回收一次代数加一，旧句柄与新句柄在
//! 同一槽位上永远比较不相等，陈旧句柄因此可以被检测出来。

use crate::error::{Result, SemError};

/// 原始整数句柄的取值空间：非负 i32
const RAW_SPAN: u64 = 1 << 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SemId {
    index: u32,
    generation: u32,
}

impl SemId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// 编码为对外的整数句柄：`generation * capacity + index`
    pub fn to_raw(&self, capacity: usize) -> i32 {
        let raw = self.generation as u64 * capacity as u64 + self.index as u64;
        (raw % RAW_SPAN) as i32
    }

    /// 从整数句柄解码，负数直接视为无效句柄
    pub fn from_raw(raw: i32, capacity: usize) -> Result<Self> {
        if raw < 0 || capacity == 0 {
            return Err(SemError::BadHandle);
        }
        let raw = raw as usize;
        Ok(Self {
            index: (raw % capacity) as u32,
            generation: (raw / capacity) as u32,
        })
    }
}

/// 给定容量下代数的回绕周期
pub(crate) fn generation_span(capacity: usize) -> u32 {
    (RAW_SPAN / capacity as u64).min(u32::MAX as u64) as u32
}

impl core::fmt::Display for SemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}#{}", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_encoding() {
        let id = SemId::new(5, 3);
        let raw = id.to_raw(16);
        assert_eq!(raw, 3 * 16 + 5);
        assert_eq!(SemId::from_raw(raw, 16).unwrap(), id);
    }

    #[test]
    fn test_negative_raw_is_bad_handle() {
        assert_eq!(SemId::from_raw(-1, 16), Err(SemError::BadHandle));
    }

    #[test]
    fn test_generation_span_keeps_raw_non_negative() {
        let capacity = 4096;
        let span = generation_span(capacity);
        let last = SemId::new(capacity as u32 - 1, span - 1);
        assert_eq!(last.to_raw(capacity), i32::MAX);
        assert!(last.to_raw(capacity) >= 0);
    }

    #[test]
    fn test_same_index_different_generation_differs() {
        assert_ne!(SemId::new(0, 0), SemId::new(0, 1));
        assert_ne!(SemId::new(0, 0).to_raw(8), SemId::new(0, 1).to_raw(8));
    }
}
