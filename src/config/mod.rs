//! 信号量表的容量与命名配置

use crate::error::{Result, SemError};

// 信号量表最小/最大槽位数
pub const MIN_SEMS: usize = 4096;
pub const MAX_SEMS: usize = 131072;
// 名称缓冲区长度（含结尾 NUL，实际最多保存 NAME_LENGTH - 1 字节）
pub const NAME_LENGTH: usize = 32;
pub const DEFAULT_NAME: &str = "unnamed semaphore";

/// 信号量表配置
///
/// 容量必须是 2 的幂，这样句柄里的代数（generation）可以在
/// `2^31 / capacity` 范围内干净地回绕。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableConfig {
    capacity: usize,
}

impl TableConfig {
    /// 按可用物理页数确定容量
    ///
    /// 从 `MIN_SEMS` 开始翻倍，直到达到页数的一半或 `MAX_SEMS`：
    /// 128MB 内存约 16384 个槽位，1GB 以上封顶 131072。
    pub fn for_available_pages(pages: usize) -> Self {
        let target = pages / 2;
        let mut capacity = MIN_SEMS;
        while capacity < target && capacity < MAX_SEMS {
            capacity <<= 1;
        }
        Self { capacity }
    }

    /// 指定容量（主要用于测试中的小表）
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 || !capacity.is_power_of_two() || capacity > MAX_SEMS {
            return Err(SemError::BadValue);
        }
        Ok(Self { capacity })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self { capacity: MIN_SEMS }
    }
}
