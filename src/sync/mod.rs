pub mod sem;

// 重新导出常用类型
pub use sem::{AcquireFlags, Owner, ReleaseFlags, SemId, SemInfo, SemTable};
