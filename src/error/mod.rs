mod types;

pub use types::{to_status, Result, SemError};
