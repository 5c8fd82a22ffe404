//! 内核日志后端，为 `log` 门面提供输出
//! - 内核构建：通过 `set_console` 注册的串口/控制台函数输出
//! - 宿主机（host feature）：默认输出到 stderr
//!
//! 调用方统一使用 `log::{error, warn, info, debug, trace}` 宏。

use core::fmt::{self, Write};
use core::sync::atomic::{AtomicUsize, Ordering};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::RwLock;

/// 全局日志级别，默认为 Info
static GLOBAL_LOG_LEVEL: AtomicUsize = AtomicUsize::new(LevelFilter::Info as usize);

/// 控制台输出函数
static CONSOLE: RwLock<Option<fn(&str)>> = RwLock::new(None);

static LOGGER: KernelLogger = KernelLogger;

fn level_from_usize(value: usize) -> LevelFilter {
    match value {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// 设置全局日志级别
pub fn set_log_level(level: LevelFilter) {
    GLOBAL_LOG_LEVEL.store(level as usize, Ordering::Relaxed);
    log::set_max_level(level);
}

/// 获取全局日志级别
pub fn get_log_level() -> LevelFilter {
    level_from_usize(GLOBAL_LOG_LEVEL.load(Ordering::Relaxed))
}

/// 注册控制台输出函数
pub fn set_console(sink: fn(&str)) {
    *CONSOLE.write() = Some(sink);
}

#[inline(always)]
pub fn log_write(s: &str) -> fmt::Result {
    let sink = *CONSOLE.read();
    match sink {
        Some(sink) => sink(s),
        None => default_write(s),
    }
    Ok(())
}

#[cfg(feature = "host")]
fn default_write(s: &str) {
    std::eprint!("{}", s);
}

#[cfg(not(feature = "host"))]
fn default_write(_s: &str) {
    // 未注册控制台时丢弃
}

/// 日志写入器
pub struct LogWriter;

impl Write for LogWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        log_write(s)
    }
}

/// `log` 门面的内核实现
pub struct KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= get_log_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut writer = LogWriter;
        let _ = writeln!(
            writer,
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// 初始化日志系统
///
/// 只能成功一次；重复调用返回 `SetLoggerError`，但级别仍会更新。
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    set_log_level(level);
    log::set_logger(&LOGGER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_log_level_setting() {
        set_log_level(LevelFilter::Debug);
        assert_eq!(get_log_level(), LevelFilter::Debug);

        set_log_level(LevelFilter::Error);
        assert_eq!(get_log_level(), LevelFilter::Error);

        set_log_level(LevelFilter::Info);
    }

    #[test]
    fn test_log_writer() {
        let mut writer = LogWriter;
        let result = writer.write_str("测试日志");
        assert!(result.is_ok());
    }

    #[test]
    #[serial]
    fn test_logger_filters_by_level() {
        set_log_level(LevelFilter::Warn);
        let warn = Metadata::builder().level(log::Level::Warn).build();
        let debug = Metadata::builder().level(log::Level::Debug).build();
        assert!(LOGGER.enabled(&warn));
        assert!(!LOGGER.enabled(&debug));
        set_log_level(LevelFilter::Info);
    }

    #[test]
    #[serial]
    fn test_log_macros() {
        // 宏输出难以直接验证，这里只保证不会崩溃
        let _ = init(LevelFilter::Trace);
        log::error!("这是一个错误");
        log::warn!("这是一个警告");
        log::info!("这是一条信息");
        log::debug!("这是一条调试信息");
        log::trace!("这是一条跟踪信息");
        set_log_level(LevelFilter::Info);
    }
}
