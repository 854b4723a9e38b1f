use core::fmt::{self, Write};

use lazy_static::*;

use super::{K_PRINT_HANDLER, SpinMutex, Mutex};
use crate::print_no_lock;

lazy_static!{
    /// dummy data member
    static ref PRINT_LOCK: SpinMutex<bool> = SpinMutex::new("KPuts", false);
}

pub fn k_puts(s: &str) {
    K_PRINT_HANDLER.acquire().k_puts(s);
}

struct OutputFormatter;

impl Write for OutputFormatter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        k_puts(s);
        Ok(())
    }
}

pub fn print_no_lock(args: fmt::Arguments) {
    // the sink never reports failure
    let _ = OutputFormatter.write_fmt(args);
}

#[derive(Debug, PartialEq, PartialOrd, Clone, Copy)]
pub enum LogLevel {
    Verbose = 0,
    Debug = 1,
    Info = 2,
    Warning = 3,
    Error = 4,
    Milestone = 5,
    Fatal = 6
}

impl LogLevel {
    pub fn to_num(&self) -> usize {
        *self as usize
    }

    pub fn enabled(&self) -> bool {
        match self {
            LogLevel::Verbose   => cfg!(feature = "log_verbose"),
            LogLevel::Debug     => cfg!(feature = "log_debug"),
            LogLevel::Info      => cfg!(feature = "log_info"),
            LogLevel::Warning   => cfg!(feature = "log_warning"),
            LogLevel::Error     => cfg!(feature = "log_error"),
            LogLevel::Milestone => cfg!(feature = "log_milestone"),
            LogLevel::Fatal     => cfg!(feature = "log_fatal"),
        }
    }
}

// VGA text mode has no escape sequences, so levels are told apart by title only.
static LOG_TITLE: &[&str] = &[
    "VERBOSE    ",
    "DEBUG      ",
    "INFO       ",
    "WARNING    ",
    "ERROR      ",
    "MILESTONE  ",
    "FATAL      ",
];

pub fn do_log(log_level: LogLevel, args: fmt::Arguments) {
    let _guard = PRINT_LOCK.acquire();
    print_no_lock!("[ {} ] ", LOG_TITLE[log_level.to_num()]);
    print_no_lock(args);
    print_no_lock!("\n");
}

pub fn log(log_level: LogLevel, args: fmt::Arguments) {
    if log_level.enabled() {
        do_log(log_level, args);
    }
}
