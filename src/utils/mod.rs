#[macro_use]
pub mod marcos;

#[macro_use]
mod fmt_io;

#[cfg(all(not(test), target_os = "none"))]
mod panic_handler;
mod lock;
mod error;
mod kprint;

pub use lock::{
    SpinMutex,
    MutexGuard,
    Mutex,
};

pub use fmt_io::{
    print_no_lock,
    log,
    LogLevel,
};

pub use error::{
    ErrorNum,
    ErrorClass,
};

pub use kprint::K_PRINT_HANDLER;
