mod terminal;
mod rtc;

pub use terminal::{
    Terminal,
    ConsoleOps,
    CONSOLE_OPS,
};

pub use rtc::{
    Rtc,
    RtcOps,
    RTC_OPS,
};

/// Character display collaborator.
pub trait ConsoleOutput: Send + Sync {
    fn put_bytes(&self, bytes: &[u8]);
}
