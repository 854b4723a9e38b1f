use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::config::{RTC_DEFAULT_FREQ, RTC_MAX_FREQ};
use crate::fs::{Dentry, DriverEnv, FileKind, FileOperations};
use crate::process::{FdTable, FileDescriptor};
use crate::utils::ErrorNum;
use crate::debug;

/// Register A rate values run from 15 (2 Hz) down to 6 (1024 Hz).
const RATE_BASE: u32 = 16;
/// Slowest rate a program may ask for, as a power of two.
const MIN_WRITE_LOG2: u32 = 2;

/// Periodic tick device. The interrupt handler calls [`Rtc::tick`]; the
/// programmed rate is published for the collaborator that owns the port.
pub struct Rtc {
    interrupt   : AtomicBool,
    frequency   : AtomicU32,
    rate        : AtomicU8,
}

impl Rtc {
    pub fn new() -> Self {
        Self {
            interrupt: AtomicBool::new(false),
            frequency: AtomicU32::new(RTC_DEFAULT_FREQ),
            rate: AtomicU8::new((RATE_BASE - RTC_DEFAULT_FREQ.trailing_zeros()) as u8),
        }
    }

    pub fn tick(&self) {
        self.interrupt.store(true, Ordering::Release);
    }

    /// Spins until the next tick and consumes it.
    pub fn wait_tick(&self) {
        while !self.interrupt.swap(false, Ordering::AcqRel) {
            spin_loop();
        }
    }

    pub fn frequency(&self) -> u32 {
        self.frequency.load(Ordering::Acquire)
    }

    /// Value for the low four bits of register A.
    pub fn rate(&self) -> u8 {
        self.rate.load(Ordering::Acquire)
    }

    fn program(&self, frequency: u32) {
        let rate = (RATE_BASE - frequency.trailing_zeros()) as u8;
        self.frequency.store(frequency, Ordering::Release);
        self.rate.store(rate, Ordering::Release);
        debug!("rtc set to {} Hz (rate {})", frequency, rate);
    }

    pub fn set_frequency(&self, frequency: u32) -> Result<(), ErrorNum> {
        if !frequency.is_power_of_two()
            || frequency.trailing_zeros() < MIN_WRITE_LOG2
            || frequency > RTC_MAX_FREQ {
            return Err(ErrorNum::EINVAL);
        }
        self.program(frequency);
        Ok(())
    }

    fn reset(&self) {
        self.program(RTC_DEFAULT_FREQ);
        self.interrupt.store(false, Ordering::Release);
    }
}

impl Default for Rtc {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RtcOps;

pub static RTC_OPS: RtcOps = RtcOps;

fn expect_rtc(desc: &FileDescriptor) -> Result<(), ErrorNum> {
    match desc.kind() {
        Some(FileKind::Device) => Ok(()),
        Some(_) => Err(ErrorNum::EBADTYPE),
        None => Err(ErrorNum::EBADF),
    }
}

impl FileOperations for RtcOps {
    fn name(&self) -> &'static str {
        "rtc"
    }

    fn open(&self, env: &DriverEnv, fds: &mut FdTable, dentry: &Dentry) -> Result<usize, ErrorNum> {
        if dentry.kind != FileKind::Device {
            return Err(ErrorNum::EBADTYPE);
        }
        let fd = fds.free_slot()?;
        fds.install(fd, FileDescriptor::new(&RTC_OPS, FileKind::Device, 0))?;
        env.rtc.reset();
        Ok(fd)
    }

    fn close(&self, _env: &DriverEnv, _fd: usize, desc: &mut FileDescriptor) -> Result<(), ErrorNum> {
        expect_rtc(desc)?;
        desc.clear();
        Ok(())
    }

    fn read(&self, env: &DriverEnv, _fd: usize, desc: &mut FileDescriptor, _buf: &mut [u8]) -> Result<usize, ErrorNum> {
        expect_rtc(desc)?;
        env.rtc.wait_tick();
        Ok(0)
    }

    /// Takes the new frequency as a little-endian 32-bit integer.
    fn write(&self, env: &DriverEnv, _fd: usize, desc: &mut FileDescriptor, buf: &[u8]) -> Result<usize, ErrorNum> {
        expect_rtc(desc)?;
        let bytes: [u8; 4] = buf.get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or(ErrorNum::EINVAL)?;
        env.rtc.set_frequency(u32::from_le_bytes(bytes))?;
        Ok(0)
    }
}
