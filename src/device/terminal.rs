use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, Ordering};

use alloc::sync::Arc;

use crate::arch::IntrGuard;
use crate::config::{LINE_BUFFER_LEN, STDIN_FD, STDOUT_FD};
use crate::fs::{Dentry, DriverEnv, FileKind, FileOperations};
use crate::process::{FdTable, FileDescriptor};
use crate::utils::{ErrorNum, Mutex, SpinMutex};

use super::ConsoleOutput;

struct LineBuffer {
    data    : [u8; LINE_BUFFER_LEN],
    len     : usize,
}

/// Line-buffered console. The keyboard handler feeds translated characters
/// through [`Terminal::receive`]; readers spin on the enter flag.
pub struct Terminal {
    line    : SpinMutex<LineBuffer>,
    enter   : AtomicBool,
    output  : SpinMutex<Option<Arc<dyn ConsoleOutput>>>,
}

impl Terminal {
    pub fn new() -> Self {
        Self {
            line: SpinMutex::new("terminal line", LineBuffer { data: [0; LINE_BUFFER_LEN], len: 0 }),
            enter: AtomicBool::new(false),
            output: SpinMutex::new("terminal output", None),
        }
    }

    pub fn set_output(&self, output: Arc<dyn ConsoleOutput>) {
        *self.output.acquire() = Some(output);
    }

    /// Keyboard side. Keeps the last slot free for the newline.
    pub fn receive(&self, byte: u8) {
        let mut line = self.line.acquire();
        if self.enter.load(Ordering::Acquire) {
            // previous line not consumed yet
            return;
        }
        if byte == b'\n' {
            let len = line.len;
            line.data[len] = b'\n';
            line.len += 1;
            self.enter.store(true, Ordering::Release);
        } else if line.len < LINE_BUFFER_LEN - 1 {
            let len = line.len;
            line.data[len] = byte;
            line.len += 1;
        }
    }

    pub fn line_ready(&self) -> bool {
        self.enter.load(Ordering::Acquire)
    }

    /// Hands out the finished line, newline included, and empties the buffer.
    fn take_line(&self, buf: &mut [u8]) -> usize {
        let mut line = self.line.acquire();
        let len = line.len.min(buf.len());
        buf[..len].copy_from_slice(&line.data[..len]);
        line.len = 0;
        self.enter.store(false, Ordering::Release);
        len
    }

    pub fn put_bytes(&self, bytes: &[u8]) {
        if let Some(output) = self.output.acquire().as_ref() {
            output.put_bytes(bytes);
        }
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ConsoleOps;

pub static CONSOLE_OPS: ConsoleOps = ConsoleOps;

impl FileOperations for ConsoleOps {
    fn name(&self) -> &'static str {
        "console"
    }

    /// Console descriptors are bound by execute, never opened by name.
    fn open(&self, _env: &DriverEnv, _fds: &mut FdTable, _dentry: &Dentry) -> Result<usize, ErrorNum> {
        Err(ErrorNum::EBADTYPE)
    }

    fn close(&self, _env: &DriverEnv, fd: usize, desc: &mut FileDescriptor) -> Result<(), ErrorNum> {
        if fd != STDIN_FD && fd != STDOUT_FD {
            return Err(ErrorNum::EBADF);
        }
        if !desc.in_use() {
            return Err(ErrorNum::EBADF);
        }
        desc.clear();
        Ok(())
    }

    fn read(&self, env: &DriverEnv, fd: usize, desc: &mut FileDescriptor, buf: &mut [u8]) -> Result<usize, ErrorNum> {
        if fd != STDIN_FD || desc.kind() != Some(FileKind::Console) {
            return Err(ErrorNum::EPERM);
        }
        while !env.terminal.line_ready() {
            spin_loop();
        }
        let _guard = IntrGuard::new(env.machine);
        Ok(env.terminal.take_line(buf))
    }

    fn write(&self, env: &DriverEnv, fd: usize, desc: &mut FileDescriptor, buf: &[u8]) -> Result<usize, ErrorNum> {
        if fd != STDOUT_FD || desc.kind() != Some(FileKind::Console) {
            return Err(ErrorNum::EPERM);
        }
        let _guard = IntrGuard::new(env.machine);
        env.terminal.put_bytes(buf);
        Ok(buf.len())
    }
}
