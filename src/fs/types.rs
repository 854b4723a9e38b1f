use core::fmt::{self, Debug, Formatter};

use crate::arch::Machine;
use crate::config::FILENAME_LEN;
use crate::device::{Rtc, Terminal};
use crate::process::{FdTable, FileDescriptor};
use crate::utils::ErrorNum;

use super::FileSystem;

enum_with_tryfrom_u32!(
    /// Kind of an open file. The first three values are the ones stored on disk.
    #[repr(u32)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FileKind {
        Device = 0,
        Directory = 1,
        Regular = 2,
        Console = 3,
    }
);

/// A resolved directory entry, owned by the caller.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Dentry {
    pub name    : [u8; FILENAME_LEN],
    pub kind    : FileKind,
    /// Only meaningful for regular files.
    pub inode   : u32,
}

impl Dentry {
    pub fn name(&self) -> &[u8] {
        let len = self.name.iter().position(|b| *b == 0).unwrap_or(FILENAME_LEN);
        &self.name[..len]
    }
}

impl Debug for Dentry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dentry")
            .field("name", &core::str::from_utf8(self.name()).unwrap_or("<bin>"))
            .field("kind", &self.kind)
            .field("inode", &self.inode)
            .finish()
    }
}

/// Everything a driver may touch while serving one call.
pub struct DriverEnv<'a> {
    pub fs          : &'a FileSystem,
    pub terminal    : &'a Terminal,
    pub rtc         : &'a Rtc,
    pub machine     : &'a dyn Machine,
}

/// The uniform operation table every file and device driver provides.
///
/// `open` receives the caller's whole descriptor table because choosing a slot
/// is the driver's job; the other three operate on the slot the dispatcher
/// already validated.
pub trait FileOperations: Sync {
    fn name(&self) -> &'static str;
    fn open(&self, env: &DriverEnv, fds: &mut FdTable, dentry: &Dentry) -> Result<usize, ErrorNum>;
    fn close(&self, env: &DriverEnv, fd: usize, desc: &mut FileDescriptor) -> Result<(), ErrorNum>;
    fn read(&self, env: &DriverEnv, fd: usize, desc: &mut FileDescriptor, buf: &mut [u8]) -> Result<usize, ErrorNum>;
    fn write(&self, env: &DriverEnv, fd: usize, desc: &mut FileDescriptor, buf: &[u8]) -> Result<usize, ErrorNum>;
}
