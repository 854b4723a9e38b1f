use core::fmt::{self, Debug, Formatter};

use bitflags::*;

use crate::config::{COMMAND_LEN, FIRST_FREE_FD, MAX_FD, STDIN_FD, STDOUT_FD};
use crate::device::CONSOLE_OPS;
use crate::fs::{FileKind, FileOperations};
use crate::mem::{PhysAddr, VirtAddr};
use crate::utils::ErrorNum;

use super::SavedContext;

bitflags! {
    pub struct FdFlags: u32 {
        const IN_USE = 1 << 0;
    }
}

const KIND_SHIFT: u32 = 1;
const KIND_MASK: u32 = 0b11 << KIND_SHIFT;
const BLOCK_SHIFT: u32 = 8;
const BLOCK_MASK: u32 = 0xFFF << BLOCK_SHIFT;

/// One descriptor slot. Nothing but the status word is meaningful unless it is in use.
///
/// Status word layout:
///` 31      20 19          8 7     3 2  1  0`
///`| reserved | block index | resv. |kind|U|`
#[derive(Clone, Copy)]
pub struct FileDescriptor {
    ops         : Option<&'static dyn FileOperations>,
    pub inode   : u32,
    pub position: u32,
    status      : u32,
}

impl FileDescriptor {
    pub const fn closed() -> Self {
        Self { ops: None, inode: 0, position: 0, status: 0 }
    }

    pub fn new(ops: &'static dyn FileOperations, kind: FileKind, inode: u32) -> Self {
        Self {
            ops: Some(ops),
            inode,
            position: 0,
            status: FdFlags::IN_USE.bits() | ((kind as u32) << KIND_SHIFT),
        }
    }

    pub fn ops(&self) -> Option<&'static dyn FileOperations> {
        if self.in_use() { self.ops } else { None }
    }

    pub fn flags(&self) -> FdFlags {
        FdFlags::from_bits_truncate(self.status)
    }

    pub fn in_use(&self) -> bool {
        self.flags().contains(FdFlags::IN_USE)
    }

    pub fn kind(&self) -> Option<FileKind> {
        if !self.in_use() {
            return None;
        }
        use core::convert::TryFrom;
        FileKind::try_from((self.status & KIND_MASK) >> KIND_SHIFT).ok()
    }

    /// Saved position in the inode's block list.
    pub fn block_index(&self) -> u32 {
        (self.status & BLOCK_MASK) >> BLOCK_SHIFT
    }

    pub fn set_block_index(&mut self, index: u32) {
        self.status = (self.status & !BLOCK_MASK) | ((index << BLOCK_SHIFT) & BLOCK_MASK);
    }

    pub fn status(&self) -> u32 {
        self.status
    }

    pub fn clear(&mut self) {
        *self = Self::closed();
    }
}

impl Debug for FileDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.ops() {
            Some(ops) => write!(f, "FD<{} inode {} pos {} status {:#x}>", ops.name(), self.inode, self.position, self.status),
            None => write!(f, "FD<closed>"),
        }
    }
}

/// Fixed descriptor table of one process.
#[derive(Debug, Clone, Copy)]
pub struct FdTable {
    slots: [FileDescriptor; MAX_FD],
}

impl FdTable {
    pub const fn new() -> Self {
        Self { slots: [FileDescriptor::closed(); MAX_FD] }
    }

    /// Table with stdin and stdout bound to the console and everything else closed.
    pub fn with_console() -> Self {
        let mut table = Self::new();
        table.slots[STDIN_FD] = FileDescriptor::new(&CONSOLE_OPS, FileKind::Console, 0);
        table.slots[STDOUT_FD] = FileDescriptor::new(&CONSOLE_OPS, FileKind::Console, 0);
        table
    }

    /// Lowest general purpose slot not in use.
    pub fn free_slot(&self) -> Result<usize, ErrorNum> {
        (FIRST_FREE_FD..MAX_FD)
            .find(|fd| !self.slots[*fd].in_use())
            .ok_or(ErrorNum::EMFILE)
    }

    pub fn install(&mut self, fd: usize, desc: FileDescriptor) -> Result<(), ErrorNum> {
        let slot = self.slots.get_mut(fd).ok_or(ErrorNum::EBADF)?;
        if slot.in_use() {
            return Err(ErrorNum::EBADF);
        }
        *slot = desc;
        Ok(())
    }

    /// In-use descriptor at `fd`.
    pub fn get(&self, fd: usize) -> Result<&FileDescriptor, ErrorNum> {
        self.slots.get(fd).filter(|d| d.in_use()).ok_or(ErrorNum::EBADF)
    }

    pub fn get_mut(&mut self, fd: usize) -> Result<&mut FileDescriptor, ErrorNum> {
        self.slots.get_mut(fd).filter(|d| d.in_use()).ok_or(ErrorNum::EBADF)
    }

    /// Raw slot access, in use or not.
    pub fn slot_mut(&mut self, fd: usize) -> Option<&mut FileDescriptor> {
        self.slots.get_mut(fd)
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|d| d.in_use()).count()
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Loading,
    Running,
    Resuming,
    Terminated,
}

/// What a halt needs to put back for the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResumeContext {
    pub context         : SavedContext,
    pub kernel_stack    : usize,
    /// Frame that backed the user window before this process took it.
    pub frame           : Option<PhysAddr>,
}

pub struct ProcessControlBlock {
    pub fds             : FdTable,
    command             : [u8; COMMAND_LEN],
    command_len         : usize,
    pub parent          : Option<usize>,
    pub resume          : ResumeContext,
    pub frame           : PhysAddr,
    pub kernel_stack    : usize,
    pub entry           : VirtAddr,
    pub state           : ProcessState,
}

impl ProcessControlBlock {
    pub const fn empty() -> Self {
        Self {
            fds: FdTable::new(),
            command: [0; COMMAND_LEN],
            command_len: 0,
            parent: None,
            resume: ResumeContext {
                context: SavedContext { stack_pointer: 0, frame_pointer: 0, instruction_pointer: 0 },
                kernel_stack: 0,
                frame: None,
            },
            frame: PhysAddr(0),
            kernel_stack: 0,
            entry: VirtAddr(0),
            state: ProcessState::Terminated,
        }
    }

    pub fn set_command(&mut self, command: &[u8]) -> Result<(), ErrorNum> {
        if command.len() > COMMAND_LEN {
            return Err(ErrorNum::EINVAL);
        }
        self.command[..command.len()].copy_from_slice(command);
        self.command[command.len()..].fill(0);
        self.command_len = command.len();
        Ok(())
    }

    pub fn command(&self) -> &[u8] {
        &self.command[..self.command_len]
    }

    /// Everything after the first space of the command line.
    pub fn args(&self) -> Option<&[u8]> {
        let command = self.command();
        let space = command.iter().position(|b| *b == b' ')?;
        let args = &command[space + 1..];
        if args.is_empty() { None } else { Some(args) }
    }
}
