use core::convert::TryFrom;

use crate::arch::{IntrGuard, Machine};
use crate::config::*;
use crate::fs::FileKind;
use crate::kernel::{driver_env, FaultPolicy, Kernel};
use crate::mem::{copy_to_user, VirtAddr};
use crate::utils::ErrorNum;
use crate::{enum_with_tryfrom_usize, fatal, info, warning};

use super::{frame_of, kernel_stack_of, FdTable, ProcessState, Resume, ResumeContext, SavedContext, Transition, UserFrame};

/// Value a parent sees when its child was killed by a fault.
pub const FAULT_STATUS: isize = 256;

enum_with_tryfrom_usize!(
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ExceptionVector {
        DivideError = 0,
        Debug = 1,
        NonMaskableInterrupt = 2,
        Breakpoint = 3,
        Overflow = 4,
        BoundRangeExceeded = 5,
        InvalidOpcode = 6,
        DeviceNotAvailable = 7,
        DoubleFault = 8,
        CoprocessorSegmentOverrun = 9,
        InvalidTss = 10,
        SegmentNotPresent = 11,
        StackSegmentFault = 12,
        GeneralProtection = 13,
        PageFault = 14,
        FloatingPoint = 16,
        AlignmentCheck = 17,
        MachineCheck = 18,
        SimdFloatingPoint = 19,
    }
);

/// Cuts the raw command at its first NUL and drops leading spaces and the
/// line terminator.
fn normalize_command(raw: &[u8]) -> &[u8] {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    let mut command = &raw[..end];
    while let [b' ', rest @ ..] = command {
        command = rest;
    }
    while let [rest @ .., b'\n' | b'\r'] = command {
        command = rest;
    }
    command
}

/// First token of a normalized command line.
pub fn parse_program_name(command: &[u8]) -> Result<&[u8], ErrorNum> {
    let end = command
        .iter()
        .position(|b| matches!(b, b' ' | 0 | b'\n'))
        .unwrap_or(command.len());
    match &command[..end] {
        [] => Err(ErrorNum::ENOENT),
        name if name.len() > FILENAME_LEN => Err(ErrorNum::ENOENT),
        name => Ok(name),
    }
}

impl<M: Machine> Kernel<M> {
    /// Loads the program named by the first token of `command` into a fresh
    /// process nested below the current one.
    ///
    /// On success the caller is suspended: `caller` is stored in the new PCB
    /// and handed back by the matching [`Kernel::halt`].
    pub fn execute(&mut self, command: &[u8], caller: SavedContext) -> Result<UserFrame, ErrorNum> {
        let _guard = IntrGuard::new(&self.machine);
        let command = normalize_command(command);
        if command.len() > COMMAND_LEN {
            return Err(ErrorNum::EINVAL);
        }
        let name = parse_program_name(command)?;
        if self.procs.depth() >= MAX_PROCESSES {
            warning!("execute refused: {} processes already nested", MAX_PROCESSES);
            return Err(ErrorNum::EAGAIN);
        }

        let dentry = self.fs.resolve_by_name(name)?;
        if dentry.kind != FileKind::Regular {
            return Err(ErrorNum::EBADTYPE);
        }
        let mut header = [0u8; EXEC_HEADER_LEN];
        let read = self.fs.read_data(dentry.inode, 0, &mut header, None)?;
        if read < EXEC_ENTRY_OFFSET + 4 || header[..EXEC_MAGIC.len()] != EXEC_MAGIC {
            return Err(ErrorNum::ENOEXEC);
        }
        let entry = u32::from_le_bytes([
            header[EXEC_ENTRY_OFFSET],
            header[EXEC_ENTRY_OFFSET + 1],
            header[EXEC_ENTRY_OFFSET + 2],
            header[EXEC_ENTRY_OFFSET + 3],
        ]);
        let image_len = self.fs.file_length(dentry.inode)? as usize;
        if image_len > (USER_WINDOW_BASE + BIG_PAGE_SIZE) - USER_IMAGE_BASE {
            return Err(ErrorNum::ENOEXEC);
        }

        let previous = ResumeContext {
            context: caller,
            kernel_stack: self.machine.kernel_stack(),
            frame: self.mem.user_window_frame(),
        };
        let parent = self.procs.current_pid();
        let (pid, pcb) = self.procs.reserve()?;
        pcb.set_command(command)?;
        pcb.fds = FdTable::with_console();
        pcb.parent = parent.map(|p| p.0);
        pcb.resume = previous;
        pcb.frame = frame_of(pid);
        pcb.kernel_stack = kernel_stack_of(pid);
        pcb.entry = VirtAddr(entry as usize);
        let (frame, kernel_stack) = (pcb.frame, pcb.kernel_stack);

        self.mem.remap_user_window(frame, &self.machine)?;
        if let Err(e) = self.load_image(dentry.inode) {
            fatal!("loading {:?} failed: {}", dentry, e);
            match previous.frame {
                Some(frame) => self.mem.remap_user_window(frame, &self.machine)?,
                None => self.mem.unmap_user_window(&self.machine)?,
            }
            return Err(e);
        }
        self.machine.set_kernel_stack(kernel_stack);
        self.procs.commit(pid);

        info!(
            "{:?} started {:?} at depth {}, entry {:#x}, frame {:?}",
            parent, pid, self.procs.depth(), entry, frame
        );
        Ok(UserFrame {
            entry: VirtAddr(entry as usize),
            stack: USER_STACK_TOP,
        })
    }

    /// Copies the whole image to the user base through the freshly mapped window.
    fn load_image(&self, inode: u32) -> Result<usize, ErrorNum> {
        let mut buf = [0u8; BLK_SIZE];
        let mut offset = 0usize;
        let mut cursor = 0u32;
        loop {
            let read = self.fs.read_data(inode, offset as u32, &mut buf, Some(&mut cursor))?;
            if read == 0 {
                return Ok(offset);
            }
            copy_to_user(&self.mem, &self.machine, USER_IMAGE_BASE + offset, &buf[..read])?;
            offset += read;
        }
    }

    /// Ends the current process and resumes its parent with `status`.
    pub fn halt(&mut self, status: u8) -> Result<Resume, ErrorNum> {
        self.terminate(status as isize)
    }

    fn terminate(&mut self, value: isize) -> Result<Resume, ErrorNum> {
        let _guard = IntrGuard::new(&self.machine);
        let env = driver_env!(self);
        let pcb = self.procs.current_mut().ok_or(ErrorNum::EPERM)?;
        if pcb.parent.is_none() {
            return Err(ErrorNum::EPERM);
        }
        pcb.state = ProcessState::Resuming;
        for fd in 0..MAX_FD {
            if let Some(desc) = pcb.fds.slot_mut(fd) {
                if let Some(ops) = desc.ops() {
                    if let Err(e) = ops.close(&env, fd, desc) {
                        warning!("closing fd {} on halt: {}", fd, e);
                    }
                    desc.clear();
                }
            }
        }
        let resume = pcb.resume;
        let pid = self.procs.retire();

        match resume.frame {
            Some(frame) => self.mem.remap_user_window(frame, &self.machine)?,
            None => self.mem.unmap_user_window(&self.machine)?,
        }
        self.machine.set_kernel_stack(resume.kernel_stack);
        info!("{:?} halted with {}, back to depth {}", pid, value, self.procs.depth());
        Ok(Resume {
            context: resume.context,
            value,
        })
    }

    /// Entry point for CPU exceptions raised while a process runs.
    pub fn handle_exception(&mut self, vector: usize) -> Transition {
        match ExceptionVector::try_from(vector) {
            Ok(exception) => fatal!("{:?} exception in {:?}", exception, self.procs.current_pid()),
            Err(_) => fatal!("unknown exception {} in {:?}", vector, self.procs.current_pid()),
        }
        match self.config.fault_policy {
            FaultPolicy::HaltMachine => Transition::Freeze,
            FaultPolicy::TerminateProcess => match self.terminate(FAULT_STATUS) {
                Ok(resume) => Transition::Resume(resume),
                Err(_) => Transition::Freeze,
            },
        }
    }
}
