use crate::arch::{IntrGuard, Machine};
use crate::config::*;
use crate::fs::{FileKind, FileOperations, DIRECTORY_OPS, REGULAR_FILE_OPS};
use crate::device::RTC_OPS;
use crate::kernel::{driver_env, Kernel};
use crate::mem::{check_user_range, copy_from_user, copy_to_user, read_user_cstr, VirtAddr};
use crate::process::{Resume, SavedContext, Transition, UserFrame};
use crate::utils::ErrorNum;
use crate::{debug, verbose};

use super::syscall_num::*;

macro_rules! CALL_SYSCALL {
    ( $kernel: expr, $syscall_name: ident ) => {
        {
            let do_trace = $kernel.config.trace_syscalls;
            if do_trace {
                debug!("SYSCALL {} CALLED BY {:?}", stringify!($syscall_name), $kernel.procs.current_pid());
            }
            let ret = $kernel.$syscall_name();
            if do_trace {
                debug!("SYSCALL {} RESULT {:?}", stringify!($syscall_name), ret);
            }
            ret
        }
    };
    ( $kernel: expr, $syscall_name: ident, $($y:expr),+ ) => {
        {
            let do_trace = $kernel.config.trace_syscalls;
            if do_trace {
                debug!("SYSCALL {} CALLED BY {:?}", stringify!($syscall_name), $kernel.procs.current_pid());
                $(
                    verbose!("{:>25} = {:?}", stringify!{$y}, $y);
                )+
            }
            let ret = $kernel.$syscall_name($($y),+);
            if do_trace {
                debug!("SYSCALL {} RESULT {:?}", stringify!($syscall_name), ret);
            }
            ret
        }
    };
}

fn check_fd(fd: i32) -> Result<usize, ErrorNum> {
    if fd < 0 || fd as usize >= MAX_FD {
        return Err(ErrorNum::EBADF);
    }
    Ok(fd as usize)
}

/// Register value as a descriptor number. Anything outside `i32` names no descriptor.
fn fd_arg(raw: usize) -> Result<i32, ErrorNum> {
    i32::try_from(raw).map_err(|_| ErrorNum::EBADF)
}

/// Byte counts are signed on the user side; negative or wider values are refused.
fn check_count(nbytes: usize) -> Result<usize, ErrorNum> {
    i32::try_from(nbytes).map(|_| nbytes).map_err(|_| ErrorNum::EINVAL)
}

fn to_ret(ret: Result<usize, ErrorNum>) -> isize {
    match ret {
        Ok(value) => value as isize,
        Err(e) => e.to_ret(),
    }
}

impl<M: Machine> Kernel<M> {
    /// Single trap entry. `caller` is the kernel context of the trapping
    /// call, kept only if the call suspends it.
    pub fn syscall(&mut self, syscall_id: usize, args: [usize; 3], caller: SavedContext) -> Transition {
        match syscall_id {
            SYSCALL_HALT => match CALL_SYSCALL!(self, sys_halt, args[0] as u8) {
                Ok(resume) => Transition::Resume(resume),
                Err(e) => Transition::Return(e.to_ret()),
            },
            SYSCALL_EXECUTE => match CALL_SYSCALL!(self, sys_execute, VirtAddr::from(args[0]), caller) {
                Ok(frame) => Transition::EnterUser(frame),
                Err(e) => Transition::Return(e.to_ret()),
            },
            SYSCALL_READ        => Transition::Return(to_ret(CALL_SYSCALL!(self, sys_read, args[0], VirtAddr::from(args[1]), args[2]))),
            SYSCALL_WRITE       => Transition::Return(to_ret(CALL_SYSCALL!(self, sys_write, args[0], VirtAddr::from(args[1]), args[2]))),
            SYSCALL_OPEN        => Transition::Return(to_ret(CALL_SYSCALL!(self, sys_open, VirtAddr::from(args[0])))),
            SYSCALL_CLOSE       => Transition::Return(to_ret(CALL_SYSCALL!(self, sys_close, args[0]))),
            SYSCALL_GETARGS     => Transition::Return(to_ret(CALL_SYSCALL!(self, sys_getargs, VirtAddr::from(args[0]), args[1]))),
            SYSCALL_VIDMAP      => Transition::Return(to_ret(CALL_SYSCALL!(self, sys_vidmap, VirtAddr::from(args[0])))),
            SYSCALL_SET_HANDLER => Transition::Return(to_ret(CALL_SYSCALL!(self, sys_set_handler, args[0], VirtAddr::from(args[1])))),
            SYSCALL_SIGRETURN   => Transition::Return(to_ret(CALL_SYSCALL!(self, sys_sigreturn))),
            _                   => Transition::Return(to_ret(CALL_SYSCALL!(self, sys_unknown, syscall_id))),
        }
    }

    fn sys_halt(&mut self, status: u8) -> Result<Resume, ErrorNum> {
        self.halt(status)
    }

    fn sys_execute(&mut self, command: VirtAddr, caller: SavedContext) -> Result<UserFrame, ErrorNum> {
        let mut buf = [0u8; COMMAND_LEN + 1];
        let len = read_user_cstr(&self.mem, &self.machine, command, &mut buf)?;
        if len > COMMAND_LEN {
            return Err(ErrorNum::EINVAL);
        }
        self.execute(&buf[..len], caller)
    }

    /// Reads through a kernel bounce buffer; at most [`BOUNCE_LEN`] bytes per call.
    fn sys_read(&mut self, fd: usize, buf: VirtAddr, nbytes: usize) -> Result<usize, ErrorNum> {
        let fd = fd_arg(fd)?;
        if buf.is_null() {
            return Err(ErrorNum::EFAULT);
        }
        let nbytes = check_count(nbytes)?.min(BOUNCE_LEN);
        check_user_range(&self.mem, buf, nbytes, true)?;
        let mut bounce = [0u8; BOUNCE_LEN];
        let read = self.read(fd, &mut bounce[..nbytes])?;
        copy_to_user(&self.mem, &self.machine, buf, &bounce[..read])?;
        Ok(read)
    }

    fn sys_write(&mut self, fd: usize, buf: VirtAddr, nbytes: usize) -> Result<usize, ErrorNum> {
        let fd = fd_arg(fd)?;
        if buf.is_null() {
            return Err(ErrorNum::EFAULT);
        }
        let nbytes = check_count(nbytes)?.min(BOUNCE_LEN);
        let mut bounce = [0u8; BOUNCE_LEN];
        copy_from_user(&self.mem, &self.machine, buf, &mut bounce[..nbytes])?;
        self.write(fd, &bounce[..nbytes])
    }

    fn sys_open(&mut self, name: VirtAddr) -> Result<usize, ErrorNum> {
        let mut buf = [0u8; FILENAME_LEN + 1];
        let len = read_user_cstr(&self.mem, &self.machine, name, &mut buf)?;
        self.open(&buf[..len])
    }

    fn sys_close(&mut self, fd: usize) -> Result<usize, ErrorNum> {
        self.close(fd_arg(fd)?).map(|_| 0)
    }

    fn sys_getargs(&mut self, buf: VirtAddr, nbytes: usize) -> Result<usize, ErrorNum> {
        if buf.is_null() {
            return Err(ErrorNum::EFAULT);
        }
        let nbytes = check_count(nbytes)?.min(COMMAND_LEN + 1);
        let mut bounce = [0u8; COMMAND_LEN + 1];
        let copied = self.getargs(&mut bounce[..nbytes])?;
        copy_to_user(&self.mem, &self.machine, buf, &bounce[..copied])?;
        Ok(0)
    }

    fn sys_vidmap(&mut self, out: VirtAddr) -> Result<usize, ErrorNum> {
        self.vidmap(out).map(|_| 0)
    }

    fn sys_set_handler(&mut self, signum: usize, handler: VirtAddr) -> Result<usize, ErrorNum> {
        self.set_handler(signum, handler).map(|_| 0)
    }

    fn sys_sigreturn(&mut self) -> Result<usize, ErrorNum> {
        self.sigreturn().map(|_| 0)
    }

    fn sys_unknown(&mut self, syscall_id: usize) -> Result<usize, ErrorNum> {
        debug!("unknown syscall {}", syscall_id);
        Err(ErrorNum::ENOSYS)
    }

    pub fn read(&mut self, fd: i32, buf: &mut [u8]) -> Result<usize, ErrorNum> {
        let fd = check_fd(fd)?;
        let env = driver_env!(self);
        let pcb = self.procs.current_mut().ok_or(ErrorNum::EPERM)?;
        let desc = pcb.fds.get_mut(fd)?;
        let ops = desc.ops().ok_or(ErrorNum::EBADF)?;
        ops.read(&env, fd, desc, buf)
    }

    pub fn write(&mut self, fd: i32, buf: &[u8]) -> Result<usize, ErrorNum> {
        let fd = check_fd(fd)?;
        let env = driver_env!(self);
        let pcb = self.procs.current_mut().ok_or(ErrorNum::EPERM)?;
        let desc = pcb.fds.get_mut(fd)?;
        let ops = desc.ops().ok_or(ErrorNum::EBADF)?;
        ops.write(&env, fd, desc, buf)
    }

    /// Opens `name` in the first free general purpose slot.
    pub fn open(&mut self, name: &[u8]) -> Result<usize, ErrorNum> {
        let dentry = self.fs.resolve_by_name(name)?;
        let ops: &'static dyn FileOperations = match dentry.kind {
            FileKind::Regular => &REGULAR_FILE_OPS,
            FileKind::Directory => &DIRECTORY_OPS,
            FileKind::Device => &RTC_OPS,
            FileKind::Console => return Err(ErrorNum::EBADTYPE),
        };
        let env = driver_env!(self);
        let pcb = self.procs.current_mut().ok_or(ErrorNum::EPERM)?;
        let _guard = IntrGuard::new(env.machine);
        ops.open(&env, &mut pcb.fds, &dentry)
    }

    pub fn close(&mut self, fd: i32) -> Result<(), ErrorNum> {
        let fd = check_fd(fd)?;
        if fd < FIRST_FREE_FD {
            return Err(ErrorNum::EBADF);
        }
        let env = driver_env!(self);
        let pcb = self.procs.current_mut().ok_or(ErrorNum::EPERM)?;
        let desc = pcb.fds.get_mut(fd)?;
        let ops = desc.ops().ok_or(ErrorNum::EBADF)?;
        ops.close(&env, fd, desc)
    }

    /// Copies the arguments of the current command into `buf`, NUL terminated
    /// when room remains. Returns the number of argument bytes copied.
    pub fn getargs(&self, buf: &mut [u8]) -> Result<usize, ErrorNum> {
        let pcb = self.procs.current().ok_or(ErrorNum::EPERM)?;
        let args = pcb.args().ok_or(ErrorNum::EINVAL)?;
        if buf.is_empty() {
            return Err(ErrorNum::EINVAL);
        }
        let len = args.len().min(buf.len());
        buf[..len].copy_from_slice(&args[..len]);
        if len < buf.len() {
            buf[len] = 0;
            return Ok(len + 1);
        }
        Ok(len)
    }

    /// Stores the user address of display memory at `out`.
    pub fn vidmap(&mut self, out: VirtAddr) -> Result<VirtAddr, ErrorNum> {
        if out.0 <= BIG_PAGE_SIZE {
            return Err(ErrorNum::EFAULT);
        }
        self.mem
            .lookup_small(USER_VIDEO_SLOT, VIDEO_TABLE_INDEX)
            .filter(|entry| entry.user())
            .ok_or(ErrorNum::ENOENT)?;
        let addr = USER_VIDEO_ADDR.0 as u32;
        copy_to_user(&self.mem, &self.machine, out, &addr.to_le_bytes())?;
        Ok(USER_VIDEO_ADDR)
    }

    pub fn set_handler(&mut self, _signum: usize, _handler: VirtAddr) -> Result<(), ErrorNum> {
        Err(ErrorNum::ENOSYS)
    }

    pub fn sigreturn(&mut self) -> Result<(), ErrorNum> {
        Err(ErrorNum::ENOSYS)
    }
}
