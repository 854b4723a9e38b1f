use std::sync::Arc;
use std::vec::Vec;

use super::*;
use crate::arch::{HostMachine, HostScreen, Machine};
use crate::config::*;
use crate::fs::image::ImageBuilder;
use crate::kernel::{FaultPolicy, Kernel, KernelConfig};
use crate::mem::{copy_from_user, copy_to_user, PageDirectoryEntry, PageFlags, VirtAddr};
use crate::process::{frame_of, kernel_stack_of, ProcessID, Resume, SavedContext, Transition, FAULT_STATUS};
use crate::utils::{ErrorNum, LogLevel, Mutex, K_PRINT_HANDLER};

const SHELL_ENTRY: u32 = 0x0804_8094;
const FRAME0: &[u8] = b"/\\/\\/\\ fish frame zero /\\/\\/\\\n";

/// User scratch area below the image base, inside the user window.
fn scratch(offset: usize) -> VirtAddr {
    USER_WINDOW_BASE + 0x1000 + offset
}

fn program(entry: u32, body_len: usize) -> Vec<u8> {
    let mut image = vec![0u8; EXEC_HEADER_LEN + body_len];
    image[..4].copy_from_slice(&EXEC_MAGIC);
    image[EXEC_ENTRY_OFFSET..EXEC_ENTRY_OFFSET + 4].copy_from_slice(&entry.to_le_bytes());
    for (i, b) in image[EXEC_HEADER_LEN..].iter_mut().enumerate() {
        *b = (i % 251) as u8;
    }
    image
}

fn image() -> &'static [u8] {
    ImageBuilder::new()
        .directory(".")
        .device("rtc")
        .file("shell", &program(SHELL_ENTRY, 6000))
        .file("ls", &program(0x0804_8100, 100))
        .file("frame0.txt", FRAME0)
        .file("notexec", b"just text, no header at all")
        .leak()
        .unwrap()
}

fn boot(config: KernelConfig) -> Kernel<HostMachine> {
    let mut kernel = Kernel::boot(HostMachine::new(), image(), config).unwrap();
    kernel.start_shell().unwrap();
    kernel
}

fn booted() -> Kernel<HostMachine> {
    boot(KernelConfig::default())
}

fn poke(kernel: &Kernel<HostMachine>, va: VirtAddr, data: &[u8]) {
    copy_to_user(kernel.mem(), kernel.machine(), va, data).unwrap();
}

fn peek(kernel: &Kernel<HostMachine>, va: VirtAddr, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    copy_from_user(kernel.mem(), kernel.machine(), va, &mut buf).unwrap();
    buf
}

fn call(kernel: &mut Kernel<HostMachine>, id: usize, args: [usize; 3]) -> Transition {
    kernel.syscall(id, args, SavedContext::default())
}

fn ret(kernel: &mut Kernel<HostMachine>, id: usize, args: [usize; 3]) -> isize {
    match call(kernel, id, args) {
        Transition::Return(value) => value,
        other => panic!("syscall {} did not return: {:?}", id, other),
    }
}

/// Places `s` NUL-terminated in user scratch memory.
fn user_str(kernel: &Kernel<HostMachine>, offset: usize, s: &str) -> usize {
    let va = scratch(offset);
    let mut bytes = s.as_bytes().to_vec();
    bytes.push(0);
    poke(kernel, va, &bytes);
    va.0
}

fn sys_open(kernel: &mut Kernel<HostMachine>, name: &str) -> isize {
    let va = user_str(kernel, 0x800, name);
    ret(kernel, SYSCALL_OPEN, [va, 0, 0])
}

fn sys_execute(kernel: &mut Kernel<HostMachine>, command: &str) -> Transition {
    let va = user_str(kernel, 0x400, command);
    call(kernel, SYSCALL_EXECUTE, [va, 0, 0])
}

#[test]
fn shell_is_loaded_at_image_base() {
    let kernel = booted();
    assert_eq!(kernel.depth(), 1);
    assert_eq!(kernel.current_pid(), Some(ProcessID(0)));
    assert_eq!(kernel.mem().user_window_frame(), Some(frame_of(ProcessID(0))));
    assert_eq!(kernel.machine().kernel_stack(), kernel_stack_of(ProcessID(0)));
    let expected = program(SHELL_ENTRY, 6000);
    assert_eq!(peek(&kernel, USER_IMAGE_BASE, expected.len()), expected);
}

#[test]
fn start_shell_only_once() {
    let mut kernel = booted();
    assert_eq!(kernel.start_shell(), Err(ErrorNum::EPERM));
}

#[test]
fn execute_enters_child_at_its_entry() {
    let mut kernel = booted();
    match sys_execute(&mut kernel, "ls") {
        Transition::EnterUser(frame) => {
            assert_eq!(frame.entry, VirtAddr(0x0804_8100));
            assert_eq!(frame.stack, USER_STACK_TOP);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(kernel.depth(), 2);
    assert_eq!(kernel.current_pid(), Some(ProcessID(1)));
    assert_eq!(kernel.current().unwrap().parent, Some(0));
    assert_eq!(kernel.mem().user_window_frame(), Some(frame_of(ProcessID(1))));
}

#[test]
fn execute_rejects_bad_programs() {
    let mut kernel = booted();
    for command in ["missing", "notexec", ".", "rtc", "", "   "] {
        assert_eq!(sys_execute(&mut kernel, command), Transition::Return(-1), "{:?}", command);
    }
    assert_eq!(call(&mut kernel, SYSCALL_EXECUTE, [0, 0, 0]), Transition::Return(-1));
    assert_eq!(kernel.depth(), 1);
    assert_eq!(kernel.mem().user_window_frame(), Some(frame_of(ProcessID(0))));
}

#[test]
fn overlong_command_is_invalid() {
    let mut kernel = booted();
    let long = "a".repeat(COMMAND_LEN + 10);
    assert_eq!(kernel.execute(long.as_bytes(), SavedContext::default()), Err(ErrorNum::EINVAL));
    assert_eq!(kernel.depth(), 1);
}

#[test]
fn seventh_nested_execute_fails_without_side_effects() {
    let mut kernel = booted();
    for depth in 2..=MAX_PROCESSES {
        assert!(matches!(sys_execute(&mut kernel, "shell"), Transition::EnterUser(_)));
        assert_eq!(kernel.depth(), depth);
    }
    let stack = kernel.machine().kernel_stack();
    assert_eq!(kernel.execute(b"shell", SavedContext::default()), Err(ErrorNum::EAGAIN));
    assert_eq!(sys_execute(&mut kernel, "shell"), Transition::Return(-1));
    assert_eq!(kernel.depth(), MAX_PROCESSES);
    assert_eq!(kernel.machine().kernel_stack(), stack);
    assert_eq!(kernel.mem().user_window_frame(), Some(frame_of(ProcessID(MAX_PROCESSES - 1))));
}

#[test]
fn halt_resumes_parent_exactly() {
    let mut kernel = booted();
    let parent_stack = kernel.machine().kernel_stack();
    let caller = SavedContext { stack_pointer: 0x7f_f000, frame_pointer: 0x7f_f020, instruction_pointer: 0x40_1234 };
    let va = user_str(&kernel, 0x400, "ls -l");
    assert!(matches!(kernel.syscall(SYSCALL_EXECUTE, [va, 0, 0], caller), Transition::EnterUser(_)));
    assert_ne!(kernel.machine().kernel_stack(), parent_stack);

    assert_eq!(
        call(&mut kernel, SYSCALL_HALT, [0x1_07, 0, 0]),
        Transition::Resume(Resume { context: caller, value: 7 })
    );
    assert_eq!(kernel.depth(), 1);
    assert_eq!(kernel.current_pid(), Some(ProcessID(0)));
    assert_eq!(kernel.machine().kernel_stack(), parent_stack);
    assert_eq!(kernel.mem().user_window_frame(), Some(frame_of(ProcessID(0))));
    let shell = program(SHELL_ENTRY, 6000);
    assert_eq!(peek(&kernel, USER_IMAGE_BASE, 64), &shell[..64]);
}

#[test]
fn halt_closes_child_files() {
    let mut kernel = booted();
    assert!(matches!(sys_execute(&mut kernel, "ls"), Transition::EnterUser(_)));
    assert_eq!(sys_open(&mut kernel, "frame0.txt"), 2);
    assert_eq!(sys_open(&mut kernel, "rtc"), 3);
    assert_eq!(kernel.current().unwrap().fds.open_count(), 4);
    assert!(matches!(call(&mut kernel, SYSCALL_HALT, [0, 0, 0]), Transition::Resume(_)));
    assert!(kernel.process(ProcessID(1)).is_none());
    assert_eq!(kernel.current().unwrap().fds.open_count(), 2);
    assert_eq!(sys_open(&mut kernel, "frame0.txt"), 2);
}

#[test]
fn root_shell_cannot_halt() {
    let mut kernel = booted();
    assert_eq!(kernel.halt(0), Err(ErrorNum::EPERM));
    assert_eq!(ret(&mut kernel, SYSCALL_HALT, [0, 0, 0]), -1);
    assert_eq!(kernel.depth(), 1);
}

#[test]
fn descriptor_table_fills_and_reuses_lowest_slot() {
    let mut kernel = booted();
    for fd in FIRST_FREE_FD..MAX_FD {
        assert_eq!(sys_open(&mut kernel, "frame0.txt"), fd as isize);
    }
    assert_eq!(kernel.open(b"frame0.txt"), Err(ErrorNum::EMFILE));
    assert_eq!(sys_open(&mut kernel, "frame0.txt"), -1);
    assert_eq!(ret(&mut kernel, SYSCALL_CLOSE, [3, 0, 0]), 0);
    assert_eq!(sys_open(&mut kernel, "frame0.txt"), 3);
}

#[test]
fn close_rejects_console_and_bad_descriptors() {
    let mut kernel = booted();
    for fd in [0, 1, 5, 8, usize::MAX] {
        assert_eq!(ret(&mut kernel, SYSCALL_CLOSE, [fd, 0, 0]), -1, "fd {}", fd);
    }
    assert_eq!(kernel.close(5), Err(ErrorNum::EBADF));
    let fd = sys_open(&mut kernel, "frame0.txt");
    assert_eq!(ret(&mut kernel, SYSCALL_CLOSE, [fd as usize, 0, 0]), 0);
    assert_eq!(ret(&mut kernel, SYSCALL_CLOSE, [fd as usize, 0, 0]), -1);
}

#[test]
fn open_missing_name_fails() {
    let mut kernel = booted();
    assert_eq!(sys_open(&mut kernel, "nope"), -1);
    assert_eq!(sys_open(&mut kernel, ""), -1);
    assert_eq!(ret(&mut kernel, SYSCALL_OPEN, [0, 0, 0]), -1);
}

#[test]
fn regular_file_reads_in_chunks_then_eof() {
    let mut kernel = booted();
    let fd = sys_open(&mut kernel, "frame0.txt") as usize;
    let buf = scratch(0x100);
    let mut content = Vec::new();
    loop {
        let n = ret(&mut kernel, SYSCALL_READ, [fd, buf.0, 7]);
        assert!(n >= 0);
        if n == 0 {
            break;
        }
        content.extend(peek(&kernel, buf, n as usize));
    }
    assert_eq!(content, FRAME0);
    assert_eq!(ret(&mut kernel, SYSCALL_READ, [fd, buf.0, 7]), 0);
}

#[test]
fn regular_file_is_read_only() {
    let mut kernel = booted();
    let fd = sys_open(&mut kernel, "frame0.txt") as usize;
    assert_eq!(kernel.write(fd as i32, b"x"), Err(ErrorNum::EROFS));
    assert_eq!(ret(&mut kernel, SYSCALL_WRITE, [fd, scratch(0).0, 1]), -1);
}

#[test]
fn directory_lists_one_name_per_read() {
    let mut kernel = booted();
    let fd = sys_open(&mut kernel, ".") as i32;
    let mut names = Vec::new();
    let mut buf = [0u8; FILENAME_LEN];
    loop {
        let n = kernel.read(fd, &mut buf).unwrap();
        if n == 0 {
            break;
        }
        names.push(String::from_utf8(buf[..n].to_vec()).unwrap());
    }
    assert_eq!(names, [".", "rtc", "shell", "ls", "frame0.txt", "notexec"]);
}

#[test]
fn read_and_write_argument_checks() {
    let mut kernel = booted();
    let fd = sys_open(&mut kernel, "frame0.txt") as usize;
    assert_eq!(ret(&mut kernel, SYSCALL_READ, [fd, 0, 4]), -1);
    assert_eq!(ret(&mut kernel, SYSCALL_READ, [fd, scratch(0).0, (-1i32) as usize]), -1);
    assert_eq!(ret(&mut kernel, SYSCALL_READ, [MAX_FD, scratch(0).0, 4]), -1);
    assert_eq!(ret(&mut kernel, SYSCALL_READ, [6, scratch(0).0, 4]), -1);
    assert_eq!(ret(&mut kernel, SYSCALL_WRITE, [STDOUT_FD, 0, 4]), -1);
    // kernel memory is not a valid user buffer, and the failed read consumes nothing
    assert_eq!(ret(&mut kernel, SYSCALL_READ, [fd, KERNEL_BASE.0, 4]), -1);
    assert_eq!(ret(&mut kernel, SYSCALL_READ, [fd, scratch(0).0, 4]), 4);
    assert_eq!(peek(&kernel, scratch(0), 4), &FRAME0[..4]);
}

#[test]
fn wide_register_values_are_not_truncated() {
    let mut kernel = booted();
    let fd = sys_open(&mut kernel, "frame0.txt") as usize;
    let va = scratch(0);
    assert_eq!(ret(&mut kernel, SYSCALL_READ, [fd, va.0, 0x8000_0000]), -1);
    #[cfg(target_pointer_width = "64")]
    {
        let high = 1usize << 32;
        assert_eq!(ret(&mut kernel, SYSCALL_READ, [high + fd, va.0, 4]), -1);
        assert_eq!(ret(&mut kernel, SYSCALL_READ, [fd, va.0, high + 4]), -1);
        assert_eq!(ret(&mut kernel, SYSCALL_WRITE, [high + STDOUT_FD, va.0, 1]), -1);
        assert_eq!(ret(&mut kernel, SYSCALL_GETARGS, [va.0, high + 8, 0]), -1);
        assert_eq!(ret(&mut kernel, SYSCALL_CLOSE, [high + fd, 0, 0]), -1);
    }
    // nothing above consumed data or closed the file
    assert_eq!(ret(&mut kernel, SYSCALL_READ, [fd, va.0, 4]), 4);
    assert_eq!(peek(&kernel, va, 4), &FRAME0[..4]);
    assert_eq!(ret(&mut kernel, SYSCALL_CLOSE, [fd, 0, 0]), 0);
}

#[test]
fn console_write_reaches_screen() {
    let mut kernel = booted();
    let screen = Arc::new(HostScreen::new());
    kernel.terminal().set_output(screen.clone());
    let va = scratch(0);
    poke(&kernel, va, b"391OS> ");
    assert_eq!(ret(&mut kernel, SYSCALL_WRITE, [STDOUT_FD, va.0, 7]), 7);
    assert_eq!(screen.contents(), b"391OS> ");
    assert_eq!(ret(&mut kernel, SYSCALL_WRITE, [STDIN_FD, va.0, 7]), -1);
}

#[test]
fn attached_console_receives_output_and_logs() {
    let mut kernel = booted();
    let screen = Arc::new(HostScreen::new());
    kernel.attach_console(screen.clone());
    assert!(matches!(sys_execute(&mut kernel, "ls"), Transition::EnterUser(_)));
    let va = scratch(0);
    poke(&kernel, va, b"hello");
    assert_eq!(ret(&mut kernel, SYSCALL_WRITE, [STDOUT_FD, va.0, 5]), 5);
    K_PRINT_HANDLER.acquire().clear_sink();

    let text = screen.contents();
    assert!(text.windows(5).any(|w| w == b"hello"));
    if LogLevel::Info.enabled() {
        assert!(text.windows(8).any(|w| w == b"[ INFO  "));
    }
}

#[test]
fn console_read_returns_typed_line() {
    let mut kernel = booted();
    let terminal = kernel.terminal();
    for b in b"ls\n" {
        kernel.keyboard_interrupt(*b);
    }
    assert_eq!(kernel.machine().acknowledged(KEYBOARD_IRQ), 3);
    let buf = scratch(0x200);
    assert_eq!(ret(&mut kernel, SYSCALL_READ, [STDIN_FD, buf.0, 128]), 3);
    assert_eq!(peek(&kernel, buf, 3), b"ls\n");
    assert!(!terminal.line_ready());
    assert_eq!(ret(&mut kernel, SYSCALL_READ, [STDOUT_FD, buf.0, 128]), -1);
}

#[test]
fn rtc_rate_and_tick() {
    let mut kernel = booted();
    let fd = sys_open(&mut kernel, "rtc") as usize;
    assert_eq!(kernel.rtc().frequency(), RTC_DEFAULT_FREQ);

    let va = scratch(0x300);
    poke(&kernel, va, &512u32.to_le_bytes());
    assert_eq!(ret(&mut kernel, SYSCALL_WRITE, [fd, va.0, 4]), 0);
    assert_eq!(kernel.rtc().frequency(), 512);
    poke(&kernel, va, &3u32.to_le_bytes());
    assert_eq!(ret(&mut kernel, SYSCALL_WRITE, [fd, va.0, 4]), -1);
    assert_eq!(ret(&mut kernel, SYSCALL_WRITE, [fd, va.0, 2]), -1);
    assert_eq!(kernel.rtc().frequency(), 512);

    kernel.rtc_interrupt();
    assert_eq!(kernel.machine().acknowledged(RTC_IRQ), 1);
    assert_eq!(ret(&mut kernel, SYSCALL_READ, [fd, va.0, 4]), 0);
}

#[test]
fn getargs_returns_text_after_program_name() {
    let mut kernel = booted();
    assert!(matches!(sys_execute(&mut kernel, "ls arg1 arg2"), Transition::EnterUser(_)));
    let buf = scratch(0x500);
    assert_eq!(ret(&mut kernel, SYSCALL_GETARGS, [buf.0, 32, 0]), 0);
    assert_eq!(peek(&kernel, buf, 10), b"arg1 arg2\0");

    poke(&kernel, buf, &[0xEE; 8]);
    assert_eq!(ret(&mut kernel, SYSCALL_GETARGS, [buf.0, 4, 0]), 0);
    assert_eq!(peek(&kernel, buf, 5), b"arg1\xEE");

    assert_eq!(ret(&mut kernel, SYSCALL_GETARGS, [0, 32, 0]), -1);
    assert_eq!(ret(&mut kernel, SYSCALL_GETARGS, [buf.0, 0, 0]), -1);
}

#[test]
fn getargs_fails_without_arguments() {
    let mut kernel = booted();
    let buf = scratch(0x500);
    assert_eq!(ret(&mut kernel, SYSCALL_GETARGS, [buf.0, 32, 0]), -1);
    assert!(matches!(sys_execute(&mut kernel, "ls "), Transition::EnterUser(_)));
    assert_eq!(kernel.getargs(&mut [0u8; 8]), Err(ErrorNum::EINVAL));
}

#[test]
fn vidmap_writes_fixed_address() {
    let mut kernel = booted();
    let out = scratch(0x600);
    assert_eq!(ret(&mut kernel, SYSCALL_VIDMAP, [out.0, 0, 0]), 0);
    assert_eq!(peek(&kernel, out, 4), (USER_VIDEO_ADDR.0 as u32).to_le_bytes());
    assert_eq!(kernel.vidmap(out), Ok(USER_VIDEO_ADDR));

    let t = kernel.mem().translate_user(USER_VIDEO_ADDR).unwrap();
    assert_eq!(t.pa, VIDEO_MEM_ADDR);
    assert!(t.writable);
}

#[test]
fn vidmap_rejects_low_pointers() {
    let mut kernel = booted();
    for out in [0, 0x1000, BIG_PAGE_SIZE] {
        assert_eq!(ret(&mut kernel, SYSCALL_VIDMAP, [out, 0, 0]), -1, "{:#x}", out);
    }
    assert_eq!(kernel.vidmap(VirtAddr(0)), Err(ErrorNum::EFAULT));
}

#[test]
fn vidmap_needs_exposed_display() {
    let mut kernel = boot(KernelConfig { map_user_video: false, ..KernelConfig::default() });
    let out = scratch(0x600);
    assert_eq!(kernel.vidmap(out), Err(ErrorNum::ENOENT));
    assert!(kernel.mem().translate_user(USER_VIDEO_ADDR).is_none());
    kernel.enable_user_video().unwrap();
    assert_eq!(ret(&mut kernel, SYSCALL_VIDMAP, [out.0, 0, 0]), 0);
}

#[test]
fn installed_directory_follows_the_running_process() {
    let mut kernel = boot(KernelConfig { map_user_video: false, ..KernelConfig::default() });
    let slot = |kernel: &Kernel<HostMachine>| {
        kernel.machine().installed_entry(USER_IMAGE_SLOT).map(PageDirectoryEntry::decode)
    };
    assert_eq!(kernel.machine().root(), Some(PAGE_DIRECTORY_ADDR));
    assert_eq!(slot(&kernel), kernel.mem().directory().get(USER_IMAGE_SLOT));
    sys_execute(&mut kernel, "ls");
    match slot(&kernel) {
        Some(PageDirectoryEntry::Big { frame, flags }) => {
            assert_eq!(frame, frame_of(ProcessID(1)));
            assert!(flags.contains(PageFlags::US));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(call(&mut kernel, SYSCALL_HALT, [0, 0, 0]), Transition::Resume(_)));
    assert_eq!(slot(&kernel).map(|e| e.encode()), Some(frame_of(ProcessID(0)).0 as u32 | 0x87));

    assert!(kernel.machine().installed_table_entry(USER_VIDEO_SLOT, VIDEO_TABLE_INDEX).is_none());
    kernel.enable_user_video().unwrap();
    let word = kernel.machine().installed_table_entry(USER_VIDEO_SLOT, VIDEO_TABLE_INDEX).unwrap();
    assert_eq!(word, VIDEO_MEM_ADDR.0 as u32 | 0x7);
}

#[test]
fn signal_calls_and_unknown_numbers_fail() {
    let mut kernel = booted();
    assert_eq!(ret(&mut kernel, SYSCALL_SET_HANDLER, [1, scratch(0).0, 0]), -1);
    assert_eq!(ret(&mut kernel, SYSCALL_SIGRETURN, [0, 0, 0]), -1);
    assert_eq!(kernel.sigreturn(), Err(ErrorNum::ENOSYS));
    assert_eq!(ret(&mut kernel, 0, [0, 0, 0]), -1);
    assert_eq!(ret(&mut kernel, 42, [0, 0, 0]), -1);
}

#[test]
fn tracing_does_not_change_results() {
    let mut kernel = boot(KernelConfig { trace_syscalls: true, ..KernelConfig::default() });
    assert_eq!(sys_open(&mut kernel, "frame0.txt"), 2);
    assert_eq!(ret(&mut kernel, 42, [0, 0, 0]), -1);
}

#[test]
fn faults_freeze_the_machine_by_default() {
    let mut kernel = booted();
    assert!(matches!(sys_execute(&mut kernel, "ls"), Transition::EnterUser(_)));
    assert_eq!(kernel.handle_exception(14), Transition::Freeze);
    assert_eq!(kernel.depth(), 2);
}

#[test]
fn faults_can_terminate_only_the_process() {
    let mut kernel = boot(KernelConfig { fault_policy: FaultPolicy::TerminateProcess, ..KernelConfig::default() });
    assert_eq!(kernel.handle_exception(0), Transition::Freeze);
    let caller = SavedContext { stack_pointer: 1, frame_pointer: 2, instruction_pointer: 3 };
    let va = user_str(&kernel, 0x400, "ls");
    assert!(matches!(kernel.syscall(SYSCALL_EXECUTE, [va, 0, 0], caller), Transition::EnterUser(_)));
    assert_eq!(
        kernel.handle_exception(13),
        Transition::Resume(Resume { context: caller, value: FAULT_STATUS })
    );
    assert_eq!(kernel.depth(), 1);
}

#[test]
fn boot_rejects_corrupt_image() {
    let junk: &'static [u8] = Box::leak(vec![0xFFu8; BLK_SIZE].into_boxed_slice());
    assert!(Kernel::boot(HostMachine::new(), junk, KernelConfig::default()).is_err());
}

#[test]
fn boot_turns_on_paging() {
    let kernel = Kernel::boot(HostMachine::new(), image(), KernelConfig::default()).unwrap();
    assert!(kernel.machine().paging_enabled());
    assert_eq!(kernel.depth(), 0);
    assert!(kernel.mem().user_window_frame().is_none());
}
