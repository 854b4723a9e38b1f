use alloc::sync::Arc;

use crate::arch::{IntrGuard, Machine};
use crate::config::{KEYBOARD_IRQ, RTC_IRQ};
use crate::device::{ConsoleOutput, Rtc, Terminal};
use crate::fs::FileSystem;
use crate::mem::MemLayout;
use crate::process::{ProcessControlBlock, ProcessID, ProcessManager, SavedContext, UserFrame};
use crate::utils::{ErrorNum, Mutex, K_PRINT_HANDLER};
use crate::version::VERSION;
use crate::{info, milestone};

/// Builds a [`crate::fs::DriverEnv`] from disjoint field borrows of a kernel.
macro_rules! driver_env {
    ($kernel: expr) => {
        $crate::fs::DriverEnv {
            fs: &$kernel.fs,
            terminal: &$kernel.terminal,
            rtc: &$kernel.rtc,
            machine: &$kernel.machine,
        }
    };
}
pub(crate) use driver_env;

/// What to do when user code takes an unrecoverable fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultPolicy {
    /// Print the fault and stop the whole machine.
    #[default]
    HaltMachine,
    /// Halt only the faulting process; its parent sees status 256.
    TerminateProcess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    pub trace_syscalls  : bool,
    pub fault_policy    : FaultPolicy,
    /// Install the user display-memory mapping at boot.
    pub map_user_video  : bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            trace_syscalls: false,
            fault_policy: FaultPolicy::HaltMachine,
            map_user_video: true,
        }
    }
}

pub struct Kernel<M: Machine> {
    pub(crate) machine  : M,
    pub(crate) fs       : FileSystem,
    pub(crate) mem      : MemLayout,
    pub(crate) procs    : ProcessManager,
    pub(crate) terminal : Arc<Terminal>,
    pub(crate) rtc      : Arc<Rtc>,
    pub(crate) config   : KernelConfig,
}

impl<M: Machine> Kernel<M> {
    /// Brings up paging and mounts the boot image. No process exists yet;
    /// call [`Kernel::start_shell`] next.
    pub fn boot(machine: M, image: &'static [u8], config: KernelConfig) -> Result<Self, ErrorNum> {
        #[cfg(target_os = "none")]
        crate::mem::init_kernel_heap();
        milestone!("nested_kernel built {}", VERSION);
        let mut mem = MemLayout::new();
        if config.map_user_video {
            mem.expose_user_video(&machine)?;
        }
        mem.activate(&machine)?;
        let fs = FileSystem::mount(image)?;
        milestone!("Kernel core initialized");
        Ok(Self {
            machine,
            fs,
            mem,
            procs: ProcessManager::new(),
            terminal: Arc::new(Terminal::new()),
            rtc: Arc::new(Rtc::new()),
            config,
        })
    }

    /// Loads the root shell. Its frame is where the boot path drops to user mode.
    pub fn start_shell(&mut self) -> Result<UserFrame, ErrorNum> {
        if self.procs.depth() != 0 {
            return Err(ErrorNum::EPERM);
        }
        info!("Starting root shell");
        self.execute(b"shell", SavedContext::default())
    }

    pub fn current(&self) -> Option<&ProcessControlBlock> {
        self.procs.current()
    }

    pub fn current_pid(&self) -> Option<ProcessID> {
        self.procs.current_pid()
    }

    pub fn depth(&self) -> usize {
        self.procs.depth()
    }

    pub fn process(&self, pid: ProcessID) -> Option<&ProcessControlBlock> {
        self.procs.get(pid)
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn fs(&self) -> &FileSystem {
        &self.fs
    }

    pub fn mem(&self) -> &MemLayout {
        &self.mem
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Shared with the keyboard interrupt handler.
    pub fn terminal(&self) -> Arc<Terminal> {
        self.terminal.clone()
    }

    /// Shared with the tick interrupt handler.
    pub fn rtc(&self) -> Arc<Rtc> {
        self.rtc.clone()
    }

    /// Keyboard handler body. `byte` is the already translated character.
    pub fn keyboard_interrupt(&self, byte: u8) {
        let _guard = IntrGuard::new(&self.machine);
        self.terminal.receive(byte);
        self.machine.end_of_interrupt(KEYBOARD_IRQ);
    }

    pub fn rtc_interrupt(&self) {
        let _guard = IntrGuard::new(&self.machine);
        self.rtc.tick();
        self.machine.end_of_interrupt(RTC_IRQ);
    }

    /// Routes console writes and kernel log lines to `output`.
    pub fn attach_console(&self, output: Arc<dyn ConsoleOutput>) {
        self.terminal.set_output(output.clone());
        K_PRINT_HANDLER.acquire().set_sink(output);
    }

    /// Privileged opt-in for the user display-memory mapping used by `vidmap`.
    pub fn enable_user_video(&mut self) -> Result<(), ErrorNum> {
        self.mem.expose_user_video(&self.machine)
    }
}
