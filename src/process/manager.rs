use core::fmt::{self, Debug, Formatter};

use crate::config::{BIG_PAGE_SIZE, KERNEL_STACK_SIZE, KERNEL_STACK_TOP, MAX_PROCESSES, USER_FRAME_BASE};
use crate::mem::PhysAddr;
use crate::utils::ErrorNum;

use super::{ProcessControlBlock, ProcessState};

/// Index of a process in the arena, equal to its nesting depth minus one.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProcessID(pub usize);

impl Debug for ProcessID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "PID<{}>", self.0)
    }
}

/// Physical frame backing the user window of process `pid`.
pub fn frame_of(pid: ProcessID) -> PhysAddr {
    USER_FRAME_BASE + pid.0 * BIG_PAGE_SIZE
}

/// Kernel stack top of process `pid`.
pub fn kernel_stack_of(pid: ProcessID) -> usize {
    KERNEL_STACK_TOP - (pid.0 + 1) * KERNEL_STACK_SIZE
}

/// Fixed arena of nested processes. Slot `depth - 1` is the current process;
/// everything below it is suspended in `execute`.
pub struct ProcessManager {
    slots   : [ProcessControlBlock; MAX_PROCESSES],
    depth   : usize,
}

impl ProcessManager {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| ProcessControlBlock::empty()),
            depth: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn current_pid(&self) -> Option<ProcessID> {
        self.depth.checked_sub(1).map(ProcessID)
    }

    pub fn current(&self) -> Option<&ProcessControlBlock> {
        self.current_pid().map(|pid| &self.slots[pid.0])
    }

    pub fn current_mut(&mut self) -> Option<&mut ProcessControlBlock> {
        let pid = self.current_pid()?;
        Some(&mut self.slots[pid.0])
    }

    pub fn get(&self, pid: ProcessID) -> Option<&ProcessControlBlock> {
        if pid.0 < self.depth { self.slots.get(pid.0) } else { None }
    }

    /// Slot the next execute will fill.
    pub(crate) fn reserve(&mut self) -> Result<(ProcessID, &mut ProcessControlBlock), ErrorNum> {
        if self.depth >= MAX_PROCESSES {
            return Err(ErrorNum::EAGAIN);
        }
        let pid = ProcessID(self.depth);
        let pcb = &mut self.slots[pid.0];
        *pcb = ProcessControlBlock::empty();
        pcb.state = ProcessState::Loading;
        Ok((pid, pcb))
    }

    /// Makes the reserved slot current. Only execute calls this.
    pub(crate) fn commit(&mut self, pid: ProcessID) {
        debug_assert_eq!(pid.0, self.depth);
        self.slots[pid.0].state = ProcessState::Running;
        self.depth += 1;
    }

    /// Retires the current process and makes its parent current. Only halt calls this.
    pub(crate) fn retire(&mut self) -> Option<ProcessID> {
        let pid = self.current_pid()?;
        self.slots[pid.0].state = ProcessState::Terminated;
        self.depth -= 1;
        Some(pid)
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}
