use crate::mem::VirtAddr;

/// Kernel-side execution context of a caller suspended inside `execute`.
///
/// The arch layer captures it at syscall entry and hands it back to its
/// context-switch primitive when the callee halts.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SavedContext {
    pub stack_pointer       : usize,
    pub frame_pointer       : usize,
    pub instruction_pointer : usize,
}

/// Privilege-lowering return frame for a freshly loaded program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserFrame {
    pub entry   : VirtAddr,
    pub stack   : VirtAddr,
}

/// Where and how to continue a parent after its child halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resume {
    pub context : SavedContext,
    /// Value `execute` appears to return in the parent.
    pub value   : isize,
}

/// What the arch layer must do after the kernel handled a trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Return to the calling process with this value in the result register.
    Return(isize),
    /// Drop to user mode at a new program.
    EnterUser(UserFrame),
    /// Switch to a parent's saved context.
    Resume(Resume),
    /// Stop the machine.
    Freeze,
}
