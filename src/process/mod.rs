mod context;
mod pcb;
mod manager;
mod lifecycle;

pub use context::{
    SavedContext,
    UserFrame,
    Resume,
    Transition,
};

pub use pcb::{
    FdFlags,
    FileDescriptor,
    FdTable,
    ProcessState,
    ResumeContext,
    ProcessControlBlock,
};

pub use manager::{
    ProcessID,
    ProcessManager,
    frame_of,
    kernel_stack_of,
};

pub use lifecycle::{
    ExceptionVector,
    FAULT_STATUS,
    parse_program_name,
};
