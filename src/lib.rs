//! Core of a small single-core kernel that runs up to six nested user
//! programs from a read-only boot image.
//!
//! The platform is reached only through [`arch::Machine`]; [`arch::HostMachine`]
//! simulates it so the whole core runs under `cargo test`.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
pub mod utils;
pub mod config;
pub mod version;
pub mod arch;
pub mod mem;
pub mod fs;
pub mod device;
pub mod process;
pub mod syscall;
mod kernel;

pub use kernel::{
    FaultPolicy,
    Kernel,
    KernelConfig,
};

pub use arch::{
    HostMachine,
    HostScreen,
    Machine,
};

pub use process::{
    Resume,
    SavedContext,
    Transition,
    UserFrame,
};

pub use utils::ErrorNum;
