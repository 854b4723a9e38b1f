mod types;
mod pagetable;
mod mem_layout;
mod user;
#[cfg(target_os = "none")]
mod kernel_heap;

#[cfg(target_os = "none")]
pub use kernel_heap::init_kernel_heap;

pub use types::{
    PhysAddr,
    VirtAddr,
};

pub use pagetable::{
    PageFlags,
    PageDirectoryEntry,
    PageTableEntry,
    PageDirectory,
    PageTable,
};

pub use mem_layout::{
    MemLayout,
    Translation,
};

pub use user::{
    copy_to_user,
    copy_from_user,
    read_user_cstr,
    check_user_range,
};
