use crate::mem::{PhysAddr, VirtAddr};

pub const KERNEL_HEAP_SIZE  : usize = 0x1_0000;
pub const BOUNCE_LEN        : usize = 0x1000;

pub const SMALL_PAGE_OFFSET : usize = 12;
pub const SMALL_PAGE_SIZE   : usize = 1 << SMALL_PAGE_OFFSET;
pub const BIG_PAGE_OFFSET   : usize = 22;
pub const BIG_PAGE_SIZE     : usize = 1 << BIG_PAGE_OFFSET;
pub const ENTRIES_PER_TABLE : usize = 1024;

pub const VIDEO_MEM_ADDR    : PhysAddr = PhysAddr(0xB8000);
pub const KERNEL_BASE       : PhysAddr = PhysAddr(0x40_0000);
/// Physical frame of the outermost process; deeper ones follow at 4MB strides.
pub const USER_FRAME_BASE   : PhysAddr = PhysAddr(0x80_0000);

// page directory slots
pub const VIDEO_SLOT        : usize = 0;
pub const KERNEL_SLOT       : usize = 1;
pub const USER_IMAGE_SLOT   : usize = 32;
pub const USER_VIDEO_SLOT   : usize = 33;
pub const VIDEO_TABLE_INDEX : usize = VIDEO_MEM_ADDR.0 >> SMALL_PAGE_OFFSET;

// Kernel-resident page tables live inside the kernel big page.
pub const VIDEO_TABLE_ADDR      : PhysAddr = PhysAddr(0x40_1000);
pub const USER_VIDEO_TABLE_ADDR : PhysAddr = PhysAddr(0x40_2000);
pub const PAGE_DIRECTORY_ADDR   : PhysAddr = PhysAddr(0x40_3000);

pub const USER_WINDOW_BASE  : VirtAddr = VirtAddr(USER_IMAGE_SLOT << BIG_PAGE_OFFSET);
pub const USER_IMAGE_BASE   : VirtAddr = VirtAddr(0x0804_8000);
pub const USER_STACK_TOP    : VirtAddr = VirtAddr(USER_WINDOW_BASE.0 + BIG_PAGE_SIZE - 4);
pub const USER_VIDEO_ADDR   : VirtAddr = VirtAddr((USER_VIDEO_SLOT << BIG_PAGE_OFFSET) | VIDEO_MEM_ADDR.0);

/// Per-process kernel stacks grow down from the start of user frames.
pub const KERNEL_STACK_TOP  : usize = USER_FRAME_BASE.0;
pub const KERNEL_STACK_SIZE : usize = 0x2000;

pub const MAX_PROCESSES     : usize = 6;
pub const MAX_FD            : usize = 8;
pub const FIRST_FREE_FD     : usize = 2;
pub const STDIN_FD          : usize = 0;
pub const STDOUT_FD         : usize = 1;
pub const COMMAND_LEN       : usize = 1024;
pub const LINE_BUFFER_LEN   : usize = 128;

pub const BLK_SIZE          : usize = 4096;
pub const FILENAME_LEN      : usize = 32;
pub const MAX_DENTRIES      : usize = 63;
pub const BLOCKS_PER_INODE  : usize = 1023;

pub const EXEC_MAGIC        : [u8; 4] = [0x7F, b'E', b'L', b'F'];
pub const EXEC_HEADER_LEN   : usize = 40;
pub const EXEC_ENTRY_OFFSET : usize = 24;

pub const KEYBOARD_IRQ      : u8 = 1;
pub const RTC_IRQ           : u8 = 8;

pub const RTC_DEFAULT_FREQ  : u32 = 2;
pub const RTC_MAX_FREQ      : u32 = 1024;
