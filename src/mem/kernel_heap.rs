//! Kernel dynamic memory allocator, bare-metal builds only.

use core::ptr::addr_of_mut;
use core::sync::atomic::{AtomicBool, Ordering};

use buddy_system_allocator::LockedHeap;
use crate::config::KERNEL_HEAP_SIZE;

#[global_allocator]
static KERNEL_HEAP_ALLOCATOR: LockedHeap<32> = LockedHeap::empty();

static mut HEAP_SPACE: [u8; KERNEL_HEAP_SIZE] = [0; KERNEL_HEAP_SIZE];
static HEAP_READY: AtomicBool = AtomicBool::new(false);

/// Hands the static heap area to the allocator. Later calls do nothing.
pub fn init_kernel_heap() {
    if HEAP_READY.swap(true, Ordering::AcqRel) {
        return;
    }
    unsafe {
        KERNEL_HEAP_ALLOCATOR.lock().init(addr_of_mut!(HEAP_SPACE) as usize, KERNEL_HEAP_SIZE);
    }
}
