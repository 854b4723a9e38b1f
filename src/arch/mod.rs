//! Platform seam. Everything the core needs from the CPU goes through [`Machine`].

mod hosted;

pub use hosted::{HostMachine, HostScreen};

use crate::mem::PhysAddr;
use crate::utils::ErrorNum;

pub trait Machine {
    /// Points the translation root at the directory stored at `root`. Also
    /// flushes non-global translations.
    fn load_page_directory(&self, root: PhysAddr);
    /// Turns on 4MB pages, global pages and translation, in that order.
    fn enable_paging(&self);
    fn paging_enabled(&self) -> bool;

    fn interrupts_enabled(&self) -> bool;
    fn disable_interrupts(&self);
    fn enable_interrupts(&self);
    /// Acknowledges interrupt line `irq` at the interrupt controller.
    fn end_of_interrupt(&self, irq: u8);

    fn read_phys(&self, pa: PhysAddr, buf: &mut [u8]) -> Result<(), ErrorNum>;
    fn write_phys(&self, pa: PhysAddr, data: &[u8]) -> Result<(), ErrorNum>;

    /// Kernel stack used on the next privilege change into the kernel.
    fn set_kernel_stack(&self, top: usize);
    fn kernel_stack(&self) -> usize;
}

/// Keeps interrupts off for its lifetime, restoring the previous state on drop.
pub struct IntrGuard<'a> {
    machine : &'a dyn Machine,
    restore : bool,
}

impl<'a> IntrGuard<'a> {
    pub fn new(machine: &'a dyn Machine) -> Self {
        let restore = machine.interrupts_enabled();
        machine.disable_interrupts();
        Self { machine, restore }
    }
}

impl Drop for IntrGuard<'_> {
    fn drop(&mut self) {
        if self.restore {
            self.machine.enable_interrupts();
        }
    }
}
