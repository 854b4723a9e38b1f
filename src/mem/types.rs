use core::fmt::{self, Debug, Formatter};
use core::ops;

use crate::config::{BIG_PAGE_OFFSET, BIG_PAGE_SIZE, ENTRIES_PER_TABLE, SMALL_PAGE_OFFSET, SMALL_PAGE_SIZE};

#[repr(C)]
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct VirtAddr(pub usize);

#[repr(C)]
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct PhysAddr(pub usize);

impl Debug for VirtAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("VA<{:#x}>", self.0))
    }
}

impl Debug for PhysAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("PA<{:#x}>", self.0))
    }
}

impl From<usize> for PhysAddr { fn from(num: usize) -> Self { Self(num) } }
impl From<usize> for VirtAddr { fn from(num: usize) -> Self { Self(num) } }

impl ops::Add<usize> for VirtAddr {
    type Output = VirtAddr;
    fn add(self, rhs: usize) -> VirtAddr {
        VirtAddr(self.0 + rhs)
    }
}

impl ops::AddAssign<usize> for VirtAddr {
    fn add_assign(&mut self, rhs: usize) {
        self.0 += rhs;
    }
}

impl ops::Sub<VirtAddr> for VirtAddr {
    type Output = usize;
    fn sub(self, rhs: VirtAddr) -> usize {
        self.0 - rhs.0
    }
}

impl ops::Add<usize> for PhysAddr {
    type Output = PhysAddr;
    fn add(self, rhs: usize) -> PhysAddr {
        PhysAddr(self.0 + rhs)
    }
}

impl ops::Sub<PhysAddr> for PhysAddr {
    type Output = usize;
    fn sub(self, rhs: PhysAddr) -> usize {
        self.0 - rhs.0
    }
}

impl VirtAddr {
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Page directory slot covering this address.
    pub fn dir_index(&self) -> usize {
        (self.0 >> BIG_PAGE_OFFSET) & (ENTRIES_PER_TABLE - 1)
    }

    /// Page table slot covering this address inside a 4KB-granular directory slot.
    pub fn table_index(&self) -> usize {
        (self.0 >> SMALL_PAGE_OFFSET) & (ENTRIES_PER_TABLE - 1)
    }

    pub fn big_page_offset(&self) -> usize {
        self.0 & (BIG_PAGE_SIZE - 1)
    }

    pub fn small_page_offset(&self) -> usize {
        self.0 & (SMALL_PAGE_SIZE - 1)
    }
}

impl PhysAddr {
    pub fn is_big_aligned(&self) -> bool {
        self.0 & (BIG_PAGE_SIZE - 1) == 0
    }
}
