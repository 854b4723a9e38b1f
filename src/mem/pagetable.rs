use bitflags::*;
use static_assertions::*;

use super::PhysAddr;
use crate::config::{ENTRIES_PER_TABLE, SMALL_PAGE_SIZE};

bitflags! {
    /// Access flags shared by directory and table entries on IA-32.
    pub struct PageFlags: u32 {
        /// present
        const P   = 1 << 0;
        /// writable
        const RW  = 1 << 1;
        /// user accessible
        const US  = 1 << 2;
        /// write-through
        const PWT = 1 << 3;
        /// cache disabled
        const PCD = 1 << 4;
        /// accessed
        const A   = 1 << 5;
        /// dirty, only meaningful for leaf mappings
        const D   = 1 << 6;
        /// global, survives a root reload
        const G   = 1 << 8;
    }
}

/// Page size bit of a directory entry. Owned by [`PageDirectoryEntry`], never by callers.
const PS_BIT: u32 = 1 << 7;
const BIG_FRAME_MASK: u32 = 0xFFC0_0000;
const SMALL_FRAME_MASK: u32 = 0xFFFF_F000;
const FLAG_MASK: u32 = 0x0000_017F;

/// One slot of the page directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirectoryEntry {
    /// Maps a whole 4MB frame.
    Big { frame: PhysAddr, flags: PageFlags },
    /// Refers to a page table of 4KB mappings.
    Table { table: PhysAddr, flags: PageFlags },
}

impl PageDirectoryEntry {
    pub const fn empty() -> Self {
        Self::Table { table: PhysAddr(0), flags: PageFlags::empty() }
    }

    pub fn flags(&self) -> PageFlags {
        match self {
            Self::Big { flags, .. } | Self::Table { flags, .. } => *flags,
        }
    }

    pub fn present(&self) -> bool {
        self.flags().contains(PageFlags::P)
    }

    pub fn user(&self) -> bool {
        self.flags().contains(PageFlags::US)
    }

    /// Hardware word for this entry.
    pub fn encode(&self) -> u32 {
        match self {
            Self::Big { frame, flags } => (frame.0 as u32 & BIG_FRAME_MASK) | PS_BIT | flags.bits(),
            // global and dirty are ignored by the MMU on table references
            Self::Table { table, flags } => {
                let flags = *flags - PageFlags::G - PageFlags::D;
                (table.0 as u32 & SMALL_FRAME_MASK) | flags.bits()
            }
        }
    }

    pub fn decode(bits: u32) -> Self {
        let flags = PageFlags::from_bits_truncate(bits & FLAG_MASK);
        if bits & PS_BIT != 0 {
            Self::Big { frame: PhysAddr((bits & BIG_FRAME_MASK) as usize), flags }
        } else {
            Self::Table { table: PhysAddr((bits & SMALL_FRAME_MASK) as usize), flags }
        }
    }
}

/// A 4KB mapping.
///` 31                        12 11    8 7 6 5 4 3 2 1 0`
///`|         frame              | avl |G|0|D|A|C|W|U|R|P|`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(C)]
pub struct PageTableEntry {
    pub bits: u32
}

impl PageTableEntry {
    pub fn new(frame: PhysAddr, flags: PageFlags) -> Self {
        Self {
            bits: (frame.0 as u32 & SMALL_FRAME_MASK) | flags.bits()
        }
    }

    pub const fn empty() -> Self {
        Self {bits: 0}
    }

    pub fn frame(&self) -> PhysAddr {
        PhysAddr((self.bits & SMALL_FRAME_MASK) as usize)
    }

    pub fn flags(&self) -> PageFlags {
        PageFlags::from_bits_truncate(self.bits)
    }

    pub fn present(&self) -> bool {
        self.flags().contains(PageFlags::P)
    }

    pub fn user(&self) -> bool {
        self.flags().contains(PageFlags::US)
    }
}

/// Top-level table, stored in hardware format so the root register can point at it.
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [u32; ENTRIES_PER_TABLE]
}

#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageTableEntry; ENTRIES_PER_TABLE]
}

assert_eq_size!(PageDirectory, [u8; SMALL_PAGE_SIZE]);
assert_eq_size!(PageTable, [u8; SMALL_PAGE_SIZE]);

impl PageDirectory {
    pub const fn new() -> Self {
        Self { entries: [0; ENTRIES_PER_TABLE] }
    }

    pub fn get(&self, index: usize) -> Option<PageDirectoryEntry> {
        self.entries.get(index).map(|bits| PageDirectoryEntry::decode(*bits))
    }

    /// Out-of-range indices are ignored; layout code only ever passes fixed slots.
    pub fn set(&mut self, index: usize, entry: PageDirectoryEntry) {
        if let Some(slot) = self.entries.get_mut(index) {
            *slot = entry.encode();
        }
    }

    pub fn raw(&self) -> &[u32; ENTRIES_PER_TABLE] {
        &self.entries
    }
}

impl Default for PageDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl PageTable {
    pub const fn new() -> Self {
        Self { entries: [PageTableEntry::empty(); ENTRIES_PER_TABLE] }
    }

    pub fn get(&self, index: usize) -> Option<PageTableEntry> {
        self.entries.get(index).copied()
    }

    pub fn set(&mut self, index: usize, entry: PageTableEntry) {
        if let Some(slot) = self.entries.get_mut(index) {
            *slot = entry;
        }
    }

    pub fn words(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().map(|entry| entry.bits)
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}
