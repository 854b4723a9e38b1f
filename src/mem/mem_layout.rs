use crate::arch::Machine;
use crate::config::*;
use crate::utils::ErrorNum;
use crate::{info, verbose, fatal};

use super::{PageDirectory, PageDirectoryEntry, PageFlags, PageTable, PageTableEntry, PhysAddr, VirtAddr};

/// Result of walking the directory for one virtual address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    pub pa          : PhysAddr,
    /// Bytes from `pa` to the end of the mapping page.
    pub remaining   : usize,
    pub user        : bool,
    pub writable    : bool,
}

/// The kernel's only address space. Slots 0 and 1 are fixed at construction,
/// the user image slot follows the running process and the user video slot
/// appears on request.
pub struct MemLayout {
    directory           : PageDirectory,
    video_table         : PageTable,
    user_video_table    : PageTable,
    activated           : bool,
}

impl MemLayout {
    pub fn new() -> Self {
        let mut layout = Self {
            directory: PageDirectory::new(),
            video_table: PageTable::new(),
            user_video_table: PageTable::new(),
            activated: false,
        };

        layout.video_table.set(VIDEO_TABLE_INDEX, PageTableEntry::new(VIDEO_MEM_ADDR, PageFlags::P | PageFlags::RW));
        layout.directory.set(VIDEO_SLOT, PageDirectoryEntry::Table {
            table: VIDEO_TABLE_ADDR,
            flags: PageFlags::P | PageFlags::RW,
        });
        verbose!("Mapping video memory {:?} through table {:?}", VIDEO_MEM_ADDR, VIDEO_TABLE_ADDR);

        layout.directory.set(KERNEL_SLOT, PageDirectoryEntry::Big {
            frame: KERNEL_BASE,
            flags: PageFlags::P | PageFlags::RW | PageFlags::G,
        });
        verbose!("Mapping kernel image at {:?}", KERNEL_BASE);

        layout
    }

    /// Writes both tables and the directory to their physical homes, installs
    /// the directory and turns translation on. Boot only.
    pub fn activate(&mut self, machine: &dyn Machine) -> Result<(), ErrorNum> {
        if self.activated {
            fatal!("Paging activated twice");
            return Err(ErrorNum::EPERM);
        }
        store_table(machine, VIDEO_TABLE_ADDR, self.video_table.words())?;
        store_table(machine, USER_VIDEO_TABLE_ADDR, self.user_video_table.words())?;
        store_table(machine, PAGE_DIRECTORY_ADDR, self.directory.raw().iter().copied())?;
        machine.load_page_directory(PAGE_DIRECTORY_ADDR);
        machine.enable_paging();
        self.activated = true;
        info!("Paging enabled, kernel at {:?}", KERNEL_BASE);
        Ok(())
    }

    pub fn activated(&self) -> bool {
        self.activated
    }

    pub fn directory(&self) -> &PageDirectory {
        &self.directory
    }

    /// Points the user image window at `frame` and flushes stale translations.
    pub fn remap_user_window(&mut self, frame: PhysAddr, machine: &dyn Machine) -> Result<(), ErrorNum> {
        if !frame.is_big_aligned() {
            return Err(ErrorNum::EINVAL);
        }
        self.set_slot(USER_IMAGE_SLOT, PageDirectoryEntry::Big {
            frame,
            flags: PageFlags::P | PageFlags::RW | PageFlags::US,
        }, machine)?;
        verbose!("User window now backed by {:?}", frame);
        Ok(())
    }

    pub fn unmap_user_window(&mut self, machine: &dyn Machine) -> Result<(), ErrorNum> {
        self.set_slot(USER_IMAGE_SLOT, PageDirectoryEntry::empty(), machine)?;
        verbose!("User window unmapped");
        Ok(())
    }

    /// Updates one directory slot. Once paging is on, the installed copy is
    /// patched too and the root reloaded.
    fn set_slot(&mut self, slot: usize, entry: PageDirectoryEntry, machine: &dyn Machine) -> Result<(), ErrorNum> {
        self.directory.set(slot, entry);
        if self.activated {
            machine.write_phys(PAGE_DIRECTORY_ADDR + slot * 4, &entry.encode().to_le_bytes())?;
            machine.load_page_directory(PAGE_DIRECTORY_ADDR);
        }
        Ok(())
    }

    /// Frame currently behind the user image window.
    pub fn user_window_frame(&self) -> Option<PhysAddr> {
        self.lookup_big(USER_IMAGE_SLOT).map(|(frame, _)| frame)
    }

    /// Opt-in: make display memory reachable from user mode through its own slot.
    pub fn expose_user_video(&mut self, machine: &dyn Machine) -> Result<(), ErrorNum> {
        self.user_video_table.set(
            VIDEO_TABLE_INDEX,
            PageTableEntry::new(VIDEO_MEM_ADDR, PageFlags::P | PageFlags::RW | PageFlags::US),
        );
        if self.activated {
            store_table(machine, USER_VIDEO_TABLE_ADDR, self.user_video_table.words())?;
        }
        self.set_slot(USER_VIDEO_SLOT, PageDirectoryEntry::Table {
            table: USER_VIDEO_TABLE_ADDR,
            flags: PageFlags::P | PageFlags::RW | PageFlags::US,
        }, machine)?;
        info!("Display memory exposed to user at {:?}", USER_VIDEO_ADDR);
        Ok(())
    }

    fn table_at(&self, addr: PhysAddr) -> Option<&PageTable> {
        match addr {
            VIDEO_TABLE_ADDR => Some(&self.video_table),
            USER_VIDEO_TABLE_ADDR => Some(&self.user_video_table),
            _ => None,
        }
    }

    /// Present 4KB mapping at `dir_index`/`table_index`, if any.
    pub fn lookup_small(&self, dir_index: usize, table_index: usize) -> Option<PageTableEntry> {
        match self.directory.get(dir_index)? {
            PageDirectoryEntry::Table { table, flags } if flags.contains(PageFlags::P) => {
                let entry = self.table_at(table)?.get(table_index)?;
                entry.present().then_some(entry)
            }
            _ => None,
        }
    }

    /// Present 4MB mapping at `dir_index`, if any.
    pub fn lookup_big(&self, dir_index: usize) -> Option<(PhysAddr, PageFlags)> {
        match self.directory.get(dir_index)? {
            PageDirectoryEntry::Big { frame, flags } if flags.contains(PageFlags::P) => Some((frame, flags)),
            _ => None,
        }
    }

    pub fn translate(&self, va: VirtAddr) -> Option<Translation> {
        if let Some((frame, flags)) = self.lookup_big(va.dir_index()) {
            let offset = va.big_page_offset();
            return Some(Translation {
                pa: frame + offset,
                remaining: BIG_PAGE_SIZE - offset,
                user: flags.contains(PageFlags::US),
                writable: flags.contains(PageFlags::RW),
            });
        }
        let dir_flags = self.directory.get(va.dir_index())?.flags();
        let entry = self.lookup_small(va.dir_index(), va.table_index())?;
        let offset = va.small_page_offset();
        Some(Translation {
            pa: entry.frame() + offset,
            remaining: SMALL_PAGE_SIZE - offset,
            user: dir_flags.contains(PageFlags::US) && entry.user(),
            writable: dir_flags.contains(PageFlags::RW) && entry.flags().contains(PageFlags::RW),
        })
    }

    /// Like [`Self::translate`], but only for pages user mode may touch.
    pub fn translate_user(&self, va: VirtAddr) -> Option<Translation> {
        self.translate(va).filter(|t| t.user)
    }
}

/// Writes one table in hardware format at `base`.
fn store_table(machine: &dyn Machine, base: PhysAddr, words: impl Iterator<Item = u32>) -> Result<(), ErrorNum> {
    let mut page = [0u8; SMALL_PAGE_SIZE];
    for (chunk, word) in page.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    machine.write_phys(base, &page)
}

impl Default for MemLayout {
    fn default() -> Self {
        Self::new()
    }
}
