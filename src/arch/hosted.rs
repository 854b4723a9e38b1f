use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use super::Machine;
use crate::config::{ENTRIES_PER_TABLE, SMALL_PAGE_SIZE};
use crate::device::ConsoleOutput;
use crate::mem::{PageDirectoryEntry, PageFlags, PhysAddr};
use crate::utils::{ErrorNum, Mutex, SpinMutex};

/// 64MB of simulated RAM, enough for the kernel page and six user frames.
const DEFAULT_PHYS_SIZE: usize = 0x400_0000;

struct HostState {
    frames          : BTreeMap<usize, Box<[u8; SMALL_PAGE_SIZE]>>,
    root            : Option<PhysAddr>,
    root_loads      : usize,
    paging          : bool,
    interrupts      : bool,
    kernel_stack    : usize,
    acked           : BTreeMap<u8, usize>,
}

/// Simulated machine: sparse physical memory plus the few control registers the core touches.
pub struct HostMachine {
    phys_size   : usize,
    state       : SpinMutex<HostState>,
}

impl HostMachine {
    pub fn new() -> Self {
        Self::with_memory(DEFAULT_PHYS_SIZE)
    }

    pub fn with_memory(phys_size: usize) -> Self {
        Self {
            phys_size,
            state: SpinMutex::new("host machine", HostState {
                frames: BTreeMap::new(),
                root: None,
                root_loads: 0,
                paging: false,
                interrupts: false,
                kernel_stack: 0,
                acked: BTreeMap::new(),
            }),
        }
    }

    /// How many times the translation root has been (re)loaded.
    pub fn root_loads(&self) -> usize {
        self.state.acquire().root_loads
    }

    /// Physical address the translation root points at.
    pub fn root(&self) -> Option<PhysAddr> {
        self.state.acquire().root
    }

    fn read_word(&self, pa: PhysAddr) -> Option<u32> {
        let mut word = [0u8; 4];
        self.read_phys(pa, &mut word).ok()?;
        Some(u32::from_le_bytes(word))
    }

    /// Word at `index` of the directory in memory, as the hardware would read it.
    pub fn installed_entry(&self, index: usize) -> Option<u32> {
        if index >= ENTRIES_PER_TABLE {
            return None;
        }
        self.read_word(self.root()? + index * 4)
    }

    /// Second-level word reached through directory slot `slot`, if that slot
    /// holds a present table.
    pub fn installed_table_entry(&self, slot: usize, index: usize) -> Option<u32> {
        if index >= ENTRIES_PER_TABLE {
            return None;
        }
        match PageDirectoryEntry::decode(self.installed_entry(slot)?) {
            PageDirectoryEntry::Table { table, flags } if flags.contains(PageFlags::P) => {
                self.read_word(table + index * 4)
            }
            _ => None,
        }
    }

    /// Number of 4KB frames ever written.
    pub fn touched_frames(&self) -> usize {
        self.state.acquire().frames.len()
    }

    /// How many times `irq` was acknowledged.
    pub fn acknowledged(&self, irq: u8) -> usize {
        self.state.acquire().acked.get(&irq).copied().unwrap_or(0)
    }

    fn check_range(&self, pa: PhysAddr, len: usize) -> Result<(), ErrorNum> {
        match pa.0.checked_add(len) {
            Some(end) if end <= self.phys_size => Ok(()),
            _ => Err(ErrorNum::EFAULT),
        }
    }
}

impl Default for HostMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine for HostMachine {
    fn load_page_directory(&self, root: PhysAddr) {
        let mut state = self.state.acquire();
        state.root = Some(root);
        state.root_loads += 1;
    }

    fn enable_paging(&self) {
        self.state.acquire().paging = true;
    }

    fn paging_enabled(&self) -> bool {
        self.state.acquire().paging
    }

    fn interrupts_enabled(&self) -> bool {
        self.state.acquire().interrupts
    }

    fn disable_interrupts(&self) {
        self.state.acquire().interrupts = false;
    }

    fn enable_interrupts(&self) {
        self.state.acquire().interrupts = true;
    }

    fn end_of_interrupt(&self, irq: u8) {
        *self.state.acquire().acked.entry(irq).or_insert(0) += 1;
    }

    fn read_phys(&self, pa: PhysAddr, buf: &mut [u8]) -> Result<(), ErrorNum> {
        self.check_range(pa, buf.len())?;
        let state = self.state.acquire();
        let mut addr = pa.0;
        let mut done = 0;
        while done < buf.len() {
            let frame = addr & !(SMALL_PAGE_SIZE - 1);
            let offset = addr - frame;
            let len = (SMALL_PAGE_SIZE - offset).min(buf.len() - done);
            match state.frames.get(&frame) {
                Some(data) => buf[done..done + len].copy_from_slice(&data[offset..offset + len]),
                None => buf[done..done + len].fill(0),
            }
            done += len;
            addr += len;
        }
        Ok(())
    }

    fn write_phys(&self, pa: PhysAddr, data: &[u8]) -> Result<(), ErrorNum> {
        self.check_range(pa, data.len())?;
        let mut state = self.state.acquire();
        let mut addr = pa.0;
        let mut done = 0;
        while done < data.len() {
            let frame = addr & !(SMALL_PAGE_SIZE - 1);
            let offset = addr - frame;
            let len = (SMALL_PAGE_SIZE - offset).min(data.len() - done);
            let page = state.frames.entry(frame).or_insert_with(|| Box::new([0u8; SMALL_PAGE_SIZE]));
            page[offset..offset + len].copy_from_slice(&data[done..done + len]);
            done += len;
            addr += len;
        }
        Ok(())
    }

    fn set_kernel_stack(&self, top: usize) {
        self.state.acquire().kernel_stack = top;
    }

    fn kernel_stack(&self) -> usize {
        self.state.acquire().kernel_stack
    }
}

/// Display stand-in that records every byte written to it.
pub struct HostScreen {
    text: SpinMutex<Vec<u8>>,
}

impl HostScreen {
    pub fn new() -> Self {
        Self { text: SpinMutex::new("host screen", Vec::new()) }
    }

    pub fn contents(&self) -> Vec<u8> {
        self.text.acquire().clone()
    }

    pub fn clear(&self) {
        self.text.acquire().clear();
    }
}

impl Default for HostScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleOutput for HostScreen {
    fn put_bytes(&self, bytes: &[u8]) {
        self.text.acquire().extend_from_slice(bytes);
    }
}
