use crate::arch::Machine;
use crate::utils::ErrorNum;

use super::{MemLayout, VirtAddr};

/// Copies `data` into user memory at `va`, page by page.
pub fn copy_to_user(layout: &MemLayout, machine: &dyn Machine, va: VirtAddr, data: &[u8]) -> Result<(), ErrorNum> {
    let mut va = va;
    let mut done = 0;
    while done < data.len() {
        let t = layout.translate_user(va).ok_or(ErrorNum::EFAULT)?;
        if !t.writable {
            return Err(ErrorNum::EFAULT);
        }
        let len = t.remaining.min(data.len() - done);
        machine.write_phys(t.pa, &data[done..done + len])?;
        done += len;
        va += len;
    }
    Ok(())
}

pub fn copy_from_user(layout: &MemLayout, machine: &dyn Machine, va: VirtAddr, buf: &mut [u8]) -> Result<(), ErrorNum> {
    let mut va = va;
    let mut done = 0;
    while done < buf.len() {
        let t = layout.translate_user(va).ok_or(ErrorNum::EFAULT)?;
        let len = t.remaining.min(buf.len() - done);
        machine.read_phys(t.pa, &mut buf[done..done + len])?;
        done += len;
        va += len;
    }
    Ok(())
}

/// Checks that `len` bytes at `va` are mapped for user mode, and writable if asked.
pub fn check_user_range(layout: &MemLayout, va: VirtAddr, len: usize, write: bool) -> Result<(), ErrorNum> {
    let mut va = va;
    let mut left = len;
    while left > 0 {
        let t = layout.translate_user(va).ok_or(ErrorNum::EFAULT)?;
        if write && !t.writable {
            return Err(ErrorNum::EFAULT);
        }
        let len = t.remaining.min(left);
        left -= len;
        va += len;
    }
    Ok(())
}

/// Reads a NUL-terminated string into `buf`. Returns its length; a result of
/// `buf.len()` means no terminator was found within the buffer.
pub fn read_user_cstr(layout: &MemLayout, machine: &dyn Machine, va: VirtAddr, buf: &mut [u8]) -> Result<usize, ErrorNum> {
    if va.is_null() {
        return Err(ErrorNum::EFAULT);
    }
    for i in 0..buf.len() {
        let t = layout.translate_user(va + i).ok_or(ErrorNum::EFAULT)?;
        let mut byte = [0u8];
        machine.read_phys(t.pa, &mut byte)?;
        if byte[0] == 0 {
            return Ok(i);
        }
        buf[i] = byte[0];
    }
    Ok(buf.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::HostMachine;
    use crate::config::{BIG_PAGE_SIZE, USER_WINDOW_BASE};
    use crate::mem::PhysAddr;

    fn mapped() -> (HostMachine, MemLayout) {
        let machine = HostMachine::new();
        let mut layout = MemLayout::new();
        layout.activate(&machine).unwrap();
        layout.remap_user_window(PhysAddr(0x80_0000), &machine).unwrap();
        (machine, layout)
    }

    #[test]
    fn string_round_trip_in_window() {
        let (machine, layout) = mapped();
        let va = USER_WINDOW_BASE + 0x100;
        copy_to_user(&layout, &machine, va, b"shell\0").unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(read_user_cstr(&layout, &machine, va, &mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"shell");

        let mut short = [0u8; 3];
        assert_eq!(read_user_cstr(&layout, &machine, va, &mut short).unwrap(), 3);
    }

    #[test]
    fn copies_stop_at_window_edge() {
        let (machine, layout) = mapped();
        let end = USER_WINDOW_BASE + (BIG_PAGE_SIZE - 2);
        assert_eq!(copy_to_user(&layout, &machine, end, &[1, 2, 3, 4]), Err(ErrorNum::EFAULT));
        let mut buf = [0u8; 4];
        assert_eq!(copy_from_user(&layout, &machine, VirtAddr(0x40_0000), &mut buf), Err(ErrorNum::EFAULT));
        assert_eq!(read_user_cstr(&layout, &machine, VirtAddr(0), &mut buf), Err(ErrorNum::EFAULT));
    }
}
