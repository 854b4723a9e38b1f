//! On-disk structures, little-endian and byte aligned so they can be viewed
//! straight out of the image.

use static_assertions::*;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, little_endian::U32};

use crate::config::{BLK_SIZE, BLOCKS_PER_INODE, FILENAME_LEN, MAX_DENTRIES};

pub const BOOT_HEADER_SIZE: usize = 64;
pub const DENTRY_SIZE: usize = 64;

/// Statistics header at the start of block 0.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned, Clone, Copy)]
#[repr(C)]
pub struct RawBootHeader {
    pub dentry_count    : U32,
    pub inode_count     : U32,
    pub data_count      : U32,
    pub reserved        : [u8; 52],
}

#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned, Clone, Copy)]
#[repr(C)]
pub struct RawDentry {
    pub name        : [u8; FILENAME_LEN],
    pub kind        : U32,
    pub inode       : U32,
    pub reserved    : [u8; 24],
}

#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct RawInode {
    pub length  : U32,
    pub blocks  : [U32; BLOCKS_PER_INODE],
}

assert_eq_size!(RawBootHeader, [u8; BOOT_HEADER_SIZE]);
assert_eq_size!(RawDentry, [u8; DENTRY_SIZE]);
assert_eq_size!(RawInode, [u8; BLK_SIZE]);
const_assert!(BOOT_HEADER_SIZE + MAX_DENTRIES * DENTRY_SIZE == BLK_SIZE);

impl RawDentry {
    /// Name up to its first NUL, at most 32 bytes.
    pub fn name(&self) -> &[u8] {
        let len = self.name.iter().position(|b| *b == 0).unwrap_or(FILENAME_LEN);
        &self.name[..len]
    }
}
