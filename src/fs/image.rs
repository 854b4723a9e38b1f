//! Builds filesystem images in memory, for tests and host-side tooling.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use zerocopy::IntoBytes;
use zerocopy::little_endian::U32;

use crate::config::{BLK_SIZE, BLOCKS_PER_INODE, FILENAME_LEN, MAX_DENTRIES};
use crate::fs::FileKind;
use crate::utils::ErrorNum;

use super::rofs::{RawBootHeader, RawDentry, RawInode, BOOT_HEADER_SIZE, DENTRY_SIZE};

/// Block id guaranteed to be outside any image this builder produces.
pub const INVALID_BLOCK: u32 = u32::MAX;

struct Entry {
    name        : Vec<u8>,
    kind        : FileKind,
    data        : Vec<u8>,
    bad_blocks  : Vec<usize>,
}

#[derive(Default)]
pub struct ImageBuilder {
    entries: Vec<Entry>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, name: &str, kind: FileKind, data: &[u8], bad_blocks: &[usize]) -> Self {
        self.entries.push(Entry {
            name: name.as_bytes().to_vec(),
            kind,
            data: data.to_vec(),
            bad_blocks: bad_blocks.to_vec(),
        });
        self
    }

    pub fn directory(self, name: &str) -> Self {
        self.push(name, FileKind::Directory, &[], &[])
    }

    pub fn device(self, name: &str) -> Self {
        self.push(name, FileKind::Device, &[], &[])
    }

    pub fn file(self, name: &str, data: &[u8]) -> Self {
        self.push(name, FileKind::Regular, data, &[])
    }

    /// Regular file whose block list carries [`INVALID_BLOCK`] at the given list positions.
    pub fn file_with_bad_blocks(self, name: &str, data: &[u8], positions: &[usize]) -> Self {
        self.push(name, FileKind::Regular, data, positions)
    }

    pub fn build(&self) -> Result<Vec<u8>, ErrorNum> {
        if self.entries.len() > MAX_DENTRIES {
            return Err(ErrorNum::EOOR);
        }
        let regular: Vec<&Entry> = self.entries.iter().filter(|e| e.kind == FileKind::Regular).collect();
        let inode_count = regular.len();
        let data_count: usize = regular.iter().map(|e| e.data.len().div_ceil(BLK_SIZE)).sum();
        let mut image = vec![0u8; (1 + inode_count + data_count) * BLK_SIZE];

        let header = RawBootHeader {
            dentry_count: U32::new(self.entries.len() as u32),
            inode_count: U32::new(inode_count as u32),
            data_count: U32::new(data_count as u32),
            reserved: [0; 52],
        };
        image[..BOOT_HEADER_SIZE].copy_from_slice(header.as_bytes());

        let mut next_inode = 0usize;
        let mut next_block = 0usize;
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.name.is_empty() || entry.name.len() > FILENAME_LEN {
                return Err(ErrorNum::EINVAL);
            }
            let mut dentry = RawDentry {
                name: [0; FILENAME_LEN],
                kind: U32::new(entry.kind as u32),
                inode: U32::new(0),
                reserved: [0; 24],
            };
            dentry.name[..entry.name.len()].copy_from_slice(&entry.name);

            if entry.kind == FileKind::Regular {
                dentry.inode = U32::new(next_inode as u32);
                let inode_start = (1 + next_inode) * BLK_SIZE;
                let mut inode = RawInode {
                    length: U32::new(entry.data.len() as u32),
                    blocks: [U32::new(0); BLOCKS_PER_INODE],
                };
                let mut slot = 0usize;
                for chunk in entry.data.chunks(BLK_SIZE) {
                    while entry.bad_blocks.contains(&slot) {
                        *inode.blocks.get_mut(slot).ok_or(ErrorNum::EOOR)? = U32::new(INVALID_BLOCK);
                        slot += 1;
                    }
                    *inode.blocks.get_mut(slot).ok_or(ErrorNum::EOOR)? = U32::new(next_block as u32);
                    let block_start = (1 + inode_count + next_block) * BLK_SIZE;
                    image[block_start..block_start + chunk.len()].copy_from_slice(chunk);
                    next_block += 1;
                    slot += 1;
                }
                image[inode_start..inode_start + BLK_SIZE].copy_from_slice(inode.as_bytes());
                next_inode += 1;
            }

            let start = BOOT_HEADER_SIZE + index * DENTRY_SIZE;
            image[start..start + DENTRY_SIZE].copy_from_slice(dentry.as_bytes());
        }
        Ok(image)
    }

    /// Builds the image and leaks it, matching the boot-time contract of an image that is never unmapped.
    pub fn leak(&self) -> Result<&'static [u8], ErrorNum> {
        Ok(Box::leak(self.build()?.into_boxed_slice()))
    }
}
