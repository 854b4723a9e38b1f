use core::convert::TryFrom;

use zerocopy::FromBytes;

use crate::config::{BLK_SIZE, BLOCKS_PER_INODE, FILENAME_LEN, MAX_DENTRIES};
use crate::fs::{Dentry, FileKind};
use crate::utils::ErrorNum;
use crate::{info, verbose, warning};

use super::types::{RawBootHeader, RawDentry, RawInode, BOOT_HEADER_SIZE, DENTRY_SIZE};

/// Counts from the boot block, read once at mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootBlock {
    pub dentry_count    : u32,
    pub inode_count     : u32,
    pub data_count      : u32,
}

/// Read-only view over a filesystem image that stays mapped for the kernel's lifetime.
pub struct FileSystem {
    image   : &'static [u8],
    boot    : BootBlock,
}

/// Bytes needed for the boot block plus `inodes` inode blocks and `data` data
/// blocks, or `None` when that does not fit the address space.
pub(super) fn image_len_for(inodes: usize, data: usize) -> Option<usize> {
    inodes.checked_add(data)?.checked_add(1)?.checked_mul(BLK_SIZE)
}

impl FileSystem {
    pub fn mount(image: &'static [u8]) -> Result<Self, ErrorNum> {
        let (header, _) = RawBootHeader::ref_from_prefix(image).map_err(|_| ErrorNum::EBADFS)?;
        let boot = BootBlock {
            dentry_count: header.dentry_count.get(),
            inode_count: header.inode_count.get(),
            data_count: header.data_count.get(),
        };
        if boot.dentry_count as usize > MAX_DENTRIES {
            return Err(ErrorNum::EBADFS);
        }
        let needed = image_len_for(boot.inode_count as usize, boot.data_count as usize)
            .ok_or(ErrorNum::EBADFS)?;
        if image.len() < needed {
            return Err(ErrorNum::EBADFS);
        }
        info!(
            "Mounted filesystem: {} entries, {} inodes, {} data blocks",
            boot.dentry_count, boot.inode_count, boot.data_count
        );
        Ok(Self { image, boot })
    }

    pub fn boot_block(&self) -> BootBlock {
        self.boot
    }

    fn raw_dentry(&self, index: u32) -> Result<&RawDentry, ErrorNum> {
        if index >= self.boot.dentry_count {
            return Err(ErrorNum::EOOR);
        }
        let start = BOOT_HEADER_SIZE + index as usize * DENTRY_SIZE;
        RawDentry::ref_from_bytes(&self.image[start..start + DENTRY_SIZE]).map_err(|_| ErrorNum::EBADFS)
    }

    fn raw_inode(&self, inode: u32) -> Result<&RawInode, ErrorNum> {
        if inode >= self.boot.inode_count {
            return Err(ErrorNum::EOOR);
        }
        let start = (1 + inode as usize) * BLK_SIZE;
        RawInode::ref_from_bytes(&self.image[start..start + BLK_SIZE]).map_err(|_| ErrorNum::EBADFS)
    }

    fn data_block(&self, block: u32) -> Option<&[u8]> {
        if block >= self.boot.data_count {
            return None;
        }
        let start = (1 + self.boot.inode_count as usize + block as usize) * BLK_SIZE;
        Some(&self.image[start..start + BLK_SIZE])
    }

    fn to_dentry(raw: &RawDentry) -> Result<Dentry, ErrorNum> {
        let kind = FileKind::try_from(raw.kind.get())?;
        if kind == FileKind::Console {
            return Err(ErrorNum::EBADTYPE);
        }
        let mut name = [0u8; FILENAME_LEN];
        let src = raw.name();
        name[..src.len()].copy_from_slice(src);
        // only regular files own an inode
        let inode = match kind {
            FileKind::Regular => raw.inode.get(),
            _ => 0,
        };
        Ok(Dentry { name, kind, inode })
    }

    pub fn resolve_by_name(&self, name: &[u8]) -> Result<Dentry, ErrorNum> {
        if name.is_empty() || name.len() > FILENAME_LEN {
            return Err(ErrorNum::ENOENT);
        }
        for index in 0..self.boot.dentry_count {
            let raw = self.raw_dentry(index)?;
            if raw.name() == name {
                return Self::to_dentry(raw);
            }
        }
        Err(ErrorNum::ENOENT)
    }

    pub fn resolve_by_index(&self, index: u32) -> Result<Dentry, ErrorNum> {
        Self::to_dentry(self.raw_dentry(index)?)
    }

    pub fn file_length(&self, inode: u32) -> Result<u32, ErrorNum> {
        Ok(self.raw_inode(inode)?.length.get())
    }

    /// Copies bytes of `inode` starting at `offset` into `buf`.
    ///
    /// `cursor` is the index into the inode's block list of the block holding
    /// `offset`; it is advanced past every block consumed so that the next
    /// call continues without rescanning. Without a cursor the walk starts at
    /// the `offset / BLK_SIZE`-th valid entry of the list, so both forms see
    /// the same bytes. Block ids beyond the data region are skipped.
    pub fn read_data(&self, inode: u32, offset: u32, buf: &mut [u8], cursor: Option<&mut u32>) -> Result<usize, ErrorNum> {
        let raw = self.raw_inode(inode)?;
        let length = raw.length.get() as usize;
        let mut pos = offset as usize;
        if pos >= length {
            return Ok(0);
        }

        let mut index = match cursor.as_deref() {
            Some(cursor) => *cursor as usize,
            None => raw.blocks.iter()
                .enumerate()
                .filter(|(_, id)| self.data_block(id.get()).is_some())
                .nth(pos / BLK_SIZE)
                .map_or(BLOCKS_PER_INODE, |(index, _)| index),
        };
        let mut copied = 0;
        while copied < buf.len() && pos < length && index < BLOCKS_PER_INODE {
            let block_id = raw.blocks[index].get();
            let block = match self.data_block(block_id) {
                Some(block) => block,
                None => {
                    warning!("inode {} lists invalid data block {} at index {}, skipped", inode, block_id, index);
                    index += 1;
                    continue;
                }
            };
            let in_block = pos % BLK_SIZE;
            let len = (BLK_SIZE - in_block).min(buf.len() - copied).min(length - pos);
            buf[copied..copied + len].copy_from_slice(&block[in_block..in_block + len]);
            copied += len;
            pos += len;
            if pos % BLK_SIZE == 0 {
                index += 1;
            }
        }

        if let Some(cursor) = cursor {
            *cursor = index as u32;
        }
        verbose!("read {} bytes from inode {} at offset {}", copied, inode, offset);
        Ok(copied)
    }
}
