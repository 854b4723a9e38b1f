mod types;
mod fs;

pub use types::{
    RawBootHeader,
    RawDentry,
    RawInode,
    BOOT_HEADER_SIZE,
    DENTRY_SIZE,
};

pub use fs::{
    BootBlock,
    FileSystem,
};
