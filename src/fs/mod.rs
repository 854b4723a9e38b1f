mod types;
mod rofs;
mod file_ops;
pub mod image;

pub use types::{
    FileKind,
    Dentry,
    DriverEnv,
    FileOperations,
};

pub use rofs::{
    BootBlock,
    FileSystem,
};

pub use file_ops::{
    RegularFileOps,
    DirectoryOps,
    REGULAR_FILE_OPS,
    DIRECTORY_OPS,
};
