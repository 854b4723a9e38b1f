use crate::process::{FdTable, FileDescriptor};
use crate::utils::ErrorNum;
use crate::verbose;

use super::{Dentry, DriverEnv, FileKind, FileOperations};

pub struct RegularFileOps;
pub struct DirectoryOps;

pub static REGULAR_FILE_OPS: RegularFileOps = RegularFileOps;
pub static DIRECTORY_OPS: DirectoryOps = DirectoryOps;

fn expect_kind(desc: &FileDescriptor, kind: FileKind) -> Result<(), ErrorNum> {
    if !desc.in_use() {
        return Err(ErrorNum::EBADF);
    }
    if desc.kind() != Some(kind) {
        return Err(ErrorNum::EBADTYPE);
    }
    Ok(())
}

impl FileOperations for RegularFileOps {
    fn name(&self) -> &'static str {
        "regular"
    }

    fn open(&self, _env: &DriverEnv, fds: &mut FdTable, dentry: &Dentry) -> Result<usize, ErrorNum> {
        if dentry.kind != FileKind::Regular {
            return Err(ErrorNum::EBADTYPE);
        }
        let fd = fds.free_slot()?;
        fds.install(fd, FileDescriptor::new(&REGULAR_FILE_OPS, FileKind::Regular, dentry.inode))?;
        verbose!("opened {:?} as fd {}", dentry, fd);
        Ok(fd)
    }

    fn close(&self, _env: &DriverEnv, _fd: usize, desc: &mut FileDescriptor) -> Result<(), ErrorNum> {
        expect_kind(desc, FileKind::Regular)?;
        desc.clear();
        Ok(())
    }

    fn read(&self, env: &DriverEnv, _fd: usize, desc: &mut FileDescriptor, buf: &mut [u8]) -> Result<usize, ErrorNum> {
        expect_kind(desc, FileKind::Regular)?;
        let mut cursor = desc.block_index();
        let read = env.fs.read_data(desc.inode, desc.position, buf, Some(&mut cursor))?;
        desc.position += read as u32;
        desc.set_block_index(cursor);
        Ok(read)
    }

    fn write(&self, _env: &DriverEnv, _fd: usize, _desc: &mut FileDescriptor, _buf: &[u8]) -> Result<usize, ErrorNum> {
        Err(ErrorNum::EROFS)
    }
}

impl FileOperations for DirectoryOps {
    fn name(&self) -> &'static str {
        "directory"
    }

    fn open(&self, _env: &DriverEnv, fds: &mut FdTable, dentry: &Dentry) -> Result<usize, ErrorNum> {
        if dentry.kind != FileKind::Directory {
            return Err(ErrorNum::EBADTYPE);
        }
        let fd = fds.free_slot()?;
        fds.install(fd, FileDescriptor::new(&DIRECTORY_OPS, FileKind::Directory, 0))?;
        Ok(fd)
    }

    fn close(&self, _env: &DriverEnv, _fd: usize, desc: &mut FileDescriptor) -> Result<(), ErrorNum> {
        expect_kind(desc, FileKind::Directory)?;
        desc.clear();
        Ok(())
    }

    /// One entry name per call.
    fn read(&self, env: &DriverEnv, _fd: usize, desc: &mut FileDescriptor, buf: &mut [u8]) -> Result<usize, ErrorNum> {
        expect_kind(desc, FileKind::Directory)?;
        if desc.position >= env.fs.boot_block().dentry_count {
            return Ok(0);
        }
        let dentry = env.fs.resolve_by_index(desc.position)?;
        let name = dentry.name();
        let len = name.len().min(buf.len());
        buf[..len].copy_from_slice(&name[..len]);
        desc.position += 1;
        Ok(len)
    }

    fn write(&self, _env: &DriverEnv, _fd: usize, _desc: &mut FileDescriptor, _buf: &[u8]) -> Result<usize, ErrorNum> {
        Err(ErrorNum::EROFS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::HostMachine;
    use crate::device::{Rtc, Terminal};
    use crate::fs::image::ImageBuilder;
    use crate::fs::FileSystem;

    fn fixture() -> (FileSystem, Terminal, Rtc, HostMachine) {
        let image = ImageBuilder::new()
            .directory(".")
            .device("rtc")
            .file("hello", b"hello world")
            .leak()
            .unwrap();
        (FileSystem::mount(image).unwrap(), Terminal::new(), Rtc::new(), HostMachine::new())
    }

    #[test]
    fn open_accepts_only_its_own_kind() {
        let (fs, terminal, rtc, machine) = fixture();
        let env = DriverEnv { fs: &fs, terminal: &terminal, rtc: &rtc, machine: &machine };
        let dir = fs.resolve_by_name(b".").unwrap();
        let dev = fs.resolve_by_name(b"rtc").unwrap();
        let file = fs.resolve_by_name(b"hello").unwrap();
        let mut fds = FdTable::with_console();

        for dentry in [&dir, &dev] {
            assert_eq!(REGULAR_FILE_OPS.open(&env, &mut fds, dentry), Err(ErrorNum::EBADTYPE));
        }
        for dentry in [&file, &dev] {
            assert_eq!(DIRECTORY_OPS.open(&env, &mut fds, dentry), Err(ErrorNum::EBADTYPE));
        }
        assert_eq!(fds.open_count(), 2);

        assert_eq!(REGULAR_FILE_OPS.open(&env, &mut fds, &file), Ok(2));
        assert_eq!(DIRECTORY_OPS.open(&env, &mut fds, &dir), Ok(3));
        assert_eq!(fds.get(2).unwrap().kind(), Some(FileKind::Regular));
        assert_eq!(fds.get(3).unwrap().kind(), Some(FileKind::Directory));
    }

    #[test]
    fn mismatched_descriptor_is_refused() {
        let (fs, terminal, rtc, machine) = fixture();
        let env = DriverEnv { fs: &fs, terminal: &terminal, rtc: &rtc, machine: &machine };
        let file = fs.resolve_by_name(b"hello").unwrap();
        let mut fds = FdTable::new();
        let fd = REGULAR_FILE_OPS.open(&env, &mut fds, &file).unwrap();
        let mut buf = [0u8; 32];

        let desc = fds.get_mut(fd).unwrap();
        assert_eq!(DIRECTORY_OPS.read(&env, fd, desc, &mut buf), Err(ErrorNum::EBADTYPE));
        assert_eq!(DIRECTORY_OPS.close(&env, fd, desc), Err(ErrorNum::EBADTYPE));
        assert!(desc.in_use());
        assert_eq!(REGULAR_FILE_OPS.read(&env, fd, desc, &mut buf), Ok(11));
        assert_eq!(&buf[..11], b"hello world");
        assert_eq!(REGULAR_FILE_OPS.write(&env, fd, desc, b"x"), Err(ErrorNum::EROFS));
        assert_eq!(REGULAR_FILE_OPS.close(&env, fd, desc), Ok(()));
        assert!(!desc.in_use());

        // a closed slot is not a descriptor of any kind
        assert_eq!(REGULAR_FILE_OPS.close(&env, fd, desc), Err(ErrorNum::EBADF));
        assert_eq!(REGULAR_FILE_OPS.read(&env, fd, desc, &mut buf), Err(ErrorNum::EBADF));
        assert_eq!(DIRECTORY_OPS.read(&env, fd, desc, &mut buf), Err(ErrorNum::EBADF));
    }

    #[test]
    fn directory_lists_one_name_per_read() {
        let (fs, terminal, rtc, machine) = fixture();
        let env = DriverEnv { fs: &fs, terminal: &terminal, rtc: &rtc, machine: &machine };
        let dir = fs.resolve_by_name(b".").unwrap();
        let mut fds = FdTable::new();
        let fd = DIRECTORY_OPS.open(&env, &mut fds, &dir).unwrap();
        let desc = fds.get_mut(fd).unwrap();
        let mut buf = [0u8; 32];

        let mut names = Vec::new();
        loop {
            let n = DIRECTORY_OPS.read(&env, fd, desc, &mut buf).unwrap();
            if n == 0 {
                break;
            }
            names.push(buf[..n].to_vec());
        }
        assert_eq!(names, [b".".to_vec(), b"rtc".to_vec(), b"hello".to_vec()]);
        assert_eq!(REGULAR_FILE_OPS.close(&env, fd, desc), Err(ErrorNum::EBADTYPE));
        assert_eq!(DIRECTORY_OPS.write(&env, fd, desc, b"x"), Err(ErrorNum::EROFS));
    }
}
