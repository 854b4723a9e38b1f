use core::fmt::{self, Display, Formatter};

/// Kernel-internal error numbers.
///
/// User space never sees these: the syscall boundary collapses every one of
/// them to `-1`. They exist so that the kernel can log and test the precise
/// cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorNum {
    /// No such file or directory entry
    ENOENT,
    /// Index or offset out of range
    EOOR,
    /// Invalid argument
    EINVAL,
    /// Bad file descriptor
    EBADF,
    /// Bad user address
    EFAULT,
    /// Executable format error
    ENOEXEC,
    /// Filesystem image is corrupted
    EBADFS,
    /// File kind does not match the requested operation
    EBADTYPE,
    /// Too many open files
    EMFILE,
    /// Process nesting limit reached
    EAGAIN,
    /// Function not implemented
    ENOSYS,
    /// Read-only filesystem
    EROFS,
    /// Operation not permitted
    EPERM,
}

/// Coarse classification of [`ErrorNum`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    OutOfRange,
    InvalidArgument,
    WrongKind,
    ResourceExhausted,
    Unsupported,
    ReadOnlyViolation,
    NotPermitted,
}

impl ErrorNum {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ENOENT => ErrorClass::NotFound,
            Self::EOOR => ErrorClass::OutOfRange,
            Self::EINVAL | Self::EBADF | Self::EFAULT | Self::ENOEXEC | Self::EBADFS => ErrorClass::InvalidArgument,
            Self::EBADTYPE => ErrorClass::WrongKind,
            Self::EMFILE | Self::EAGAIN => ErrorClass::ResourceExhausted,
            Self::ENOSYS => ErrorClass::Unsupported,
            Self::EROFS => ErrorClass::ReadOnlyViolation,
            Self::EPERM => ErrorClass::NotPermitted,
        }
    }

    /// The value returned to user space.
    pub fn to_ret(&self) -> isize {
        -1
    }
}

impl Display for ErrorNum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let desc = match self {
            Self::ENOENT => "no such entry",
            Self::EOOR => "out of range",
            Self::EINVAL => "invalid argument",
            Self::EBADF => "bad file descriptor",
            Self::EFAULT => "bad address",
            Self::ENOEXEC => "exec format error",
            Self::EBADFS => "corrupted filesystem image",
            Self::EBADTYPE => "wrong file kind",
            Self::EMFILE => "too many open files",
            Self::EAGAIN => "process limit reached",
            Self::ENOSYS => "not implemented",
            Self::EROFS => "read-only filesystem",
            Self::EPERM => "operation not permitted",
        };
        write!(f, "{:?} ({})", self, desc)
    }
}
