//! User-visible error channel.
//!
//! `spec.md §7` splits failures into two channels: routine conditions
//! that a user-space caller can observe (this type, mapped to `-1` at
//! the syscall boundary) and kernel-invariant violations, which are
//! always a `panic!`/`assert!` and never produce an `Error` value.
use core::fmt;

/// A user-visible failure. Never constructed for invariant violations —
/// those panic instead (see module docs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// No free inode, file, pipe page, process slot, or physical frame.
    NoSpace,
    /// A path argument was malformed (empty, too long, or contained a
    /// rejected component).
    BadPath,
    /// A named file or directory entry does not exist.
    NotFound,
    /// Expected a directory inode but found a non-directory.
    NotDir,
    /// Expected a non-directory but found a directory (e.g. `open` for
    /// write).
    IsDir,
    /// `link`/`mkdir`/`create` target already exists.
    Exists,
    /// Directory is not empty.
    NotEmpty,
    /// `link` attempted across devices, or a directory was hard-linked.
    CrossDevice,
    /// `unlink` of `.` or `..`.
    ProtectedEntry,
    /// The calling process was killed while blocked.
    Killed,
    /// An argument referred to a file descriptor that is not open, or
    /// not open with the requested access.
    BadFd,
    /// A user pointer/length argument did not lie within the caller's
    /// address space, or a string argument had no NUL terminator.
    BadAddr,
    /// A requested size exceeds a hard limit (`MAXARG`, `MAXFILE`, ...).
    TooBig,
    /// The read end (for a writer) or write end (for a reader) of a
    /// pipe has closed.
    PipeClosed,
    /// The calling process has no children to `wait` for.
    NoChildren,
    /// Malformed syscall argument (bad syscall number, bad integer).
    BadArgument,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::NoSpace => "no space left",
            Error::BadPath => "malformed path",
            Error::NotFound => "no such file or directory",
            Error::NotDir => "not a directory",
            Error::IsDir => "is a directory",
            Error::Exists => "already exists",
            Error::NotEmpty => "directory not empty",
            Error::CrossDevice => "cross-device link",
            Error::ProtectedEntry => "cannot unlink . or ..",
            Error::Killed => "process was killed",
            Error::BadFd => "bad file descriptor",
            Error::BadAddr => "bad address",
            Error::TooBig => "argument list too long",
            Error::PipeClosed => "pipe closed",
            Error::NoChildren => "no children",
            Error::BadArgument => "bad syscall argument",
        };
        f.write_str(msg)
    }
}

pub type Result<T> = core::result::Result<T, Error>;

/// Maps a kernel `Result` to the classic xv6 syscall return convention:
/// non-negative on success, `-1` on any `Error`.
pub fn to_syscall_ret(r: Result<usize>) -> isize {
    match r {
        Ok(v) => v as isize,
        Err(_) => crate::param::SYSCALL_ERR,
    }
}
