//! Compile-time kernel configuration constants.
//!
//! Mirrors the teacher's `param.rs`; values are the classic xv6 constants
//! unless a comment says otherwise.

/// Maximum number of processes.
pub const NPROC: usize = 64;

/// Maximum number of CPUs.
pub const NCPU: usize = 8;

/// Open files per process.
pub const NOFILE: usize = 16;

/// Open files per system (size of the global file table).
pub const NFILE: usize = 100;

/// Maximum number of active in-memory inodes.
pub const NINODE: usize = 50;

/// Maximum major device number (size of the `devsw` table).
pub const NDEV: usize = 10;

/// Device number of the file system root disk.
pub const ROOTDEV: u32 = 1;

/// Console device major number.
pub const CONSOLE_MAJOR: u16 = 1;

/// Max exec arguments.
pub const MAXARG: usize = 32;

/// Maximum file path length, including the NUL terminator.
pub const MAXPATH: usize = 128;

/// Maximum length of a process name, for debugging.
pub const MAXPROCNAME: usize = 16;

/// Disk block size in bytes.
pub const BSIZE: usize = 1024;

/// Number of direct block pointers in a `Dinode`.
pub const NDIRECT: usize = 12;

/// Number of block numbers that fit in one indirect block.
pub const NINDIRECT: usize = BSIZE / core::mem::size_of::<u32>();

/// Maximum file size in blocks (direct + singly-indirect).
pub const MAXFILE: usize = NDIRECT + NINDIRECT;

/// Directory entry name length (no NUL terminator stored on disk).
pub const DIRSIZ: usize = 14;

/// Max # of distinct blocks any single file-system syscall may write.
pub const MAXOPBLOCKS: usize = 10;

/// Max data blocks in the on-disk log.
pub const LOGSIZE: usize = MAXOPBLOCKS * 3;

/// Number of buffers in the block cache.
pub const NBUF: usize = MAXOPBLOCKS * 3;

/// Size of a physical/virtual page, in bytes.
pub const PGSIZE: usize = 4096;

/// Pipe ring-buffer capacity, in bytes.
pub const PIPESIZE: usize = 512;

/// Boundary between the user and kernel regions of every address space.
/// The kernel region above this address is identical (and present) in
/// every process's page table, so traps can run without switching page
/// tables. Value chosen to leave a generous user region for a teaching
/// kernel's test workloads.
pub const KERNBASE: usize = 0x8000_0000;

/// Sentinel returned to user space on a failed syscall.
pub const SYSCALL_ERR: isize = -1;
