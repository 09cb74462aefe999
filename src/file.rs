//! Open-file table and the `devsw` device-switch contract. `spec.md
//! §4.9, §6`.
//!
//! Grounded on the teacher's `file.rs` `File`/`FileType`/`Devsw`, with
//! the GAT-based `RcArena` replaced by a fixed `NFILE`-slot table (see
//! `DESIGN.md`) and `Rc`-refcounting replaced by the same explicit
//! `.dup()`/`.close()` convention as [`crate::fs::InodeRef`].
use crate::error::{Error, Result};
use crate::fs::InodeRef;
use crate::lock::Spinlock;
use crate::param::{NDEV, NFILE};
use crate::pipe::{PipeEnd, PipeRef, PipeTable};
use crate::stat::Stat;

/// Per-major-number device read/write entry points. Only this
/// contract matters here; the UART line discipline behind it is out of
/// scope (`spec.md §1, §6`).
#[derive(Clone, Copy, Default)]
pub struct Devsw {
    pub read: Option<fn(&mut [u8]) -> Result<usize>>,
    pub write: Option<fn(&[u8]) -> Result<usize>>,
}

#[derive(Clone, Copy)]
pub enum FileKind {
    Pipe { pipe: PipeRef, end: PipeEnd },
    Inode { ip: InodeRef, off: usize },
    Device { ip: InodeRef, major: u16 },
}

struct OpenFile {
    kind: FileKind,
    readable: bool,
    writable: bool,
    refcnt: u32,
}

pub struct Ftable {
    files: Spinlock<[Option<OpenFile>; NFILE]>,
    pipes: PipeTable,
    devsw: [Devsw; NDEV],
}

/// A held reference to an open file: `Ftable::alloc`'s result.
/// `Copy`, explicitly refcounted like [`InodeRef`] -- see `DESIGN.md`.
#[derive(Clone, Copy)]
pub struct FileRef {
    idx: usize,
}

impl Ftable {
    pub fn new(devsw: [Devsw; NDEV]) -> Self {
        Self {
            files: Spinlock::new_named("ftable", core::array::from_fn(|_| None)),
            pipes: PipeTable::new(),
            devsw,
        }
    }

    pub fn pipes(&self) -> &PipeTable {
        &self.pipes
    }

    pub fn alloc(&self, kind: FileKind, readable: bool, writable: bool) -> Result<FileRef> {
        let mut files = self.files.lock();
        let idx = files.iter().position(|f| f.is_none()).ok_or(Error::NoSpace)?;
        files[idx] = Some(OpenFile {
            kind,
            readable,
            writable,
            refcnt: 1,
        });
        Ok(FileRef { idx })
    }

    /// Opens a new anonymous pipe, returning its read and write ends
    /// as a pair of file references. Backs the `pipe` syscall.
    pub fn alloc_pipe(&self) -> Result<(FileRef, FileRef)> {
        let pipe = self.pipes.alloc()?;
        let read = self.alloc(FileKind::Pipe { pipe, end: PipeEnd::Read }, true, false)?;
        let write = match self.alloc(FileKind::Pipe { pipe, end: PipeEnd::Write }, false, true) {
            Ok(w) => w,
            Err(e) => {
                read.close();
                return Err(e);
            }
        };
        Ok((read, write))
    }

    fn dup(&self, f: FileRef) -> FileRef {
        self.files.lock()[f.idx].as_mut().expect("dup: not open").refcnt += 1;
        f
    }

    fn close(&self, f: FileRef) {
        let closed = {
            let mut files = self.files.lock();
            let slot = files[f.idx].as_mut().expect("close: not open");
            slot.refcnt -= 1;
            if slot.refcnt == 0 {
                files[f.idx].take()
            } else {
                None
            }
        };
        if let Some(slot) = closed {
            match slot.kind {
                FileKind::Pipe { pipe, end } => self.pipes.close(pipe, end),
                FileKind::Inode { ip, .. } | FileKind::Device { ip, .. } => ip.put(),
            }
        }
    }

    fn read(&self, f: FileRef, dst: &mut [u8]) -> Result<usize> {
        let (kind, readable) = {
            let files = self.files.lock();
            let slot = files[f.idx].as_ref().expect("read: not open");
            (slot.kind, slot.readable)
        };
        if !readable {
            return Err(Error::BadFd);
        }
        match kind {
            FileKind::Pipe { pipe, .. } => self.pipes.read(pipe, dst),
            FileKind::Device { major, .. } => {
                let read = self.devsw.get(major as usize).and_then(|d| d.read).ok_or(Error::BadArgument)?;
                read(dst)
            }
            FileKind::Inode { ip, off } => {
                let fs = crate::kernel::kernel().fs();
                let mut guard = fs.ilock(ip);
                let n = guard.readi(fs.bcache(), fs.disk(), fs.superblock(), &self.devsw, dst, off)?;
                drop(guard);
                self.files.lock()[f.idx].as_mut().unwrap().kind = FileKind::Inode { ip, off: off + n };
                Ok(n)
            }
        }
    }

    fn write(&self, f: FileRef, src: &[u8]) -> Result<usize> {
        let (kind, writable) = {
            let files = self.files.lock();
            let slot = files[f.idx].as_ref().expect("write: not open");
            (slot.kind, slot.writable)
        };
        if !writable {
            return Err(Error::BadFd);
        }
        match kind {
            FileKind::Pipe { pipe, .. } => self.pipes.write(pipe, src),
            FileKind::Device { major, .. } => {
                let write = self.devsw.get(major as usize).and_then(|d| d.write).ok_or(Error::BadArgument)?;
                write(src)
            }
            FileKind::Inode { ip, off } => {
                crate::log::begin_op();
                let fs = crate::kernel::kernel().fs();
                let mut guard = fs.ilock(ip);
                let result = guard.writei(fs.bcache(), fs.disk(), fs.superblock(), &self.devsw, src, off);
                drop(guard);
                crate::log::end_op();
                let n = result?;
                self.files.lock()[f.idx].as_mut().unwrap().kind = FileKind::Inode { ip, off: off + n };
                Ok(n)
            }
        }
    }

    fn stat(&self, f: FileRef) -> Result<Stat> {
        let kind = {
            let files = self.files.lock();
            files[f.idx].as_ref().expect("stat: not open").kind
        };
        match kind {
            FileKind::Inode { ip, .. } | FileKind::Device { ip, .. } => {
                Ok(crate::kernel::kernel().fs().ilock(ip).stat())
            }
            FileKind::Pipe { .. } => Err(Error::BadArgument),
        }
    }
}

impl FileRef {
    pub fn dup(self) -> Self {
        crate::kernel::kernel().ftable().dup(self)
    }

    pub fn close(self) {
        crate::kernel::kernel().ftable().close(self);
    }

    pub fn read(self, dst: &mut [u8]) -> Result<usize> {
        crate::kernel::kernel().ftable().read(self, dst)
    }

    pub fn write(self, src: &[u8]) -> Result<usize> {
        crate::kernel::kernel().ftable().write(self, src)
    }

    pub fn stat(self) -> Result<Stat> {
        crate::kernel::kernel().ftable().stat(self)
    }
}
