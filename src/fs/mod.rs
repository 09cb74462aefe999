//! Superblock/inode file system. `spec.md §4.9, §6, §9`.
//!
//! Ties the on-disk layout ([`superblock`]), the inode cache and block
//! allocator ([`inode`]), directory entries ([`dirent`]) and path
//! resolution ([`path`]) together behind one [`FileSystem`] that the
//! kernel singleton owns.
pub mod dirent;
pub mod inode;
pub mod path;
pub mod superblock;

use crate::bio::Bcache;
use crate::disk::BlockDevice;
use crate::error::Result;
use crate::kernel::kernel;
use crate::stat::{T_DEVICE, T_DIR, T_FILE};

pub use inode::{InodeGuard, InodeRef, Itable};
pub use superblock::{Superblock, ROOT_INUM};

pub struct FileSystem {
    dev: u32,
    sb: Superblock,
    itable: Itable,
}

impl FileSystem {
    /// Mounts `dev`: reads its superblock and replays the log (`spec.md
    /// §4.8`'s "recovery runs before any other file-system access").
    /// The log itself lives in the kernel singleton, constructed right
    /// after this so it can borrow the recovered superblock's
    /// `logstart`/`nlog`.
    pub fn mount(disk: &dyn BlockDevice, dev: u32) -> Self {
        let sb = Superblock::read(disk);
        Self {
            dev,
            sb,
            itable: Itable::new(),
        }
    }

    pub fn dev(&self) -> u32 {
        self.dev
    }

    pub fn superblock(&self) -> &Superblock {
        &self.sb
    }

    pub fn disk(&self) -> &'static dyn BlockDevice {
        kernel().disk()
    }

    pub fn bcache(&self) -> &'static Bcache {
        kernel().bcache()
    }

    pub fn itable(&self) -> &Itable {
        &self.itable
    }

    pub fn iget(&self, dev: u32, inum: u32) -> InodeRef {
        self.itable
            .iget(dev, inum)
            .expect("iget: inode cache exhausted")
    }

    /// Every caller reaches a `FileSystem` through `kernel().fs()`,
    /// which hands out `&'static`, so the returned guard's borrow is
    /// `'static` too.
    pub fn ilock(&'static self, ip: InodeRef) -> InodeGuard<'static> {
        self.itable.ilock(self.disk(), &self.sb, ip)
    }

    pub fn iput(&self, ip: InodeRef) {
        self.itable.iput(self.bcache(), self.disk(), &self.sb, ip);
    }

    pub fn ialloc(&self, kind: u16) -> Result<InodeRef> {
        inode::ialloc(self.bcache(), self.disk(), &self.sb, &self.itable, self.dev, kind)
    }

    /// Resolves `path` to an inode.
    pub fn namei(&self, cwd: Option<InodeRef>, path: &[u8]) -> Result<InodeRef> {
        path::namei(self, cwd, path)
    }

    pub fn nameiparent(&self, cwd: Option<InodeRef>, path: &[u8]) -> Result<(InodeRef, [u8; crate::param::DIRSIZ])> {
        path::nameiparent(self, cwd, path)
    }

    /// Finds-or-creates the file/device/directory named by `path`.
    /// Backs `open(O_CREATE)`/`mknod`/`mkdir`. `spec.md §4.9`, grounded
    /// on the classic xv6 `create()`.
    pub fn create(
        &'static self,
        cwd: Option<InodeRef>,
        path: &[u8],
        kind: u16,
        major: u16,
        minor: u16,
    ) -> Result<InodeRef> {
        let (parent, name_buf) = self.nameiparent(cwd, path)?;
        let name_len = path::name_len(&name_buf);
        let name = &name_buf[..name_len];

        let mut parent_guard = self.ilock(parent);
        if let Ok((existing_inum, _)) = parent_guard.dirlookup(self.bcache(), self.disk(), &self.sb, name) {
            drop(parent_guard);
            parent.put();
            let existing = self.iget(self.dev, existing_inum);
            let guard = self.ilock(existing);
            let existing_kind = guard.dinode().kind;
            drop(guard);
            if kind == T_FILE && (existing_kind == T_FILE || existing_kind == T_DEVICE) {
                return Ok(existing);
            }
            existing.put();
            return Err(crate::error::Error::Exists);
        }

        let child = self.ialloc(kind)?;
        let mut child_guard = self.ilock(child);
        child_guard.mutate(|d| {
            d.major = major;
            d.minor = minor;
            d.nlink = 1;
        });
        child_guard.update(self.disk(), self.bcache(), &self.sb);

        if kind == T_DIR {
            dirent::init_dir(&self.itable, self.bcache(), self.disk(), &self.sb, &mut child_guard, parent.inum)
                .expect("create: init_dir");
            parent_guard.mutate(|d| d.nlink += 1);
            parent_guard.update(self.disk(), self.bcache(), &self.sb);
        }
        drop(child_guard);
        parent_guard
            .dirlink(self.bcache(), self.disk(), &self.sb, name, child.inum)
            .expect("create: dirlink");
        drop(parent_guard);
        parent.put();
        Ok(child)
    }
}

/// The root inode, for a freshly forked `init` process's initial
/// `cwd`. `None` before the file system has finished mounting.
pub fn root_inode() -> Option<InodeRef> {
    Some(kernel().fs().iget(kernel().fs().dev(), ROOT_INUM))
}
