//! Fixed-size directory entries. `spec.md §4.9`.
use crate::bio::Bcache;
use crate::disk::BlockDevice;
use crate::error::{Error, Result};
use crate::param::DIRSIZ;
use crate::stat::T_DIR;

use super::inode::{InodeGuard, Itable};
use super::superblock::Superblock;

pub const DIRENT_SIZE: usize = 4 + DIRSIZ;

/// One directory entry: `{inum, name}`. `inum == 0` marks a free slot.
#[derive(Clone, Copy)]
pub struct DirEntry {
    pub inum: u32,
    name: [u8; DIRSIZ],
}

impl DirEntry {
    const fn free() -> Self {
        Self {
            inum: 0,
            name: [0; DIRSIZ],
        }
    }

    fn decode(bytes: &[u8]) -> Self {
        let inum = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let mut name = [0u8; DIRSIZ];
        name.copy_from_slice(&bytes[4..4 + DIRSIZ]);
        Self { inum, name }
    }

    fn encode(&self, bytes: &mut [u8]) {
        bytes[0..4].copy_from_slice(&self.inum.to_le_bytes());
        bytes[4..4 + DIRSIZ].copy_from_slice(&self.name);
    }

    /// Name with the trailing NUL padding (if any) trimmed off.
    pub fn name(&self) -> &[u8] {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(DIRSIZ);
        &self.name[..len]
    }

    fn set_name(&mut self, name: &[u8]) {
        let len = name.len().min(DIRSIZ);
        self.name[..len].copy_from_slice(&name[..len]);
        self.name[len..].fill(0);
    }
}

impl InodeGuard<'_> {
    /// Scans a directory's entries via `readi`, stopping at the first
    /// entry for which `f` returns `Some`.
    fn find_entry<R>(
        &mut self,
        bcache: &Bcache,
        disk: &dyn BlockDevice,
        sb: &Superblock,
        mut f: impl FnMut(&DirEntry, u32) -> Option<R>,
    ) -> Option<R> {
        assert!(self.is_dir(), "find_entry: not a directory");
        let size = self.dinode().size;
        let mut off = 0u32;
        while off < size {
            let mut raw = [0u8; DIRENT_SIZE];
            self.readi(bcache, disk, sb, &[], &mut raw, off as usize)
                .expect("find_entry: readi");
            let de = DirEntry::decode(&raw);
            if let Some(r) = f(&de, off) {
                return Some(r);
            }
            off += DIRENT_SIZE as u32;
        }
        None
    }

    /// Looks up `name` in this directory, returning the child's inode
    /// number and byte offset of its entry. `spec.md §4.9`.
    pub fn dirlookup(
        &mut self,
        bcache: &Bcache,
        disk: &dyn BlockDevice,
        sb: &Superblock,
        name: &[u8],
    ) -> Result<(u32, u32)> {
        self.find_entry(bcache, disk, sb, |de, off| {
            (de.inum != 0 && de.name() == name).then_some((de.inum, off))
        })
        .ok_or(Error::NotFound)
    }

    /// Adds `(name, inum)` to this directory, reusing a free slot if
    /// one exists. Fails if `name` is already present. `spec.md §4.9`.
    pub fn dirlink(
        &mut self,
        bcache: &Bcache,
        disk: &dyn BlockDevice,
        sb: &Superblock,
        name: &[u8],
        inum: u32,
    ) -> Result<()> {
        if self.dirlookup(bcache, disk, sb, name).is_ok() {
            return Err(Error::Exists);
        }
        let free_off = self.find_entry(bcache, disk, sb, |de, off| (de.inum == 0).then_some(off));
        let off = free_off.unwrap_or(self.dinode().size);

        let mut entry = DirEntry::free();
        entry.inum = inum;
        entry.set_name(name);
        let mut raw = [0u8; DIRENT_SIZE];
        entry.encode(&mut raw);
        self.writei(bcache, disk, sb, &[], &raw, off as usize)?;
        Ok(())
    }

    /// True if a directory contains only `.` and `..`.
    pub fn is_empty_dir(&mut self, bcache: &Bcache, disk: &dyn BlockDevice, sb: &Superblock) -> bool {
        let extra = self.find_entry(bcache, disk, sb, |de, off| {
            (de.inum != 0 && off >= 2 * DIRENT_SIZE as u32).then_some(())
        });
        extra.is_none()
    }
}

/// Initializes a freshly allocated directory inode with `.` and `..`
/// entries, linking it into its parent. `spec.md §4.9`.
pub fn init_dir(
    itable: &Itable,
    bcache: &Bcache,
    disk: &dyn BlockDevice,
    sb: &Superblock,
    dir: &mut InodeGuard<'_>,
    parent_inum: u32,
) -> Result<()> {
    debug_assert_eq!(dir.dinode().kind, T_DIR);
    dir.dirlink(bcache, disk, sb, b".", dir.ip.inum)?;
    dir.dirlink(bcache, disk, sb, b"..", parent_inum)?;
    dir.mutate(|d| d.nlink = 1);
    dir.update(disk, bcache, sb);
    let _ = itable;
    Ok(())
}
