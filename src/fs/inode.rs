//! On-disk inodes, the in-memory inode cache, and the block allocator.
//! `spec.md §4.9`.
use crate::bio::Bcache;
use crate::disk::BlockDevice;
use crate::error::{Error, Result};
use crate::file::Devsw;
use crate::lock::{Sleeplock, SleeplockGuard, Spinlock};
use crate::param::{BSIZE, NDIRECT, NINDIRECT, NINODE};
use crate::stat::{Stat, T_DEVICE, T_DIR, T_FILE};

use super::superblock::Superblock;

/// On-disk inode layout: type, device major/minor (for `T_DEVICE`),
/// link count, size, `NDIRECT` direct block numbers plus one indirect
/// block number. `IPB = BSIZE / DINODE_SIZE` are packed per block.
pub const DINODE_SIZE: usize = 2 + 2 + 2 + 2 + 4 + 4 * (NDIRECT + 1);

#[derive(Clone, Copy, Debug)]
pub struct Dinode {
    pub kind: u16,
    pub major: u16,
    pub minor: u16,
    pub nlink: u16,
    pub size: u32,
    pub addrs: [u32; NDIRECT + 1],
}

impl Dinode {
    const fn free() -> Self {
        Self {
            kind: 0,
            major: 0,
            minor: 0,
            nlink: 0,
            size: 0,
            addrs: [0; NDIRECT + 1],
        }
    }

    fn decode(bytes: &[u8]) -> Self {
        let mut addrs = [0u32; NDIRECT + 1];
        for (i, a) in addrs.iter_mut().enumerate() {
            let off = 12 + i * 4;
            *a = u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
        }
        Self {
            kind: u16::from_le_bytes(bytes[0..2].try_into().unwrap()),
            major: u16::from_le_bytes(bytes[2..4].try_into().unwrap()),
            minor: u16::from_le_bytes(bytes[4..6].try_into().unwrap()),
            nlink: u16::from_le_bytes(bytes[6..8].try_into().unwrap()),
            size: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
            addrs,
        }
    }

    fn encode(&self, bytes: &mut [u8]) {
        bytes[0..2].copy_from_slice(&self.kind.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.major.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.minor.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.nlink.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.size.to_le_bytes());
        for (i, a) in self.addrs.iter().enumerate() {
            let off = 12 + i * 4;
            bytes[off..off + 4].copy_from_slice(&a.to_le_bytes());
        }
    }
}

/// The in-memory half of an inode: cache identity and reference count,
/// protected by the cache's own spinlock. The cached `Dinode` fields
/// live behind the per-entry sleeplock instead, alongside `valid`,
/// matching `spec.md §3`'s "mutation requires holding the sleeplock".
struct CacheSlot {
    dev: u32,
    inum: u32,
    refcnt: u32,
}

impl CacheSlot {
    const fn empty() -> Self {
        Self {
            dev: 0,
            inum: 0,
            refcnt: 0,
        }
    }
}

pub struct InodeData {
    pub valid: bool,
    pub dinode: Dinode,
}

pub struct Itable {
    table: Spinlock<[CacheSlot; NINODE]>,
    data: [Sleeplock<InodeData>; NINODE],
}

/// A held reference to a cached inode: `iget`'s result. `spec.md
/// §4.9`: "the separation of `iget` (reference) and `ilock` (exclusive
/// access)" -- this type is the reference half.
#[derive(Clone, Copy)]
pub struct InodeRef {
    idx: usize,
    pub dev: u32,
    pub inum: u32,
}

impl InodeRef {
    /// Bumps the reference count. Mirrors `FileRef::dup`: explicit,
    /// `Copy`-handle refcounting rather than `Rc`/`Drop`.
    pub fn dup(self) -> Self {
        crate::kernel::kernel().fs().itable().dup(self)
    }

    /// Drops a reference, freeing the inode on disk once the last one
    /// is gone and its link count is zero.
    pub fn put(self) {
        crate::kernel::kernel().fs().iput(self);
    }

    /// Locks the inode for exclusive access, reading it from disk on a
    /// first touch.
    pub fn lock(self) -> InodeGuard<'static> {
        crate::kernel::kernel().fs().ilock(self)
    }
}

impl Itable {
    pub fn new() -> Self {
        Self {
            table: Spinlock::new_named("itable", core::array::from_fn(|_| CacheSlot::empty())),
            data: core::array::from_fn(|_| {
                Sleeplock::new_named(
                    "inode",
                    InodeData {
                        valid: false,
                        dinode: Dinode::free(),
                    },
                )
            }),
        }
    }

    /// Returns a cached reference to `(dev, inum)`, evicting a
    /// `ref == 0` entry on a cache miss. Does not read the disk; call
    /// `ilock` for that.
    pub fn iget(&self, dev: u32, inum: u32) -> Result<InodeRef> {
        let mut table = self.table.lock();
        if let Some(idx) = table
            .iter()
            .position(|s| s.refcnt > 0 && s.dev == dev && s.inum == inum)
        {
            table[idx].refcnt += 1;
            return Ok(InodeRef { idx, dev, inum });
        }
        let idx = table
            .iter()
            .position(|s| s.refcnt == 0)
            .ok_or(Error::NoSpace)?;
        table[idx] = CacheSlot { dev, inum, refcnt: 1 };
        drop(table);
        self.data[idx].lock().valid = false;
        Ok(InodeRef { idx, dev, inum })
    }

    pub fn dup(&self, ip: InodeRef) -> InodeRef {
        self.table.lock()[ip.idx].refcnt += 1;
        ip
    }

    /// Acquires the entry's sleeplock and, if not already valid, reads
    /// the on-disk inode into the cache.
    pub fn ilock(&self, disk: &dyn BlockDevice, sb: &Superblock, ip: InodeRef) -> InodeGuard<'_> {
        let mut guard = self.data[ip.idx].lock();
        if !guard.valid {
            let block_no = sb.block_of_inode(ip.inum);
            let mut block = [0u8; BSIZE];
            disk.read_block(block_no, &mut block);
            let ipb = sb.inodes_per_block();
            let offset = (ip.inum % ipb) as usize * DINODE_SIZE;
            guard.dinode = Dinode::decode(&block[offset..offset + DINODE_SIZE]);
            guard.valid = true;
            assert_ne!(guard.dinode.kind, 0, "ilock: no type (unallocated inode)");
        }
        InodeGuard { ip, guard }
    }

    /// Drops a reference. If it was the last one and the on-disk link
    /// count has reached zero, truncates and frees the inode --
    /// requires an active log transaction.
    pub fn iput(&self, bcache: &Bcache, disk: &dyn BlockDevice, sb: &Superblock, ip: InodeRef) {
        let mut table = self.table.lock();
        if table[ip.idx].refcnt == 1 {
            drop(table);
            let mut guard = self.data[ip.idx].lock();
            if guard.valid && guard.dinode.nlink == 0 {
                truncate(bcache, disk, sb, ip, &mut guard.dinode);
                guard.dinode = Dinode::free();
                write_dinode(disk, sb, ip, &guard.dinode);
                guard.valid = false;
            }
            drop(guard);
            table = self.table.lock();
        }
        table[ip.idx].refcnt -= 1;
    }
}

impl Default for Itable {
    fn default() -> Self {
        Self::new()
    }
}

/// An inode locked for exclusive access; `Deref`s to its cached
/// `Dinode` fields.
pub struct InodeGuard<'a> {
    pub ip: InodeRef,
    guard: SleeplockGuard<'a, InodeData>,
}

impl InodeGuard<'_> {
    pub fn dinode(&self) -> &Dinode {
        &self.guard.dinode
    }

    pub fn is_dir(&self) -> bool {
        self.guard.dinode.kind == T_DIR
    }

    pub fn stat(&self) -> Stat {
        let d = &self.guard.dinode;
        Stat {
            dev: self.ip.dev,
            inum: self.ip.inum,
            kind: d.kind,
            nlink: d.nlink,
            size: d.size as u64,
        }
    }

    /// Writes the cached `Dinode` fields back to disk and logs the
    /// containing block. Must be called inside a transaction after any
    /// mutation.
    pub fn update(&self, disk: &dyn BlockDevice, bcache: &Bcache, sb: &Superblock) {
        write_dinode(disk, sb, self.ip, &self.guard.dinode);
        let block_no = sb.block_of_inode(self.ip.inum);
        if let Ok(buf) = bcache.bread(disk, self.ip.dev, block_no) {
            crate::log::log_write(buf);
            bcache.brelse(buf);
        }
    }

    pub fn mutate(&mut self, f: impl FnOnce(&mut Dinode)) {
        f(&mut self.guard.dinode);
    }

    /// Returns the physical block number for file block index `bn`,
    /// allocating on demand. `spec.md §4.9`.
    pub fn bmap(&mut self, bcache: &Bcache, disk: &dyn BlockDevice, sb: &Superblock, bn: usize) -> Result<u32> {
        if bn < NDIRECT {
            if self.guard.dinode.addrs[bn] == 0 {
                let block = balloc(bcache, disk, sb, self.ip.dev)?;
                self.guard.dinode.addrs[bn] = block;
            }
            return Ok(self.guard.dinode.addrs[bn]);
        }
        let ibn = bn - NDIRECT;
        if ibn >= NINDIRECT {
            return Err(Error::TooBig);
        }
        if self.guard.dinode.addrs[NDIRECT] == 0 {
            self.guard.dinode.addrs[NDIRECT] = balloc(bcache, disk, sb, self.ip.dev)?;
        }
        let indirect_block_no = self.guard.dinode.addrs[NDIRECT];
        let buf = bcache.bread(disk, self.ip.dev, indirect_block_no)?;
        let entry_off = ibn * 4;
        let existing = {
            let data = bcache.data(buf);
            u32::from_le_bytes(data.bytes[entry_off..entry_off + 4].try_into().unwrap())
        };
        let result = if existing != 0 {
            existing
        } else {
            let new_block = balloc(bcache, disk, sb, self.ip.dev)?;
            {
                let mut data = bcache.data(buf);
                data.bytes[entry_off..entry_off + 4].copy_from_slice(&new_block.to_le_bytes());
            }
            crate::log::log_write(buf);
            new_block
        };
        bcache.brelse(buf);
        Ok(result)
    }

    /// Reads up to `dst.len()` bytes starting at `off`, dispatching to
    /// the `devsw` table for device inodes. `spec.md §4.9, §6`.
    pub fn readi(
        &mut self,
        bcache: &Bcache,
        disk: &dyn BlockDevice,
        sb: &Superblock,
        devsw: &[Devsw],
        dst: &mut [u8],
        off: usize,
    ) -> Result<usize> {
        if self.guard.dinode.kind == T_DEVICE {
            let major = self.guard.dinode.major as usize;
            let read = devsw.get(major).and_then(|d| d.read).ok_or(Error::BadArgument)?;
            return read(dst);
        }
        let size = self.guard.dinode.size as usize;
        if off > size {
            return Err(Error::BadArgument);
        }
        let n = dst.len().min(size - off);
        let mut done = 0;
        while done < n {
            let bn = (off + done) / BSIZE;
            let block_off = (off + done) % BSIZE;
            let block_no = self.bmap(bcache, disk, sb, bn)?;
            let buf = bcache.bread(disk, self.ip.dev, block_no)?;
            let take = (BSIZE - block_off).min(n - done);
            {
                let data = bcache.data(buf);
                dst[done..done + take].copy_from_slice(&data.bytes[block_off..block_off + take]);
            }
            bcache.brelse(buf);
            done += take;
        }
        Ok(done)
    }

    /// Writes `src` at `off`, dispatching to `devsw` for device
    /// inodes. Extends the file and log-writes the inode if the write
    /// goes past the current size. `spec.md §4.9, §6`.
    pub fn writei(
        &mut self,
        bcache: &Bcache,
        disk: &dyn BlockDevice,
        sb: &Superblock,
        devsw: &[Devsw],
        src: &[u8],
        off: usize,
    ) -> Result<usize> {
        if self.guard.dinode.kind == T_DEVICE {
            let major = self.guard.dinode.major as usize;
            let write = devsw.get(major).and_then(|d| d.write).ok_or(Error::BadArgument)?;
            return write(src);
        }
        if off > self.guard.dinode.size as usize {
            return Err(Error::BadArgument);
        }
        if off + src.len() > crate::param::MAXFILE * BSIZE {
            return Err(Error::TooBig);
        }
        let mut done = 0;
        while done < src.len() {
            let bn = (off + done) / BSIZE;
            let block_off = (off + done) % BSIZE;
            let block_no = self.bmap(bcache, disk, sb, bn)?;
            let buf = bcache.bread(disk, self.ip.dev, block_no)?;
            let take = (BSIZE - block_off).min(src.len() - done);
            {
                let mut data = bcache.data(buf);
                data.bytes[block_off..block_off + take].copy_from_slice(&src[done..done + take]);
            }
            crate::log::log_write(buf);
            bcache.brelse(buf);
            done += take;
        }
        if off + done > self.guard.dinode.size as usize {
            self.guard.dinode.size = (off + done) as u32;
        }
        self.update(disk, bcache, sb);
        Ok(done)
    }
}

fn write_dinode(disk: &dyn BlockDevice, sb: &Superblock, ip: InodeRef, dinode: &Dinode) {
    let block_no = sb.block_of_inode(ip.inum);
    let mut block = [0u8; BSIZE];
    disk.read_block(block_no, &mut block);
    let ipb = sb.inodes_per_block();
    let offset = (ip.inum % ipb) as usize * DINODE_SIZE;
    dinode.encode(&mut block[offset..offset + DINODE_SIZE]);
    disk.write_block(block_no, &block);
}

/// Scans the on-disk inode table for a free (`type == 0`) entry,
/// claims it with `kind`, and returns a cached reference to it.
/// `spec.md §4.9`.
pub fn ialloc(
    bcache: &Bcache,
    disk: &dyn BlockDevice,
    sb: &Superblock,
    itable: &Itable,
    dev: u32,
    kind: u16,
) -> Result<InodeRef> {
    for inum in 1..sb.ninodes {
        let block_no = sb.block_of_inode(inum);
        let buf = bcache.bread(disk, dev, block_no)?;
        let ipb = sb.inodes_per_block();
        let offset = (inum % ipb) as usize * DINODE_SIZE;
        let free = {
            let data = bcache.data(buf);
            u16::from_le_bytes(data.bytes[offset..offset + 2].try_into().unwrap()) == 0
        };
        if free {
            {
                let mut data = bcache.data(buf);
                data.bytes[offset..offset + 2].copy_from_slice(&kind.to_le_bytes());
            }
            crate::log::log_write(buf);
            bcache.brelse(buf);
            return itable.iget(dev, inum);
        }
        bcache.brelse(buf);
    }
    Err(Error::NoSpace)
}

/// Allocates the lowest-numbered free data block, zeroing it.
/// `spec.md §4.9`.
pub fn balloc(bcache: &Bcache, disk: &dyn BlockDevice, sb: &Superblock, dev: u32) -> Result<u32> {
    for b in 0..sb.nblocks {
        let bitmap_block_no = sb.bitmap_block_of(b);
        let buf = bcache.bread(disk, dev, bitmap_block_no)?;
        let bit = (b % (BSIZE as u32 * 8)) as usize;
        let byte = bit / 8;
        let mask = 1u8 << (bit % 8);
        let free = {
            let data = bcache.data(buf);
            data.bytes[byte] & mask == 0
        };
        if free {
            {
                let mut data = bcache.data(buf);
                data.bytes[byte] |= mask;
            }
            crate::log::log_write(buf);
            bcache.brelse(buf);
            let block_no = sb.data_start() + b;
            bzero(bcache, disk, dev, block_no);
            return Ok(block_no);
        }
        bcache.brelse(buf);
    }
    Err(Error::NoSpace)
}

/// Zeroes a data block. Used both by `balloc` and to scrub blocks
/// during truncation.
pub fn bzero(bcache: &Bcache, disk: &dyn BlockDevice, dev: u32, block_no: u32) {
    if let Ok(buf) = bcache.bread(disk, dev, block_no) {
        {
            let mut data = bcache.data(buf);
            data.bytes = [0; BSIZE];
        }
        crate::log::log_write(buf);
        bcache.brelse(buf);
    }
}

/// Marks a data block free in the bitmap. Panics on an already-free
/// block: `spec.md §6` lists this as a fatal kernel-invariant
/// violation, not a user-facing error.
pub fn bfree(bcache: &Bcache, disk: &dyn BlockDevice, sb: &Superblock, dev: u32, block_no: u32) {
    let rel = block_no - sb.data_start();
    let bitmap_block_no = sb.bitmap_block_of(rel);
    let buf = bcache.bread(disk, dev, bitmap_block_no).expect("bfree: bread");
    let bit = (rel % (BSIZE as u32 * 8)) as usize;
    let byte = bit / 8;
    let mask = 1u8 << (bit % 8);
    {
        let mut data = bcache.data(buf);
        assert!(data.bytes[byte] & mask != 0, "bfree: freeing free block");
        data.bytes[byte] &= !mask;
    }
    crate::log::log_write(buf);
    bcache.brelse(buf);
}

fn truncate(bcache: &Bcache, disk: &dyn BlockDevice, sb: &Superblock, ip: InodeRef, dinode: &mut Dinode) {
    for addr in dinode.addrs[..NDIRECT].iter_mut() {
        if *addr != 0 {
            bfree(bcache, disk, sb, ip.dev, *addr);
            *addr = 0;
        }
    }
    if dinode.addrs[NDIRECT] != 0 {
        if let Ok(buf) = bcache.bread(disk, ip.dev, dinode.addrs[NDIRECT]) {
            let entries = {
                let data = bcache.data(buf);
                let mut entries = [0u32; NINDIRECT];
                for (i, e) in entries.iter_mut().enumerate() {
                    let off = i * 4;
                    *e = u32::from_le_bytes(data.bytes[off..off + 4].try_into().unwrap());
                }
                entries
            };
            bcache.brelse(buf);
            for e in entries {
                if e != 0 {
                    bfree(bcache, disk, sb, ip.dev, e);
                }
            }
        }
        bfree(bcache, disk, sb, ip.dev, dinode.addrs[NDIRECT]);
        dinode.addrs[NDIRECT] = 0;
    }
    dinode.size = 0;
}

pub fn is_file_kind(kind: u16) -> bool {
    kind == T_FILE
}
