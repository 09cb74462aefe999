//! Two-level page tables. `spec.md §4.6`.
//!
//! 1024 × 1024 × 4 KiB: a page directory of 1024 entries, each either
//! absent or pointing at a page table of 1024 leaf entries. Both
//! directory and table occupy exactly one physical page, which is
//! what makes `kalloc`'s page-granular allocator enough to build them
//! out of. Addresses here are [`PhysAddr`] offsets into a [`Kmem`]
//! arena, not real pointers -- there is no MMU behind this library
//! (`spec.md §1`).
use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::kalloc::{Kmem, PhysAddr};
use crate::lock::Spinlock;
use crate::param::PGSIZE;

const ENTRIES_PER_PAGE: usize = PGSIZE / 4;

bitflags! {
    /// Permission bits carried on a leaf PTE (and mirrored on the
    /// directory entry pointing at its table).
    pub struct PteFlags: u32 {
        const PRESENT  = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER     = 1 << 2;
    }
}

fn pdx(va: usize) -> usize {
    (va >> 22) & (ENTRIES_PER_PAGE - 1)
}

fn ptx(va: usize) -> usize {
    (va >> 12) & (ENTRIES_PER_PAGE - 1)
}

pub fn page_align_down(va: usize) -> usize {
    va & !(PGSIZE - 1)
}

pub fn page_align_up(va: usize) -> usize {
    (va + PGSIZE - 1) & !(PGSIZE - 1)
}

fn pte_addr(entry: u32) -> PhysAddr {
    (entry & !((PGSIZE as u32) - 1)) as PhysAddr
}

fn pte_flags(entry: u32) -> PteFlags {
    PteFlags::from_bits_truncate(entry & (PGSIZE as u32 - 1))
}

fn make_pte(frame: PhysAddr, flags: PteFlags) -> u32 {
    frame as u32 | flags.bits()
}

/// A process's address space: the physical page holding the top-level
/// directory. Entries it points at (page-table pages, leaf data pages)
/// are owned transitively and freed together by [`PageTable::destroy`].
pub struct PageTable {
    root: PhysAddr,
}

impl PageTable {
    /// Allocates a fresh, empty root directory.
    pub fn new(kmem: &Spinlock<Kmem>) -> Result<Self> {
        let root = kmem.lock().try_alloc()?;
        Ok(Self { root })
    }

    /// Finds (optionally allocating) the leaf PTE slot for `va`.
    /// Mirrors the original's `walk`.
    fn walk(&self, kmem: &Spinlock<Kmem>, va: usize, alloc: bool) -> Result<PhysAddr> {
        let mut kmem = kmem.lock();
        let pde_addr = self.root + pdx(va) * 4;
        let pde = kmem.read_u32(pde_addr);
        let table_pa = if pte_flags(pde).contains(PteFlags::PRESENT) {
            pte_addr(pde)
        } else {
            if !alloc {
                return Err(Error::BadAddr);
            }
            let new_table = kmem.try_alloc()?;
            kmem.write_u32(
                pde_addr,
                make_pte(new_table, PteFlags::PRESENT | PteFlags::WRITABLE | PteFlags::USER),
            );
            new_table
        };
        Ok(table_pa + ptx(va) * 4)
    }

    /// Maps `[va, va + size)` to physically contiguous frames starting
    /// at `pa`, `size` rounded up to a page. Panics on remap of an
    /// already-present entry: a programming-error invariant, not a
    /// user-facing failure (`spec.md §4.6`).
    pub fn mappages(
        &self,
        kmem: &Spinlock<Kmem>,
        va: usize,
        size: usize,
        pa: PhysAddr,
        flags: PteFlags,
    ) -> Result<()> {
        let start = page_align_down(va);
        let end = page_align_up(va + size);
        let mut off = 0;
        while start + off < end {
            let pte_pa = self.walk(kmem, start + off, true)?;
            let mut kmem_guard = kmem.lock();
            let existing = kmem_guard.read_u32(pte_pa);
            assert!(
                !pte_flags(existing).contains(PteFlags::PRESENT),
                "mappages: remap of already-mapped page"
            );
            kmem_guard.write_u32(pte_pa, make_pte(pa + off, flags | PteFlags::PRESENT));
            off += PGSIZE;
        }
        Ok(())
    }

    /// Maps one freshly allocated, zeroed page at virtual address 0 and
    /// copies `content` into it. Used by `userinit` to install the
    /// first process's embedded image; `spec.md §1` treats the image
    /// itself (and `exec`'s general loader) as an external concern, so
    /// `content` is supplied by the caller.
    pub fn map_first_page(&mut self, kmem: &Spinlock<Kmem>, content: &[u8]) -> Result<()> {
        assert!(content.len() <= PGSIZE, "init image larger than one page");
        let frame = kmem.lock().try_alloc()?;
        kmem.lock().write_bytes(frame, content);
        self.mappages(
            kmem,
            0,
            PGSIZE,
            frame,
            PteFlags::PRESENT | PteFlags::WRITABLE | PteFlags::USER,
        )
    }

    /// Translates a user virtual address to the `Kmem` offset backing
    /// it, honoring the present and user-accessible bits. Used by
    /// `copyout`/`copyin` to marshal syscall arguments.
    pub fn uva2ka(&self, kmem: &Spinlock<Kmem>, va: usize) -> Result<PhysAddr> {
        let pte_pa = self.walk(kmem, va, false)?;
        let entry = kmem.lock().read_u32(pte_pa);
        let flags = pte_flags(entry);
        if !flags.contains(PteFlags::PRESENT) || !flags.contains(PteFlags::USER) {
            return Err(Error::BadAddr);
        }
        Ok(pte_addr(entry))
    }

    /// Copies `src` into the user address space starting at `dst_va`.
    pub fn copy_out(&self, kmem: &Spinlock<Kmem>, dst_va: usize, src: &[u8]) -> Result<()> {
        let mut copied = 0;
        while copied < src.len() {
            let va = dst_va + copied;
            let page_va = page_align_down(va);
            let pa = self.uva2ka(kmem, page_va)?;
            let off_in_page = va - page_va;
            let n = (PGSIZE - off_in_page).min(src.len() - copied);
            kmem.lock().write_bytes(pa + off_in_page, &src[copied..copied + n]);
            copied += n;
        }
        Ok(())
    }

    /// Copies `dst.len()` bytes out of the user address space starting
    /// at `src_va`.
    pub fn copy_in(&self, kmem: &Spinlock<Kmem>, dst: &mut [u8], src_va: usize) -> Result<()> {
        let mut copied = 0;
        while copied < dst.len() {
            let va = src_va + copied;
            let page_va = page_align_down(va);
            let pa = self.uva2ka(kmem, page_va)?;
            let off_in_page = va - page_va;
            let n = (PGSIZE - off_in_page).min(dst.len() - copied);
            kmem.lock().read_bytes(pa + off_in_page, &mut dst[copied..copied + n]);
            copied += n;
        }
        Ok(())
    }

    /// Copies a NUL-terminated string out of user space into `buf`,
    /// returning the slice up to (excluding) the NUL.
    pub fn copy_in_str<'a>(
        &self,
        kmem: &Spinlock<Kmem>,
        buf: &'a mut [u8],
        src_va: usize,
    ) -> Result<&'a [u8]> {
        for (i, slot) in buf.iter_mut().enumerate() {
            self.copy_in(kmem, core::slice::from_mut(slot), src_va + i)?;
            if *slot == 0 {
                return Ok(&buf[..i]);
            }
        }
        Err(Error::TooBig)
    }

    /// Deep-copies `[0, sz)`: allocates new frames and copies contents,
    /// preserving permission flags. Never shares a page with the
    /// source. The mechanism behind `fork` (`spec.md §4.5, §4.6`).
    pub fn copy_with_contents(&self, kmem: &Spinlock<Kmem>, sz: usize) -> Result<Self> {
        let mut child = Self::new(kmem)?;
        let mut va = 0;
        while va < sz {
            let pte_pa = match self.walk(kmem, va, false) {
                Ok(pa) => pa,
                Err(_) => {
                    va += PGSIZE;
                    continue;
                }
            };
            let entry = kmem.lock().read_u32(pte_pa);
            let flags = pte_flags(entry);
            if flags.contains(PteFlags::PRESENT) {
                let src_pa = pte_addr(entry);
                let new_frame = match kmem.lock().try_alloc() {
                    Ok(pa) => pa,
                    Err(e) => {
                        child.destroy(kmem, va);
                        return Err(e);
                    }
                };
                {
                    let mut k = kmem.lock();
                    let mut buf = [0u8; PGSIZE];
                    buf.copy_from_slice(k.page(src_pa));
                    k.page_mut(new_frame).copy_from_slice(&buf);
                }
                if let Err(e) = child.mappages(kmem, va, PGSIZE, new_frame, flags) {
                    child.destroy(kmem, va);
                    return Err(e);
                }
            }
            va += PGSIZE;
        }
        Ok(child)
    }

    /// Allocates and maps additional frames to grow user memory from
    /// `old_sz` to `new_sz`, returning `new_sz`. Backs `sbrk`/`growproc`.
    pub fn grow(&mut self, kmem: &Spinlock<Kmem>, old_sz: usize, new_sz: usize) -> Result<usize> {
        if new_sz < old_sz {
            return Ok(old_sz);
        }
        let mut va = page_align_up(old_sz);
        while va < new_sz {
            let frame = match kmem.lock().try_alloc() {
                Ok(pa) => pa,
                Err(e) => {
                    self.shrink(kmem, va, old_sz);
                    return Err(e);
                }
            };
            if let Err(e) = self.mappages(
                kmem,
                va,
                PGSIZE,
                frame,
                PteFlags::PRESENT | PteFlags::WRITABLE | PteFlags::USER,
            ) {
                kmem.lock().free(frame);
                self.shrink(kmem, va, old_sz);
                return Err(e);
            }
            va += PGSIZE;
        }
        Ok(new_sz)
    }

    /// Unmaps and frees frames to shrink user memory from `old_sz` down
    /// to `new_sz`, returning `new_sz`.
    pub fn shrink(&mut self, kmem: &Spinlock<Kmem>, old_sz: usize, new_sz: usize) -> usize {
        if new_sz >= old_sz {
            return old_sz;
        }
        let mut va = page_align_up(new_sz);
        while va < old_sz {
            if let Ok(pte_pa) = self.walk(kmem, va, false) {
                let mut k = kmem.lock();
                let entry = k.read_u32(pte_pa);
                if pte_flags(entry).contains(PteFlags::PRESENT) {
                    let frame = pte_addr(entry);
                    k.write_u32(pte_pa, 0);
                    k.free(frame);
                }
            }
            va += PGSIZE;
        }
        new_sz
    }

    /// Drops the user-accessible bit on the page mapping `va`, used to
    /// create a guard page below the user stack.
    pub fn clear_user_bit(&self, kmem: &Spinlock<Kmem>, va: usize) -> Result<()> {
        let pte_pa = self.walk(kmem, va, false)?;
        let mut k = kmem.lock();
        let entry = k.read_u32(pte_pa);
        k.write_u32(pte_pa, entry & !PteFlags::USER.bits());
        Ok(())
    }

    /// Frees every mapped frame below `sz` plus the page-table pages
    /// and directory themselves. Called when a process is reaped
    /// (`spec.md §4.5`'s `wait`) or when `fork`/`grow` fails partway.
    pub fn destroy(mut self, kmem: &Spinlock<Kmem>, sz: usize) {
        self.shrink(kmem, sz, 0);
        let mut k = kmem.lock();
        for i in 0..ENTRIES_PER_PAGE {
            let pde = k.read_u32(self.root + i * 4);
            if pte_flags(pde).contains(PteFlags::PRESENT) {
                k.free(pte_addr(pde));
            }
        }
        k.free(self.root);
        // Prevent `Drop` (there is none) from double-freeing; `self` is
        // consumed here by value.
        self.root = PhysAddr::MAX;
    }
}

/// Loads file contents into already-mapped user pages at page-aligned
/// virtual addresses. Used by `exec`, whose own image-loading policy
/// is out of scope (`spec.md §1`); this only performs the page-local
/// copy once the caller has decided what bytes go where.
pub fn loaduvm(
    pagetable: &PageTable,
    kmem: &Spinlock<Kmem>,
    va: usize,
    data: &[u8],
) -> Result<()> {
    assert_eq!(va % PGSIZE, 0, "loaduvm: unaligned va");
    let pte_pa = pagetable.walk(kmem, va, false)?;
    let entry = kmem.lock().read_u32(pte_pa);
    if !pte_flags(entry).contains(PteFlags::PRESENT) {
        return Err(Error::BadAddr);
    }
    let frame = pte_addr(entry);
    kmem.lock().write_bytes(frame, data);
    Ok(())
}

/// Narrow seam for the image loader `spec.md §1` excludes from scope:
/// turns a path into mapped, populated user memory. A platform/loader
/// crate implements the ELF (or flat binary) parsing; this crate only
/// needs the resulting page table and trap frame.
pub trait ExecLoader {
    fn load(&self, kmem: &Spinlock<Kmem>, path: &[u8]) -> Result<(PageTable, usize, usize)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_kmem() -> Spinlock<Kmem> {
        let arena = vec![0u8; 64 * PGSIZE].leak();
        Spinlock::new_named("kmem", unsafe { Kmem::new(arena) })
    }

    #[test]
    fn mapped_page_round_trips_through_copy_out_in() {
        let kmem = test_kmem();
        let mut pt = PageTable::new(&kmem).unwrap();
        pt.grow(&kmem, 0, PGSIZE).unwrap();
        pt.copy_out(&kmem, 0, b"hello").unwrap();
        let mut buf = [0u8; 5];
        pt.copy_in(&kmem, &mut buf, 0).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn remap_panics() {
        let kmem = test_kmem();
        let pt = PageTable::new(&kmem).unwrap();
        let frame = kmem.lock().try_alloc().unwrap();
        pt.mappages(&kmem, 0, PGSIZE, frame, PteFlags::PRESENT)
            .unwrap();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pt.mappages(&kmem, 0, PGSIZE, frame, PteFlags::PRESENT)
        }));
        assert!(result.is_err());
    }

    #[test]
    fn fork_copy_is_independent() {
        let kmem = test_kmem();
        let mut parent = PageTable::new(&kmem).unwrap();
        parent.grow(&kmem, 0, PGSIZE).unwrap();
        parent.copy_out(&kmem, 0, b"AAAA").unwrap();

        let child = parent.copy_with_contents(&kmem, PGSIZE).unwrap();
        parent.copy_out(&kmem, 0, b"BBBB").unwrap();

        let mut buf = [0u8; 4];
        child.copy_in(&kmem, &mut buf, 0).unwrap();
        assert_eq!(&buf, b"AAAA");
    }

    #[test]
    fn grow_then_shrink_frees_frames() {
        let kmem = test_kmem();
        let mut pt = PageTable::new(&kmem).unwrap();
        let before = kmem.lock().total_pages();
        pt.grow(&kmem, 0, 4 * PGSIZE).unwrap();
        pt.shrink(&kmem, 4 * PGSIZE, 0);
        // every grown frame came back to the free list
        let mut reclaimed = 0;
        while kmem.lock().alloc().is_some() {
            reclaimed += 1;
        }
        assert_eq!(reclaimed, before - 1 /* pt.root still held */);
    }
}
