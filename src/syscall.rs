//! System call argument marshalling and dispatch. `spec.md §4, §6, §7`.
//!
//! Mostly argument checking, since user-supplied register values and
//! pointers are never trusted; the actual work is in [`crate::sysproc`]
//! and [`crate::sysfile`]. Grounded on the teacher's `syscall.rs`
//! `argint`/`argaddr`/`argstr`/`fetchstr`, adapted from its
//! `CurrentProc`/`KernelCtx` threading to this crate's
//! `myproc_idx`/`lock_table` singleton style.
use crate::error::{Error, Result};
use crate::file::FileRef;
use crate::fs::InodeRef;
use crate::kernel::kernel;
use crate::param::{MAXPATH, NOFILE};
use crate::proc::{myproc_idx, ProcTable};
use crate::{sysfile, sysproc};

pub const SYS_FORK: usize = 1;
pub const SYS_EXIT: usize = 2;
pub const SYS_WAIT: usize = 3;
pub const SYS_PIPE: usize = 4;
pub const SYS_READ: usize = 5;
pub const SYS_KILL: usize = 6;
pub const SYS_EXEC: usize = 7;
pub const SYS_FSTAT: usize = 8;
pub const SYS_CHDIR: usize = 9;
pub const SYS_DUP: usize = 10;
pub const SYS_GETPID: usize = 11;
pub const SYS_SBRK: usize = 12;
pub const SYS_SLEEP: usize = 13;
pub const SYS_UPTIME: usize = 14;
pub const SYS_OPEN: usize = 15;
pub const SYS_WRITE: usize = 16;
pub const SYS_MKNOD: usize = 17;
pub const SYS_UNLINK: usize = 18;
pub const SYS_LINK: usize = 19;
pub const SYS_MKDIR: usize = 20;
pub const SYS_CLOSE: usize = 21;

/// Dispatches the calling process's pending trapframe syscall number
/// to its handler, returning the xv6 convention (non-negative on
/// success, `-1` on error) that a trap return path writes into `a0`.
pub fn syscall() -> isize {
    let num = argraw_num();
    match num {
        SYS_FORK => to_isize(sysproc::sys_fork()),
        SYS_EXIT => sysproc::sys_exit(),
        SYS_WAIT => to_isize(sysproc::sys_wait()),
        SYS_PIPE => to_isize(sysfile::sys_pipe()),
        SYS_READ => to_isize(sysfile::sys_read()),
        SYS_KILL => to_isize(sysproc::sys_kill()),
        SYS_EXEC => crate::param::SYSCALL_ERR,
        SYS_FSTAT => to_isize(sysfile::sys_fstat()),
        SYS_CHDIR => to_isize(sysfile::sys_chdir()),
        SYS_DUP => to_isize(sysfile::sys_dup()),
        SYS_GETPID => to_isize(sysproc::sys_getpid()),
        SYS_SBRK => to_isize(sysproc::sys_sbrk()),
        SYS_SLEEP => to_isize(sysproc::sys_sleep()),
        SYS_UPTIME => to_isize(sysproc::sys_uptime()),
        SYS_OPEN => to_isize(sysfile::sys_open()),
        SYS_WRITE => to_isize(sysfile::sys_write()),
        SYS_MKNOD => to_isize(sysfile::sys_mknod()),
        SYS_UNLINK => to_isize(sysfile::sys_unlink()),
        SYS_LINK => to_isize(sysfile::sys_link()),
        SYS_MKDIR => to_isize(sysfile::sys_mkdir()),
        SYS_CLOSE => to_isize(sysfile::sys_close()),
        _ => {
            ::log::warn!("unknown syscall number {num}");
            crate::param::SYSCALL_ERR
        }
    }
}

fn to_isize(r: Result<usize>) -> isize {
    crate::error::to_syscall_ret(r)
}

fn with_table<R>(f: impl FnOnce(usize, &mut ProcTable) -> R) -> R {
    let idx = myproc_idx().expect("syscall: no current process");
    let mut table = crate::proc::table_for_syscalls();
    f(idx, &mut table)
}

fn argraw_num() -> usize {
    with_table(|idx, table| table.procs[idx].trapframe.regs[0])
}

pub fn argraw(n: usize) -> usize {
    with_table(|idx, table| table.procs[idx].trapframe.arg_raw(n))
}

pub fn argint(n: usize) -> i32 {
    argraw(n) as i32
}

pub fn argaddr(n: usize) -> usize {
    argraw(n)
}

/// Copies a NUL-terminated string argument into `buf`.
pub fn argstr<'a>(n: usize, buf: &'a mut [u8]) -> Result<&'a [u8]> {
    let addr = argaddr(n);
    with_table(|idx, table| {
        let pt = table.procs[idx].pagetable.as_ref().ok_or(Error::BadAddr)?;
        pt.copy_in_str(kernel().kmem(), buf, addr)
    })
}

/// Copies a path argument, which is bounded by `MAXPATH` (unlike a
/// general string argument).
pub fn argpath(n: usize, buf: &mut [u8; MAXPATH]) -> Result<usize> {
    let s = argstr(n, buf)?;
    Ok(s.len())
}

/// Fetches the `n`th argument as a file descriptor, returning both the
/// descriptor and the open file it names.
pub fn argfd(n: usize) -> Result<(usize, FileRef)> {
    let fd = argint(n);
    if fd < 0 || fd as usize >= NOFILE {
        return Err(Error::BadFd);
    }
    let fd = fd as usize;
    with_table(|idx, table| {
        table.procs[idx].open_files[fd].ok_or(Error::BadFd).map(|f| (fd, f))
    })
}

/// Installs `file` in the calling process's lowest-numbered free file
/// descriptor slot.
pub fn fdalloc(file: FileRef) -> Result<usize> {
    with_table(|idx, table| {
        let slot = table.procs[idx]
            .open_files
            .iter_mut()
            .position(|f| f.is_none())
            .ok_or(Error::NoSpace)?;
        table.procs[idx].open_files[slot] = Some(file);
        Ok(slot)
    })
}

/// Clears the calling process's `fd` slot, without closing the file it
/// held (the caller does that first).
pub fn fdclear(fd: usize) {
    with_table(|idx, table| table.procs[idx].open_files[fd] = None);
}

/// The calling process's current working directory.
pub fn cwd() -> Option<InodeRef> {
    with_table(|idx, table| table.procs[idx].cwd)
}

/// Replaces the calling process's current working directory, dropping
/// the reference the old one held.
pub fn set_cwd(ip: InodeRef) {
    with_table(|idx, table| {
        if let Some(old) = table.procs[idx].cwd.take() {
            old.put();
        }
        table.procs[idx].cwd = Some(ip);
    });
}

/// Copies `src` into the calling process's address space at `dst_va`.
pub fn copy_out(dst_va: usize, src: &[u8]) -> Result<()> {
    with_table(|idx, table| {
        let pt = table.procs[idx].pagetable.as_ref().ok_or(Error::BadAddr)?;
        pt.copy_out(kernel().kmem(), dst_va, src)
    })
}

/// Copies `dst.len()` bytes out of the calling process's address space.
pub fn copy_in(dst: &mut [u8], src_va: usize) -> Result<()> {
    with_table(|idx, table| {
        let pt = table.procs[idx].pagetable.as_ref().ok_or(Error::BadAddr)?;
        pt.copy_in(kernel().kmem(), dst, src_va)
    })
}
