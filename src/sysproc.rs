//! Process-related system calls. `spec.md §4.11`.
//!
//! Grounded on the teacher's `sysproc.rs`, adapted from its
//! `Kernel`-method/`myproc()` style to this crate's free-function
//! `crate::proc` API.
use crate::error::Result;
use crate::kernel::kernel;
use crate::syscall::argint;

pub fn sys_fork() -> Result<usize> {
    crate::proc::fork().map(|pid| pid as usize)
}

/// Never returns: the calling process becomes a ZOMBIE and parks for
/// the scheduler. `SYS_EXIT`'s match arm takes this value directly
/// rather than through `to_isize`, since there is no success/failure
/// distinction to report.
pub fn sys_exit() -> isize {
    let status = argint(0);
    crate::proc::exit_current(status)
}

pub fn sys_wait() -> Result<usize> {
    crate::proc::wait().map(|pid| pid as usize)
}

pub fn sys_kill() -> Result<usize> {
    let pid = argint(0);
    crate::proc::kill(pid).map(|()| 0)
}

pub fn sys_getpid() -> Result<usize> {
    Ok(crate::proc::myproc_pid().expect("getpid: no current process") as usize)
}

/// Grows or shrinks the calling process's address space, returning its
/// size *before* the change (the classic `sbrk` convention).
pub fn sys_sbrk() -> Result<usize> {
    let n = argint(0) as isize;
    crate::proc::growproc(n)
}

/// Blocks until `n` timer ticks have elapsed, or the caller is killed.
pub fn sys_sleep() -> Result<usize> {
    let n = argint(0) as u32;
    let mut ticks = kernel().ticks().lock();
    let ticks0 = *ticks;
    while ticks.wrapping_sub(ticks0) < n {
        if crate::proc::myproc_killed() {
            return Err(crate::error::Error::Killed);
        }
        ticks.sleep();
    }
    Ok(0)
}

pub fn sys_uptime() -> Result<usize> {
    Ok(*kernel().ticks().lock() as usize)
}
