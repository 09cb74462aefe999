//! The process table and scheduler. `spec.md §3, §4.4, §4.5`.
use core::sync::atomic::{AtomicU32, Ordering};

use super::context::{Context, TrapFrame};
use super::cpu;
use super::waitchannel::WaitChannel;
use crate::error::{Error, Result};
use crate::file::FileRef;
use crate::fs::InodeRef;
use crate::kernel::kernel;
use crate::lock::{Spinlock, SpinlockGuard};
use crate::param::{MAXPROCNAME, NOFILE, NPROC};
use crate::vm::PageTable;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ProcState {
    #[default]
    Unused,
    Embryo,
    Sleeping,
    Runnable,
    Running,
    Zombie,
}

/// One process-table slot. `spec.md §3`'s "process record".
pub struct Proc {
    pub state: ProcState,
    pub pid: u32,
    pub killed: bool,
    /// Valid only while `state == Sleeping`.
    pub chan: Option<usize>,
    /// Index into the same table.
    pub parent: Option<usize>,
    pub sz: usize,
    pub pagetable: Option<PageTable>,
    pub trapframe: TrapFrame,
    pub context: Context,
    pub name: [u8; MAXPROCNAME],
    pub open_files: [Option<FileRef>; NOFILE],
    pub cwd: Option<InodeRef>,
    /// Channel other processes sleep on when waiting for this one, e.g.
    /// a parent blocked in `wait`.
    pub wait_chan: WaitChannel,
}

impl Proc {
    pub(super) const fn new() -> Self {
        Self {
            state: ProcState::Unused,
            pid: 0,
            killed: false,
            chan: None,
            parent: None,
            sz: 0,
            pagetable: None,
            trapframe: TrapFrame::new(),
            context: Context::new(),
            name: [0; MAXPROCNAME],
            open_files: [None; NOFILE],
            cwd: None,
            wait_chan: WaitChannel::new(),
        }
    }

    pub fn name(&self) -> &[u8] {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        &self.name[..len]
    }

    fn set_name(&mut self, name: &[u8]) {
        let len = name.len().min(self.name.len());
        self.name[..len].copy_from_slice(&name[..len]);
        self.name[len..].fill(0);
    }
}

pub struct ProcTable {
    pub procs: [Proc; NPROC],
    next_pid: AtomicU32,
}

impl ProcTable {
    fn new() -> Self {
        Self {
            procs: core::array::from_fn(|_| Proc::new()),
            next_pid: AtomicU32::new(1),
        }
    }

    fn alloc(&mut self) -> Option<usize> {
        let idx = self.procs.iter().position(|p| p.state == ProcState::Unused)?;
        let pid = self.next_pid.fetch_add(1, Ordering::Relaxed);
        let p = &mut self.procs[idx];
        *p = Proc::new();
        p.state = ProcState::Embryo;
        p.pid = pid;
        Some(idx)
    }
}

pub struct Procs {
    table: Spinlock<ProcTable>,
}

impl Procs {
    pub(crate) fn new() -> Self {
        Self {
            table: Spinlock::new_named("proc_table", ProcTable::new()),
        }
    }
}

pub(super) fn lock_table() -> SpinlockGuard<'static, ProcTable> {
    kernel().procs().table.lock()
}

/// Public door into the same lock, for `syscall.rs`'s argument fetchers.
pub fn table_for_syscalls() -> SpinlockGuard<'static, ProcTable> {
    lock_table()
}

/// Index, in the process table, of the process running on this CPU.
pub fn myproc_idx() -> Option<usize> {
    // SAFETY: reading our own CPU's slot; no concurrent writer since
    // only this CPU assigns its own `proc_idx`.
    unsafe { (*cpu::mycpu()).proc_idx }
}

/// The pid of the calling process, or `None` outside any process.
pub fn myproc_pid() -> Option<i32> {
    let idx = myproc_idx()?;
    Some(lock_table().procs[idx].pid as i32)
}

/// Whether the calling process has been marked killed. Sleep loops
/// that block indefinitely (pipe read/write, `sys_sleep`) must check
/// this on every wakeup, since `kill` only promotes a sleeper to
/// RUNNABLE -- it cannot unwind the loop itself. `spec.md §5`.
pub fn myproc_killed() -> bool {
    match myproc_idx() {
        Some(idx) => lock_table().procs[idx].killed,
        None => false,
    }
}

/// Binds the process at `idx` (or none) to the current CPU. Called by
/// the scheduler right before a real platform would context-switch
/// into it, and directly by tests standing in for that dispatch.
///
/// # Safety
/// Must only be called for the CPU actually executing this code.
pub unsafe fn bind_current(idx: Option<usize>) {
    unsafe { (*cpu::mycpu()).proc_idx = idx };
}

/// Scans for a RUNNABLE process and marks it RUNNING. Pure scheduling
/// decision, split out from any context-switch mechanics so it is
/// testable on its own. `spec.md §4.4`.
pub fn scheduler_pick(table: &mut ProcTable) -> Option<usize> {
    let idx = table.procs.iter().position(|p| p.state == ProcState::Runnable)?;
    table.procs[idx].state = ProcState::Running;
    Some(idx)
}

/// Marks the calling process RUNNABLE again, surrendering the CPU for
/// one scheduling round. A real platform's timer ISR calls this on
/// preemption; it is also `sys_sleep`'s/voluntary-yield's exit point.
pub fn proc_yield() {
    let idx = myproc_idx().expect("yield: no current process");
    {
        let mut table = lock_table();
        table.procs[idx].state = ProcState::Runnable;
    }
    unsafe { bind_current(None) };
    super::waitchannel::park_until_woken(idx);
}

const INIT_PID: u32 = 1;

/// Builds the first user process. `spec.md §4.5`: "built from an
/// embedded init image; state=RUNNABLE, one page of user memory."
/// Supplying that image is `crate::vm::ExecLoader`'s job, not this
/// function's; `image` is whatever bytes the platform embeds.
pub fn userinit(image: &[u8]) -> Result<()> {
    let idx = {
        let mut table = lock_table();
        table.alloc().ok_or(Error::NoSpace)?
    };
    let pagetable = PageTable::new(kernel().kmem())?;
    let mut pagetable = pagetable;
    pagetable.map_first_page(kernel().kmem(), image)?;

    let mut table = lock_table();
    let p = &mut table.procs[idx];
    p.pagetable = Some(pagetable);
    p.sz = crate::param::PGSIZE;
    p.trapframe = TrapFrame::new();
    p.set_name(b"initcode");
    p.cwd = crate::fs::root_inode();
    p.state = ProcState::Runnable;
    debug_assert_eq!(p.pid, INIT_PID);
    Ok(())
}

/// Deep-copies the calling process into a new child slot: fresh frames
/// with the parent's contents (never shared pages), duplicated open
/// files and cwd, a zeroed return register in the copied trap frame.
/// `spec.md §4.5`.
pub fn fork() -> Result<i32> {
    let parent_idx = myproc_idx().expect("fork: no current process");

    let (parent_pagetable_copy, parent_sz, parent_trapframe, parent_files, parent_cwd) = {
        let table = lock_table();
        let p = &table.procs[parent_idx];
        let pt = p
            .pagetable
            .as_ref()
            .expect("fork: parent has no address space")
            .copy_with_contents(kernel().kmem(), p.sz)?;
        (pt, p.sz, p.trapframe, p.open_files, p.cwd)
    };

    let mut table = lock_table();
    let child_idx = match table.alloc() {
        Some(idx) => idx,
        None => return Err(Error::NoSpace),
    };
    let pid = table.procs[child_idx].pid;
    {
        let parent_name = table.procs[parent_idx].name;
        let child = &mut table.procs[child_idx];
        child.pagetable = Some(parent_pagetable_copy);
        child.sz = parent_sz;
        child.trapframe = parent_trapframe;
        child.trapframe.set_return_value(0);
        child.open_files = parent_files.map(|f| f.map(|fr| fr.dup()));
        child.cwd = parent_cwd.map(|c| c.dup());
        child.parent = Some(parent_idx);
        child.set_name(&parent_name);
        child.state = ProcState::Runnable;
    }
    Ok(pid as i32)
}

/// Reassigns every child of `idx` to the init process, waking init if
/// any reparented child is already a ZOMBIE. Preserves the invariant
/// that every live process has a waitable parent. `spec.md §4.5`.
fn reparent_to_init(table: &mut ProcTable, idx: usize) {
    let init_idx = table.procs.iter().position(|p| p.pid == INIT_PID);
    for i in 0..table.procs.len() {
        if table.procs[i].parent == Some(idx) {
            table.procs[i].parent = init_idx;
        }
    }
    if let Some(init_idx) = init_idx {
        let any_zombie = table
            .procs
            .iter()
            .any(|p| p.parent == Some(init_idx) && p.state == ProcState::Zombie);
        if any_zombie {
            table.procs[init_idx].wait_chan.wakeup();
        }
    }
}

/// Closes all open files (inside a log transaction), drops the cwd,
/// reparents children, wakes the parent, and becomes a ZOMBIE.
/// `spec.md §4.5`. Never returns: the caller must immediately yield to
/// the scheduler.
pub fn exit_current(status: i32) -> ! {
    let idx = myproc_idx().expect("exit: no current process");

    crate::log::begin_op();
    {
        let mut table = lock_table();
        let p = &mut table.procs[idx];
        for slot in p.open_files.iter_mut() {
            if let Some(f) = slot.take() {
                f.close();
            }
        }
        if let Some(cwd) = p.cwd.take() {
            cwd.put();
        }
    }
    crate::log::end_op();

    let mut table = lock_table();
    reparent_to_init(&mut table, idx);
    let parent = table.procs[idx].parent;
    table.procs[idx].state = ProcState::Zombie;
    let _ = status;
    drop(table);

    if let Some(parent_idx) = parent {
        lock_table().procs[parent_idx].wait_chan.wakeup();
    }

    unsafe { bind_current(None) };
    loop {
        core::hint::spin_loop();
    }
}

/// Blocks until a child becomes a ZOMBIE, then reclaims it (frees its
/// page table and kernel resources, marks the slot UNUSED) and returns
/// its pid. `spec.md §4.5`.
pub fn wait() -> Result<i32> {
    let my_idx = myproc_idx().expect("wait: no current process");
    let mut table = lock_table();
    loop {
        let mut have_children = false;
        for i in 0..table.procs.len() {
            if table.procs[i].parent != Some(my_idx) {
                continue;
            }
            have_children = true;
            if table.procs[i].state == ProcState::Zombie {
                let pid = table.procs[i].pid;
                if let Some(pt) = table.procs[i].pagetable.take() {
                    pt.destroy(kernel().kmem(), table.procs[i].sz);
                }
                table.procs[i] = Proc::new();
                return Ok(pid as i32);
            }
        }
        if !have_children || table.procs[my_idx].killed {
            return Err(Error::NoChildren);
        }
        table.procs[my_idx].chan = Some(&table.procs[my_idx].wait_chan as *const _ as usize);
        table.procs[my_idx].state = ProcState::Sleeping;
        drop(table);
        super::waitchannel::park_until_woken(my_idx);
        table = lock_table();
        table.procs[my_idx].chan = None;
    }
}

/// Sets the target's killed flag; if it is SLEEPING, promotes it to
/// RUNNABLE so it observes the flag promptly. `spec.md §4.5`.
pub fn kill(pid: i32) -> Result<()> {
    let mut table = lock_table();
    let idx = table
        .procs
        .iter()
        .position(|p| p.pid as i32 == pid && p.state != ProcState::Unused)
        .ok_or(Error::NotFound)?;
    table.procs[idx].killed = true;
    if table.procs[idx].state == ProcState::Sleeping {
        table.procs[idx].state = ProcState::Runnable;
    }
    Ok(())
}

/// Grows or shrinks the calling process's user memory by `delta`
/// bytes, (de)allocating frames as needed. Backs the `sbrk` syscall.
pub fn growproc(delta: isize) -> Result<usize> {
    let idx = myproc_idx().expect("growproc: no current process");
    let mut table = lock_table();
    let old_sz = table.procs[idx].sz;
    let pagetable = table.procs[idx]
        .pagetable
        .as_mut()
        .expect("growproc: no address space");
    let new_sz = if delta >= 0 {
        pagetable.grow(kernel().kmem(), old_sz, old_sz + delta as usize)?
    } else {
        pagetable.shrink(kernel().kmem(), old_sz, old_sz - (-delta) as usize)
    };
    table.procs[idx].sz = new_sz;
    Ok(old_sz)
}
