//! Sleep/wakeup coordination. `spec.md §4.3`.
use core::hint::spin_loop;

use super::table::{lock_table, myproc_idx, ProcState};
use crate::lock::Waitable;

/// An opaque sleep channel. Its own address is the channel identity,
/// exactly as in the original C kernel's `(void *)chan` convention --
/// any stable address can serve as a channel, but embedding one of
/// these in the data being waited on documents the pairing.
pub struct WaitChannel;

impl WaitChannel {
    pub const fn new() -> Self {
        Self
    }

    fn id(&self) -> usize {
        self as *const Self as usize
    }

    /// Atomically releases `guard` and blocks the calling process until
    /// some other process calls `wakeup` on this channel. Reacquires
    /// `guard` before returning. `spec.md §4.3`.
    ///
    /// Must not be called while already holding the process-table
    /// lock; `proc::wait` sleeps on a process record directly against
    /// that lock instead, since releasing and reacquiring it there
    /// would be a no-op wrapped around a deadlock.
    pub fn sleep<W: Waitable>(&self, guard: &mut W) {
        let idx = myproc_idx().expect("sleep: no current process");
        let mut table = lock_table();
        // SAFETY: reacquired below before returning.
        unsafe { guard.raw_release() };
        table.procs[idx].chan = Some(self.id());
        table.procs[idx].state = ProcState::Sleeping;
        drop(table);

        park_until_woken(idx);

        let mut table = lock_table();
        table.procs[idx].chan = None;
        drop(table);
        // SAFETY: paired with the release above.
        unsafe { guard.raw_acquire() };
    }

    /// Moves every process sleeping on this channel to RUNNABLE.
    /// Spurious wakeups are fine: sleepers loop on their own condition.
    pub fn wakeup(&self) {
        let mut table = lock_table();
        let id = self.id();
        for p in table.procs.iter_mut() {
            if p.state == ProcState::Sleeping && p.chan == Some(id) {
                p.state = ProcState::Runnable;
            }
        }
    }
}

impl Default for WaitChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Blocks the caller until `idx`'s state is no longer SLEEPING.
///
/// There is no real per-process kernel stack to switch away from and
/// back to here (`spec.md §1` puts that machinery out of scope); the
/// calling thread itself is the process's thread of control, so
/// "switch to the scheduler" is modeled as releasing the process-table
/// lock and polling it until woken, rather than a true context switch.
pub(super) fn park_until_woken(idx: usize) {
    loop {
        {
            let table = lock_table();
            if table.procs[idx].state != ProcState::Sleeping {
                return;
            }
        }
        spin_loop();
    }
}
