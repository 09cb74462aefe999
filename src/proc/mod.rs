//! Process table, scheduler, and per-CPU state. `spec.md §3, §4.4, §4.5`.
pub mod cpu;
mod context;
mod table;
mod waitchannel;

pub use context::{Context, TrapFrame};
pub use cpu::CpuTable;
pub use table::{
    exit_current, fork, growproc, kill, myproc_idx, myproc_killed, myproc_pid, proc_yield,
    scheduler_pick, table_for_syscalls, userinit, wait, Proc, ProcState, ProcTable, Procs,
};
pub use waitchannel::WaitChannel;

/// # Safety
/// See [`table::bind_current`].
pub use table::bind_current;

#[cfg(test)]
pub mod test_support {
    //! Lets unit tests outside this module exercise code paths (like
    //! `Sleeplock`) that require a current process, without going
    //! through `fork`/`userinit`.
    use super::table::{lock_table, ProcState};
    use super::{bind_current, Proc};

    pub struct FakeProcess(usize);

    impl FakeProcess {
        /// Allocates a table slot, marks it RUNNING, and binds it as
        /// the current process on this (test) thread's simulated CPU.
        pub fn bind() -> Self {
            let idx = {
                let mut table = lock_table();
                let idx = table
                    .procs
                    .iter()
                    .position(|p| p.state == ProcState::Unused)
                    .expect("process table full in test");
                table.procs[idx] = Proc::new();
                table.procs[idx].state = ProcState::Running;
                idx
            };
            unsafe { bind_current(Some(idx)) };
            Self(idx)
        }
    }

    impl Drop for FakeProcess {
        fn drop(&mut self) {
            unsafe { bind_current(None) };
            lock_table().procs[self.0] = Proc::new();
        }
    }
}
