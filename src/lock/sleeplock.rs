//! Long-term locks for processes: block (sleep) instead of spinning.
//!
//! `spec.md §4.2`. Used where a lock may be held across I/O -- per-buffer
//! and per-inode exclusion -- so spinning would waste the CPU and risk
//! deadlock against the very I/O the holder is waiting for.
use super::{Lock, RawLock, Sleepablelock};
use crate::proc::myproc_pid;

/// `locked` holds the owning pid, or `-1` when free.
pub struct RawSleeplock {
    locked: Sleepablelock<i32>,
    name: &'static str,
}

pub type Sleeplock<T> = Lock<RawSleeplock, T>;
pub type SleeplockGuard<'s, T> = super::Guard<'s, RawSleeplock, T>;

impl RawSleeplock {
    fn new(name: &'static str) -> Self {
        Self {
            locked: Sleepablelock::new_named("sleeplock", -1),
            name: name,
        }
    }
}

impl RawLock for RawSleeplock {
    fn acquire(&self) {
        let mut locked = self.locked.lock();
        while *locked != -1 {
            locked.sleep();
        }
        *locked = myproc_pid().expect("Sleeplock::acquire outside a process");
    }

    fn release(&self) {
        let mut locked = self.locked.lock();
        assert!(*locked != -1, "release: not holding {}", self.name);
        *locked = -1;
        locked.wakeup();
    }

    fn holding(&self) -> bool {
        let pid = myproc_pid().unwrap_or(-1);
        *self.locked.lock() == pid
    }
}

impl<T> Sleeplock<T> {
    pub fn new_named(name: &'static str, data: T) -> Self {
        Self::new(RawSleeplock::new(name), data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncontended_roundtrip() {
        let _proc = crate::proc::test_support::FakeProcess::bind();
        let lock: Sleeplock<i32> = Sleeplock::new_named("test", 41);
        {
            let mut g = lock.lock();
            *g += 1;
        }
        assert_eq!(*lock.lock(), 42);
    }
}
