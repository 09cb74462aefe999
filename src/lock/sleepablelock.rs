//! Spinlocks whose guard can park the caller on a wait channel.
use super::spinlock::RawSpinlock;
use super::{Lock, RawLock};
use crate::proc::WaitChannel;

pub struct RawSleepablelock {
    inner: RawSpinlock,
    waitchannel: WaitChannel,
}

pub type Sleepablelock<T> = Lock<RawSleepablelock, T>;
pub type SleepablelockGuard<'s, T> = super::Guard<'s, RawSleepablelock, T>;

impl RawSleepablelock {
    const fn new(name: &'static str) -> Self {
        Self {
            inner: RawSpinlock::new(name),
            waitchannel: WaitChannel::new(),
        }
    }
}

impl RawLock for RawSleepablelock {
    fn acquire(&self) {
        self.inner.acquire();
    }

    fn release(&self) {
        self.inner.release();
    }

    fn holding(&self) -> bool {
        self.inner.holding()
    }
}

impl<T> Sleepablelock<T> {
    pub const fn new_named(name: &'static str, data: T) -> Self {
        Self::new(RawSleepablelock::new(name), data)
    }
}

impl<T> SleepablelockGuard<'_, T> {
    /// Atomically releases this lock and blocks the caller on its wait
    /// channel; reacquires the lock before returning. `spec.md §4.3`.
    pub fn sleep(&mut self) {
        let chan = self.waitchannel() as *const WaitChannel;
        // SAFETY: `chan` outlives the sleep since it is embedded in the
        // same `Lock` this guard borrows from.
        unsafe { (*chan).sleep(self) }
    }

    /// Wakes every process sleeping on this lock's wait channel.
    pub fn wakeup(&self) {
        self.waitchannel().wakeup();
    }

    fn waitchannel(&self) -> &WaitChannel {
        &self.lock.raw.waitchannel
    }
}
