//! Busy-waiting locks with interrupt-disable nesting.
//!
//! `spec.md §4.1`. Acquiring a spinlock disables hardware interrupts on
//! the calling CPU; a per-CPU nesting counter (`push_off`/`pop_off`)
//! lets code that holds multiple spinlocks compose without
//! re-enabling interrupts early, and lets a thread that entered with
//! interrupts already off leave them off.
use core::hint::spin_loop;
use core::sync::atomic::{AtomicUsize, Ordering};

use super::{Lock, RawLock};
use crate::arch;
use crate::proc::cpu;

/// Sentinel meaning "no CPU holds this lock".
const NONE: usize = usize::MAX;

/// Busy-waiting mutual-exclusion strategy.
pub struct RawSpinlock {
    name: &'static str,
    /// `cpu::cpuid()` of the holder, or [`NONE`].
    holder: AtomicUsize,
}

pub type Spinlock<T> = Lock<RawSpinlock, T>;
pub type SpinlockGuard<'s, T> = super::Guard<'s, RawSpinlock, T>;

impl RawSpinlock {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            holder: AtomicUsize::new(NONE),
        }
    }
}

impl RawLock for RawSpinlock {
    fn acquire(&self) {
        // Disable interrupts before touching `holder`: an interrupt
        // handler that needed this same lock could otherwise deadlock
        // against ourselves.
        unsafe { push_off() };
        assert!(!self.holding(), "acquire: already holding {}", self.name);

        let me = cpu::cpuid();
        while self
            .holder
            .compare_exchange_weak(NONE, me, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            spin_loop();
        }
    }

    fn release(&self) {
        assert!(self.holding(), "release: not holding {}", self.name);
        self.holder.store(NONE, Ordering::Release);
        unsafe { pop_off() };
    }

    fn holding(&self) -> bool {
        self.holder.load(Ordering::Relaxed) == cpu::cpuid()
    }
}

impl<T> Spinlock<T> {
    pub const fn new_named(name: &'static str, data: T) -> Self {
        Self::new(RawSpinlock::new(name), data)
    }
}

/// Disables interrupts on this CPU, tracking nesting depth so that
/// `pop_off` only re-enables interrupts once the outermost spinlock is
/// released. Mirrors the original xv6 `push_off`/`pop_off` exactly.
///
/// # Safety
/// Must be paired with a matching `pop_off`.
pub unsafe fn push_off() {
    let was_enabled = arch::platform().interrupts_enabled();
    arch::platform().disable_interrupts();

    let c = unsafe { &mut *cpu::mycpu() };
    if c.noff == 0 {
        c.interrupt_enabled = was_enabled;
    }
    c.noff += 1;
}

/// Undoes one `push_off`. Once nesting returns to zero, restores
/// whatever interrupt-enabled state was in effect before the first
/// `push_off`.
///
/// # Safety
/// Must follow a matching `push_off`; panics (kernel invariant
/// violation, `spec.md §7`) if interrupts are found enabled or nesting
/// underflows.
pub unsafe fn pop_off() {
    assert!(
        !arch::platform().interrupts_enabled(),
        "pop_off: interruptible"
    );
    let c = unsafe { &mut *cpu::mycpu() };
    assert!(c.noff >= 1, "pop_off: unbalanced");
    c.noff -= 1;
    if c.noff == 0 && c.interrupt_enabled {
        arch::platform().enable_interrupts();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_release_roundtrip() {
        let lock: Spinlock<i32> = Spinlock::new_named("test", 0);
        {
            let mut g = lock.lock();
            *g += 1;
        }
        assert_eq!(*lock.lock(), 1);
    }

    #[test]
    #[should_panic(expected = "already holding")]
    fn double_acquire_panics() {
        let lock: Spinlock<i32> = Spinlock::new_named("test", 0);
        let _g1 = lock.lock();
        let _g2 = lock.lock();
    }

    #[test]
    fn nesting_restores_interrupt_state() {
        let outer: Spinlock<i32> = Spinlock::new_named("outer", 0);
        let inner: Spinlock<i32> = Spinlock::new_named("inner", 0);
        assert!(crate::arch::platform().interrupts_enabled());
        let g1 = outer.lock();
        let g2 = inner.lock();
        assert!(!crate::arch::platform().interrupts_enabled());
        drop(g2);
        assert!(!crate::arch::platform().interrupts_enabled());
        drop(g1);
        assert!(crate::arch::platform().interrupts_enabled());
    }
}
