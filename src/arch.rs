//! The narrow hardware seam.
//!
//! `spec.md §1` puts bootstrap, CPU bring-up, and interrupt-vector
//! wiring out of scope: "treated as external collaborators whose
//! interface we merely cite." `Platform` is that citation. A real boot
//! loader/platform crate implements it over the actual APIC/PLIC and
//! installs it with [`set_platform`] before starting the scheduler;
//! this crate never constructs the production implementation itself.
use core::sync::atomic::{AtomicBool, Ordering};
use spin::Once;

/// Hardware operations the kernel core needs but does not implement.
pub trait Platform: Send + Sync {
    /// Index of the CPU executing this code, in `0..NCPU`.
    fn cpu_id(&self) -> usize;
    /// Whether hardware interrupts are currently enabled on this CPU.
    fn interrupts_enabled(&self) -> bool;
    /// Enables hardware interrupts on this CPU.
    fn enable_interrupts(&self);
    /// Disables hardware interrupts on this CPU.
    fn disable_interrupts(&self);
}

/// Single-core stand-in `Platform` used by tests and as the default
/// before a real platform is installed. Interrupt state is tracked with
/// a plain flag rather than touching real hardware, which is exactly
/// the contract callers need from the `push_off`/`pop_off` discipline
/// in `lock::spinlock`.
pub struct UniCore {
    enabled: AtomicBool,
}

impl UniCore {
    pub const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
        }
    }
}

impl Default for UniCore {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for UniCore {
    fn cpu_id(&self) -> usize {
        0
    }

    fn interrupts_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn enable_interrupts(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    fn disable_interrupts(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }
}

static DEFAULT_PLATFORM: UniCore = UniCore::new();
static ACTIVE_PLATFORM: Once<&'static dyn Platform> = Once::new();

/// Installs the platform implementation used by `push_off`/`pop_off`
/// and `proc::cpuid`. Must be called before starting any CPU other than
/// the boot CPU; not required for single-core use, which falls back to
/// [`UniCore`]. Only the first call takes effect, matching the
/// once-at-boot lifecycle `spec.md §9` describes for kernel singletons.
pub fn set_platform(platform: &'static dyn Platform) {
    ACTIVE_PLATFORM.call_once(|| platform);
}

/// Returns the currently installed platform, or a default if none has
/// been installed yet: [`UniCore`] in production, or, under test, a
/// per-OS-thread stand-in (see [`tests::TestPlatform`]) so that
/// `std::thread`-per-process test harnesses get independent CPU ids
/// and interrupt flags instead of aliasing CPU 0.
pub fn platform() -> &'static dyn Platform {
    #[cfg(not(test))]
    {
        *ACTIVE_PLATFORM.call_once(|| &DEFAULT_PLATFORM)
    }
    #[cfg(test)]
    {
        *ACTIVE_PLATFORM.call_once(|| &tests::TEST_PLATFORM)
    }
}

#[cfg(test)]
mod tests {
    use super::Platform;
    use crate::param::NCPU;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    std::thread_local! {
        static TID: Cell<Option<usize>> = const { Cell::new(None) };
        static IRQ: Cell<bool> = const { Cell::new(true) };
    }
    static NEXT_TID: AtomicUsize = AtomicUsize::new(0);

    /// One simulated CPU per OS thread: `cpu_id` and the
    /// interrupt-enabled flag are both thread-local, so concurrent
    /// `std::thread`s standing in for separate processes never alias
    /// each other's `Cpu` slot or `push_off` nesting state.
    pub struct TestPlatform;

    pub static TEST_PLATFORM: TestPlatform = TestPlatform;

    impl Platform for TestPlatform {
        fn cpu_id(&self) -> usize {
            TID.with(|c| {
                if let Some(id) = c.get() {
                    return id;
                }
                let id = NEXT_TID.fetch_add(1, Ordering::Relaxed) % NCPU;
                c.set(Some(id));
                id
            })
        }

        fn interrupts_enabled(&self) -> bool {
            IRQ.with(Cell::get)
        }

        fn enable_interrupts(&self) {
            IRQ.with(|c| c.set(true));
        }

        fn disable_interrupts(&self) {
            IRQ.with(|c| c.set(false));
        }
    }
}
