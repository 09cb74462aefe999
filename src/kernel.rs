//! The kernel singleton. `spec.md §1`: ties every subsystem together
//! behind one `kernel()` accessor.
//!
//! Grounded on the teacher's `kernel_builder()`/`kernel()` pair, minus
//! its `Pin`/`MaybeUninit` machinery (`DESIGN.md` simplification #3):
//! a `spin::Once<Kernel>` gives the same "initialize once, then hand
//! out shared references forever" shape without needing an `Unpin`
//! audit of every field.
use spin::Once;

use crate::bio::Bcache;
use crate::console::{Console, Uart};
use crate::disk::BlockDevice;
use crate::file::{Devsw, Ftable};
use crate::fs::FileSystem;
use crate::kalloc::Kmem;
use crate::lock::{Sleepablelock, Spinlock};
use crate::log::Log;
use crate::param::{CONSOLE_MAJOR, NDEV, ROOTDEV};
use crate::proc::{CpuTable, Procs};

static KERNEL: Once<Kernel> = Once::new();

/// Panics if called before [`init`]. Every subsystem above this module
/// reaches shared state through this accessor, never through a
/// smuggled-in reference.
pub fn kernel() -> &'static Kernel {
    KERNEL.get().expect("kernel: used before init()")
}

pub struct Kernel {
    kmem: Spinlock<Kmem>,
    cpus: CpuTable,
    procs: Procs,
    bcache: Bcache,
    disk: &'static dyn BlockDevice,
    log: Log,
    fs: FileSystem,
    ftable: Ftable,
    console: Console,
    /// Timer-interrupt tick count. `sys_sleep`/`sys_uptime` read and
    /// wait on it; the interrupt that bumps it is out of scope
    /// (`crate::kernel` docs), so `tick` is also callable directly by
    /// tests and any platform glue standing in for that ISR.
    ticks: Sleepablelock<u32>,
}

impl Kernel {
    pub fn kmem(&self) -> &Spinlock<Kmem> {
        &self.kmem
    }

    pub fn cpus(&self) -> &CpuTable {
        &self.cpus
    }

    pub fn procs(&self) -> &Procs {
        &self.procs
    }

    pub fn bcache(&self) -> &Bcache {
        &self.bcache
    }

    pub fn disk(&self) -> &'static dyn BlockDevice {
        self.disk
    }

    pub fn log(&self) -> &Log {
        &self.log
    }

    pub fn fs(&'static self) -> &'static FileSystem {
        &self.fs
    }

    pub fn ftable(&self) -> &Ftable {
        &self.ftable
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn ticks(&self) -> &Sleepablelock<u32> {
        &self.ticks
    }

    /// Advances the tick count and wakes anything blocked in
    /// `sys_sleep`. A platform's timer interrupt calls this once per
    /// tick; tests call it directly.
    pub fn tick(&self) {
        let mut ticks = self.ticks.lock();
        *ticks = ticks.wrapping_add(1);
        ticks.wakeup();
    }
}

/// Brings up every subsystem and installs the global singleton.
/// `spec.md §4.8`'s "recovery runs before any other file-system
/// access" governs the ordering here: mount, then replay the log,
/// only then is `kernel()` usable at all.
///
/// # Safety
/// `arena` must be a region of memory this kernel owns exclusively,
/// sized and aligned for use as the physical page allocator's backing
/// store, and this must be called at most once.
pub unsafe fn init(
    arena: &'static mut [u8],
    disk: &'static dyn BlockDevice,
    uart: &'static dyn Uart,
) -> &'static Kernel {
    let kmem = unsafe { Kmem::new(arena) };
    let fs = FileSystem::mount(disk, ROOTDEV);
    let log = Log::new(ROOTDEV, fs.superblock().logstart);
    log.recover(disk);
    ::log::info!("log recovered, {} blocks reserved at {}", crate::param::LOGSIZE, fs.superblock().logstart);

    let mut devsw = [Devsw::default(); NDEV];
    devsw[CONSOLE_MAJOR as usize] = Devsw {
        read: Some(crate::console::console_read),
        write: Some(crate::console::console_write),
    };

    KERNEL.call_once(|| Kernel {
        kmem: Spinlock::new_named("kmem", kmem),
        cpus: CpuTable::new(),
        procs: Procs::new(),
        bcache: Bcache::new(),
        disk,
        log,
        fs,
        ftable: Ftable::new(devsw),
        console: Console::new(uart),
        ticks: Sleepablelock::new_named("ticks", 0),
    });
    ::log::info!("kernel initialized");
    kernel()
}
