//! Per-CPU scheduler state.
//!
//! `spec.md §3`: "CPU record. Per logical processor: APIC id; pointer to
//! currently running process (or none); saved scheduler context;
//! interrupt-disable nesting counter `ncli`; saved 'interrupts were
//! enabled' flag restored at nesting = 0." A real APIC id is out of
//! scope (bootstrap); `arch::Platform::cpu_id` supplies the index.
use core::cell::UnsafeCell;

use super::context::Context;
use crate::arch;
use crate::kernel::kernel;
use crate::param::NCPU;

/// State belonging to one logical CPU. Only ever touched by the CPU
/// that owns it -- `mycpu()` hands out a raw pointer rather than a
/// lock, matching the original's "interrupts disabled, so no one else
/// can be looking at this" discipline.
pub struct Cpu {
    /// Index into the process table of the process running here, if any.
    pub proc_idx: Option<usize>,
    /// Scheduler's own saved context; `swtch` returns here.
    pub context: Context,
    /// `push_off` nesting depth.
    pub noff: i32,
    /// Interrupt-enabled state to restore once `noff` returns to zero.
    pub interrupt_enabled: bool,
}

impl Cpu {
    const fn new() -> Self {
        Self {
            proc_idx: None,
            context: Context::new(),
            noff: 0,
            interrupt_enabled: false,
        }
    }
}

pub struct CpuTable {
    cpus: [UnsafeCell<Cpu>; NCPU],
}

// SAFETY: each `Cpu` is only ever accessed by the CPU it belongs to,
// with interrupts disabled for any mutation (see `push_off`/`pop_off`).
unsafe impl Sync for CpuTable {}

impl CpuTable {
    pub const fn new() -> Self {
        const INIT: UnsafeCell<Cpu> = UnsafeCell::new(Cpu::new());
        Self {
            cpus: [INIT; NCPU],
        }
    }

    /// # Safety
    /// The caller must not alias this with another live `&mut Cpu` for
    /// the same index, and must only dereference it on the owning CPU.
    pub unsafe fn get(&self, id: usize) -> *mut Cpu {
        self.cpus[id].get()
    }
}

/// This CPU's id, in `0..NCPU`.
pub fn cpuid() -> usize {
    arch::platform().cpu_id()
}

/// Raw pointer to this CPU's state.
///
/// # Safety
/// Callers must already hold interrupts disabled (e.g. via
/// `push_off`) before touching fields that participate in the
/// `noff`/`interrupt_enabled` protocol, and must not keep the pointer
/// across a context switch to a different CPU.
pub unsafe fn mycpu() -> *mut Cpu {
    unsafe { kernel().cpus().get(cpuid()) }
}
