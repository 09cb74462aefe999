//! Saved register state.
//!
//! The actual save/restore sequence is a `swtch`-style routine written
//! in assembly for the target architecture -- out of scope here along
//! with the rest of CPU bring-up. `Context` and `TrapFrame` are plain
//! data the scheduler and trap path move around; a platform crate is
//! responsible for filling and consuming them.

/// Callee-saved registers for a kernel-to-kernel context switch.
#[derive(Clone, Copy, Default)]
#[repr(C)]
pub struct Context {
    pub regs: [usize; 16],
}

impl Context {
    pub const fn new() -> Self {
        Self { regs: [0; 16] }
    }
}

/// Saved user registers, captured on trap entry and restored on
/// return to user mode. `spec.md §3` calls this out as a `Proc` field
/// without prescribing a layout; `regs[0]` is treated as the syscall
/// return-value register, matching every architecture this kernel's
/// ports target.
#[derive(Clone, Copy, Default)]
#[repr(C)]
pub struct TrapFrame {
    pub regs: [usize; 32],
}

impl TrapFrame {
    pub const fn new() -> Self {
        Self { regs: [0; 32] }
    }

    /// Sets the register `sys_exit`/`sys_fork` use to report a syscall
    /// result, or that `fork` zeroes in the child (`spec.md §4.5`).
    pub fn set_return_value(&mut self, v: usize) {
        self.regs[0] = v;
    }

    /// The `n`th syscall argument register, `a0`-style: `regs[0]` is
    /// reserved for the return value, so arguments start at `regs[1]`.
    pub fn arg_raw(&self, n: usize) -> usize {
        self.regs[1 + n]
    }
}
