// TODO(https://github.com/kaist-cp/rv6/issues/120)
#![allow(dead_code)]

//! Architecture-dependent code.

pub mod addr;
pub mod memlayout;
pub mod plic;
pub mod poweroff;
pub mod riscv;
