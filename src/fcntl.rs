//! `open` mode flags. `spec.md §4.11`.
use bitflags::bitflags;

bitflags! {
    pub struct OpenFlags: i32 {
        const O_RDONLY = 0;
        const O_WRONLY = 0x1;
        const O_RDWR = 0x2;
        const O_CREATE = 0x200;
    }
}
