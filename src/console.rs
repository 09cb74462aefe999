//! Console device: line-at-a-time input/output over an injected
//! [`Uart`] seam.
//!
//! `spec.md §1, §6` puts the real UART and its line discipline out of
//! scope; only the `devsw` contract (a major-number-addressable
//! read/write pair) matters to the rest of the kernel. This still
//! implements the classic erase/kill/EOF line discipline over the
//! trait seam, both because it's the one piece of the contract other
//! code (`sh`, `cat`, ...) actually depends on and because it is
//! otherwise untestable without *some* concrete backing. Grounded on
//! the teacher's `console.rs` `Console::read`/`intr`.
use crate::error::Result;
use crate::lock::Sleepablelock;

const INPUT_BUF: usize = 128;

const CTRL_H: u8 = 0x08;
const CTRL_U: u8 = 0x15;
const CTRL_D: u8 = 0x04;

/// The narrow seam standing in for a real UART driver. A platform
/// implements this; everything above only calls through it.
pub trait Uart: Send + Sync {
    /// Transmits one byte, blocking if the hardware's output register
    /// is momentarily full.
    fn put(&self, byte: u8);
    /// Non-blocking receive: `None` if nothing is waiting.
    fn poll(&self) -> Option<u8>;
}

struct InputBuffer {
    buf: [u8; INPUT_BUF],
    r: usize,
    w: usize,
    e: usize,
}

impl InputBuffer {
    const fn new() -> Self {
        Self {
            buf: [0; INPUT_BUF],
            r: 0,
            w: 0,
            e: 0,
        }
    }
}

pub struct Console {
    uart: &'static dyn Uart,
    input: Sleepablelock<InputBuffer>,
}

impl Console {
    pub const fn new(uart: &'static dyn Uart) -> Self {
        Self {
            uart,
            input: Sleepablelock::new_named("console", InputBuffer::new()),
        }
    }

    /// Drains whatever the UART has buffered, applying the line
    /// discipline and waking a blocked reader once a full line (or
    /// EOF) has accumulated. A platform calls this from its receive
    /// interrupt; tests call it directly to inject bytes.
    pub fn feed(&self) {
        let mut input = self.input.lock();
        while let Some(c) = self.uart.poll() {
            match c {
                CTRL_H | 0x7f => {
                    if input.e != input.w {
                        input.e -= 1;
                        self.uart.put(CTRL_H);
                        self.uart.put(b' ');
                        self.uart.put(CTRL_H);
                    }
                }
                CTRL_U => {
                    while input.e != input.w && input.buf[(input.e - 1) % INPUT_BUF] != b'\n' {
                        input.e -= 1;
                        self.uart.put(CTRL_H);
                        self.uart.put(b' ');
                        self.uart.put(CTRL_H);
                    }
                }
                _ => {
                    if input.e - input.r < INPUT_BUF {
                        let c = if c == b'\r' { b'\n' } else { c };
                        self.uart.put(c);
                        input.buf[input.e % INPUT_BUF] = c;
                        input.e += 1;
                        if c == b'\n' || c == CTRL_D || input.e - input.r == INPUT_BUF {
                            input.w = input.e;
                            input.wakeup();
                        }
                    }
                }
            }
        }
    }

    /// Reads one line (or up to `dst.len()` bytes), blocking until
    /// `feed` has delivered a newline or EOF marker.
    pub fn read(&self, dst: &mut [u8]) -> Result<usize> {
        let mut input = self.input.lock();
        let mut n = 0;
        loop {
            while input.r == input.w {
                input.sleep();
            }
            let c = input.buf[input.r % INPUT_BUF];
            input.r += 1;
            if c == CTRL_D {
                if n == 0 {
                    return Ok(0);
                }
                input.r -= 1;
                break;
            }
            if n < dst.len() {
                dst[n] = c;
                n += 1;
            }
            if c == b'\n' || n == dst.len() {
                break;
            }
        }
        Ok(n)
    }

    pub fn write(&self, src: &[u8]) -> Result<usize> {
        for &b in src {
            self.uart.put(b);
        }
        Ok(src.len())
    }
}

pub fn console_read(dst: &mut [u8]) -> Result<usize> {
    crate::kernel::kernel().console().read(dst)
}

pub fn console_write(src: &[u8]) -> Result<usize> {
    crate::kernel::kernel().console().write(src)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeUart {
        rx: Mutex<std::collections::VecDeque<u8>>,
        tx: Mutex<std::vec::Vec<u8>>,
    }

    impl FakeUart {
        fn new(input: &[u8]) -> Self {
            Self {
                rx: Mutex::new(input.iter().copied().collect()),
                tx: Mutex::new(std::vec::Vec::new()),
            }
        }
    }

    impl Uart for FakeUart {
        fn put(&self, byte: u8) {
            self.tx.lock().unwrap().push(byte);
        }

        fn poll(&self) -> Option<u8> {
            self.rx.lock().unwrap().pop_front()
        }
    }

    #[test]
    fn feed_then_read_returns_one_line() {
        let uart = Box::leak(Box::new(FakeUart::new(b"hi\n")));
        let console = Console::new(uart);
        console.feed();
        let mut buf = [0u8; 16];
        let n = console.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hi\n");
    }

    #[test]
    fn backspace_erases_the_last_buffered_character() {
        let uart = Box::leak(Box::new(FakeUart::new(b"hix\x08\n")));
        let console = Console::new(uart);
        console.feed();
        let mut buf = [0u8; 16];
        let n = console.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hi\n");
    }

    #[test]
    fn eof_with_no_pending_input_reads_as_empty() {
        let uart = Box::leak(Box::new(FakeUart::new(&[CTRL_D])));
        let console = Console::new(uart);
        console.feed();
        let mut buf = [0u8; 16];
        assert_eq!(console.read(&mut buf).unwrap(), 0);
    }
}
