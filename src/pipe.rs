//! Anonymous pipes. `spec.md §5`.
//!
//! A fixed `NPIPE`-slot table of ring buffers, each behind its own
//! [`Sleepablelock`] so a blocked reader/writer can park on a
//! [`WaitChannel`] without busy-waiting. Grounded on the teacher's
//! `pipe.rs` `Pipe::read`/`Pipe::write` try-then-sleep loop, adapted
//! from its `Page`-backed single pipe to a fixed table of slots (the
//! GAT arena the teacher otherwise uses for this is one of the
//! deliberate simplifications recorded in `DESIGN.md`).
use crate::error::{Error, Result};
use crate::lock::Sleepablelock;
use crate::param::PIPESIZE;
use crate::proc::WaitChannel;

const NPIPE: usize = 16;

struct PipeInner {
    in_use: bool,
    data: [u8; PIPESIZE],
    nread: usize,
    nwrite: usize,
    readopen: bool,
    writeopen: bool,
}

impl PipeInner {
    const fn empty() -> Self {
        Self {
            in_use: false,
            data: [0; PIPESIZE],
            nread: 0,
            nwrite: 0,
            readopen: false,
            writeopen: false,
        }
    }
}

struct PipeSlot {
    inner: Sleepablelock<PipeInner>,
    read_chan: WaitChannel,
    write_chan: WaitChannel,
}

pub struct PipeTable {
    slots: [PipeSlot; NPIPE],
}

/// Which end of a pipe a file descriptor refers to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PipeEnd {
    Read,
    Write,
}

#[derive(Clone, Copy)]
pub struct PipeRef {
    idx: usize,
}

impl PipeTable {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| PipeSlot {
                inner: Sleepablelock::new_named("pipe", PipeInner::empty()),
                read_chan: WaitChannel::new(),
                write_chan: WaitChannel::new(),
            }),
        }
    }

    /// Allocates a fresh pipe with both ends open.
    pub fn alloc(&self) -> Result<PipeRef> {
        for (idx, slot) in self.slots.iter().enumerate() {
            let mut inner = slot.inner.lock();
            if !inner.in_use {
                *inner = PipeInner {
                    in_use: true,
                    data: [0; PIPESIZE],
                    nread: 0,
                    nwrite: 0,
                    readopen: true,
                    writeopen: true,
                };
                return Ok(PipeRef { idx });
            }
        }
        Err(Error::NoSpace)
    }

    fn slot(&self, p: PipeRef) -> &PipeSlot {
        &self.slots[p.idx]
    }

    /// Reads up to `dst.len()` bytes, blocking while the pipe is empty
    /// and the write end is still open. Returns `0` at EOF. `spec.md
    /// §5`.
    pub fn read(&self, p: PipeRef, dst: &mut [u8]) -> Result<usize> {
        let slot = self.slot(p);
        let mut inner = slot.inner.lock();
        loop {
            if inner.nread < inner.nwrite {
                let mut n = 0;
                while n < dst.len() && inner.nread < inner.nwrite {
                    dst[n] = inner.data[inner.nread % PIPESIZE];
                    inner.nread += 1;
                    n += 1;
                }
                slot.write_chan.wakeup();
                return Ok(n);
            }
            if !inner.writeopen {
                return Ok(0);
            }
            if crate::proc::myproc_killed() {
                return Err(Error::Killed);
            }
            slot.read_chan.sleep(&mut inner);
        }
    }

    /// Writes `src`, blocking while the ring buffer is full and the
    /// read end is still open. Fails with `PipeClosed` once the reader
    /// has gone away. `spec.md §5`.
    pub fn write(&self, p: PipeRef, src: &[u8]) -> Result<usize> {
        let slot = self.slot(p);
        let mut inner = slot.inner.lock();
        let mut written = 0;
        while written < src.len() {
            if !inner.readopen {
                return Err(Error::PipeClosed);
            }
            if inner.nwrite == inner.nread + PIPESIZE {
                slot.read_chan.wakeup();
                if crate::proc::myproc_killed() {
                    return Err(Error::Killed);
                }
                slot.write_chan.sleep(&mut inner);
                continue;
            }
            let n = (PIPESIZE - (inner.nwrite - inner.nread)).min(src.len() - written);
            for &b in &src[written..written + n] {
                inner.data[inner.nwrite % PIPESIZE] = b;
                inner.nwrite += 1;
            }
            written += n;
        }
        slot.read_chan.wakeup();
        Ok(written)
    }

    /// Closes one end of the pipe, waking the other side so a blocked
    /// peer observes EOF/`PipeClosed` promptly. Frees the slot once
    /// both ends are closed.
    pub fn close(&self, p: PipeRef, end: PipeEnd) {
        let slot = self.slot(p);
        let now_unused = {
            let mut inner = slot.inner.lock();
            match end {
                PipeEnd::Read => inner.readopen = false,
                PipeEnd::Write => inner.writeopen = false,
            }
            slot.read_chan.wakeup();
            slot.write_chan.wakeup();
            !inner.readopen && !inner.writeopen
        };
        if now_unused {
            slot.inner.lock().in_use = false;
        }
    }
}

impl Default for PipeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn write_then_read_round_trips_in_order() {
        let table = PipeTable::new();
        let p = table.alloc().unwrap();
        table.write(p, b"hello").unwrap();
        let mut buf = [0u8; 5];
        let n = table.read(p, &mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn read_blocks_until_a_writer_supplies_data() {
        let table = Arc::new(PipeTable::new());
        let p = table.alloc().unwrap();

        let reader_table = table.clone();
        let reader = thread::spawn(move || {
            let _proc = crate::proc::test_support::FakeProcess::bind();
            let mut buf = [0u8; 3];
            let n = reader_table.read(p, &mut buf).unwrap();
            (n, buf)
        });

        thread::sleep(std::time::Duration::from_millis(20));
        table.write(p, b"hi!").unwrap();

        let (n, buf) = reader.join().unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf, b"hi!");
    }

    #[test]
    fn read_returns_zero_at_eof_once_writer_closes() {
        let table = PipeTable::new();
        let p = table.alloc().unwrap();
        table.close(p, PipeEnd::Write);
        let mut buf = [0u8; 4];
        assert_eq!(table.read(p, &mut buf).unwrap(), 0);
    }

    #[test]
    fn write_fails_once_reader_has_closed() {
        let table = PipeTable::new();
        let p = table.alloc().unwrap();
        table.close(p, PipeEnd::Read);
        assert_eq!(table.write(p, b"x").unwrap_err(), Error::PipeClosed);
    }
}
