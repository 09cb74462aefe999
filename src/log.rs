//! Crash-safe redo log. `spec.md §4.8`.
//!
//! On-disk layout: `[ header | data1 | data2 | … | dataN ]`, `N =
//! LOGSIZE` blocks reserved starting at `start`. The header records
//! how many blocks are currently logged and their home block numbers,
//! little-endian 32-bit fixed-width fields (`spec.md §9`).
use crate::bio::BufRef;
use crate::disk::BlockDevice;
use crate::kernel::kernel;
use crate::lock::Sleepablelock;
use crate::param::{BSIZE, LOGSIZE, MAXOPBLOCKS};

struct LogState {
    outstanding: u32,
    committing: bool,
    /// Number of blocks logged in the transaction currently being
    /// built (or committed).
    n: usize,
    /// Home block numbers for `block_numbers[..n]`.
    block_numbers: [u32; LOGSIZE],
}

impl LogState {
    const fn new() -> Self {
        Self {
            outstanding: 0,
            committing: false,
            n: 0,
            block_numbers: [0; LOGSIZE],
        }
    }
}

pub struct Log {
    dev: u32,
    /// Block number of the on-disk header; data blocks follow at
    /// `start + 1 ..= start + LOGSIZE`.
    start: u32,
    state: Sleepablelock<LogState>,
}

impl Log {
    pub fn new(dev: u32, start: u32) -> Self {
        Self {
            dev,
            start,
            state: Sleepablelock::new_named("log", LogState::new()),
        }
    }

    /// Replays a crash-interrupted commit. Idempotent: safe to call
    /// whether or not the previous run actually crashed. Must run
    /// before any other file-system access. `spec.md §4.8`.
    pub fn recover(&self, disk: &dyn BlockDevice) {
        let mut header = [0u8; BSIZE];
        disk.read_block(self.start, &mut header);
        let (n, block_numbers) = decode_header(&header);
        for i in 0..n {
            let mut block = [0u8; BSIZE];
            disk.read_block(self.start + 1 + i as u32, &mut block);
            disk.write_block(block_numbers[i], &block);
        }
        disk.write_block(self.start, &encode_header(0, &[]));
    }

    /// Enters a transaction, blocking while a commit is in progress or
    /// while admitting one more operation could overflow the log.
    pub fn begin_op(&self) {
        let mut state = self.state.lock();
        loop {
            let would_overflow = (state.outstanding as usize + 1) * MAXOPBLOCKS > LOGSIZE;
            if state.committing || would_overflow {
                state.sleep();
            } else {
                state.outstanding += 1;
                return;
            }
        }
    }

    /// Leaves a transaction. The last concurrent operation to leave
    /// performs the actual commit.
    pub fn end_op(&self) {
        let should_commit = {
            let mut state = self.state.lock();
            assert!(!state.committing, "end_op: commit already in progress");
            state.outstanding -= 1;
            if state.outstanding == 0 {
                state.committing = true;
                true
            } else {
                state.wakeup();
                false
            }
        };

        if should_commit {
            self.commit();
            let mut state = self.state.lock();
            state.committing = false;
            state.n = 0;
            state.wakeup();
        }
    }

    /// Marks `buf` as participating in the current transaction,
    /// reusing its slot if already logged ("absorption"), and pins it
    /// in the cache by marking it `DIRTY`. Only valid inside a
    /// transaction.
    pub fn log_write(&self, buf: BufRef) {
        let mut state = self.state.lock();
        assert!(state.outstanding > 0, "log_write: outside a transaction");
        let already_logged = state.block_numbers[..state.n].contains(&buf.blockno);
        if !already_logged {
            assert!(
                state.n < LOGSIZE,
                "log_write: transaction exceeds LOGSIZE"
            );
            state.block_numbers[state.n] = buf.blockno;
            state.n += 1;
        }
        drop(state);
        kernel().bcache().mark_dirty(buf);
    }

    /// Copies logged blocks from the cache to the log area and writes
    /// the committing header, then installs them to their home
    /// locations and clears the header. Runs without any lock held, as
    /// required for `bread`/`bwrite` to be callable at all.
    fn commit(&self) {
        let (n, block_numbers) = {
            let state = self.state.lock();
            (state.n, state.block_numbers)
        };
        if n == 0 {
            return;
        }

        let disk = kernel().disk();
        let bcache = kernel().bcache();

        for i in 0..n {
            let cached = bcache.bread(disk, self.dev, block_numbers[i]).expect("log: bread");
            let log_slot = bcache
                .bread(disk, self.dev, self.start + 1 + i as u32)
                .expect("log: bread log slot");
            {
                let mut log_data = bcache.data(log_slot);
                let src = bcache.data(cached);
                log_data.bytes = src.bytes;
            }
            bcache.mark_dirty(log_slot);
            bcache.bwrite(disk, log_slot);
            bcache.brelse(log_slot);
            bcache.brelse(cached);
        }

        disk.write_block(self.start, &encode_header(n, &block_numbers[..n]));

        for i in 0..n {
            let log_slot = bcache
                .bread(disk, self.dev, self.start + 1 + i as u32)
                .expect("log: bread log slot for install");
            let home = bcache
                .bread(disk, self.dev, block_numbers[i])
                .expect("log: bread home block for install");
            {
                let mut home_data = bcache.data(home);
                let src = bcache.data(log_slot);
                home_data.bytes = src.bytes;
            }
            bcache.mark_dirty(home);
            bcache.bwrite(disk, home);
            bcache.brelse(home);
            bcache.brelse(log_slot);
        }

        disk.write_block(self.start, &encode_header(0, &[]));
    }
}

fn encode_header(n: usize, block_numbers: &[u32]) -> [u8; BSIZE] {
    let mut buf = [0u8; BSIZE];
    buf[0..4].copy_from_slice(&(n as u32).to_le_bytes());
    for (i, &b) in block_numbers.iter().enumerate() {
        let off = 4 + i * 4;
        buf[off..off + 4].copy_from_slice(&b.to_le_bytes());
    }
    buf
}

fn decode_header(buf: &[u8; BSIZE]) -> (usize, [u32; LOGSIZE]) {
    let n = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
    let mut block_numbers = [0u32; LOGSIZE];
    for i in 0..n.min(LOGSIZE) {
        let off = 4 + i * 4;
        block_numbers[i] = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
    }
    (n.min(LOGSIZE), block_numbers)
}

/// Wraps a disk-mutating operation in a transaction, matching
/// `spec.md §4.8`'s "every file-system syscall that mutates disk must
/// wrap its entire set of writes inside one `begin_op`/`end_op`".
pub fn with_transaction<F, T>(f: F) -> T
where
    F: FnOnce() -> T,
{
    begin_op();
    let result = f();
    end_op();
    result
}

pub fn begin_op() {
    kernel().log().begin_op();
}

pub fn end_op() {
    kernel().log().end_op();
}

/// Marks `buf` as participating in the current transaction. Thin
/// wrapper so file-system code need not reach into `kernel().log()`
/// directly.
pub fn log_write(buf: BufRef) {
    kernel().log().log_write(buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let numbers = [5u32, 9, 3];
        let encoded = encode_header(3, &numbers);
        let (n, decoded) = decode_header(&encoded);
        assert_eq!(n, 3);
        assert_eq!(&decoded[..3], &numbers);
    }

    #[test]
    fn recover_is_a_noop_on_a_clean_header() {
        let disk = crate::disk::RamDisk::new(LOGSIZE as u32 + 2);
        disk.write_block(0, &encode_header(0, &[]));
        let log = Log::new(1, 0);
        log.recover(&disk);
        let mut header = [0u8; BSIZE];
        disk.read_block(0, &mut header);
        assert_eq!(decode_header(&header).0, 0);
    }

    #[test]
    fn recover_installs_a_pending_commit() {
        let disk = crate::disk::RamDisk::new(LOGSIZE as u32 + 10);
        let mut logged_block = [0u8; BSIZE];
        logged_block[0] = 0x42;
        disk.write_block(1, &logged_block);
        disk.write_block(0, &encode_header(1, &[7]));

        let log = Log::new(1, 0);
        log.recover(&disk);

        let mut home = [0u8; BSIZE];
        disk.read_block(7, &mut home);
        assert_eq!(home[0], 0x42);
        let mut header = [0u8; BSIZE];
        disk.read_block(0, &mut header);
        assert_eq!(decode_header(&header).0, 0);
    }
}
