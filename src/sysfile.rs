//! File-system system calls. `spec.md §4.9, §4.11`.
//!
//! Mostly argument checking and log-transaction bracketing; the real
//! work is in [`crate::fs`], [`crate::file`], and [`crate::pipe`].
//! Grounded on the teacher's `sysfile.rs` `sys_open`/`sys_unlink`/
//! `create`, adapted from its `Path`/`RcFile`/`myproc()` API to this
//! crate's `FileSystem`/`FileRef`/`crate::syscall` helpers.
use crate::error::{Error, Result};
use crate::fcntl::OpenFlags;
use crate::file::FileKind;
use crate::fs::InodeRef;
use crate::kernel::kernel;
use crate::param::{MAXOPBLOCKS, MAXPATH, NDEV};
use crate::stat::{T_DEVICE, T_DIR, T_FILE};
use crate::syscall::{argaddr, argfd, argint, argpath, cwd, fdalloc, fdclear, set_cwd};

/// Bound on one `read`/`write` syscall's per-call transfer, small
/// enough that an inode write's blocks (data + indirect + inode) never
/// overflow one log transaction. Mirrors the classic xv6 constant.
const MAX_IO: usize = ((MAXOPBLOCKS - 1 - 1 - 2) / 2) * crate::param::BSIZE;

pub fn sys_dup() -> Result<usize> {
    let (_, file) = argfd(0)?;
    let dup = file.dup();
    match fdalloc(dup) {
        Ok(fd) => Ok(fd),
        Err(e) => {
            dup.close();
            Err(e)
        }
    }
}

pub fn sys_read() -> Result<usize> {
    let (_, file) = argfd(0)?;
    let addr = argaddr(1);
    let n = (argint(2).max(0) as usize).min(MAX_IO);
    let mut buf = [0u8; MAX_IO];
    let got = file.read(&mut buf[..n])?;
    crate::syscall::copy_out(addr, &buf[..got])?;
    Ok(got)
}

pub fn sys_write() -> Result<usize> {
    let (_, file) = argfd(0)?;
    let addr = argaddr(1);
    let n = argint(2).max(0) as usize;
    let mut total = 0;
    while total < n {
        let chunk = (n - total).min(MAX_IO);
        let mut buf = [0u8; MAX_IO];
        crate::syscall::copy_in(&mut buf[..chunk], addr + total)?;
        let wrote = file.write(&buf[..chunk])?;
        total += wrote;
        if wrote < chunk {
            break;
        }
    }
    Ok(total)
}

pub fn sys_close() -> Result<usize> {
    let (fd, file) = argfd(0)?;
    fdclear(fd);
    file.close();
    Ok(0)
}

pub fn sys_fstat() -> Result<usize> {
    let (_, file) = argfd(0)?;
    let addr = argaddr(1);
    let st = file.stat()?;
    crate::syscall::copy_out(addr, &st.encode())?;
    Ok(0)
}

/// Finds-or-creates the file/device/directory named by `path`, locked
/// for exclusive access only long enough to stamp its type/major/minor.
/// The shared find-or-create algorithm lives on `FileSystem::create`;
/// this just wraps the `O_CREATE` decision and `T_FILE`/`T_DEVICE`
/// compatibility check `sys_open` needs around it.
fn link_new(path: &[u8], old: InodeRef) -> Result<()> {
    let fs = kernel().fs();
    let (parent, name_buf) = fs.nameiparent(cwd(), path)?;
    let name_len = crate::fs::path::name_len(&name_buf);
    let mut parent_guard = parent.lock();
    let result = if parent_guard.ip.dev != old.dev {
        Err(Error::CrossDevice)
    } else {
        parent_guard.dirlink(fs.bcache(), fs.disk(), fs.superblock(), &name_buf[..name_len], old.inum)
    };
    drop(parent_guard);
    parent.put();
    result
}

pub fn sys_link() -> Result<usize> {
    let mut old_buf = [0u8; MAXPATH];
    let mut new_buf = [0u8; MAXPATH];
    let old_len = argpath(0, &mut old_buf)?;
    let new_len = argpath(1, &mut new_buf)?;

    crate::log::begin_op();
    let result = (|| {
        let fs = kernel().fs();
        let ip = fs.namei(cwd(), &old_buf[..old_len])?;
        let mut guard = ip.lock();
        if guard.is_dir() {
            drop(guard);
            ip.put();
            return Err(Error::IsDir);
        }
        guard.mutate(|d| d.nlink += 1);
        guard.update(fs.disk(), fs.bcache(), fs.superblock());
        drop(guard);

        if let Err(e) = link_new(&new_buf[..new_len], ip) {
            let mut guard = ip.lock();
            guard.mutate(|d| d.nlink -= 1);
            guard.update(fs.disk(), fs.bcache(), fs.superblock());
            drop(guard);
            ip.put();
            return Err(e);
        }
        ip.put();
        Ok(0)
    })();
    crate::log::end_op();
    result
}

pub fn sys_unlink() -> Result<usize> {
    let mut path = [0u8; MAXPATH];
    let len = argpath(0, &mut path)?;

    crate::log::begin_op();
    let result = (|| {
        let fs = kernel().fs();
        let (parent, name_buf) = fs.nameiparent(cwd(), &path[..len])?;
        let name_len = crate::fs::path::name_len(&name_buf);
        let name = &name_buf[..name_len];
        if name == b"." || name == b".." {
            parent.put();
            return Err(Error::ProtectedEntry);
        }

        let mut parent_guard = parent.lock();
        let (child_inum, off) = match parent_guard.dirlookup(fs.bcache(), fs.disk(), fs.superblock(), name) {
            Ok(v) => v,
            Err(e) => {
                drop(parent_guard);
                parent.put();
                return Err(e);
            }
        };

        let child = fs.iget(fs.dev(), child_inum);
        let mut child_guard = child.lock();
        assert!(child_guard.dinode().nlink >= 1, "unlink: nlink < 1");
        if child_guard.is_dir() && !child_guard.is_empty_dir(fs.bcache(), fs.disk(), fs.superblock()) {
            drop(child_guard);
            child.put();
            drop(parent_guard);
            parent.put();
            return Err(Error::NotEmpty);
        }

        let zero = [0u8; crate::fs::dirent::DIRENT_SIZE];
        parent_guard
            .writei(fs.bcache(), fs.disk(), fs.superblock(), &[], &zero, off as usize)
            .expect("unlink: clearing directory entry");
        if child_guard.is_dir() {
            parent_guard.mutate(|d| d.nlink -= 1);
            parent_guard.update(fs.disk(), fs.bcache(), fs.superblock());
        }
        drop(parent_guard);
        parent.put();

        child_guard.mutate(|d| d.nlink -= 1);
        child_guard.update(fs.disk(), fs.bcache(), fs.superblock());
        drop(child_guard);
        child.put();
        Ok(0)
    })();
    crate::log::end_op();
    result
}

fn do_open(path: &[u8], omode: OpenFlags) -> Result<usize> {
    let fs = kernel().fs();
    let ip = if omode.contains(OpenFlags::O_CREATE) {
        fs.create(cwd(), path, T_FILE, 0, 0)?
    } else {
        let ip = fs.namei(cwd(), path)?;
        let guard = ip.lock();
        if guard.is_dir() && omode != OpenFlags::O_RDONLY {
            drop(guard);
            ip.put();
            return Err(Error::IsDir);
        }
        drop(guard);
        ip
    };

    let guard = ip.lock();
    let kind = guard.dinode().kind;
    let major = guard.dinode().major;
    drop(guard);

    if kind == T_DEVICE && major as usize >= NDEV {
        ip.put();
        return Err(Error::BadArgument);
    }

    let file_kind = if kind == T_DEVICE {
        FileKind::Device { ip, major }
    } else {
        FileKind::Inode { ip, off: 0 }
    };
    let readable = !omode.contains(OpenFlags::O_WRONLY);
    let writable = omode.intersects(OpenFlags::O_WRONLY | OpenFlags::O_RDWR);
    let file = match kernel().ftable().alloc(file_kind, readable, writable) {
        Ok(f) => f,
        Err(e) => {
            ip.put();
            return Err(e);
        }
    };
    match fdalloc(file) {
        Ok(fd) => Ok(fd),
        Err(e) => {
            file.close();
            Err(e)
        }
    }
}

pub fn sys_open() -> Result<usize> {
    let mut path = [0u8; MAXPATH];
    let len = argpath(0, &mut path)?;
    let omode = OpenFlags::from_bits_truncate(argint(1));

    crate::log::begin_op();
    let result = do_open(&path[..len], omode);
    crate::log::end_op();
    result
}

pub fn sys_mkdir() -> Result<usize> {
    let mut path = [0u8; MAXPATH];
    let len = argpath(0, &mut path)?;

    crate::log::begin_op();
    let result = kernel().fs().create(cwd(), &path[..len], T_DIR, 0, 0).map(|ip| {
        ip.put();
        0
    });
    crate::log::end_op();
    result
}

pub fn sys_mknod() -> Result<usize> {
    let mut path = [0u8; MAXPATH];
    let len = argpath(0, &mut path)?;
    let major = argint(1) as u16;
    let minor = argint(2) as u16;

    crate::log::begin_op();
    let result = kernel().fs().create(cwd(), &path[..len], T_DEVICE, major, minor).map(|ip| {
        ip.put();
        0
    });
    crate::log::end_op();
    result
}

pub fn sys_chdir() -> Result<usize> {
    let mut path = [0u8; MAXPATH];
    let len = argpath(0, &mut path)?;

    crate::log::begin_op();
    let result = (|| {
        let ip = kernel().fs().namei(cwd(), &path[..len])?;
        let guard = ip.lock();
        if !guard.is_dir() {
            drop(guard);
            ip.put();
            return Err(Error::NotDir);
        }
        drop(guard);
        set_cwd(ip);
        Ok(0)
    })();
    crate::log::end_op();
    result
}

pub fn sys_pipe() -> Result<usize> {
    let fdarray = argaddr(0);
    let (read_file, write_file) = kernel().ftable().alloc_pipe()?;

    let fd0 = match fdalloc(read_file) {
        Ok(fd) => fd,
        Err(e) => {
            read_file.close();
            write_file.close();
            return Err(e);
        }
    };
    let fd1 = match fdalloc(write_file) {
        Ok(fd) => fd,
        Err(e) => {
            fdclear(fd0);
            read_file.close();
            write_file.close();
            return Err(e);
        }
    };

    let fd0_bytes = (fd0 as u32).to_le_bytes();
    let fd1_bytes = (fd1 as u32).to_le_bytes();
    if crate::syscall::copy_out(fdarray, &fd0_bytes).is_err()
        || crate::syscall::copy_out(fdarray + fd0_bytes.len(), &fd1_bytes).is_err()
    {
        fdclear(fd0);
        fdclear(fd1);
        read_file.close();
        write_file.close();
        return Err(Error::BadAddr);
    }
    Ok(0)
}
