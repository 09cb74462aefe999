//! Path resolution. `spec.md §4.9`.
use crate::error::{Error, Result};
use crate::param::DIRSIZ;
use crate::stat::T_DIR;

use super::inode::InodeRef;
use super::superblock::ROOT_INUM;
use super::FileSystem;

/// Splits the next `/`-delimited component off the front of `path`.
/// Returns the component (truncated to `DIRSIZ` bytes, as xv6 does)
/// and the remainder, or `None` once only slashes remain.
fn skip_element(path: &[u8]) -> Option<(&[u8], &[u8])> {
    let mut p = path;
    while p.first() == Some(&b'/') {
        p = &p[1..];
    }
    if p.is_empty() {
        return None;
    }
    let len = p.iter().position(|&b| b == b'/').unwrap_or(p.len());
    let (name, rest) = p.split_at(len);
    let mut rest = rest;
    while rest.first() == Some(&b'/') {
        rest = &rest[1..];
    }
    Some((&name[..len.min(DIRSIZ)], rest))
}

/// Walks `path` from `root`/`cwd`. If `stop_before_last` is set,
/// resolution stops one component short and the unresolved final
/// component is returned alongside its parent directory -- this is
/// `nameiparent`'s shape; `namei`/`namex` just discard it.
fn namex(fs: &FileSystem, cwd: Option<InodeRef>, path: &[u8], stop_before_last: bool) -> Result<(InodeRef, [u8; DIRSIZ])> {
    let mut ip = if path.first() == Some(&b'/') {
        fs.iget(fs.dev(), ROOT_INUM)
    } else {
        cwd.map(|c| c.dup()).ok_or(Error::NotFound)?
    };

    let mut rest = path;
    loop {
        let Some((name, next_rest)) = skip_element(rest) else {
            if stop_before_last {
                ip.put();
                return Err(Error::NotFound);
            }
            let mut last = [0u8; DIRSIZ];
            return Ok((ip, last_component(path, &mut last)));
        };

        let mut guard = ip.lock();
        if !guard.is_dir() {
            drop(guard);
            ip.put();
            return Err(Error::NotDir);
        }

        if stop_before_last && next_rest.is_empty() {
            drop(guard);
            let mut last = [0u8; DIRSIZ];
            let len = name.len().min(DIRSIZ);
            last[..len].copy_from_slice(&name[..len]);
            return Ok((ip, last));
        }

        let lookup = guard.dirlookup(fs.bcache(), fs.disk(), fs.superblock(), name);
        drop(guard);
        let (child_inum, _) = match lookup {
            Ok(v) => v,
            Err(e) => {
                ip.put();
                return Err(e);
            }
        };
        let child = fs.iget(fs.dev(), child_inum);
        ip.put();
        ip = child;
        rest = next_rest;
    }
}

fn last_component<'a>(path: &[u8], buf: &'a mut [u8; DIRSIZ]) -> [u8; DIRSIZ] {
    let trimmed = {
        let mut end = path.len();
        while end > 0 && path[end - 1] == b'/' {
            end -= 1;
        }
        &path[..end]
    };
    let start = trimmed.iter().rposition(|&b| b == b'/').map(|i| i + 1).unwrap_or(0);
    let name = &trimmed[start..];
    let len = name.len().min(DIRSIZ);
    buf[..len].copy_from_slice(&name[..len]);
    *buf
}

/// Resolves `path` (absolute, or relative to `cwd`) to an inode
/// reference.
pub fn namei(fs: &FileSystem, cwd: Option<InodeRef>, path: &[u8]) -> Result<InodeRef> {
    namex(fs, cwd, path, false).map(|(ip, _)| ip)
}

/// Resolves all but the last component of `path`, returning the
/// parent directory and the final component's raw name bytes (NUL- or
/// zero-padded to `DIRSIZ`). Used by `create`/`unlink`/`mkdir`, which
/// need the parent locked separately from the child they're about to
/// make or remove.
pub fn nameiparent(fs: &FileSystem, cwd: Option<InodeRef>, path: &[u8]) -> Result<(InodeRef, [u8; DIRSIZ])> {
    namex(fs, cwd, path, true)
}

pub fn name_len(raw: &[u8; DIRSIZ]) -> usize {
    raw.iter().position(|&b| b == 0).unwrap_or(DIRSIZ)
}

pub const fn is_root_candidate(kind: u16) -> bool {
    kind == T_DIR
}
