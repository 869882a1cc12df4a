//! POSIX named object backend
//!
//! Named objects live in a filesystem-like namespace (`/dev/shm` on Linux).
//! Unlike the keyed backend, removing the name (unlink) is separate from
//! unmapping the local view: an ordinary detach only unmaps, and the name
//! stays resolvable until something unlinks it explicitly.

use std::ffi::CString;
use std::io;
use std::ptr;

use crate::error::{Error, Result};
use crate::region::Detach;

/// One POSIX object mapping held by this process
#[derive(Debug)]
pub(crate) struct PosixMapping {
    name: CString,
    addr: *mut libc::c_void,
    byte_len: usize,
}

impl PosixMapping {
    /// Create the object under `name`, size it, and map it.
    ///
    /// Returns `Ok(None)` when the name is already taken.
    pub(crate) fn create_exclusive(name: &str, byte_len: usize, mode: u32) -> Result<Option<Self>> {
        let c_name = c_name(name)?;
        let oflag = libc::O_CREAT | libc::O_EXCL | libc::O_RDWR;
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), oflag, mode as libc::mode_t) };
        if fd == -1 {
            let err = io::Error::last_os_error();
            return match err.raw_os_error() {
                Some(libc::EEXIST) => Ok(None),
                _ => Err(Error::os("shm_open", err)),
            };
        }
        if unsafe { libc::ftruncate(fd, byte_len as libc::off_t) } == -1 {
            let err = io::Error::last_os_error();
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c_name.as_ptr());
            }
            return Err(Error::os("ftruncate", err));
        }
        let addr = match map(fd, byte_len, false) {
            Ok(addr) => addr,
            Err(err) => {
                unsafe {
                    libc::close(fd);
                    libc::shm_unlink(c_name.as_ptr());
                }
                return Err(err);
            }
        };
        unsafe { libc::close(fd) };
        Ok(Some(Self {
            name: c_name,
            addr,
            byte_len,
        }))
    }

    /// Open the object under `name` and map it at its current size.
    ///
    /// Returns `Ok(None)` when no object exists under the name.
    pub(crate) fn open(name: &str, readonly: bool) -> Result<Option<Self>> {
        let c_name = c_name(name)?;
        let oflag = if readonly { libc::O_RDONLY } else { libc::O_RDWR };
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), oflag, 0) };
        if fd == -1 {
            let err = io::Error::last_os_error();
            return match err.raw_os_error() {
                Some(libc::ENOENT) => Ok(None),
                _ => Err(Error::os("shm_open", err)),
            };
        }
        let mut st: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::fstat(fd, &mut st) } == -1 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(Error::os("fstat", err));
        }
        let byte_len = st.st_size as usize;
        let addr = match map(fd, byte_len, readonly) {
            Ok(addr) => addr,
            Err(err) => {
                unsafe { libc::close(fd) };
                return Err(err);
            }
        };
        unsafe { libc::close(fd) };
        Ok(Some(Self {
            name: c_name,
            addr,
            byte_len,
        }))
    }

    pub(crate) fn addr(&self) -> *mut u8 {
        self.addr as *mut u8
    }

    pub(crate) fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Unmap the local view; unlink the name only when forced.
    pub(crate) fn release(&self, force: bool) -> Result<Detach> {
        if unsafe { libc::munmap(self.addr, self.byte_len) } == -1 {
            return Err(Error::os("munmap", io::Error::last_os_error()));
        }
        if !force {
            // The name stays resolvable; existing mappings elsewhere are
            // untouched either way.
            return Ok(Detach::Detached(1));
        }
        if unsafe { libc::shm_unlink(self.name.as_ptr()) } == -1 {
            let err = io::Error::last_os_error();
            // Someone else unlinked it first; the name is gone either way.
            if err.raw_os_error() != Some(libc::ENOENT) {
                return Err(Error::os("shm_unlink", err));
            }
        }
        Ok(Detach::Destroyed)
    }
}

fn c_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| Error::InvalidName {
        name: name.to_string(),
        reason: "name must not contain a NUL byte",
    })
}

fn map(fd: libc::c_int, byte_len: usize, readonly: bool) -> Result<*mut libc::c_void> {
    let prot = if readonly {
        libc::PROT_READ
    } else {
        libc::PROT_READ | libc::PROT_WRITE
    };
    let addr = unsafe { libc::mmap(ptr::null_mut(), byte_len, prot, libc::MAP_SHARED, fd, 0) };
    if addr == libc::MAP_FAILED {
        return Err(Error::os("mmap", io::Error::last_os_error()));
    }
    Ok(addr)
}
