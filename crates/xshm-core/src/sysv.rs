//! System V keyed segment backend
//!
//! Keyed segments live in the kernel-global key table. Creation always passes
//! `IPC_CREAT | IPC_EXCL`, so a key collision fails cleanly instead of
//! attaching to a foreign segment. Removal is attach-count driven: a detach
//! that leaves `shm_nattch` at zero removes the segment, matching the
//! OS-automatic collection the keyed namespace is used for.

use std::io;
use std::ptr;

use crate::error::{Error, Result};
use crate::region::Detach;

/// One System V attachment held by this process
#[derive(Debug)]
pub(crate) struct SysvMapping {
    shmid: libc::c_int,
    addr: *mut libc::c_void,
    byte_len: usize,
}

impl SysvMapping {
    /// Create the segment under `key` and attach it.
    ///
    /// Returns `Ok(None)` when the key is already taken, so racing creators
    /// observe the collision instead of an attach to another owner's segment.
    pub(crate) fn create_exclusive(key: u32, byte_len: usize, mode: u32) -> Result<Option<Self>> {
        let flags = libc::IPC_CREAT | libc::IPC_EXCL | mode as libc::c_int;
        let shmid = unsafe { libc::shmget(key as libc::key_t, byte_len, flags) };
        if shmid == -1 {
            let err = io::Error::last_os_error();
            return match err.raw_os_error() {
                Some(libc::EEXIST) | Some(libc::EIDRM) => Ok(None),
                _ => Err(Error::os("shmget", err)),
            };
        }
        let addr = match attach(shmid, false) {
            Ok(addr) => addr,
            Err(err) => {
                // Don't leak the segment we just created.
                unsafe { libc::shmctl(shmid, libc::IPC_RMID, ptr::null_mut()) };
                return Err(err);
            }
        };
        Ok(Some(Self {
            shmid,
            addr,
            byte_len,
        }))
    }

    /// Open the segment under `key` and attach it.
    ///
    /// Returns `Ok(None)` when no segment exists under the key.
    pub(crate) fn open(key: u32, readonly: bool) -> Result<Option<Self>> {
        let shmid = unsafe { libc::shmget(key as libc::key_t, 0, 0) };
        if shmid == -1 {
            let err = io::Error::last_os_error();
            return match err.raw_os_error() {
                Some(libc::ENOENT) | Some(libc::EIDRM) => Ok(None),
                _ => Err(Error::os("shmget", err)),
            };
        }
        let byte_len = stat(shmid)?.shm_segsz as usize;
        let addr = attach(shmid, readonly)?;
        Ok(Some(Self {
            shmid,
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

    /// Detach the local mapping; remove the segment when forced or when the
    /// kernel reports no attaches left.
    pub(crate) fn release(&self, force: bool) -> Result<Detach> {
        if unsafe { libc::shmdt(self.addr) } == -1 {
            return Err(Error::os("shmdt", io::Error::last_os_error()));
        }
        let remaining = match stat(self.shmid) {
            Ok(ds) => ds.shm_nattch as u32,
            // Removal was already pending and our detach was the last
            // attach, so the segment is gone.
            Err(err) if gone(&err) => return Ok(Detach::Destroyed),
            Err(err) => return Err(err),
        };
        if force || remaining == 0 {
            if unsafe { libc::shmctl(self.shmid, libc::IPC_RMID, ptr::null_mut()) } == -1 {
                let err = io::Error::last_os_error();
                if !matches!(
                    err.raw_os_error(),
                    Some(libc::EINVAL) | Some(libc::EIDRM)
                ) {
                    return Err(Error::os("shmctl", err));
                }
            }
            return Ok(Detach::Destroyed);
        }
        Ok(Detach::Detached(remaining))
    }
}

fn attach(shmid: libc::c_int, readonly: bool) -> Result<*mut libc::c_void> {
    let flags = if readonly { libc::SHM_RDONLY } else { 0 };
    let addr = unsafe { libc::shmat(shmid, ptr::null(), flags) };
    if addr as isize == -1 {
        return Err(Error::os("shmat", io::Error::last_os_error()));
    }
    Ok(addr)
}

fn gone(err: &Error) -> bool {
    matches!(
        err,
        Error::Os { source, .. } if matches!(
            source.raw_os_error(),
            Some(libc::EINVAL) | Some(libc::EIDRM)
        )
    )
}

fn stat(shmid: libc::c_int) -> Result<libc::shmid_ds> {
    let mut ds: libc::shmid_ds = unsafe { std::mem::zeroed() };
    if unsafe { libc::shmctl(shmid, libc::IPC_STAT, &mut ds) } == -1 {
        return Err(Error::os("shmctl", io::Error::last_os_error()));
    }
    Ok(ds)
}
