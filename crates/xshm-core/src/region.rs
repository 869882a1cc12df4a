//! Attached region ownership and teardown

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};
use crate::posix::PosixMapping;
use crate::sysv::SysvMapping;

/// Outcome of a detach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detach {
    /// The underlying resource was removed from the system
    Destroyed,
    /// The local mapping was released; other attaches (or the name) remain
    Detached(u32),
    /// This process held nothing under the identifier
    NotFound,
}

impl Detach {
    /// Numeric form: 0 destroyed, n > 0 attaches left, -1 nothing to detach
    pub fn code(&self) -> i64 {
        match self {
            Detach::Destroyed => 0,
            Detach::Detached(n) => *n as i64,
            Detach::NotFound => -1,
        }
    }
}

/// Backend mapping, dispatched by identifier kind
pub(crate) enum Mapping {
    Sysv(SysvMapping),
    Posix(PosixMapping),
}

impl Mapping {
    pub(crate) fn addr(&self) -> *mut u8 {
        match self {
            Mapping::Sysv(m) => m.addr(),
            Mapping::Posix(m) => m.addr(),
        }
    }

    pub(crate) fn byte_len(&self) -> usize {
        match self {
            Mapping::Sysv(m) => m.byte_len(),
            Mapping::Posix(m) => m.byte_len(),
        }
    }

    pub(crate) fn release(&self, force: bool) -> Result<Detach> {
        match self {
            Mapping::Sysv(m) => m.release(force),
            Mapping::Posix(m) => m.release(force),
        }
    }
}

/// An attached region with a single-shot release latch
///
/// The mapped address is owned exclusively by this value. Release runs at
/// most once; views created before it observe [`Error::Detached`] instead of
/// touching a dangling mapping.
pub(crate) struct Region {
    mapping: Mapping,
    detached: AtomicBool,
}

// The mapping is shared kernel memory, not thread-local state; the release
// latch serializes teardown.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    pub(crate) fn new(mapping: Mapping) -> Self {
        Self {
            mapping,
            detached: AtomicBool::new(false),
        }
    }

    pub(crate) fn byte_len(&self) -> usize {
        self.mapping.byte_len()
    }

    pub(crate) fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Raw base address, while attached
    pub(crate) fn as_ptr(&self) -> Result<*mut u8> {
        if self.is_detached() {
            return Err(Error::Detached);
        }
        Ok(self.mapping.addr())
    }

    /// Release the mapping exactly once
    pub(crate) fn release(&self, force: bool) -> Result<Detach> {
        if self.detached.swap(true, Ordering::AcqRel) {
            return Ok(Detach::NotFound);
        }
        self.mapping.release(force)
    }
}
