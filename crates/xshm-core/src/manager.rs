//! Segment lifecycle orchestration

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use log::{debug, warn};

use crate::cleanup;
use crate::dtype::{max_count, ElementType};
use crate::error::{Error, Result};
use crate::id::SegmentId;
use crate::key::{KeyAllocator, MAX_KEY_RETRIES};
use crate::posix::PosixMapping;
use crate::region::{Detach, Mapping, Region};
use crate::registry::{Entry, Registry, SizeLedger};
use crate::segment::{AccessMode, Segment};
use crate::sysv::SysvMapping;

/// Default permission bits for created segments
pub const DEFAULT_MODE: u32 = 0o660;

/// Process-scoped manager of shared memory attachments
///
/// Tracks every segment this instance has created or attached and releases
/// them all when dropped. Registry and ledger mutation happens under one
/// lock together with the backend call, so each operation is a single unit
/// in threaded hosts.
///
/// Most programs use the shared [`global()`] instance, which additionally
/// installs the process exit hook; independent instances are handy in tests
/// and in hosts that want several cleanup scopes.
pub struct ShmManager {
    state: Mutex<State>,
}

struct State {
    registry: Registry,
    ledger: SizeLedger,
    keys: KeyAllocator,
}

impl ShmManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                registry: Registry::default(),
                ledger: SizeLedger::default(),
                keys: KeyAllocator::new(),
            }),
        }
    }

    /// Create a segment under a fresh random key.
    ///
    /// Key collisions are expected and retried with a new draw; the key is
    /// reported on the returned view.
    pub fn create(&self, count: usize, ty: ElementType) -> Result<Segment> {
        validate_count(count, ty)?;
        self.create_auto(count, ty, DEFAULT_MODE)
    }

    /// Create a segment under a caller-chosen key.
    ///
    /// Returns `Ok(None)` when the key is already taken; a collision on an
    /// explicit key is a normal outcome, not an error.
    pub fn create_keyed(&self, key: u32, count: usize, ty: ElementType) -> Result<Option<Segment>> {
        self.create_with_mode(Some(SegmentId::Key(key)), count, ty, DEFAULT_MODE)
    }

    /// Create a named object, e.g. `"/frames"`.
    ///
    /// Returns `Ok(None)` when the name is already taken.
    pub fn create_named(
        &self,
        name: &str,
        count: usize,
        ty: ElementType,
    ) -> Result<Option<Segment>> {
        self.create_with_mode(Some(SegmentId::from(name)), count, ty, DEFAULT_MODE)
    }

    /// Full create form: explicit or auto identifier plus permission bits.
    ///
    /// `None` as identifier draws random keys until a free one is found, so
    /// the result is always `Some` on success.
    pub fn create_with_mode(
        &self,
        id: Option<SegmentId>,
        count: usize,
        ty: ElementType,
        mode: u32,
    ) -> Result<Option<Segment>> {
        validate_count(count, ty)?;
        let Some(id) = id else {
            return self.create_auto(count, ty, mode).map(Some);
        };
        id.validate()?;
        let byte_len = count * ty.width();
        let mut state = self.state();
        let mapping = match &id {
            SegmentId::Key(key) => {
                SysvMapping::create_exclusive(*key, byte_len, mode)?.map(Mapping::Sysv)
            }
            SegmentId::Name(name) => {
                PosixMapping::create_exclusive(name, byte_len, mode)?.map(Mapping::Posix)
            }
        };
        let Some(mapping) = mapping else {
            return Ok(None);
        };
        Ok(Some(register(
            &mut state,
            id,
            mapping,
            ty,
            count,
            AccessMode::ReadWrite,
            true,
        )))
    }

    fn create_auto(&self, count: usize, ty: ElementType, mode: u32) -> Result<Segment> {
        let byte_len = count * ty.width();
        let mut state = self.state();
        for _ in 0..MAX_KEY_RETRIES {
            let key = state.keys.draw();
            if let Some(mapping) = SysvMapping::create_exclusive(key, byte_len, mode)? {
                return Ok(register(
                    &mut state,
                    SegmentId::Key(key),
                    Mapping::Sysv(mapping),
                    ty,
                    count,
                    AccessMode::ReadWrite,
                    true,
                ));
            }
            debug!("key {key} already taken, retrying");
        }
        Err(Error::KeySpaceExhausted(MAX_KEY_RETRIES))
    }

    /// Attach an existing segment read-write.
    ///
    /// Returns `Ok(None)` when nothing exists under the identifier. The
    /// element count is the segment byte length divided by the element
    /// width.
    pub fn get(&self, id: impl Into<SegmentId>, ty: ElementType) -> Result<Option<Segment>> {
        self.get_with_mode(id, ty, AccessMode::ReadWrite)
    }

    /// Attach an existing segment with an explicit access mode
    pub fn get_with_mode(
        &self,
        id: impl Into<SegmentId>,
        ty: ElementType,
        mode: AccessMode,
    ) -> Result<Option<Segment>> {
        let id = id.into();
        id.validate()?;
        let mut state = self.state();

        // Re-getting an identifier this instance already holds reuses the
        // existing attachment instead of stacking a second one.
        if let Some(entry) = state.registry.get(&id) {
            let count = if ty == entry.ty {
                entry.count
            } else {
                counted(entry.region.byte_len(), ty)?
            };
            let region = Arc::clone(&entry.region);
            // A read-only attach can never back a writable view.
            let mode = if entry.mode == AccessMode::ReadOnly {
                AccessMode::ReadOnly
            } else {
                mode
            };
            return Ok(Some(Segment::new(region, id, ty, count, mode)));
        }

        let readonly = mode == AccessMode::ReadOnly;
        let mapping = match &id {
            SegmentId::Key(key) => SysvMapping::open(*key, readonly)?.map(Mapping::Sysv),
            SegmentId::Name(name) => PosixMapping::open(name, readonly)?.map(Mapping::Posix),
        };
        let Some(mapping) = mapping else {
            return Ok(None);
        };
        let count = match counted(mapping.byte_len(), ty) {
            Ok(count) => count,
            Err(err) => {
                // Undo the attach; nothing was registered yet.
                if let Err(release_err) = mapping.release(false) {
                    warn!("failed to undo attach of {id}: {release_err}");
                }
                return Err(err);
            }
        };
        Ok(Some(register(
            &mut state, id, mapping, ty, count, mode, false,
        )))
    }

    /// Detach the local handle; the keyed backend removes the segment when
    /// no attaches remain, the named backend leaves the name linked.
    pub fn detach(&self, id: impl Into<SegmentId>) -> Result<Detach> {
        self.detach_with(id, false)
    }

    /// Detach and, when `force` is set, remove the underlying resource even
    /// if other attaches or the namespace entry remain.
    pub fn detach_with(&self, id: impl Into<SegmentId>, force: bool) -> Result<Detach> {
        let id = id.into();
        id.validate()?;
        let mut state = self.state();
        let Some(entry) = state.registry.remove(&id) else {
            return Ok(Detach::NotFound);
        };
        // The entry and its ledger contribution go away even when the
        // backend call fails; the local view must not survive a detach
        // attempt.
        state.ledger.detach(entry.region.byte_len(), entry.created);
        let outcome = entry.region.release(force)?;
        debug!("detached {id}: {outcome:?}");
        Ok(outcome)
    }

    /// Remove the underlying resource; true when it was actually removed
    pub fn destroy(&self, id: impl Into<SegmentId>) -> Result<bool> {
        Ok(self.detach_with(id, true)? == Detach::Destroyed)
    }

    /// Force-release every held handle; returns how many underlying
    /// resources were removed from the system.
    ///
    /// Idempotent, and tolerant of individual failures so one bad handle
    /// cannot block the rest during process teardown.
    pub fn detach_all(&self) -> usize {
        let mut state = self.state();
        let entries = state.registry.drain();
        let mut destroyed = 0;
        for (id, entry) in entries {
            state.ledger.detach(entry.region.byte_len(), entry.created);
            match entry.region.release(true) {
                Ok(Detach::Destroyed) => destroyed += 1,
                Ok(_) => {}
                Err(err) => warn!("failed to release {id} during cleanup: {err}"),
            }
        }
        destroyed
    }

    /// Bytes currently mapped through this instance
    pub fn used_bytes(&self) -> usize {
        self.state().ledger.used()
    }

    /// Bytes of segments this instance created and still holds
    pub fn created_bytes(&self) -> usize {
        self.state().ledger.created()
    }

    /// Number of handles currently held
    pub fn held(&self) -> usize {
        self.state().registry.len()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ShmManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ShmManager {
    fn drop(&mut self) {
        let destroyed = self.detach_all();
        if destroyed > 0 {
            debug!("segments destroyed on drop: {destroyed}");
        }
    }
}

fn register(
    state: &mut State,
    id: SegmentId,
    mapping: Mapping,
    ty: ElementType,
    count: usize,
    mode: AccessMode,
    created: bool,
) -> Segment {
    let region = Arc::new(Region::new(mapping));
    let byte_len = region.byte_len();
    state.registry.insert(
        id.clone(),
        Entry {
            region: Arc::clone(&region),
            ty,
            count,
            mode,
            created,
        },
    );
    state.ledger.attach(byte_len, created);
    debug!("attached {id} ({byte_len} bytes)");
    Segment::new(region, id, ty, count, mode)
}

fn validate_count(count: usize, ty: ElementType) -> Result<()> {
    let max = max_count(ty);
    if count < 1 || count > max {
        return Err(Error::InvalidCount {
            count,
            min: 1,
            max,
        });
    }
    Ok(())
}

fn counted(byte_len: usize, ty: ElementType) -> Result<usize> {
    let width = ty.width();
    if byte_len % width != 0 {
        return Err(Error::IndivisibleLength {
            len: byte_len,
            width,
        });
    }
    Ok(byte_len / width)
}

static GLOBAL: OnceLock<ShmManager> = OnceLock::new();

/// The process-wide manager.
///
/// First use installs the exit hook, so segments held through this instance
/// are released on normal exit and on termination signals.
pub fn global() -> &'static ShmManager {
    GLOBAL.get_or_init(|| {
        cleanup::install();
        ShmManager::new()
    })
}

pub(crate) fn global_if_init() -> Option<&'static ShmManager> {
    GLOBAL.get()
}
