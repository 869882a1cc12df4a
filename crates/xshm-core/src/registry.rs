//! Process-local handle registry and byte ledger

use std::collections::HashMap;
use std::sync::Arc;

use crate::dtype::ElementType;
use crate::id::SegmentId;
use crate::region::Region;
use crate::segment::AccessMode;

/// One locally held attachment
pub(crate) struct Entry {
    pub(crate) region: Arc<Region>,
    pub(crate) ty: ElementType,
    pub(crate) count: usize,
    pub(crate) mode: AccessMode,
    /// Whether this process created the underlying resource
    pub(crate) created: bool,
}

/// Table of every attachment this process must release
///
/// The registry only ever reflects this process's own handles; cross-process
/// attach counts belong to the kernel.
#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<SegmentId, Entry>,
}

impl Registry {
    pub(crate) fn insert(&mut self, id: SegmentId, entry: Entry) {
        self.entries.insert(id, entry);
    }

    pub(crate) fn remove(&mut self, id: &SegmentId) -> Option<Entry> {
        self.entries.remove(id)
    }

    pub(crate) fn get(&self, id: &SegmentId) -> Option<&Entry> {
        self.entries.get(id)
    }

    pub(crate) fn drain(&mut self) -> Vec<(SegmentId, Entry)> {
        self.entries.drain().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Byte totals for observability, not correctness
#[derive(Default)]
pub(crate) struct SizeLedger {
    used: usize,
    created: usize,
}

impl SizeLedger {
    pub(crate) fn attach(&mut self, byte_len: usize, created: bool) {
        self.used += byte_len;
        if created {
            self.created += byte_len;
        }
    }

    pub(crate) fn detach(&mut self, byte_len: usize, created: bool) {
        self.used = self.used.saturating_sub(byte_len);
        if created {
            self.created = self.created.saturating_sub(byte_len);
        }
    }

    pub(crate) fn used(&self) -> usize {
        self.used
    }

    pub(crate) fn created(&self) -> usize {
        self.created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_returns_to_zero() {
        let mut ledger = SizeLedger::default();
        ledger.attach(4096, true);
        ledger.attach(1024, false);
        assert_eq!(ledger.used(), 5120);
        assert_eq!(ledger.created(), 4096);
        ledger.detach(1024, false);
        ledger.detach(4096, true);
        assert_eq!(ledger.used(), 0);
        assert_eq!(ledger.created(), 0);
    }
}
