//! Caller-facing segment views

use std::sync::Arc;

use crate::dtype::{Element, ElementType};
use crate::error::{Error, Result};
use crate::id::SegmentId;
use crate::region::Region;

/// Access mode for a segment view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// A typed view of one attached shared memory region
///
/// Views do not release the region when dropped; the owning manager (or the
/// process exit hook) does. Once the manager detaches the identifier, every
/// outstanding view fails with [`Error::Detached`] instead of dereferencing
/// a dangling mapping.
pub struct Segment {
    region: Arc<Region>,
    id: SegmentId,
    ty: ElementType,
    count: usize,
    mode: AccessMode,
}

impl Segment {
    pub(crate) fn new(
        region: Arc<Region>,
        id: SegmentId,
        ty: ElementType,
        count: usize,
        mode: AccessMode,
    ) -> Self {
        Self {
            region,
            id,
            ty,
            count,
            mode,
        }
    }

    /// Identifier this view is attached under
    pub fn id(&self) -> &SegmentId {
        &self.id
    }

    /// Numeric key, for keyed segments; named objects carry none
    pub fn key(&self) -> Option<u32> {
        self.id.key()
    }

    /// Element type of the view
    pub fn element_type(&self) -> ElementType {
        self.ty
    }

    /// Element count
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// View length in bytes
    pub fn byte_len(&self) -> usize {
        self.region.byte_len()
    }

    /// Access mode this view was attached with
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Whether the underlying mapping has been released
    pub fn is_detached(&self) -> bool {
        self.region.is_detached()
    }

    /// Raw byte view
    pub fn bytes(&self) -> Result<&[u8]> {
        let ptr = self.region.as_ptr()?;
        Ok(unsafe { std::slice::from_raw_parts(ptr, self.byte_len()) })
    }

    /// Mutable raw byte view; requires a read-write attach
    pub fn bytes_mut(&mut self) -> Result<&mut [u8]> {
        if self.mode == AccessMode::ReadOnly {
            return Err(Error::ReadOnly);
        }
        let ptr = self.region.as_ptr()?;
        Ok(unsafe { std::slice::from_raw_parts_mut(ptr, self.byte_len()) })
    }

    /// Typed view over the elements
    ///
    /// The primitive must match the view's element type; raw-byte segments
    /// accept any primitive whose width divides the segment length.
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        let count = self.element_count::<T>()?;
        let ptr = self.region.as_ptr()?;
        Ok(unsafe { std::slice::from_raw_parts(ptr as *const T, count) })
    }

    /// Mutable typed view; requires a read-write attach
    pub fn as_mut_slice<T: Element>(&mut self) -> Result<&mut [T]> {
        if self.mode == AccessMode::ReadOnly {
            return Err(Error::ReadOnly);
        }
        let count = self.element_count::<T>()?;
        let ptr = self.region.as_ptr()?;
        Ok(unsafe { std::slice::from_raw_parts_mut(ptr as *mut T, count) })
    }

    fn element_count<T: Element>(&self) -> Result<usize> {
        if T::TYPE == self.ty
            || (self.ty == ElementType::Uint8Clamped && T::TYPE == ElementType::Uint8)
        {
            return Ok(self.count);
        }
        if self.ty == ElementType::RawBytes {
            let width = std::mem::size_of::<T>();
            let len = self.byte_len();
            if len % width != 0 {
                return Err(Error::IndivisibleLength { len, width });
            }
            return Ok(len / width);
        }
        Err(Error::TypeMismatch {
            segment: self.ty,
            requested: T::TYPE,
        })
    }
}
