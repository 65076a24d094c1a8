// Region tracking helpers
//
// Austin Shafer - 2020

use serde::{Deserialize, Serialize};

/// A byte range within a larger allocation
///
/// This is what gets handed out when a chunk of a shared memory
/// object is reserved for someone. The owner of the memory object
/// is not tracked here, only where in it the bytes live:
///   offset: the first byte of the region
///   len:    the number of bytes in the region
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone, Hash, Serialize, Deserialize)]
pub struct MemoryRegion {
    pub offset: usize,
    pub len: usize,
}

impl MemoryRegion {
    pub fn new(offset: usize, len: usize) -> MemoryRegion {
        MemoryRegion {
            offset: offset,
            len: len,
        }
    }

    /// One past the last byte of this region
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Checks if any byte is shared between this region and `other`.
    ///
    /// Empty regions never overlap anything.
    pub fn overlaps(&self, other: &MemoryRegion) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.offset < other.end()
            && other.offset < self.end()
    }

    /// Get the part of `bytes` described by this region
    pub fn slice<'a>(&self, bytes: &'a [u8]) -> Option<&'a [u8]> {
        bytes.get(self.offset..self.end())
    }
}

/// Calculate the region that `subspan` occupies inside of `span`.
///
/// Returns None if `subspan` does not lie within `span`.
pub fn subspan_region<T>(span: &[T], subspan: &[T]) -> Option<MemoryRegion> {
    let elem = std::mem::size_of::<T>().max(1);
    let start = span.as_ptr() as usize;
    let sub_start = subspan.as_ptr() as usize;

    if sub_start < start || sub_start + subspan.len() * elem > start + span.len() * elem {
        return None;
    }

    Some(MemoryRegion {
        offset: sub_start - start,
        len: subspan.len() * std::mem::size_of::<T>(),
    })
}
