// Host side bump allocation
//
// Austin Shafer - 2024
use crate::region::MemoryRegion;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonotonicError {
    #[error("{requested} bytes with alignment {alignment} do not fit in the {remaining} remaining")]
    OutOfMemory {
        requested: usize,
        alignment: usize,
        remaining: usize,
    },
}

/// A bump allocator over an owned byte buffer
///
/// Allocations are handed out as regions of the backing buffer and
/// are never freed individually. `clear` resets the whole arena at
/// once. This is used to pack staging data before it is uploaded,
/// where everything written for one upload is thrown away together.
///
/// Alignment is relative to the start of the buffer, since the
/// offsets are what end up in copy commands.
pub struct MonotonicArena {
    ma_mem: Vec<u8>,
    /// The first unused byte in ma_mem
    ma_offset: usize,
}

impl MonotonicArena {
    pub fn new(size: usize) -> Self {
        Self::from_buffer(vec![0; size])
    }

    /// Build an arena that allocates out of `buf`
    pub fn from_buffer(buf: Vec<u8>) -> Self {
        Self {
            ma_mem: buf,
            ma_offset: 0,
        }
    }

    /// Forget all allocations. The contents are left as they are.
    pub fn clear(&mut self) {
        self.ma_offset = 0;
    }

    /// The number of bytes that have not been handed out yet
    pub fn capacity(&self) -> usize {
        self.ma_mem.len() - self.ma_offset
    }

    /// Reserve `bytes` bytes aligned to `alignment`
    pub fn allocate(&mut self, bytes: usize, alignment: usize) -> Result<MemoryRegion, MonotonicError> {
        debug_assert!(alignment == 0 || alignment.is_power_of_two());
        let err = MonotonicError::OutOfMemory {
            requested: bytes,
            alignment: alignment,
            remaining: self.capacity(),
        };

        let start = crate::align_up(self.ma_offset, alignment).ok_or_else(|| err.clone())?;
        let end = start.checked_add(bytes).ok_or_else(|| err.clone())?;
        if end > self.ma_mem.len() {
            return Err(err);
        }

        self.ma_offset = end;
        Ok(MemoryRegion::new(start, bytes))
    }

    /// Reserve room for `data` and copy it in
    pub fn push(&mut self, data: &[u8], alignment: usize) -> Result<MemoryRegion, MonotonicError> {
        let region = self.allocate(data.len(), alignment)?;
        self.slice_mut(&region).copy_from_slice(data);
        Ok(region)
    }

    /// Get the bytes of a region previously returned from this arena
    pub fn slice(&self, region: &MemoryRegion) -> &[u8] {
        &self.ma_mem[region.offset..region.end()]
    }

    pub fn slice_mut(&mut self, region: &MemoryRegion) -> &mut [u8] {
        &mut self.ma_mem[region.offset..region.end()]
    }

    /// The whole backing buffer
    pub fn as_bytes(&self) -> &[u8] {
        self.ma_mem.as_slice()
    }
}
