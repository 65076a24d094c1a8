//! # Vlk: device memory for the castle renderer
//!
//! Vulkan wants few, large allocations, and wants resources bound at
//! offsets that satisfy their alignment. Vlk reserves a fixed capacity
//! for each `Purpose` (vertex buffers, index buffers, textures) and packs
//! purposes with compatible memory types into one shared pool.
//!
//! The allocator itself (`ArenaPools`) knows nothing about Vulkan. It is
//! handed a function reporting each purpose's requirements and a function
//! that allocates a pool, so it can be driven by plain host memory just
//! as well. `DeviceArena` wires it up to an `ash::Device`.
//!
//! ```
//! use vlk::{ArenaPools, MemoryRequirement, PoolSizes, Purpose, BufferPurpose};
//!
//! let sizes = PoolSizes::builder()
//!     .vbo_capacity(100)
//!     .ibo_capacity(100)
//!     .textures_capacity(500)
//!     .build();
//!
//! let mut arenas = ArenaPools::<Purpose, Vec<u8>>::new(
//!     &sizes.capacities(),
//!     |_| MemoryRequirement { alignment: 8, type_class: 100u32 },
//!     |_class, size| -> Result<Vec<u8>, ()> { Ok(vec![0; size]) },
//! )
//! .unwrap();
//!
//! let (mem, region) = arenas.lock_memory_for(BufferPurpose::Ibo, 30).unwrap();
//! assert_eq!(mem.len(), 700);
//! assert_eq!(region.len, 30);
//! assert_eq!(region.offset % 8, 0);
//! ```

// Austin Shafer - 2024

mod arena;
pub mod device;
mod purpose;

#[cfg(test)]
mod tests;

pub use arena::{ArenaError, ArenaInfo, ArenaPools, MemoryRequirement};
pub use device::{DeviceArena, DeviceArenaCreateInfo};
pub use purpose::{BufferPurpose, ImagePurpose, MemoryPurpose, Purpose, PurposeData};

// Re-export some things from utils so clients
// can use them
extern crate utils;
pub use crate::utils::MemoryRegion;

use serde::{Deserialize, Serialize};

/// Requested capacities, in bytes
///
/// `staging_size` is the size of the host visible buffer that data is
/// uploaded through. It is not part of any arena pool.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSizes {
    pub vbo_capacity: usize,
    pub ibo_capacity: usize,
    pub textures_capacity: usize,
    pub staging_size: usize,
}

impl PoolSizes {
    pub fn builder() -> PoolSizesBuilder {
        PoolSizesBuilder {
            ps: PoolSizes::default(),
        }
    }

    /// The capacity reserved for `purpose`
    pub fn capacity_for(&self, purpose: Purpose) -> usize {
        match purpose {
            Purpose::Vbo => self.vbo_capacity,
            Purpose::Ibo => self.ibo_capacity,
            Purpose::Texture => self.textures_capacity,
        }
    }

    /// All arena capacities as a per-purpose table
    pub fn capacities(&self) -> PurposeData<Purpose, usize> {
        PurposeData::from_fn(|p| self.capacity_for(p))
    }
}

/// Implements the builder pattern for easier PoolSizes creation
pub struct PoolSizesBuilder {
    ps: PoolSizes,
}

impl PoolSizesBuilder {
    pub fn vbo_capacity(mut self, size: usize) -> Self {
        self.ps.vbo_capacity = size;
        self
    }

    pub fn ibo_capacity(mut self, size: usize) -> Self {
        self.ps.ibo_capacity = size;
        self
    }

    pub fn textures_capacity(mut self, size: usize) -> Self {
        self.ps.textures_capacity = size;
        self
    }

    pub fn staging_size(mut self, size: usize) -> Self {
        self.ps.staging_size = size;
        self
    }

    pub fn build(self) -> PoolSizes {
        self.ps
    }
}
