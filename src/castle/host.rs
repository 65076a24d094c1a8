// Host memory posing as device memory
//
// Austin Shafer - 2024
use utils::{anyhow, MemoryRegion, Result};
use vlk::{MemoryRequirement, Purpose};

use std::cell::RefCell;

/// Memory type bits buffers are allowed to live in
pub const BUFFER_TYPE_BITS: u32 = 0b0011;
/// Memory type bits images are allowed to live in
pub const IMAGE_TYPE_BITS: u32 = 0b0010;

/// Requirements in the shape a typical discrete GPU reports them:
/// buffers share a class, optimally tiled images need their own
/// memory and a stricter alignment.
pub fn query_requirements(purpose: Purpose) -> MemoryRequirement<u32> {
    if purpose.is_buffer() {
        MemoryRequirement {
            alignment: 16,
            type_class: BUFFER_TYPE_BITS,
        }
    } else {
        MemoryRequirement {
            alignment: 256,
            type_class: IMAGE_TYPE_BITS,
        }
    }
}

/// One pool's worth of bytes
///
/// Several purposes write into the same pool through shared
/// references, the same way command buffers refer to one
/// VkDeviceMemory at different offsets.
#[derive(Debug)]
pub struct HostMemory {
    hm_type_bits: u32,
    hm_bytes: RefCell<Vec<u8>>,
}

impl HostMemory {
    pub fn allocate(type_bits: u32, size: usize) -> Result<HostMemory> {
        if type_bits == 0 {
            return Err(anyhow!("Cannot allocate {} bytes without a memory type", size));
        }

        Ok(HostMemory {
            hm_type_bits: type_bits,
            hm_bytes: RefCell::new(vec![0; size]),
        })
    }

    pub fn type_bits(&self) -> u32 {
        self.hm_type_bits
    }

    pub fn size(&self) -> usize {
        self.hm_bytes.borrow().len()
    }

    /// Copy `data` into `region`
    pub fn write(&self, region: &MemoryRegion, data: &[u8]) -> Result<()> {
        if data.len() != region.len {
            return Err(anyhow!(
                "{} bytes do not match region {:?}",
                data.len(),
                region
            ));
        }

        let mut bytes = self.hm_bytes.borrow_mut();
        let dst = bytes
            .get_mut(region.offset..region.end())
            .ok_or_else(|| anyhow!("Region {:?} is outside of the pool", region))?;
        dst.copy_from_slice(data);
        Ok(())
    }

    pub fn read(&self, region: &MemoryRegion) -> Option<Vec<u8>> {
        region.slice(&self.hm_bytes.borrow()).map(|s| s.to_vec())
    }
}
