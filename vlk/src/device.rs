// Vulkan backed arena pools
//
// Austin Shafer - 2024
use crate::arena::{ArenaError, ArenaPools, MemoryRequirement};
use crate::purpose::{BufferPurpose, ImagePurpose, Purpose, PurposeData};
use crate::PoolSizes;
use ash::vk;
use utils::log;
use utils::{anyhow, Context, MemoryRegion, Result};

/// Find a memory type in the physical device's memory properties that
/// satisfies `type_bits` and has every flag in `flags`.
///
/// Bit i of `type_bits` is set if the resource supports the ith memory
/// type in `props`. Memory types specify the location and accessability
/// of memory: device local memory is resident on the GPU, while host
/// visible memory can be read from the system side.
pub fn find_memory_type_index(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> Option<u32> {
    let count = (props.memory_type_count as usize).min(props.memory_types.len());

    props.memory_types[..count]
        .iter()
        .enumerate()
        .find(|(i, mem_type)| {
            (type_bits >> i) & 1 == 1 && mem_type.property_flags.contains(flags)
        })
        .map(|(i, _)| i as u32)
}

/// Parameters for DeviceArena creation
pub struct DeviceArenaCreateInfo {
    pub sizes: PoolSizes,
    /// The format textures will be created with. Image memory
    /// requirements can depend on it.
    pub texture_format: vk::Format,
    /// Property flags every pool's memory type must have
    pub memory_flags: vk::MemoryPropertyFlags,
}

impl Default for DeviceArenaCreateInfo {
    fn default() -> Self {
        Self {
            sizes: PoolSizes::default(),
            texture_format: vk::Format::R8G8B8A8_SRGB,
            memory_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
        }
    }
}

fn buffer_usage(purpose: Purpose) -> vk::BufferUsageFlags {
    let usage = match purpose {
        Purpose::Vbo => vk::BufferUsageFlags::VERTEX_BUFFER,
        Purpose::Ibo => vk::BufferUsageFlags::INDEX_BUFFER,
        Purpose::Texture => vk::BufferUsageFlags::empty(),
    };
    usage | vk::BufferUsageFlags::TRANSFER_DST
}

/// Ask the driver what memory a resource of `purpose` would need
///
/// There is no way to get requirements without a resource, so a small
/// probe buffer or image is created and thrown away.
fn query_requirements(
    dev: &ash::Device,
    purpose: Purpose,
    format: vk::Format,
) -> Result<vk::MemoryRequirements> {
    unsafe {
        if purpose.is_buffer() {
            let create_info = vk::BufferCreateInfo::builder()
                .size(1024)
                .usage(buffer_usage(purpose))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            let buffer = dev
                .create_buffer(&create_info, None)
                .context("Could not create probe buffer")?;
            let reqs = dev.get_buffer_memory_requirements(buffer);
            dev.destroy_buffer(buffer, None);
            Ok(reqs)
        } else {
            let create_info = vk::ImageCreateInfo::builder()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D {
                    width: 64,
                    height: 64,
                    depth: 1,
                })
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);
            let image = dev
                .create_image(&create_info, None)
                .context("Could not create probe image")?;
            let reqs = dev.get_image_memory_requirements(image);
            dev.destroy_image(image, None);
            Ok(reqs)
        }
    }
}

/// Arena pools living in VkDeviceMemory
///
/// The pools are freed when this is dropped, so every resource bound
/// to them must be destroyed first.
pub struct DeviceArena {
    da_dev: ash::Device,
    da_pools: ArenaPools<Purpose, vk::DeviceMemory>,
}

impl DeviceArena {
    pub fn new(
        dev: &ash::Device,
        mem_props: &vk::PhysicalDeviceMemoryProperties,
        info: &DeviceArenaCreateInfo,
    ) -> Result<Self> {
        let reqs: PurposeData<Purpose, vk::MemoryRequirements> =
            PurposeData::try_from_fn(|p| query_requirements(dev, p, info.texture_format))?;

        // Free whatever was allocated if a later pool fails
        let mut allocated = Vec::new();
        let pools = ArenaPools::new(
            &info.sizes.capacities(),
            |p| MemoryRequirement::from(reqs[p]),
            |type_bits: u32, size: usize| -> Result<vk::DeviceMemory> {
                let mem = Self::allocate(dev, mem_props, type_bits, size, info.memory_flags)?;
                allocated.push(mem);
                Ok(mem)
            },
        );

        match pools {
            Ok(pools) => Ok(Self {
                da_dev: dev.clone(),
                da_pools: pools,
            }),
            Err(e) => {
                for mem in allocated {
                    unsafe { Self::free(dev, mem) };
                }
                Err(e)
            }
        }
    }

    fn allocate(
        dev: &ash::Device,
        mem_props: &vk::PhysicalDeviceMemoryProperties,
        type_bits: u32,
        size: usize,
        flags: vk::MemoryPropertyFlags,
    ) -> Result<vk::DeviceMemory> {
        // A purpose can have zero capacity. Vulkan does not allow
        // empty allocations.
        if size == 0 {
            return Ok(vk::DeviceMemory::null());
        }

        let index = find_memory_type_index(mem_props, type_bits, flags).ok_or_else(|| {
            anyhow!("No memory type in {:#b} has flags {:?}", type_bits, flags)
        })?;
        log::debug!("Allocating {} bytes from memory type {}", size, index);

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(size as u64)
            .memory_type_index(index);

        unsafe {
            dev.allocate_memory(&alloc_info, None)
                .context("Could not allocate arena pool")
        }
    }

    unsafe fn free(dev: &ash::Device, mem: vk::DeviceMemory) {
        if mem != vk::DeviceMemory::null() {
            dev.free_memory(mem, None);
        }
    }

    /// Claim `size` bytes for `purpose`. See `ArenaPools::lock_memory_for`.
    pub fn lock_memory_for<Q: Into<Purpose>>(
        &mut self,
        purpose: Q,
        size: usize,
    ) -> std::result::Result<(vk::DeviceMemory, MemoryRegion), ArenaError> {
        self.da_pools
            .lock_memory_for(purpose, size)
            .map(|(mem, region)| (*mem, region))
    }

    /// Claim memory for `buffer` and bind it
    pub fn bind_buffer(
        &mut self,
        purpose: BufferPurpose,
        buffer: vk::Buffer,
    ) -> Result<MemoryRegion> {
        let reqs = unsafe { self.da_dev.get_buffer_memory_requirements(buffer) };
        let (mem, region) = self.da_pools.lock_memory_for_aligned(
            purpose,
            reqs.size as usize,
            reqs.alignment as usize,
        )?;

        unsafe {
            self.da_dev
                .bind_buffer_memory(buffer, *mem, region.offset as u64)
                .context("Could not bind buffer memory")?;
        }
        Ok(region)
    }

    /// Claim memory for `image` and bind it
    pub fn bind_image(&mut self, purpose: ImagePurpose, image: vk::Image) -> Result<MemoryRegion> {
        let reqs = unsafe { self.da_dev.get_image_memory_requirements(image) };
        let (mem, region) = self.da_pools.lock_memory_for_aligned(
            purpose,
            reqs.size as usize,
            reqs.alignment as usize,
        )?;

        unsafe {
            self.da_dev
                .bind_image_memory(image, *mem, region.offset as u64)
                .context("Could not bind image memory")?;
        }
        Ok(region)
    }

    pub fn pools(&self) -> &ArenaPools<Purpose, vk::DeviceMemory> {
        &self.da_pools
    }
}

impl Drop for DeviceArena {
    fn drop(&mut self) {
        for mem in self.da_pools.pools().iter() {
            unsafe { Self::free(&self.da_dev, *mem) };
        }
    }
}
