/// Vlk tests
///
/// Austin Shafer - 2024
use crate as vlk;
use crate::device::find_memory_type_index;
use ash::vk;
use vlk::{
    ArenaError, ArenaPools, BufferPurpose, ImagePurpose, MemoryPurpose, MemoryRegion,
    MemoryRequirement, PoolSizes, Purpose, PurposeData,
};

/// Host memory standing in for a device allocation
#[derive(Debug, Default)]
struct TypedMemory {
    /// Allocation order, to tell pools apart
    id: usize,
    memtype: u32,
    bytes: Vec<u8>,
}

impl TypedMemory {
    fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Records every allocation the arena asks for
#[derive(Default)]
struct Allocator {
    calls: Vec<(u32, usize)>,
}

impl Allocator {
    fn alloc(&mut self, memtype: u32, size: usize) -> Result<TypedMemory, String> {
        self.calls.push((memtype, size));
        Ok(TypedMemory {
            id: self.calls.len() - 1,
            memtype: memtype,
            bytes: vec![0; size],
        })
    }
}

fn sizes(vbo: usize, ibo: usize, textures: usize) -> PurposeData<Purpose, usize> {
    PoolSizes::builder()
        .vbo_capacity(vbo)
        .ibo_capacity(ibo)
        .textures_capacity(textures)
        .build()
        .capacities()
}

/// Build pools where every purpose reports the same requirement
fn uniform_pools(
    capacities: &PurposeData<Purpose, usize>,
    alignment: usize,
    memtype: u32,
) -> (ArenaPools<Purpose, TypedMemory>, Allocator) {
    let mut allocator = Allocator::default();
    let pools = ArenaPools::new(
        capacities,
        |_| MemoryRequirement {
            alignment: alignment,
            type_class: memtype,
        },
        |class, size| allocator.alloc(class, size),
    )
    .unwrap();

    (pools, allocator)
}

/// Build pools from per purpose (alignment, memtype) pairs
fn typed_pools(
    capacities: &PurposeData<Purpose, usize>,
    reqs: &PurposeData<Purpose, (usize, u32)>,
) -> (ArenaPools<Purpose, TypedMemory>, Allocator) {
    let mut allocator = Allocator::default();
    let pools = ArenaPools::new(
        capacities,
        |p| MemoryRequirement {
            alignment: reqs[p].0,
            type_class: reqs[p].1,
        },
        |class, size| allocator.alloc(class, size),
    )
    .unwrap();

    (pools, allocator)
}

#[test]
fn lock_available_bytes() {
    let (mut arenas, _) = uniform_pools(&sizes(100, 100, 500), 8, 100);

    let (mem, region) = arenas.lock_memory_for(BufferPurpose::Ibo, 30).unwrap();
    assert_eq!(region.len, 30);
    assert_eq!(region.offset % 8, 0);
    assert_eq!(mem.memtype, 100);
}

#[test]
fn buffer_and_image_share_one_pool() {
    let (mut arenas, allocator) = uniform_pools(&sizes(100, 100, 500), 8, 100);
    assert_eq!(allocator.calls, vec![(100, 700)]);
    assert_eq!(arenas.pool_count(), 1);

    let (vbo_mem, vbo_region) = arenas.lock_memory_for(BufferPurpose::Vbo, 35).unwrap();
    let vbo_id = vbo_mem.id;
    assert_eq!(vbo_mem.size(), 700);

    let (tex_mem, tex_region) = arenas.lock_memory_for(ImagePurpose::Texture, 25).unwrap();
    assert_eq!(tex_mem.id, vbo_id);
    assert_eq!(tex_mem.size(), 700);

    assert_eq!(vbo_region.len, 35);
    assert_eq!(tex_region.len, 25);
    assert_eq!(vbo_region.offset % 8, 0);
    assert_eq!(tex_region.offset % 8, 0);
    assert!(!vbo_region.overlaps(&tex_region));
    assert_eq!(tex_region.offset, 40);
}

#[test]
fn equal_classes_are_coalesced() {
    let reqs = PurposeData::from_fn(|p: Purpose| match p {
        Purpose::Vbo | Purpose::Ibo => (8, 100),
        Purpose::Texture => (256, 200),
    });
    let (arenas, allocator) = typed_pools(&sizes(400, 500, 0), &reqs);

    assert_eq!(allocator.calls, vec![(100, 900), (200, 0)]);
    assert_eq!(arenas.info(Purpose::Vbo).pool_index, 0);
    assert_eq!(arenas.info(Purpose::Ibo).pool_index, 0);
    assert_eq!(arenas.info(Purpose::Texture).pool_index, 1);

    let handles = arenas.memory_handles();
    assert_eq!(handles[Purpose::Vbo].id, handles[Purpose::Ibo].id);
    assert_ne!(handles[Purpose::Vbo].id, handles[Purpose::Texture].id);
}

#[test]
fn distinct_classes_get_their_own_pool() {
    let reqs = PurposeData::from_fn(|p: Purpose| match p {
        Purpose::Vbo => (8, 3),
        Purpose::Ibo => (4, 2),
        Purpose::Texture => (64, 1),
    });
    let (mut arenas, allocator) = typed_pools(&sizes(100, 200, 300), &reqs);

    // Pools are allocated in type class order
    assert_eq!(allocator.calls, vec![(1, 300), (2, 200), (3, 100)]);

    let vbo = arenas.lock_memory_for(Purpose::Vbo, 10).unwrap().0.id;
    let ibo = arenas.lock_memory_for(Purpose::Ibo, 10).unwrap().0.id;
    let tex = arenas.lock_memory_for(Purpose::Texture, 10).unwrap().0.id;
    assert_eq!((tex, ibo, vbo), (0, 1, 2));

    // Vbo has its pool to itself, so only its own claims push it forward
    assert_eq!(arenas.lock_memory_for(Purpose::Vbo, 6).unwrap().1.offset, 16);
    assert_eq!(arenas.info(Purpose::Ibo).used, 10);
}

#[test]
fn classes_sort_before_coalescing() {
    // Texture and Ibo share a class but are not neighbours in
    // enumeration order. Sorting brings them together.
    let reqs = PurposeData::from_fn(|p: Purpose| match p {
        Purpose::Vbo => (8, 5),
        Purpose::Ibo => (8, 1),
        Purpose::Texture => (8, 1),
    });
    let (arenas, allocator) = typed_pools(&sizes(10, 20, 30), &reqs);

    assert_eq!(allocator.calls, vec![(1, 50), (5, 10)]);
    assert_eq!(arenas.info(Purpose::Ibo).pool_index, 0);
    assert_eq!(arenas.info(Purpose::Texture).pool_index, 0);
    assert_eq!(arenas.info(Purpose::Vbo).pool_index, 1);
}

#[test]
fn capacity_is_enforced_per_purpose() {
    let (mut arenas, _) = uniform_pools(&sizes(64, 64, 512), 8, 100);

    arenas.lock_memory_for(Purpose::Vbo, 60).unwrap();
    let err = arenas.lock_memory_for(Purpose::Vbo, 8).unwrap_err();
    assert_eq!(
        err,
        ArenaError::OutOfMemory {
            purpose: "Vbo".to_string(),
            requested: 8,
            padding: 4,
            remaining: 4,
        }
    );

    // The pool still has plenty of room, and failures consume nothing
    assert_eq!(arenas.info(Purpose::Vbo).used, 60);
    assert!(arenas.memory_for(Purpose::Vbo).size() > 68);
    let (_, region) = arenas.lock_memory_for(Purpose::Ibo, 32).unwrap();
    assert_eq!(region.offset, 64);

    // Exactly filling the rest is fine
    let (mut arenas, _) = uniform_pools(&sizes(64, 0, 0), 8, 100);
    arenas.lock_memory_for(Purpose::Vbo, 60).unwrap();
    assert!(arenas.lock_memory_for(Purpose::Vbo, 4).is_err());
    let (_, region) = arenas.lock_memory_for(Purpose::Vbo, 0).unwrap();
    assert_eq!(region, MemoryRegion::new(64, 0));
    assert!(arenas.lock_memory_for(Purpose::Vbo, 1).is_err());
}

#[test]
fn huge_claims_fail_cleanly() {
    let (mut arenas, _) = uniform_pools(&sizes(64, 64, 64), 8, 100);
    arenas.lock_memory_for(Purpose::Vbo, 3).unwrap();
    assert!(arenas.lock_memory_for(Purpose::Ibo, usize::MAX).is_err());
    assert_eq!(arenas.info(Purpose::Ibo).used, 0);
}

#[test]
fn zero_capacity_purpose_takes_part() {
    let (mut arenas, allocator) = uniform_pools(&sizes(0, 100, 100), 16, 7);
    assert_eq!(allocator.calls, vec![(7, 200)]);
    assert_eq!(arenas.info(Purpose::Vbo).pool_index, 0);

    let (_, region) = arenas.lock_memory_for(Purpose::Vbo, 0).unwrap();
    assert_eq!(region, MemoryRegion::new(0, 0));
    assert!(arenas.lock_memory_for(Purpose::Vbo, 1).is_err());

    let (_, region) = arenas.lock_memory_for(Purpose::Ibo, 20).unwrap();
    assert_eq!(region, MemoryRegion::new(0, 20));
    let (_, region) = arenas.lock_memory_for(Purpose::Texture, 20).unwrap();
    assert_eq!(region, MemoryRegion::new(32, 20));
}

/// Interleave claims across purposes sharing a pool and check every
/// region against every other one.
#[test]
fn interleaved_claims_never_overlap() {
    let reqs = PurposeData::from_fn(|p: Purpose| match p {
        Purpose::Vbo => (4, 9),
        Purpose::Ibo => (16, 9),
        Purpose::Texture => (256, 9),
    });
    let (mut arenas, allocator) = typed_pools(&sizes(4096, 4096, 8192), &reqs);
    assert_eq!(allocator.calls, vec![(9, 16384)]);

    let claims = [
        (Purpose::Vbo, 13),
        (Purpose::Texture, 100),
        (Purpose::Ibo, 7),
        (Purpose::Vbo, 1),
        (Purpose::Vbo, 64),
        (Purpose::Texture, 3),
        (Purpose::Ibo, 33),
        (Purpose::Texture, 512),
        (Purpose::Vbo, 5),
        (Purpose::Ibo, 0),
    ];

    let mut regions: Vec<(Purpose, MemoryRegion)> = Vec::new();
    for (purpose, size) in claims.iter() {
        let (mem, region) = arenas.lock_memory_for(*purpose, *size).unwrap();
        assert_eq!(region.len, *size);
        assert_eq!(region.offset % reqs[*purpose].0, 0);
        assert!(region.end() <= mem.size());

        for (prev_purpose, prev) in regions.iter() {
            assert!(!region.overlaps(prev), "{:?} overlaps {:?}", region, prev);
            if prev_purpose == purpose {
                assert!(region.offset >= prev.end());
            }
        }
        regions.push((*purpose, region));
    }

    for purpose in Purpose::ALL.iter() {
        let info = arenas.info(*purpose);
        assert!(info.used <= info.capacity);
    }
}

#[test]
fn explicit_alignment_is_honored() {
    let (mut arenas, _) = uniform_pools(&sizes(1024, 0, 0), 8, 1);

    arenas.lock_memory_for(Purpose::Vbo, 3).unwrap();
    let (_, region) = arenas.lock_memory_for_aligned(Purpose::Vbo, 10, 64).unwrap();
    assert_eq!(region.offset, 64);
    assert_eq!(arenas.info(Purpose::Vbo).used, 74);

    // A smaller explicit alignment does not weaken the purpose's own
    let (_, region) = arenas.lock_memory_for_aligned(Purpose::Vbo, 1, 2).unwrap();
    assert_eq!(region.offset, 80);

    // Zero alignment everywhere means no padding at all
    let (mut arenas, _) = uniform_pools(&sizes(16, 0, 0), 0, 1);
    arenas.lock_memory_for(Purpose::Vbo, 3).unwrap();
    let (_, region) = arenas.lock_memory_for(Purpose::Vbo, 3).unwrap();
    assert_eq!(region.offset, 3);
}

#[test]
fn allocation_errors_propagate() {
    let mut calls = 0;
    let reqs = PurposeData::from_fn(|p: Purpose| p.index() as u32);
    let res = ArenaPools::<Purpose, TypedMemory>::new(
        &sizes(1, 2, 3),
        |p| MemoryRequirement {
            alignment: 1,
            type_class: reqs[p],
        },
        |class, size| {
            calls += 1;
            if class == 1 {
                return Err(format!("no room for {} bytes", size));
            }
            Ok(TypedMemory::default())
        },
    );

    assert_eq!(res.err(), Some("no room for 2 bytes".to_string()));
    assert_eq!(calls, 2);
}

/// A purpose set defined outside of vlk
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Scratch {
    Uniforms,
    Storage,
    Indirect,
}

impl MemoryPurpose for Scratch {
    const ALL: &'static [Scratch] = &[Scratch::Uniforms, Scratch::Storage, Scratch::Indirect];

    fn index(self) -> usize {
        self as usize
    }
}

#[test]
fn ties_keep_enumeration_order() {
    let capacities = PurposeData::from_fn(|p: Scratch| match p {
        Scratch::Uniforms => 16,
        Scratch::Storage => 32,
        Scratch::Indirect => 64,
    });
    let mut allocator = Allocator::default();
    let mut arenas = ArenaPools::<Scratch, TypedMemory>::new(
        &capacities,
        |_| MemoryRequirement {
            alignment: 16,
            type_class: 4,
        },
        |class, size| allocator.alloc(class, size),
    )
    .unwrap();
    assert_eq!(allocator.calls, vec![(4, 112)]);

    let (_, indirect) = arenas.lock_memory_for(Scratch::Indirect, 8).unwrap();
    let (_, uniforms) = arenas.lock_memory_for(Scratch::Uniforms, 8).unwrap();
    assert_eq!(indirect, MemoryRegion::new(0, 8));
    assert_eq!(uniforms, MemoryRegion::new(16, 8));

    let pools = arenas.into_pools();
    assert_eq!(pools.len(), 1);
    assert_eq!(pools[0].size(), 112);
}

#[test]
fn purpose_tables() {
    assert!(Purpose::Vbo.is_buffer());
    assert!(Purpose::Texture.is_image());
    assert_eq!(Purpose::from(BufferPurpose::Ibo), Purpose::Ibo);
    assert_eq!(Purpose::from(ImagePurpose::Texture), Purpose::Texture);

    for (i, p) in Purpose::ALL.iter().enumerate() {
        assert_eq!(p.index(), i);
    }

    let mut table = PurposeData::from_fn(|p: Purpose| p.index() * 10);
    table[Purpose::Ibo] += 1;
    assert_eq!(table.values(), &[0, 11, 20]);

    let err: Result<PurposeData<Purpose, usize>, Purpose> =
        PurposeData::try_from_fn(|p: Purpose| if p.is_image() { Err(p) } else { Ok(0) });
    assert_eq!(err.err(), Some(Purpose::Texture));
}

#[test]
fn pool_sizes_builder() {
    let sizes = PoolSizes::builder()
        .vbo_capacity(1)
        .ibo_capacity(2)
        .textures_capacity(3)
        .staging_size(4)
        .build();

    assert_eq!(sizes.capacity_for(Purpose::Vbo), 1);
    assert_eq!(sizes.capacity_for(Purpose::Ibo), 2);
    assert_eq!(sizes.capacity_for(Purpose::Texture), 3);
    assert_eq!(sizes.staging_size, 4);
    assert_eq!(sizes.capacities().values(), &[1, 2, 3]);
}

#[test]
fn requirements_from_vulkan() {
    let reqs = vk::MemoryRequirements {
        size: 1 << 30,
        alignment: 256,
        memory_type_bits: 0b1010,
    };
    assert_eq!(
        MemoryRequirement::from(reqs),
        MemoryRequirement {
            alignment: 256,
            type_class: 0b1010,
        }
    );
}

#[test]
fn memory_type_selection() {
    let mut props = vk::PhysicalDeviceMemoryProperties::default();
    props.memory_type_count = 3;
    props.memory_types[0].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE;
    props.memory_types[1].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
    props.memory_types[2].property_flags =
        vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE;
    // Past memory_type_count, must never be picked
    props.memory_types[3].property_flags = vk::MemoryPropertyFlags::HOST_CACHED;

    let local = vk::MemoryPropertyFlags::DEVICE_LOCAL;
    let visible = vk::MemoryPropertyFlags::HOST_VISIBLE;

    assert_eq!(find_memory_type_index(&props, 0b111, local), Some(1));
    assert_eq!(find_memory_type_index(&props, 0b101, local), Some(2));
    assert_eq!(find_memory_type_index(&props, 0b111, visible), Some(0));
    assert_eq!(find_memory_type_index(&props, 0b001, local), None);
    assert_eq!(
        find_memory_type_index(&props, 0b1111, vk::MemoryPropertyFlags::HOST_CACHED),
        None
    );
}
