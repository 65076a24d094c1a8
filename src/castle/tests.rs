/// Castle tests
///
/// Austin Shafer - 2024
use super::host::{BUFFER_TYPE_BITS, IMAGE_TYPE_BITS};
use super::*;

fn quick_info() -> CastleCreateInfoBuilder {
    CastleCreateInfo::builder().frame_period_ms(1).frame_count(4)
}

#[test]
fn scene_lands_in_coalesced_pools() {
    let mut castle = quick_info().resizes(Vec::new()).build_castle();
    let arenas = castle.arenas();

    // Both buffer purposes share one pool, textures get their own
    assert_eq!(arenas.pool_count(), 2);
    assert_eq!(arenas.memory_for(Purpose::Vbo).type_bits(), BUFFER_TYPE_BITS);
    assert_eq!(arenas.memory_for(Purpose::Ibo).type_bits(), BUFFER_TYPE_BITS);
    assert_eq!(arenas.memory_for(Purpose::Texture).type_bits(), IMAGE_TYPE_BITS);
    assert_eq!(arenas.memory_for(Purpose::Vbo).size(), 128 * 1024);

    let scene = *castle.scene();
    assert_eq!(scene.vertices, MemoryRegion::new(0, 96));
    // Ibo follows the vertices in the shared pool, 16 byte aligned
    assert_eq!(scene.indices, MemoryRegion::new(96, 72));
    assert_eq!(scene.texture, MemoryRegion::new(0, 1024));

    // The bytes made it through staging
    let ibo = arenas.memory_for(Purpose::Ibo).read(&scene.indices).unwrap();
    assert_eq!(ibo, cube_indices());
    let tex = arenas.memory_for(Purpose::Texture).read(&scene.texture).unwrap();
    assert_eq!(tex, checker_texture());

    assert_eq!(castle.staging_capacity(), 2 * 1024 * 1024);
    castle.run().unwrap();
    assert_eq!(castle.current_size(), Size::new(640, 480));
    assert_eq!(castle.resize_count(), 0);
}

#[test]
fn frame_loop_sees_last_resize() {
    let sizes = vec![Size::new(800, 600), Size::new(1024, 768), Size::new(1280, 720)];
    let mut castle = quick_info().resizes(sizes).build_castle();

    castle.run().unwrap();
    // The surface thread is joined by now, so the last size is current
    assert_eq!(castle.current_size(), Size::new(1280, 720));
    assert!(castle.resize_count() <= 3);
}

#[test]
fn undersized_pools_fail_to_spin() {
    let sizes = PoolSizes::builder()
        .vbo_capacity(64)
        .ibo_capacity(1024)
        .textures_capacity(4096)
        .staging_size(8192)
        .build();

    let res = Castle::spin(quick_info().pool_sizes(sizes).build());
    let err = res.err().expect("vertices should not fit");
    assert!(format!("{}", err).contains("Vbo"));
}

#[test]
fn undersized_staging_fails_to_spin() {
    let sizes = PoolSizes::builder()
        .vbo_capacity(1024)
        .ibo_capacity(1024)
        .textures_capacity(4096)
        .staging_size(128)
        .build();

    assert!(Castle::spin(quick_info().pool_sizes(sizes).build()).is_err());
}

#[test]
fn host_memory_bounds() {
    let mem = HostMemory::allocate(1, 16).unwrap();
    assert!(mem.write(&MemoryRegion::new(8, 4), &[1, 2, 3, 4]).is_ok());
    assert_eq!(mem.read(&MemoryRegion::new(8, 4)), Some(vec![1, 2, 3, 4]));

    assert!(mem.write(&MemoryRegion::new(14, 4), &[1, 2, 3, 4]).is_err());
    assert!(mem.write(&MemoryRegion::new(0, 4), &[1, 2]).is_err());
    assert!(HostMemory::allocate(0, 16).is_err());
}

impl CastleCreateInfoBuilder {
    fn build_castle(self) -> Castle {
        Castle::spin(self.build()).unwrap()
    }
}
