// The castle driver
//
// Austin Shafer - 2024
mod host;
#[cfg(test)]
mod tests;

pub use host::HostMemory;

use utils::log;
use utils::timing::TimingManager;
use utils::{anyhow, MemoryRegion, MonotonicArena, Result};
use utils::{UpdateConsumer, ValueUpdateChannel};
use vlk::{ArenaPools, PoolSizes, Purpose};

use std::thread;
use std::time::Duration;

/// Window dimensions reported by the surface
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Size {
        Size {
            width: width,
            height: height,
        }
    }
}

/// Parameters for Castle creation
pub struct CastleCreateInfo {
    pub pool_sizes: PoolSizes,
    /// The size the window starts out at
    pub initial_size: Size,
    /// Sizes the surface thread reports, one per frame period
    pub resizes: Vec<Size>,
    pub frame_count: usize,
    pub frame_period_ms: u32,
}

impl CastleCreateInfo {
    pub fn builder() -> CastleCreateInfoBuilder {
        CastleCreateInfoBuilder {
            ci: CastleCreateInfo {
                pool_sizes: PoolSizes::builder()
                    .vbo_capacity(64 * 1024)
                    .ibo_capacity(64 * 1024)
                    .textures_capacity(1024 * 1024)
                    .staging_size(2 * 1024 * 1024)
                    .build(),
                initial_size: Size::new(640, 480),
                resizes: vec![Size::new(800, 600), Size::new(1280, 720)],
                frame_count: 60,
                frame_period_ms: 16,
            },
        }
    }
}

/// Implements the builder pattern for easier castle creation
pub struct CastleCreateInfoBuilder {
    ci: CastleCreateInfo,
}

impl CastleCreateInfoBuilder {
    pub fn pool_sizes(mut self, sizes: PoolSizes) -> Self {
        self.ci.pool_sizes = sizes;
        self
    }

    pub fn initial_size(mut self, size: Size) -> Self {
        self.ci.initial_size = size;
        self
    }

    pub fn resizes(mut self, sizes: Vec<Size>) -> Self {
        self.ci.resizes = sizes;
        self
    }

    pub fn frame_count(mut self, count: usize) -> Self {
        self.ci.frame_count = count;
        self
    }

    pub fn frame_period_ms(mut self, period: u32) -> Self {
        self.ci.frame_period_ms = period;
        self
    }

    pub fn build(self) -> CastleCreateInfo {
        self.ci
    }
}

/// Where each part of the scene ended up
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SceneRegions {
    pub vertices: MemoryRegion,
    pub indices: MemoryRegion,
    pub texture: MemoryRegion,
}

pub struct Castle {
    c_arenas: ArenaPools<Purpose, HostMemory>,
    c_staging: MonotonicArena,
    c_scene: SceneRegions,
    c_resize: UpdateConsumer<Size>,
    /// The surface thread, until the frame loop is done with it
    c_surface: Option<thread::JoinHandle<()>>,
    c_size: Size,
    /// Number of resizes the frame loop acted on
    c_resize_count: usize,
    c_frame_count: usize,
    c_frame_period_ms: u32,
}

/// Unit cube corners
fn cube_vertices() -> Vec<u8> {
    let mut ret = Vec::new();
    for i in 0..8u32 {
        for axis in 0..3 {
            let val: f32 = if i & (1 << axis) != 0 { 0.5 } else { -0.5 };
            ret.extend_from_slice(&val.to_ne_bytes());
        }
    }
    ret
}

/// Two triangles per cube face
fn cube_indices() -> Vec<u8> {
    const FACES: [[u16; 4]; 6] = [
        [0, 1, 3, 2],
        [4, 6, 7, 5],
        [0, 4, 5, 1],
        [2, 3, 7, 6],
        [0, 2, 6, 4],
        [1, 5, 7, 3],
    ];

    let mut ret = Vec::new();
    for face in FACES.iter() {
        for idx in [face[0], face[1], face[2], face[2], face[3], face[0]].iter() {
            ret.extend_from_slice(&idx.to_ne_bytes());
        }
    }
    ret
}

/// A 16x16 RGBA checkerboard
fn checker_texture() -> Vec<u8> {
    let mut ret = Vec::with_capacity(16 * 16 * 4);
    for y in 0..16 {
        for x in 0..16 {
            let val = if (x / 4 + y / 4) % 2 == 0 { 0xff } else { 0x20 };
            ret.extend_from_slice(&[val, val, val, 0xff]);
        }
    }
    ret
}

impl Castle {
    /// Set up memory, upload the scene, and start the surface thread
    pub fn spin(info: CastleCreateInfo) -> Result<Castle> {
        let mut arenas = ArenaPools::new(
            &info.pool_sizes.capacities(),
            host::query_requirements,
            HostMemory::allocate,
        )?;
        log::debug!(
            "Created {} pools for {:?}",
            arenas.pool_count(),
            info.pool_sizes
        );

        let mut staging = MonotonicArena::new(info.pool_sizes.staging_size);
        let scene = Self::upload_scene(&mut arenas, &mut staging)?;

        let (mut producer, consumer) =
            ValueUpdateChannel::with_value(info.initial_size).split();
        let period = Duration::from_millis(info.frame_period_ms as u64);
        let resizes = info.resizes;
        let surface = thread::Builder::new()
            .name("surface".to_string())
            .spawn(move || {
                for size in resizes {
                    thread::sleep(period);
                    producer.update(size);
                }
            })
            .map_err(|e| anyhow!("Could not spawn surface thread: {}", e))?;

        Ok(Castle {
            c_arenas: arenas,
            c_staging: staging,
            c_scene: scene,
            c_resize: consumer,
            c_surface: Some(surface),
            c_size: info.initial_size,
            c_resize_count: 0,
            c_frame_count: info.frame_count,
            c_frame_period_ms: info.frame_period_ms,
        })
    }

    /// Copy `data` through the staging arena into memory claimed for `purpose`
    fn upload(
        arenas: &mut ArenaPools<Purpose, HostMemory>,
        staging: &mut MonotonicArena,
        purpose: Purpose,
        data: &[u8],
    ) -> Result<MemoryRegion> {
        let src = staging.push(data, 4)?;
        let (mem, dst) = arenas.lock_memory_for(purpose, data.len())?;
        mem.write(&dst, staging.slice(&src))?;

        log::info!(
            "Uploaded {} bytes for {:?} from staging {:?} to {:?}",
            data.len(),
            purpose,
            src,
            dst
        );
        Ok(dst)
    }

    fn upload_scene(
        arenas: &mut ArenaPools<Purpose, HostMemory>,
        staging: &mut MonotonicArena,
    ) -> Result<SceneRegions> {
        let ret = SceneRegions {
            vertices: Self::upload(arenas, staging, Purpose::Vbo, &cube_vertices())?,
            indices: Self::upload(arenas, staging, Purpose::Ibo, &cube_indices())?,
            texture: Self::upload(arenas, staging, Purpose::Texture, &checker_texture())?,
        };

        // Everything staged has been copied out
        staging.clear();
        Ok(ret)
    }

    /// Run the frame loop for the configured number of frames
    ///
    /// The size is fetched once up front, as if to create the
    /// swapchain, and then polled for updates at the start of every
    /// frame.
    pub fn run(&mut self) -> Result<()> {
        self.c_size = self.c_resize.get_current();
        log::debug!("Creating swapchain at {:?}", self.c_size);

        let mut timer = TimingManager::new(self.c_frame_period_ms);
        for frame in 0..self.c_frame_count {
            if let Some(size) = self.c_resize.get_update() {
                log::debug!(
                    "Frame {}: recreating swapchain {:?} -> {:?}",
                    frame,
                    self.c_size,
                    size
                );
                self.c_size = size;
                self.c_resize_count += 1;
            }

            log::profiling!("Drawing frame {} at {:?}", frame, self.c_size);
            let remaining = timer.time_remaining();
            if remaining > 0 {
                thread::sleep(Duration::from_millis(remaining as u64));
            }
            timer.reset();
        }

        if let Some(surface) = self.c_surface.take() {
            surface
                .join()
                .map_err(|_| anyhow!("Surface thread panicked"))?;
        }
        Ok(())
    }

    /// The latest size reported by the surface
    pub fn current_size(&mut self) -> Size {
        self.c_size = self.c_resize.get_current();
        self.c_size
    }

    pub fn resize_count(&self) -> usize {
        self.c_resize_count
    }

    pub fn scene(&self) -> &SceneRegions {
        &self.c_scene
    }

    pub fn arenas(&self) -> &ArenaPools<Purpose, HostMemory> {
        &self.c_arenas
    }

    /// Remaining staging space
    pub fn staging_capacity(&self) -> usize {
        self.c_staging.capacity()
    }
}
