//! # Castle
//!
//! Headless driver for the castle renderer's memory setup. It spins up
//! a surface thread that reports window sizes through a
//! `ValueUpdateChannel`, uploads the scene into arena pools, and then
//! runs the frame loop, picking up resizes as they arrive.
//!
//! * `vlk` - device memory: purposes and coalescing arena pools.
//! * `utils` - logging, timing, memory regions and the value update
//!   channel.
//!
//! Set `CASTLE_LOG` to `critical`, `error`, `debug`, `info` or
//! `profiling` to pick how chatty this is.

// Austin Shafer - 2024
extern crate utils;
extern crate vlk;

mod castle;
use castle::{Castle, CastleCreateInfo};
use utils::log;

use std::time::SystemTime;

fn main() {
    let info = CastleCreateInfo::builder().build();
    let mut castle = match Castle::spin(info) {
        Ok(castle) => castle,
        Err(e) => {
            log::critical!("Could not start castle: {:?}", e);
            std::process::exit(1);
        }
    };

    println!("Begin render loop...");
    let start = SystemTime::now();
    if let Err(e) = castle.run() {
        log::critical!("Render loop failed: {:?}", e);
        std::process::exit(1);
    }
    let end = SystemTime::now();

    let size = castle.current_size();
    log::debug!(
        "Scene at {:?} in {} pools, final size {:?} after {} resizes, {} staging bytes free",
        castle.scene(),
        castle.arenas().pool_count(),
        size,
        castle.resize_count(),
        castle.staging_capacity()
    );

    println!(
        "uptime: {}",
        end.duration_since(start)
            .map(|d| d.as_secs_f32())
            .unwrap_or(0.0)
    );
}
