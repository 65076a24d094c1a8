// A set of helper structs for common operations
//
// Austin Shafer - 2020
pub mod timing;
#[macro_use]
pub mod logging;
pub mod channel;
pub mod log;
pub mod monotonic;
pub mod region;


extern crate anyhow;
#[macro_use]
extern crate lazy_static;
pub use anyhow::{anyhow, Context, Error, Result};

pub use channel::{UpdateConsumer, UpdateProducer, ValueUpdateChannel};
pub use monotonic::{MonotonicArena, MonotonicError};
pub use region::{subspan_region, MemoryRegion};

/// Round `value` up to the next multiple of `alignment`.
///
/// An alignment of zero is treated as one. Returns None if the
/// result does not fit in a usize.
pub fn align_up(value: usize, alignment: usize) -> Option<usize> {
    let padding = align_padding(value, alignment);
    value.checked_add(padding)
}

/// The number of bytes needed to move `value` forward to a multiple
/// of `alignment`.
pub fn align_padding(value: usize, alignment: usize) -> usize {
    if alignment == 0 {
        return 0;
    }
    (alignment - value % alignment) % alignment
}
