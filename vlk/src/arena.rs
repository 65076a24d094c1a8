// Coalescing arena allocator for device memory
//
// Austin Shafer - 2024
use crate::purpose::{MemoryPurpose, PurposeData};
use ash::vk;
use thiserror::Error;
use utils::log;
use utils::{align_padding, MemoryRegion};

use std::fmt;

/// What a purpose needs from the memory backing it
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemoryRequirement<C> {
    /// Required byte alignment of every region, a power of two
    pub alignment: usize,
    /// Purposes may share one allocation iff their classes are equal
    pub type_class: C,
}

impl From<vk::MemoryRequirements> for MemoryRequirement<u32> {
    /// The memory type bits serve as the compatibility class
    fn from(req: vk::MemoryRequirements) -> Self {
        Self {
            alignment: req.alignment as usize,
            type_class: req.memory_type_bits,
        }
    }
}

/// Bookkeeping for one purpose's slice of a pool
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ArenaInfo {
    /// Bytes claimed so far, including alignment padding
    pub used: usize,
    /// The most this purpose may ever claim
    pub capacity: usize,
    pub alignment: usize,
    /// Which pool this purpose allocates out of
    pub pool_index: usize,
}

impl ArenaInfo {
    pub fn remaining(&self) -> usize {
        self.capacity - self.used
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    #[error("{purpose} arena exhausted: {requested} bytes plus {padding} bytes of padding requested, {remaining} bytes left")]
    OutOfMemory {
        purpose: String,
        requested: usize,
        padding: usize,
        remaining: usize,
    },
}

/// A set of bump allocated arenas carved out of as few device
/// allocations as possible.
///
/// Every purpose gets a fixed capacity up front. Purposes whose memory
/// requirements have the same type class are packed into a single
/// pool, sized to the sum of their capacities. Claims only ever grow
/// the used count of a purpose; there is no way to give memory back
/// short of dropping the whole thing.
///
/// Claims from purposes sharing a pool are placed after everything
/// claimed so far from that pool, so regions never overlap no matter
/// how claims from different purposes interleave.
pub struct ArenaPools<P: MemoryPurpose, M> {
    ap_infos: PurposeData<P, ArenaInfo>,
    /// One allocation per distinct type class
    ap_pools: Vec<M>,
}

impl<P: MemoryPurpose, M> ArenaPools<P, M> {
    /// Create the pools
    ///
    /// `query_req` is asked for the requirements of every purpose.
    /// Purposes are then sorted by type class, keeping enumeration
    /// order for equal classes, and each run of equal classes gets one
    /// call to `alloc` with the total capacity of that run. Errors from
    /// `alloc` are returned as is.
    pub fn new<C, E, Q, A>(
        capacities: &PurposeData<P, usize>,
        mut query_req: Q,
        mut alloc: A,
    ) -> Result<Self, E>
    where
        C: Ord + Copy + fmt::Debug,
        Q: FnMut(P) -> MemoryRequirement<C>,
        A: FnMut(C, usize) -> Result<M, E>,
    {
        let mut type2purpose: Vec<(MemoryRequirement<C>, P, usize)> = P::ALL
            .iter()
            .map(|p| (query_req(*p), *p, capacities[*p]))
            .collect();
        // sort_by_key is stable, which decides the order within a pool
        type2purpose.sort_by_key(|(req, _, _)| req.type_class);

        let mut infos: PurposeData<P, ArenaInfo> = PurposeData::from_fn(|_| ArenaInfo::default());
        let mut pools = Vec::new();
        let mut last_class: Option<C> = None;
        let mut total_capacity: usize = 0;

        for (req, purpose, capacity) in type2purpose {
            debug_assert!(
                req.alignment == 0 || req.alignment.is_power_of_two(),
                "{:?} has alignment {}",
                purpose,
                req.alignment
            );

            if let Some(prev) = last_class.replace(req.type_class) {
                if prev != req.type_class {
                    pools.push(Self::alloc_pool(&mut alloc, prev, total_capacity)?);
                    total_capacity = 0;
                }
            }

            total_capacity = total_capacity.saturating_add(capacity);
            infos[purpose] = ArenaInfo {
                used: 0,
                capacity: capacity,
                alignment: req.alignment,
                pool_index: pools.len(),
            };
        }

        if let Some(prev) = last_class {
            pools.push(Self::alloc_pool(&mut alloc, prev, total_capacity)?);
        }

        Ok(Self {
            ap_infos: infos,
            ap_pools: pools,
        })
    }

    fn alloc_pool<C, E, A>(alloc: &mut A, class: C, size: usize) -> Result<M, E>
    where
        C: fmt::Debug,
        A: FnMut(C, usize) -> Result<M, E>,
    {
        log::debug!("Allocating {} byte pool for memory class {:?}", size, class);
        alloc(class, size)
    }

    /// Claim `size` bytes for `purpose`
    ///
    /// Returns the pool the bytes live in and where in it they are. The
    /// region is aligned to the purpose's required alignment. Fails if
    /// the purpose's capacity can't hold the bytes plus the padding
    /// needed to align them, even if the pool itself has room left.
    pub fn lock_memory_for<Q: Into<P>>(
        &mut self,
        purpose: Q,
        size: usize,
    ) -> Result<(&M, MemoryRegion), ArenaError> {
        self.lock_memory_for_aligned(purpose, size, 0)
    }

    /// Same as `lock_memory_for`, but the region is aligned to at least
    /// `alignment` as well.
    ///
    /// This is for resources whose own requirements are stricter than
    /// the ones reported for the purpose.
    pub fn lock_memory_for_aligned<Q: Into<P>>(
        &mut self,
        purpose: Q,
        size: usize,
        alignment: usize,
    ) -> Result<(&M, MemoryRegion), ArenaError> {
        let purpose = purpose.into();
        let arena = self.ap_infos[purpose];

        // Everything claimed from this pool so far, by any purpose
        let offset: usize = self
            .ap_infos
            .values()
            .iter()
            .filter(|info| info.pool_index == arena.pool_index)
            .map(|info| info.used)
            .sum();
        let padding = align_padding(offset, alignment.max(arena.alignment));

        let claim = match size.checked_add(padding) {
            Some(claim) if claim <= arena.remaining() => claim,
            _ => {
                log::error!(
                    "{:?} arena exhausted: {} + {} bytes requested, {} of {} used",
                    purpose,
                    size,
                    padding,
                    arena.used,
                    arena.capacity
                );
                return Err(ArenaError::OutOfMemory {
                    purpose: format!("{:?}", purpose),
                    requested: size,
                    padding: padding,
                    remaining: arena.remaining(),
                });
            }
        };

        self.ap_infos[purpose].used += claim;
        Ok((
            &self.ap_pools[arena.pool_index],
            MemoryRegion::new(offset + padding, size),
        ))
    }

    /// The pool backing `purpose`
    pub fn memory_for<Q: Into<P>>(&self, purpose: Q) -> &M {
        &self.ap_pools[self.ap_infos[purpose.into()].pool_index]
    }

    /// The pool backing each purpose
    ///
    /// Purposes that were coalesced refer to the same pool.
    pub fn memory_handles(&self) -> PurposeData<P, &M> {
        PurposeData::from_fn(|p| self.memory_for(p))
    }

    pub fn info<Q: Into<P>>(&self, purpose: Q) -> &ArenaInfo {
        &self.ap_infos[purpose.into()]
    }

    /// The number of allocations made for the pools
    pub fn pool_count(&self) -> usize {
        self.ap_pools.len()
    }

    pub fn pools(&self) -> &[M] {
        self.ap_pools.as_slice()
    }

    /// Hand the pools over, e.g. to free them
    pub fn into_pools(self) -> Vec<M> {
        self.ap_pools
    }
}
