// What memory gets used for
//
// Austin Shafer - 2024
use serde::{Deserialize, Serialize};

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// A closed set of things memory can be reserved for.
///
/// `ALL` lists every purpose in enumeration order, and `index` must
/// return the position of a purpose within `ALL`. This lets per-purpose
/// data live in a flat table.
pub trait MemoryPurpose: Copy + Eq + fmt::Debug + 'static {
    const ALL: &'static [Self];

    fn index(self) -> usize;
}

/// Buffer backed purposes
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferPurpose {
    Vbo,
    Ibo,
}

/// Image backed purposes
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImagePurpose {
    Texture,
}

/// Every purpose the renderer reserves memory for
///
/// Buffer purposes come first, followed by image purposes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Purpose {
    Vbo,
    Ibo,
    Texture,
}

impl Purpose {
    pub fn is_buffer(&self) -> bool {
        match self {
            Purpose::Vbo | Purpose::Ibo => true,
            Purpose::Texture => false,
        }
    }

    pub fn is_image(&self) -> bool {
        !self.is_buffer()
    }
}

impl MemoryPurpose for Purpose {
    const ALL: &'static [Purpose] = &[Purpose::Vbo, Purpose::Ibo, Purpose::Texture];

    fn index(self) -> usize {
        self as usize
    }
}

impl From<BufferPurpose> for Purpose {
    fn from(p: BufferPurpose) -> Self {
        match p {
            BufferPurpose::Vbo => Purpose::Vbo,
            BufferPurpose::Ibo => Purpose::Ibo,
        }
    }
}

impl From<ImagePurpose> for Purpose {
    fn from(p: ImagePurpose) -> Self {
        match p {
            ImagePurpose::Texture => Purpose::Texture,
        }
    }
}

/// One value per purpose
///
/// A fixed size table indexed by purpose. It always holds exactly one
/// entry for every member of `P::ALL`.
#[derive(Clone, PartialEq, Eq)]
pub struct PurposeData<P, V> {
    pd_values: Vec<V>,
    pd_purpose: PhantomData<P>,
}

impl<P: MemoryPurpose, V> PurposeData<P, V> {
    /// Fill the table by calling `f` once for each purpose, in
    /// enumeration order.
    pub fn from_fn<F: FnMut(P) -> V>(mut f: F) -> Self {
        Self {
            pd_values: P::ALL
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    debug_assert_eq!(p.index(), i, "{:?} is out of order", p);
                    f(*p)
                })
                .collect(),
            pd_purpose: PhantomData,
        }
    }

    /// Like `from_fn`, but stops at the first error
    pub fn try_from_fn<E, F: FnMut(P) -> Result<V, E>>(mut f: F) -> Result<Self, E> {
        let mut values = Vec::with_capacity(P::ALL.len());
        for p in P::ALL.iter() {
            values.push(f(*p)?);
        }

        Ok(Self {
            pd_values: values,
            pd_purpose: PhantomData,
        })
    }

    pub fn get(&self, purpose: P) -> &V {
        &self.pd_values[purpose.index()]
    }

    pub fn get_mut(&mut self, purpose: P) -> &mut V {
        &mut self.pd_values[purpose.index()]
    }

    /// Walk every (purpose, value) pair in enumeration order
    pub fn iter(&self) -> impl Iterator<Item = (P, &V)> {
        P::ALL.iter().copied().zip(self.pd_values.iter())
    }

    pub fn values(&self) -> &[V] {
        self.pd_values.as_slice()
    }
}

impl<P: MemoryPurpose, V> Index<P> for PurposeData<P, V> {
    type Output = V;

    fn index(&self, purpose: P) -> &V {
        self.get(purpose)
    }
}

impl<P: MemoryPurpose, V> IndexMut<P> for PurposeData<P, V> {
    fn index_mut(&mut self, purpose: P) -> &mut V {
        self.get_mut(purpose)
    }
}

impl<P: MemoryPurpose, V: fmt::Debug> fmt::Debug for PurposeData<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
