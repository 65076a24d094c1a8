//! Latest-value mailbox between two threads
//!
//! A `ValueUpdateChannel` lets one producer publish the most recent
//! value of something (a window size, a camera position) and lets one
//! consumer pick it up whenever it gets around to it. Intermediate
//! values the consumer never looked at are simply lost. Neither side
//! ever blocks or allocates: every call is a fixed number of atomic
//! swaps.
//!
//! There are three slots. At any moment one belongs to the producer,
//! one to the consumer, and one is parked in the shared `current`
//! atomic. Publishing and fetching both swap the caller's slot with the
//! parked one, so the three indices always stay a permutation of
//! {0, 1, 2} and no slot is ever touched by both threads at once.
//!
//! ```
//! use utils::ValueUpdateChannel;
//!
//! let (mut tx, mut rx) = ValueUpdateChannel::<(u32, u32)>::new().split();
//! tx.update((640, 480));
//! assert_eq!(rx.get_update(), Some((640, 480)));
//! assert_eq!(rx.get_update(), None);
//! assert_eq!(rx.get_current(), (640, 480));
//! ```
// Austin Shafer - 2024
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const INDEX_MASK: usize = 0b11;
const SEEN_BIT: usize = 1 << 3;
const OLD_BIT: usize = 1 << 4;

/// What a slot index means to the consumer.
///
/// This is carried in the spare bits of the index stored in `current`
/// and in the consumer's own index. The producer's index never carries
/// any state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum SlotState {
    /// Published by the producer and not observed by the consumer yet
    Unseen,
    /// Observed, and holds the latest published value
    Current,
    /// Observed, but the value has since been replaced
    Stale,
}

/// The outcome of the consumer swapping its slot with `current`.
///
/// The consumer always hands over a slot it has already seen, so it
/// is either `Current` or `Stale` going in. What comes back decides
/// which of the two slots holds the freshest value:
///
/// | consumer had | got back | outcome      | consumer ends as |
/// |--------------|----------|--------------|------------------|
/// | any          | Unseen   | Fetched      | Current          |
/// | Stale        | Current  | Refreshed    | Current          |
/// | Current      | Stale    | Retained     | Stale            |
/// | Current      | Current  | Inconsistent | Stale            |
///
/// The last row happens right after a fetch: the slot we gave away in
/// exchange for the new value was still marked current, so it comes
/// back claiming to be current when it is not. The value we held
/// before the swap is the real one, and the slot we got must be
/// marked stale.
///
/// Stale for Stale cannot happen. Between producer updates the states
/// of the consumer slot and the parked slot strictly alternate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Handoff {
    Fetched,
    Refreshed,
    Retained,
    Inconsistent,
}

impl Handoff {
    pub(crate) fn classify(held: SlotState, received: SlotState) -> Handoff {
        debug_assert!(held != SlotState::Unseen);
        match (held, received) {
            (_, SlotState::Unseen) => Handoff::Fetched,
            (SlotState::Stale, SlotState::Current) => Handoff::Refreshed,
            (SlotState::Current, SlotState::Stale) => Handoff::Retained,
            (SlotState::Current, SlotState::Current) => Handoff::Inconsistent,
            (_, SlotState::Stale) => {
                debug_assert!(false, "consumer and parked slot both stale");
                Handoff::Retained
            }
            (SlotState::Unseen, SlotState::Current) => Handoff::Refreshed,
        }
    }

    /// The state the consumer's newly received slot ends up in
    pub(crate) fn consumer_state(&self) -> SlotState {
        match self {
            Handoff::Fetched | Handoff::Refreshed => SlotState::Current,
            Handoff::Retained | Handoff::Inconsistent => SlotState::Stale,
        }
    }

    /// Does the slot given away hold a fresher value than the one received
    pub(crate) fn keeps_previous(&self) -> bool {
        self.consumer_state() == SlotState::Stale
    }
}

/// A slot index plus the consumer's view of it, packed into one word
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Tag {
    pub(crate) index: usize,
    pub(crate) state: SlotState,
}

impl Tag {
    pub(crate) fn new(index: usize, state: SlotState) -> Self {
        Self {
            index: index,
            state: state,
        }
    }

    pub(crate) fn pack(&self) -> usize {
        let bits = match self.state {
            SlotState::Unseen => 0,
            SlotState::Current => SEEN_BIT,
            SlotState::Stale => SEEN_BIT | OLD_BIT,
        };
        (self.index & INDEX_MASK) | bits
    }

    pub(crate) fn unpack(raw: usize) -> Self {
        let state = match (raw & SEEN_BIT != 0, raw & OLD_BIT != 0) {
            (false, _) => SlotState::Unseen,
            (true, false) => SlotState::Current,
            (true, true) => SlotState::Stale,
        };
        Self::new(raw & INDEX_MASK, state)
    }
}

/// One value, on its own cache line so the producer writing its slot
/// does not bounce the line the consumer is reading.
#[repr(align(64))]
struct Slot<T>(UnsafeCell<T>);

struct Shared<T> {
    s_slots: [Slot<T>; 3],
    s_current: AtomicUsize,
}

// The slots are only ever accessed by whoever currently owns their
// index, and ownership moves through s_current with AcqRel swaps.
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Shared<T> {
    /// Safety: the caller must own `index`
    unsafe fn slot(&self, index: usize) -> &T {
        &*self.s_slots[index].0.get()
    }

    /// Safety: the caller must own `index`
    unsafe fn slot_mut(&self, index: usize) -> &mut T {
        &mut *self.s_slots[index].0.get()
    }
}

/// The writing half of a `ValueUpdateChannel`
pub struct UpdateProducer<T> {
    up_shared: Arc<Shared<T>>,
    up_index: usize,
}

/// The reading half of a `ValueUpdateChannel`
pub struct UpdateConsumer<T> {
    uc_shared: Arc<Shared<T>>,
    uc_slot: Tag,
    /// The last value handed out by this consumer. Our slot may be
    /// stale, so this is what new values are compared against.
    uc_observed: T,
}

/// A single producer, single consumer channel that only keeps the
/// latest value.
///
/// Use it directly when both roles live on the same thread, or
/// `split` it to move the producer somewhere else.
pub struct ValueUpdateChannel<T> {
    vc_producer: UpdateProducer<T>,
    vc_consumer: UpdateConsumer<T>,
}

impl<T: Default> ValueUpdateChannel<T> {
    /// Create a channel holding `T::default()` with no pending update
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            s_slots: [
                Slot(UnsafeCell::new(T::default())),
                Slot(UnsafeCell::new(T::default())),
                Slot(UnsafeCell::new(T::default())),
            ],
            s_current: AtomicUsize::new(Tag::new(0, SlotState::Unseen).pack()),
        });

        Self {
            vc_producer: UpdateProducer {
                up_shared: shared.clone(),
                up_index: 1,
            },
            vc_consumer: UpdateConsumer {
                uc_shared: shared,
                uc_slot: Tag::new(2, SlotState::Current),
                uc_observed: T::default(),
            },
        }
    }

    /// Create a channel that already has `value` published
    pub fn with_value(value: T) -> Self {
        let mut ret = Self::new();
        ret.vc_producer.update(value);
        ret
    }
}

impl<T: Default> Default for ValueUpdateChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ValueUpdateChannel<T> {
    /// Break the channel into its producer and consumer halves
    pub fn split(self) -> (UpdateProducer<T>, UpdateConsumer<T>) {
        (self.vc_producer, self.vc_consumer)
    }

    pub fn update(&mut self, value: T) {
        self.vc_producer.update(value)
    }
}

impl<T: Clone + PartialEq> ValueUpdateChannel<T> {
    pub fn get_update(&mut self) -> Option<T> {
        self.vc_consumer.get_update()
    }

    pub fn get_current(&mut self) -> T {
        self.vc_consumer.get_current()
    }
}

impl<T> UpdateProducer<T> {
    /// Publish `value` as the latest value
    ///
    /// The value is written into the producer's own slot and that slot
    /// is swapped into `current` as unseen. Whatever was parked there
    /// becomes the producer's next slot.
    pub fn update(&mut self, value: T) {
        // Safety: up_index is never parked in s_current or held by the consumer
        unsafe {
            *self.up_shared.slot_mut(self.up_index) = value;
        }
        let published = Tag::new(self.up_index, SlotState::Unseen).pack();
        let parked = self
            .up_shared
            .s_current
            .swap(published, Ordering::AcqRel);
        self.up_index = Tag::unpack(parked).index;
    }
}

impl<T> UpdateConsumer<T> {
    fn value(&self) -> &T {
        // Safety: the consumer's slot is never parked or held by the producer
        unsafe { self.uc_shared.slot(self.uc_slot.index) }
    }

    /// Swap our slot with the parked one and work out what we got
    fn handoff(&mut self) -> Handoff {
        let parked = self
            .uc_shared
            .s_current
            .swap(self.uc_slot.pack(), Ordering::AcqRel);
        let received = Tag::unpack(parked);

        let handoff = Handoff::classify(self.uc_slot.state, received.state);
        self.uc_slot = Tag::new(received.index, handoff.consumer_state());
        handoff
    }
}

impl<T: Clone + PartialEq> UpdateConsumer<T> {
    /// Get the latest value if one was published since the last fetch
    /// and it differs from the last value we observed.
    pub fn get_update(&mut self) -> Option<T> {
        match self.handoff() {
            Handoff::Fetched if *self.value() != self.uc_observed => {
                self.uc_observed = self.value().clone();
                Some(self.uc_observed.clone())
            }
            _ => None,
        }
    }

    /// Get the latest published value, whether or not we saw it already
    pub fn get_current(&mut self) -> T {
        if !self.handoff().keeps_previous() {
            self.uc_observed = self.value().clone();
        }
        self.uc_observed.clone()
    }
}
