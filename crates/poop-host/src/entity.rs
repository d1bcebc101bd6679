//! Handles to props living in the host, and the table that resolves them.
//!
//! The host owns the real objects. The core only ever holds an
//! [`EntityHandle`]: a slot number plus the generation of that slot at the
//! time the prop was spawned. When a prop is destroyed its slot is recycled
//! under a new generation, so a handle kept by a timer or the rainbow set goes
//! stale instead of pointing at whatever prop spawns next. Timer ids reuse the
//! same scheme.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

// ---------------------------------------------------------------------------
// EntityHandle
// ---------------------------------------------------------------------------

const INDEX_BITS: u32 = 32;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;

/// Opaque reference to a host prop, valid until the prop is destroyed.
///
/// Ordered by raw value so tracked sets iterate deterministically.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityHandle(u64);

impl EntityHandle {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << INDEX_BITS) | index as u64)
    }

    /// Host slot the prop occupies.
    pub const fn index(self) -> u32 {
        (self.0 & INDEX_MASK) as u32
    }

    /// How many props occupied the slot before this one.
    pub const fn generation(self) -> u32 {
        (self.0 >> INDEX_BITS) as u32
    }

    /// Packed form, as stored in a [`TimerId`](crate::TimerId).
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prop#{}v{}", self.index(), self.generation())
    }
}

/// `42v7` is slot 42 on its eighth occupant.
impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// HandleTable
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Maps generational handles to live records of type `T`.
///
/// Free slots are recycled in FIFO order so that generations are spread over
/// all slots instead of piling up on one hot index.
#[derive(Debug)]
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free: VecDeque<u32>,
    len: usize,
}

impl<T> HandleTable<T> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: VecDeque::new(),
            len: 0,
        }
    }

    /// Store `value` and return a fresh handle to it.
    pub fn insert(&mut self, value: T) -> EntityHandle {
        self.len += 1;
        if let Some(index) = self.free.pop_front() {
            // Generation was already bumped when the slot was vacated.
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            EntityHandle::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            EntityHandle::new(index, 0)
        }
    }

    /// Remove the record behind `handle`, invalidating the handle.
    ///
    /// Returns `None` if the handle was stale or never issued.
    pub fn remove(&mut self, handle: EntityHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push_back(handle.index());
        self.len -= 1;
        Some(value)
    }

    /// Returns `true` if `handle` refers to a live record.
    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Resolve a handle to its record.
    pub fn get(&self, handle: EntityHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    /// Resolve a handle to its record, mutably.
    pub fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no records are live.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live `(handle, record)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityHandle, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value
                .as_ref()
                .map(|v| (EntityHandle::new(i as u32, slot.generation), v))
        })
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
