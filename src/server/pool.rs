//! Fixed-capacity pool of connection slots.
//!
//! All slots are allocated up front; acquiring and releasing only flips an
//! in-use flag. Each release bumps the slot's generation so that an id
//! handed out before the release no longer resolves.

use mio::Token;

const INDEX_BITS: u32 = usize::BITS / 2;
const INDEX_MASK: usize = (1 << INDEX_BITS) - 1;

/// Handle to an acquired slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotId {
    index: usize,
    generation: usize,
}

impl SlotId {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Packs the id into a poll token.
    pub fn token(&self) -> Token {
        Token((self.generation << INDEX_BITS) | self.index)
    }

    pub fn from_token(token: Token) -> Self {
        Self {
            index: token.0 & INDEX_MASK,
            generation: token.0 >> INDEX_BITS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool could not be allocated.
    Alloc(usize),
    /// Release of a slot that is not in use.
    NotInUse(usize),
    /// Release through an id from an earlier occupancy of the slot.
    Stale(SlotId),
    OutOfRange(usize),
}

impl std::fmt::Display for PoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolError::Alloc(n) => write!(f, "failed to allocate {n} connection slots"),
            PoolError::NotInUse(i) => write!(f, "slot {i} released while not in use"),
            PoolError::Stale(id) => write!(
                f,
                "slot {} released through stale generation {}",
                id.index, id.generation
            ),
            PoolError::OutOfRange(i) => write!(f, "slot {i} is outside the pool"),
        }
    }
}

impl std::error::Error for PoolError {}

#[derive(Debug)]
struct Slot<T> {
    value: T,
    in_use: bool,
    generation: usize,
}

#[derive(Debug)]
pub struct SlotPool<T> {
    slots: Vec<Slot<T>>,
    in_use: usize,
}

impl<T> SlotPool<T> {
    /// Allocates `capacity` slots, each initialized by `init`.
    pub fn new(capacity: usize, mut init: impl FnMut() -> T) -> Result<Self, PoolError> {
        if capacity > INDEX_MASK {
            return Err(PoolError::Alloc(capacity));
        }

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| PoolError::Alloc(capacity))?;
        for _ in 0..capacity {
            slots.push(Slot {
                value: init(),
                in_use: false,
                generation: 0,
            });
        }

        Ok(Self { slots, in_use: 0 })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently acquired.
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    pub fn is_full(&self) -> bool {
        self.in_use == self.slots.len()
    }

    /// Takes the first free slot, or `None` if every slot is occupied.
    pub fn acquire(&mut self) -> Option<SlotId> {
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| !slot.in_use)?;
        slot.in_use = true;
        self.in_use += 1;
        Some(SlotId {
            index,
            generation: slot.generation,
        })
    }

    /// Returns a slot to the pool.
    ///
    /// Releasing a free slot, or releasing through an outdated id, is an
    /// error: it means two owners believed they held the same slot.
    pub fn release(&mut self, id: SlotId) -> Result<(), PoolError> {
        let slot = self
            .slots
            .get_mut(id.index)
            .ok_or(PoolError::OutOfRange(id.index))?;
        if !slot.in_use {
            return Err(PoolError::NotInUse(id.index));
        }
        if slot.generation != id.generation {
            return Err(PoolError::Stale(id));
        }
        slot.in_use = false;
        slot.generation = (slot.generation + 1) & INDEX_MASK;
        self.in_use -= 1;
        Ok(())
    }

    /// Looks up an acquired slot; `None` if the id is free or outdated.
    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.in_use && slot.generation == id.generation)
            .map(|slot| &slot.value)
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.in_use && slot.generation == id.generation)
            .map(|slot| &mut slot.value)
    }

    /// Ids of every acquired slot.
    pub fn occupied(&self) -> Vec<SlotId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.in_use)
            .map(|(index, slot)| SlotId {
                index,
                generation: slot.generation,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_keeps_generation() {
        let id = SlotId {
            index: 17,
            generation: 3,
        };
        assert_eq!(SlotId::from_token(id.token()), id);
    }

    #[test]
    fn generation_wraps_within_token_bits() {
        let mut pool = SlotPool::new(1, || ()).unwrap();
        pool.slots[0].generation = INDEX_MASK;
        let id = pool.acquire().unwrap();
        pool.release(id).unwrap();
        assert_eq!(pool.acquire().unwrap().generation(), 0);
    }
}
