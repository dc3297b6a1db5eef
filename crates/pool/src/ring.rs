//! Ring storage and cursor arithmetic
//!
//! Slots live in a single `Vec` used as a circular array. `put_index` points
//! at the next slot to hand to a producer, `take_index` at the oldest
//! committed slot, and `count` is the number of committed slots not yet
//! taken. The capacity is always `items.len()`.
//!
//! ```text
//!            take_index        put_index
//!                 │                 │
//!   ┌─────┬─────┬─▼───┬─────┬─────┬─▼───┬─────┐
//!   │ old │ old │  1  │  2  │  3  │ free│ old │
//!   └─────┴─────┴─────┴─────┴─────┴─────┴─────┘
//!                 └── count = 3 ──┘
//! ```

use crate::error::{PoolError, Result};
use crate::factory::SlotFactory;
use tracing::{trace, warn};

/// Growable FIFO ring of reusable slots
///
/// Reservations and takes never block. A reservation on a full ring doubles
/// its capacity; a take on an empty ring fails with
/// [`PoolError::EmptyQueue`].
///
/// Each operation comes in two steps. [`reserve`](Pool::reserve) and
/// [`take`](Pool::take) only hand out a slot; the cursors move when the
/// matching [`commit_reserve`](Pool::commit_reserve) or
/// [`commit_take`](Pool::commit_take) is called. Until it is committed, a
/// reservation is idempotent: calling `reserve` again returns the same slot.
/// The returned `&mut` borrow keeps the pool locked for the lifetime of the
/// slot reference, so at most one reservation or take can be outstanding.
pub struct Pool<F: SlotFactory> {
    items: Vec<F::Item>,
    put_index: usize,
    take_index: usize,
    count: usize,
    factory: F,
}

impl<F: SlotFactory> Pool<F> {
    /// Create a pool and eagerly populate `capacity` slots
    ///
    /// If the storage or any slot cannot be allocated, the slots created so
    /// far are destroyed and [`PoolError::Allocation`] is returned. A zero
    /// capacity is rejected the same way, since doubling it would never grow.
    pub fn new(capacity: usize, mut factory: F) -> Result<Self> {
        let mut items = Vec::new();
        if capacity == 0 || items.try_reserve_exact(capacity).is_err() {
            return Err(PoolError::Allocation {
                requested: capacity,
                created: 0,
            });
        }

        for _ in 0..capacity {
            match factory.create() {
                Some(item) => items.push(item),
                None => {
                    let created = items.len();
                    warn!(
                        "Slot creation failed after {} of {} slots, releasing them",
                        created, capacity
                    );
                    for item in items.drain(..) {
                        factory.destroy(item);
                    }
                    return Err(PoolError::Allocation {
                        requested: capacity,
                        created,
                    });
                }
            }
        }

        Ok(Self {
            items,
            put_index: 0,
            take_index: 0,
            count: 0,
            factory,
        })
    }

    /// Get the slot at the put cursor, growing the ring if it is full
    ///
    /// The cursor does not move; call [`commit_reserve`](Pool::commit_reserve)
    /// once the slot is actually in use. Growth failure leaves the pool as it
    /// was and returns [`PoolError::Allocation`].
    pub fn reserve(&mut self) -> Result<&mut F::Item> {
        if self.count == self.items.len() {
            self.grow()?;
        }
        Ok(&mut self.items[self.put_index])
    }

    /// Commit the slot returned by the last [`reserve`](Pool::reserve)
    pub fn commit_reserve(&mut self) {
        debug_assert!(
            self.count < self.items.len(),
            "commit_reserve() without a reserved slot"
        );
        self.put_index += 1;
        if self.put_index == self.items.len() {
            self.put_index = 0;
        }
        self.count += 1;
        trace!(
            "Committed reservation: put_index={}, count={}",
            self.put_index, self.count
        );
    }

    /// Get the oldest committed slot
    ///
    /// Fails with [`PoolError::EmptyQueue`] without touching any state if
    /// nothing has been committed.
    pub fn take(&mut self) -> Result<&mut F::Item> {
        if self.count == 0 {
            return Err(PoolError::EmptyQueue);
        }
        Ok(&mut self.items[self.take_index])
    }

    /// Release the slot returned by the last [`take`](Pool::take)
    ///
    /// The released slot is returned so its contents can still be read. It is
    /// not overwritten until a later reservation reaches it.
    pub fn commit_take(&mut self) -> &F::Item {
        debug_assert!(self.count > 0, "commit_take() on an empty pool");
        let released = self.take_index;
        self.take_index += 1;
        if self.take_index == self.items.len() {
            self.take_index = 0;
        }
        self.count -= 1;
        trace!(
            "Committed take: take_index={}, count={}",
            self.take_index, self.count
        );
        &self.items[released]
    }

    /// Number of committed slots not yet taken
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of slots currently allocated
    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    /// Double the ring, keeping the committed slots in FIFO order
    ///
    /// The new slots are created before anything is moved, so a failed
    /// growth destroys only what it created and leaves the ring untouched.
    fn grow(&mut self) -> Result<()> {
        let old_capacity = self.items.len();
        let new_capacity = old_capacity.checked_mul(2).ok_or(PoolError::Allocation {
            requested: usize::MAX,
            created: 0,
        })?;
        let alloc_failed = |created| PoolError::Allocation {
            requested: new_capacity - old_capacity,
            created,
        };

        let mut grown = Vec::new();
        grown
            .try_reserve_exact(new_capacity)
            .map_err(|_| alloc_failed(0))?;
        let mut fresh = Vec::new();
        fresh
            .try_reserve_exact(old_capacity)
            .map_err(|_| alloc_failed(0))?;

        for _ in old_capacity..new_capacity {
            match self.factory.create() {
                Some(item) => fresh.push(item),
                None => {
                    let created = fresh.len();
                    warn!(
                        "Pool growth from {} to {} slots failed, keeping current ring",
                        old_capacity, new_capacity
                    );
                    for item in fresh.drain(..) {
                        self.factory.destroy(item);
                    }
                    return Err(alloc_failed(created));
                }
            }
        }

        // Oldest arc first: [take_index, capacity), then the wrapped [0, take_index).
        grown.extend(self.items.drain(self.take_index..));
        grown.extend(self.items.drain(..));
        grown.append(&mut fresh);

        self.items = grown;
        self.take_index = 0;
        self.put_index = old_capacity;
        trace!(
            "Grew pool from {} to {} slots",
            old_capacity, new_capacity
        );
        Ok(())
    }
}

impl<F: SlotFactory> Drop for Pool<F> {
    fn drop(&mut self) {
        for item in self.items.drain(..) {
            self.factory.destroy(item);
        }
    }
}

impl<F: SlotFactory> std::fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.items.len())
            .field("put_index", &self.put_index)
            .field("take_index", &self.take_index)
            .field("count", &self.count)
            .finish()
    }
}
