//! Growable circular slot pool
//!
//! This crate provides [`Pool`], a FIFO ring of reusable items that are
//! created up front by a [`SlotFactory`] and recycled in place. Producers
//! reserve the next free slot, fill it, and commit it; consumers take the
//! oldest committed slot, use it, and commit the take to hand the slot back.
//!
//! When every slot is in use, a reservation doubles the ring instead of
//! blocking. Existing slots keep their contents and their FIFO order across
//! growth.
//!
//! # Example
//!
//! ```
//! use pool::{Pool, SlotFactory};
//!
//! struct Counter(u32);
//!
//! impl SlotFactory for Counter {
//!     type Item = u32;
//!
//!     fn create(&mut self) -> Option<u32> {
//!         self.0 += 1;
//!         Some(self.0)
//!     }
//! }
//!
//! let mut pool = Pool::new(2, Counter(0)).unwrap();
//! *pool.reserve().unwrap() = 42;
//! pool.commit_reserve();
//!
//! assert_eq!(*pool.take().unwrap(), 42);
//! pool.commit_take();
//! assert!(pool.is_empty());
//! ```

pub mod error;
pub mod factory;
pub mod ring;

pub use error::{PoolError, Result};
pub use factory::SlotFactory;
pub use ring::Pool;
