//! Slot construction and teardown

/// Creates and destroys the items held by a [`Pool`](crate::Pool)
///
/// The pool calls [`create`](SlotFactory::create) eagerly: once per slot when
/// it is built and once per new slot when it grows. Every item that was
/// created is handed back to [`destroy`](SlotFactory::destroy) exactly once,
/// either when a construction or growth attempt is rolled back or when the
/// pool is dropped.
pub trait SlotFactory {
    /// The pooled resource
    type Item;

    /// Create a fresh item, or `None` if it cannot be allocated
    fn create(&mut self) -> Option<Self::Item>;

    /// Release an item previously returned by [`create`](SlotFactory::create)
    fn destroy(&mut self, item: Self::Item) {
        drop(item);
    }
}
