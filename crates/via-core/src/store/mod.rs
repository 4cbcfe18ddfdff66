// ── Reactive data store ──
//
// Lock-free entity storage with push-based change notification.

pub(crate) mod collection;
mod entity_store;
mod refresh;

pub use entity_store::EntityStore;
