//! Domain model for persisted items.
//!
//! # Invariants
//! - Every item is identified by a store-assigned `ItemId`.
//! - Items are hard-deleted; there is no tombstone state.

pub mod item;
