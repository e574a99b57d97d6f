//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the data access contract consumed by services and the processor.
//! - Isolate SQLite query details from business orchestration.
//!
//! # Invariants
//! - Repository writes enforce item validation before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod item_repo;
