//! Core domain logic for itemflow.
//! This crate owns the item model, its SQLite store and the batch processor.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::item::{
    validate_email, Item, ItemDraft, ItemId, ItemValidationError, STATUS_NEW, STATUS_PROCESSED,
};
pub use repo::item_repo::{ItemRepository, RepoError, RepoResult, SqliteItemRepository};
pub use service::item_processor::{ItemProcessor, ProcessError, ProcessorConfig};
pub use service::item_service::ItemService;

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
