//! Item domain model.
//!
//! # Responsibility
//! - Define the persisted item record and the client-supplied draft shape.
//! - Own the email validation rule shared by every write path.
//!
//! # Invariants
//! - `id` is assigned by the store and never reused for another item.
//! - `email` matches `local-part@domain.tld` before it reaches storage.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned item identifier.
pub type ItemId = i64;

/// Status given to items that have not been processed yet.
pub const STATUS_NEW: &str = "NEW";
/// Status written by the batch processor.
pub const STATUS_PROCESSED: &str = "PROCESSED";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s.]+(\.[^@\s.]+)+$").expect("valid email regex")
});

/// Validation failures for item writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    /// Email does not match `local-part@domain.tld`.
    InvalidEmail(String),
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEmail(value) => write!(f, "invalid email address: `{value}`"),
        }
    }
}

impl Error for ItemValidationError {}

/// Client-supplied item fields, without identity.
///
/// Used for both create and full-replacement update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Free-form; defaults to `NEW` when omitted.
    #[serde(default = "default_status")]
    pub status: String,
    pub email: String,
}

impl ItemDraft {
    /// Creates a draft with status `NEW`.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            status: default_status(),
            email: email.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ItemValidationError> {
        validate_email(&self.email)
    }

    /// Binds this draft to an existing identity.
    pub fn into_item(self, id: ItemId) -> Item {
        Item {
            id,
            name: self.name,
            description: self.description,
            status: self.status,
            email: self.email,
        }
    }
}

/// Persisted item record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub description: String,
    pub status: String,
    pub email: String,
}

impl Item {
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        validate_email(&self.email)
    }

    /// Transitions this item to `PROCESSED`.
    pub fn mark_processed(&mut self) {
        self.status = STATUS_PROCESSED.to_string();
    }
}

/// Checks an address against the basic `local-part@domain.tld` shape.
pub fn validate_email(value: &str) -> Result<(), ItemValidationError> {
    if EMAIL_RE.is_match(value) {
        Ok(())
    } else {
        Err(ItemValidationError::InvalidEmail(value.to_string()))
    }
}

fn default_status() -> String {
    STATUS_NEW.to_string()
}
