//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep the request layer decoupled from storage details.
//! - Run the concurrent batch status transition.

pub mod item_processor;
pub mod item_service;
