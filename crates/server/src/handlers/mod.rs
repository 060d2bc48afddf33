//! # API Route Handlers
//!
//! This module organizes all the Axum route handlers for the `engagement-server`.
//! The handlers are split into logical sub-modules based on their functionality.

pub mod auth;
pub mod export;
pub mod general;
pub mod ingest;
pub mod prediction;

// Re-export all handlers so the router can reach them under `handlers::`.
pub use auth::*;
pub use export::*;
pub use general::*;
pub use ingest::*;
pub use prediction::*;

// Shared items used by multiple handler modules.
use super::{errors::AppError, state::AppState};
