//! API request handlers.
//!
//! This module contains all HTTP request handlers organized by functionality.

/// Agent listing handlers.
pub mod agents;
/// Conversation inspection, reset and deletion handlers.
pub mod conversations;
/// Liveness handler.
pub mod health;
/// Turn processing handler.
pub mod turns;
/// Usage accounting handler.
pub mod usage;
