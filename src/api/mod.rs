//! HTTP API Handlers and Routes
//!
//! This module provides the REST API layer for Mioo, built on the Axum web framework.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//! - [`api::docs`](crate::api::docs) - OpenAPI document
//! - [`api::locks`](crate::api::locks) - Per-user request serialization
//!
//! # API Endpoints
//!
//! ## Turns (`/api/turns`)
//! - `POST /api/turns` - Run a user message through router, retriever and responder
//!
//! ## Conversations (`/api/conversations`)
//! - `GET /api/conversations/{user_id}/{agent}` - Get one stored conversation
//! - `POST /api/conversations/{user_id}/reset` - Summarize and collapse conversations
//! - `DELETE /api/conversations/{user_id}?agent=` - Delete conversations
//!
//! ## Registry and accounting
//! - `GET /api/agents` - List configured agents
//! - `GET /api/usage` - Per-model usage since startup
//!
//! ## Health (`/api/health`)
//! - `GET /api/health` - Health check endpoint
//!
//! # OpenAPI Documentation
//!
//! The OpenAPI document is served at `/api/openapi.json`.

/// OpenAPI document.
pub mod docs;
/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Per-user locks serializing conversation writes.
pub mod locks;
/// Router configuration and route definitions.
pub mod routes;
