//! Router Module Index
//!
//! `registrar` owns the prefixed route tables and their handler chains;
//! the other modules declare the concrete routes.

/// Route tables, handler-chain validation and materialization into axum.
pub mod registrar;

/// Routes accessible to all clients (health probe).
pub mod public;

/// Image upload routes, restricted to admins.
pub mod upload;
