//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer, providing
//! concrete implementations for data persistence and mail transport.
//!
//! # Modules
//!
//! - [`mail`] - SMTP and dry-run transmitters
//! - [`persistence`] - PostgreSQL repository implementations

pub mod mail;
pub mod persistence;
