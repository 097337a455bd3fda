//! Tristore engine library.
//!
//! Keeps addresses, catalog entries, cart reservations and orders consistent
//! across a relational store, a graph store and a document store that share
//! no transactions.
//!
//! # Modules
//!
//! - [`store`] - Store adapter traits plus in-memory and `PostgreSQL` adapters
//! - [`services`] - The engine operations, grouped per component
//! - [`scan`] - Ordered reference probes run before deletes
//! - [`locks`] - Per-listing async locks
//! - [`config`] - Environment-based configuration

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod engine;
pub mod error;
pub mod locks;
pub mod models;
pub mod scan;
pub mod services;
pub mod store;

pub use config::{ConfigError, DatabaseConfig, EngineConfig};
pub use engine::Engine;
pub use error::{ConsistencyError, Entity, ErrorKind, Result};
pub use store::{StoreError, StoreKind, Stores};
