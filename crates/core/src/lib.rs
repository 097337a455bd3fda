//! Tristore Core - Shared types library.
//!
//! This crate provides the types used across all Tristore components:
//! - `engine` - Cross-store consistency engine (relational, graph, document)
//! - `cli` - Command-line tools for migrations and id sequences
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no
//! store clients. With the `postgres` feature the id newtypes also implement
//! the `sqlx` encode/decode traits.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, euro prices and owner/action kinds

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
