//! Core types for Tristore.
//!
//! Type-safe wrappers for the ids, prices and small enumerations that every
//! store adapter and engine service shares.

pub mod id;
pub mod kind;
pub mod price;

pub use id::*;
pub use kind::{ActionType, OwnerKind};
pub use price::{PriceError, PriceEuro};
