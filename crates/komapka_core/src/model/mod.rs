//! Domain model for map overlays.
//!
//! # Responsibility
//! - Define point-of-interest records and the geographic primitives used to
//!   place them.
//!
//! # Invariants
//! - Records are identified by kind + id.
//! - Records are immutable once loaded.

pub mod entity;
pub mod geo;
