//! Search entry points.
//!
//! # Responsibility
//! - Filter the in-memory dataset by text, bounds and facets.
//! - Cache results, produce suggestions and resolve place names.

pub mod cache;
pub mod filter;
pub mod geocode;
pub mod normalize;
pub mod result;
pub mod suggest;
