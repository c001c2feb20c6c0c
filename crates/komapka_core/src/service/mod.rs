//! Use-case services.
//!
//! # Responsibility
//! - Orchestrate dataset, search and map components into use-case APIs.
//! - Keep UI collaborators behind traits ([`map_session::ResultPanel`],
//!   [`crate::map::MapLayer`]).

pub mod map_session;
pub mod search_service;
