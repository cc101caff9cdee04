//! Hub relay test support.
//!
//! This crate contains collaborator doubles, mocks and an in-memory network
//! wiring one hub and its spokes for end-to-end tests and simulations.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Collaborator doubles and mocks
pub mod mocks;

/// In-memory deployment harness
pub mod network;

pub use network::*;
