//! Hub relay. Bundle-commitment messaging between a hub chain and its spokes.
//!
//! This crate contains the core primitives, the per-chain state machines and
//! the collaborator traits (connectors, message receivers, fee distributors)
//! shared by every hub relay deployment.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![forbid(unsafe_code)]

pub use error::*;
pub use routes::*;
pub use traits::*;
pub use types::*;

/// Bundle merkle accumulator
pub mod accumulator;

/// Model instantiations of the on-chain hub, spoke and inbox state machines
pub mod models;

/// Hex and hashing utilities
pub mod utils;

mod error;
mod routes;
mod traits;
mod types;
