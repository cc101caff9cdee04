//! Shared plumbing for hub relay binaries and harnesses: settings loading and
//! tracing setup.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![forbid(unsafe_code)]

/// Settings parsing and tracing configuration
pub mod settings;

pub use settings::*;
