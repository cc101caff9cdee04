pub use ethers_core::types::{Address, H160, H256, U256};

pub use bundle::*;
pub use commitment::*;
pub use event::*;
pub use message::*;

mod bundle;
mod commitment;
mod event;
mod message;

/// Numeric chain identifier
pub type ChainId = u64;

/// Basis points denominator
pub const BASIS_POINTS: u32 = 10_000;
