use std::str::FromStr;

use thiserror::Error;

use crate::{Address, H256, U256};

/// Strips the '0x' prefix off of hex string so it can be deserialized.
pub fn strip_0x_prefix(s: &str) -> &str {
    if s.len() < 2 || &s[..2] != "0x" {
        s
    } else {
        &s[2..]
    }
}

/// Format bytes as a `0x` prefixed hex string for logs.
pub fn fmt_bytes(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Interpret a 256-bit integer as a big-endian 32 byte word.
pub fn u256_to_h256(value: U256) -> H256 {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    H256::from(buf)
}

/// Interpret a 32 byte word as a big-endian 256-bit integer.
pub fn h256_to_u256(value: H256) -> U256 {
    U256::from_big_endian(value.as_bytes())
}

/// Error parsing a hex encoded address
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AddressParseError {
    /// Address was expected to be 20 bytes
    #[error("Expected a 40 character hex address, got {0} characters")]
    InvalidLength(usize),
    /// Provided string was not hex
    #[error("The provided string is not hex: {0:?}")]
    NotHex(String),
}

/// Parse a `0x` prefixed (or bare) hex string into an address.
pub fn parse_address(s: &str) -> Result<Address, AddressParseError> {
    let stripped = strip_0x_prefix(s);
    if stripped.len() != 40 {
        return Err(AddressParseError::InvalidLength(stripped.len()));
    }
    Address::from_str(stripped).map_err(|_| AddressParseError::NotHex(stripped.to_owned()))
}
