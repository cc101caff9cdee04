use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{utils::fmt_bytes, Address, ChainId, Decode, Encode, RelayError, H256, U256};

/// Size of an encoded [`CommitmentPayload`]
pub const COMMITMENT_PAYLOAD_LEN: usize = 8 + 8 + 32 + 32 + 32 + 8;

/// What a spoke tells the hub about a committed bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitmentPayload {
    /// Origin chain of the bundle
    pub from_chain_id: ChainId,
    /// Destination chain of the bundle
    pub to_chain_id: ChainId,
    /// Bundle id
    pub bundle_id: H256,
    /// Merkle root over the bundle's message ids
    pub bundle_root: H256,
    /// Fees carried with the bundle
    pub bundle_fees: U256,
    /// Time the bundle was committed on the origin chain
    pub commit_time: u64,
}

impl CommitmentPayload {
    /// Arena key of this commitment
    pub fn key(&self) -> CommitmentKey {
        CommitmentKey {
            from_chain_id: self.from_chain_id,
            to_chain_id: self.to_chain_id,
            bundle_id: self.bundle_id,
        }
    }
}

impl Encode for CommitmentPayload {
    fn write_to<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: std::io::Write,
    {
        let mut written = 0;
        written += self.from_chain_id.write_to(writer)?;
        written += self.to_chain_id.write_to(writer)?;
        written += self.bundle_id.write_to(writer)?;
        written += self.bundle_root.write_to(writer)?;
        written += self.bundle_fees.write_to(writer)?;
        written += self.commit_time.write_to(writer)?;
        Ok(written)
    }
}

impl Decode for CommitmentPayload {
    fn read_from<R>(reader: &mut R) -> Result<Self, RelayError>
    where
        R: std::io::Read,
        Self: Sized,
    {
        Ok(Self {
            from_chain_id: u64::read_from(reader)?,
            to_chain_id: u64::read_from(reader)?,
            bundle_id: H256::read_from(reader)?,
            bundle_root: H256::read_from(reader)?,
            bundle_fees: U256::read_from(reader)?,
            commit_time: u64::read_from(reader)?,
        })
    }
}

/// Identifies a bundle across the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitmentKey {
    /// Origin chain
    pub from_chain_id: ChainId,
    /// Destination chain
    pub to_chain_id: ChainId,
    /// Bundle id
    pub bundle_id: H256,
}

impl Display for CommitmentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}->{}:{}",
            self.from_chain_id,
            self.to_chain_id,
            fmt_bytes(self.bundle_id.as_bytes())
        )
    }
}

/// Lifecycle of a commitment on the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitmentStatus {
    /// Received, waiting for a relayer
    Pending,
    /// Relayed and handed to the destination spoke's connector
    Forwarded,
    /// Relayed and proven on the hub itself
    Proven,
}

/// A commitment record held by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commitment {
    /// The payload as received
    pub payload: CommitmentPayload,
    /// `commit_time + exit_time(from_chain_id)`
    pub relay_window_start: u64,
    /// Current state
    pub status: CommitmentStatus,
    /// Who relayed it
    pub relayer: Option<Address>,
    /// What the relayer was paid
    pub relayer_reward: U256,
}

impl Commitment {
    /// A freshly received commitment
    pub fn pending(payload: CommitmentPayload, exit_time: u64) -> Self {
        Self {
            payload,
            relay_window_start: payload.commit_time.saturating_add(exit_time),
            status: CommitmentStatus::Pending,
            relayer: None,
            relayer_reward: U256::zero(),
        }
    }

    /// Arena key of this commitment
    pub fn key(&self) -> CommitmentKey {
        self.payload.key()
    }

    /// True once the commitment left the `Pending` state
    pub fn is_relayed(&self) -> bool {
        self.status != CommitmentStatus::Pending
    }

    /// True if a relay at `now` would be accepted
    pub fn is_relayable(&self, now: u64) -> bool {
        !self.is_relayed() && now >= self.relay_window_start
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn payload() -> CommitmentPayload {
        CommitmentPayload {
            from_chain_id: 11155420,
            to_chain_id: 84532,
            bundle_id: H256::repeat_byte(0x01),
            bundle_root: H256::repeat_byte(0x02),
            bundle_fees: U256::from(3_000_000_000_000_000u64),
            commit_time: 1_700_000_000,
        }
    }

    #[test]
    fn it_encodes_the_wire_layout() {
        let p = payload();
        let bytes = p.to_vec();
        assert_eq!(bytes.len(), COMMITMENT_PAYLOAD_LEN);
        assert_eq!(&bytes[..8], &11155420u64.to_be_bytes());
        assert_eq!(&bytes[16..48], p.bundle_id.as_bytes());
        assert_eq!(&bytes[112..], &1_700_000_000u64.to_be_bytes());
        assert_eq!(CommitmentPayload::read_from(&mut bytes.as_slice()).unwrap(), p);
    }

    #[test]
    fn it_rejects_truncated_payloads() {
        let bytes = payload().to_vec();
        let err = CommitmentPayload::read_from(&mut &bytes[..100]).unwrap_err();
        assert!(matches!(err, RelayError::IoError(_)));
    }

    #[test]
    fn relay_window_opens_after_exit_time() {
        let c = Commitment::pending(payload(), 100);
        assert_eq!(c.relay_window_start, 1_700_000_100);
        assert!(!c.is_relayable(1_700_000_099));
        assert!(c.is_relayable(1_700_000_100));

        let relayed = Commitment {
            status: CommitmentStatus::Forwarded,
            ..c
        };
        assert!(!relayed.is_relayable(u64::MAX));
    }
}
