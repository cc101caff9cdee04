use derive_new::new;
use ethers_core::{
    abi::{encode, Token},
    utils::keccak256,
};
use serde::{Deserialize, Serialize};

use crate::{Address, ChainId, H256, U256};

/// A cross-chain call.
///
/// `bundle_nonce` is the id of the bundle the message was appended to and
/// `tree_index` its position in that bundle; together they make the id unique
/// even for identical payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, new)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Id of the bundle holding the message
    pub bundle_nonce: H256,
    /// Position in the bundle
    pub tree_index: usize,
    /// Origin chain
    pub from_chain_id: ChainId,
    /// Sender on the origin chain
    pub from: Address,
    /// Destination chain
    pub to_chain_id: ChainId,
    /// Target on the destination chain
    pub to: Address,
    /// Call data
    #[serde(with = "serde_bytes_hex")]
    pub data: Vec<u8>,
}

impl Message {
    /// The message id, the leaf committed in the bundle tree.
    pub fn id(&self) -> H256 {
        message_id(
            self.bundle_nonce,
            self.tree_index,
            self.from_chain_id,
            self.from,
            self.to_chain_id,
            self.to,
            &self.data,
        )
    }
}

/// `keccak256(abi.encode(bytes32, uint256, uint256, address, uint256, address, bytes))`
/// over the message fields.
pub fn message_id(
    bundle_nonce: H256,
    tree_index: usize,
    from_chain_id: ChainId,
    from: Address,
    to_chain_id: ChainId,
    to: Address,
    data: &[u8],
) -> H256 {
    let encoded = encode(&[
        Token::FixedBytes(bundle_nonce.as_bytes().to_vec()),
        Token::Uint(U256::from(tree_index)),
        Token::Uint(U256::from(from_chain_id)),
        Token::Address(from),
        Token::Uint(U256::from(to_chain_id)),
        Token::Address(to),
        Token::Bytes(data.to_vec()),
    ]);
    keccak256(encoded).into()
}

/// Context exposed to a receiver while a relayed call executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossChainContext {
    /// The immediate caller, i.e. the bridge on the destination chain
    pub msg_sender: Address,
    /// The sender of the message on the origin chain
    pub x_domain_sender: Address,
    /// The origin chain
    pub x_domain_chain_id: ChainId,
}

pub(crate) mod serde_bytes_hex {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use crate::utils::{fmt_bytes, strip_0x_prefix};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&fmt_bytes(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(strip_0x_prefix(&s)).map_err(D::Error::custom)
    }
}
