/// x/wasm Record Types
///
/// Following the Cosmos SDK x/wasm module: code metadata keyed by CodeID and
/// contract metadata keyed by contract address.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::access::{AccessConfig, AccessType};
use crate::address::Address;
use crate::error::{Result, WasmError};

/// CodeID uniquely identifies stored WASM code
pub type CodeID = u64;

/// Length in bytes of an encoded `AbsoluteTxPosition`
pub const ABSOLUTE_TX_POSITION_LEN: usize = 16;

/// Sha256 digest of an uncompressed wasm binary
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Checksum(pub [u8; 32]);

impl Checksum {
    pub fn generate(wasm_code: &[u8]) -> Self {
        Self(Sha256::digest(wasm_code).into())
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| WasmError::decode("checksum", format!("expected 32 bytes, got {}", bytes.len())))?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self)
    }
}

/// CodeInfo stores metadata about uploaded WASM code
#[derive(Clone, Debug, PartialEq)]
pub struct CodeInfo {
    pub code_hash: Checksum,
    pub creator: Address,
    pub instantiate_config: AccessConfig,
}

impl CodeInfo {
    pub fn new(code_hash: Checksum, creator: Address, instantiate_config: AccessConfig) -> Self {
        Self {
            code_hash,
            creator,
            instantiate_config,
        }
    }
}

/// AbsoluteTxPosition is a unique transaction position that allows for global ordering of contracts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AbsoluteTxPosition {
    pub block_height: u64,
    pub tx_index: u64,
}

impl AbsoluteTxPosition {
    pub fn new(block_height: u64, tx_index: u64) -> Self {
        Self {
            block_height,
            tx_index,
        }
    }

    /// Big-endian encoding, so byte order matches numeric order
    pub fn to_bytes(&self) -> [u8; ABSOLUTE_TX_POSITION_LEN] {
        let mut out = [0u8; ABSOLUTE_TX_POSITION_LEN];
        out[..8].copy_from_slice(&self.block_height.to_be_bytes());
        out[8..].copy_from_slice(&self.tx_index.to_be_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ABSOLUTE_TX_POSITION_LEN {
            return Err(WasmError::decode(
                "tx position",
                format!("expected {} bytes, got {}", ABSOLUTE_TX_POSITION_LEN, bytes.len()),
            ));
        }
        let mut height = [0u8; 8];
        let mut index = [0u8; 8];
        height.copy_from_slice(&bytes[..8]);
        index.copy_from_slice(&bytes[8..]);
        Ok(Self::new(u64::from_be_bytes(height), u64::from_be_bytes(index)))
    }
}

/// ContractInfo stores metadata about an instantiated contract
#[derive(Clone, Debug, PartialEq)]
pub struct ContractInfo {
    pub code_id: CodeID,
    pub creator: Address,
    pub admin: Option<Address>,
    pub label: String,
    pub created: AbsoluteTxPosition,
    pub ibc_port_id: String,
    pub extension: Option<prost_types::Any>,
    pub ibc2_port_id: String,
}

impl ContractInfo {
    pub fn new(
        code_id: CodeID,
        creator: Address,
        admin: Option<Address>,
        label: String,
        created: AbsoluteTxPosition,
    ) -> Self {
        Self {
            code_id,
            creator,
            admin,
            label,
            created,
            ibc_port_id: String::new(),
            extension: None,
            ibc2_port_id: String::new(),
        }
    }
}

/// Module parameters governing code upload and default instantiate permissions
#[derive(Clone, Debug, PartialEq)]
pub struct Params {
    pub code_upload_access: AccessConfig,
    pub instantiate_default_permission: AccessType,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            code_upload_access: AccessConfig::Everybody,
            instantiate_default_permission: AccessType::Everybody,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<()> {
        if self.instantiate_default_permission == AccessType::Unspecified {
            return Err(WasmError::InvalidPolicyShape(
                "instantiate default permission: empty".to_string(),
            ));
        }
        self.code_upload_access.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_bytes_order() {
        let early = AbsoluteTxPosition::new(1, 9);
        let late = AbsoluteTxPosition::new(2, 0);
        assert!(early.to_bytes() < late.to_bytes());
        assert_eq!(AbsoluteTxPosition::from_bytes(&late.to_bytes()).unwrap(), late);
        assert!(AbsoluteTxPosition::from_bytes(&[0u8; 3]).is_err());
    }

    #[test]
    fn test_checksum() {
        let checksum = Checksum::generate(b"\0asm");
        assert_eq!(checksum.to_string().len(), 64);
        assert_eq!(Checksum::from_slice(checksum.as_bytes()).unwrap(), checksum);
        assert!(Checksum::from_slice(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_default_params() {
        let params = Params::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.code_upload_access, AccessConfig::Everybody);
    }
}
