/// Address Module
///
/// Raw account and contract addresses with bech32 rendering, plus the
/// deterministic contract address derivation used by instantiate.

use bech32::{FromBase32, ToBase32, Variant};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{Result, WasmError};

/// Default bech32 prefix for addresses rendered by this module
pub const DEFAULT_BECH32_PREFIX: &str = "wasm";

/// Module name used when deriving contract addresses
pub const MODULE_NAME: &str = "wasm";

/// Length of a derived contract address
pub const CONTRACT_ADDR_LEN: usize = 32;

/// Longest address accepted anywhere in the store
pub const MAX_ADDR_LEN: usize = 255;

/// Account or contract address as raw bytes
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(Vec<u8>);

impl Address {
    /// Wrap raw bytes, rejecting empty or oversized addresses
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        verify_address_format(&bytes)?;
        Ok(Self(bytes))
    }

    /// Parse a bech32 address; the human readable part is not checked
    pub fn from_bech32(addr: &str) -> Result<Self> {
        let (_, bytes) = bech32_decode(addr)?;
        Self::new(bytes)
    }

    /// Render as bech32 with the given prefix
    pub fn to_bech32(&self, prefix: &str) -> String {
        bech32::encode(prefix, self.0.to_base32(), Variant::Bech32)
            .unwrap_or_else(|_| format!("{}1{}", prefix, hex::encode(&self.0)))
    }

    /// Derive a module account address.
    ///
    /// `sha256(sha256("module") || name || 0x00 || key)`, matching the Cosmos SDK
    /// `address.Module` construction.
    pub fn module(name: &str, key: &[u8]) -> Self {
        let type_hash = Sha256::digest(b"module");
        let mut hasher = Sha256::new();
        hasher.update(type_hash);
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(key);
        Self(hasher.finalize().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bech32(DEFAULT_BECH32_PREFIX))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

/// Check the address length constraints shared by creators, admins and allow lists
pub fn verify_address_format(bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return Err(WasmError::InvalidPolicyShape("address cannot be empty".to_string()));
    }
    if bytes.len() > MAX_ADDR_LEN {
        return Err(WasmError::InvalidPolicyShape(format!(
            "address max length is {}, got {}",
            MAX_ADDR_LEN,
            bytes.len()
        )));
    }
    Ok(())
}

/// Decode bech32 address to get the raw bytes
pub fn bech32_decode(addr: &str) -> Result<(String, Vec<u8>)> {
    let (hrp, data, variant) = bech32::decode(addr)
        .map_err(|e| WasmError::Invalid(format!("invalid bech32 address {}: {}", addr, e)))?;

    if variant != Variant::Bech32 {
        return Err(WasmError::Invalid("invalid bech32 variant".to_string()));
    }

    let bytes = Vec::<u8>::from_base32(&data)
        .map_err(|e| WasmError::Invalid(format!("invalid base32 data: {}", e)))?;

    Ok((hrp, bytes))
}

/// Build the classic contract address from code id and the global instance sequence
pub fn build_contract_address_classic(code_id: u64, instance_id: u64) -> Address {
    let mut contract_id = [0u8; 16];
    contract_id[..8].copy_from_slice(&code_id.to_be_bytes());
    contract_id[8..].copy_from_slice(&instance_id.to_be_bytes());
    let mut addr = Address::module(MODULE_NAME, &contract_id);
    addr.0.truncate(CONTRACT_ADDR_LEN);
    addr
}
