// Parameter subspace encoding used before params moved into the module store.
// Values are JSON; access types are their text names. Frozen: do not change.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{Result, WasmError};
use crate::types::{AccessConfig, AccessType};

pub const PARAM_STORE_KEY_UPLOAD_ACCESS: &str = "uploadAccess";
pub const PARAM_STORE_KEY_INSTANTIATE_ACCESS: &str = "instantiateAccess";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegacyAccessConfig {
    pub permission: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub addresses: Vec<String>,
}

/// Text form of an access type; unknown names read as `Unspecified`
pub fn access_type_from_text(text: &str) -> AccessType {
    text.parse().unwrap_or(AccessType::Unspecified)
}

impl LegacyAccessConfig {
    pub fn to_access_config(&self) -> Result<AccessConfig> {
        let access_type = access_type_from_text(&self.permission);
        let addresses: Vec<&String> = match access_type {
            AccessType::OnlyAddress => vec![&self.address],
            AccessType::AnyOfAddresses => self.addresses.iter().collect(),
            _ => {
                if !self.address.is_empty() || !self.addresses.is_empty() {
                    return Err(WasmError::InvalidPolicyShape(
                        "address not allowed for this type".to_string(),
                    ));
                }
                Vec::new()
            }
        };
        let addresses = addresses
            .into_iter()
            .map(|a| Address::from_bech32(a))
            .collect::<Result<Vec<_>>>()?;
        access_type.with(&addresses)
    }
}
