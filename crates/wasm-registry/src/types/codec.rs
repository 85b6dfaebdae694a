// Protobuf wire form of the persisted records.
//
// Field tags are part of the on-disk format; never renumber a field. Layouts
// written by older releases live next to the migration that reads them.

use prost::Message;

use super::access::{unique_addresses, AccessConfig, AccessType};
use super::records::{AbsoluteTxPosition, Checksum, CodeInfo, ContractInfo, Params};
use crate::address::Address;
use crate::error::{Result, WasmError};

#[derive(Clone, PartialEq, Message)]
pub struct RawAccessConfig {
    #[prost(enumeration = "AccessType", tag = "1")]
    pub permission: i32,
    /// Only set for the legacy `OnlyAddress` type
    #[prost(bytes = "vec", tag = "2")]
    pub address: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub addresses: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct RawCodeInfo {
    #[prost(bytes = "vec", tag = "1")]
    pub code_hash: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub creator: Vec<u8>,
    #[prost(message, optional, tag = "5")]
    pub instantiate_config: Option<RawAccessConfig>,
}

#[derive(Clone, PartialEq, Message)]
pub struct RawAbsoluteTxPosition {
    #[prost(uint64, tag = "1")]
    pub block_height: u64,
    #[prost(uint64, tag = "2")]
    pub tx_index: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct RawContractInfo {
    #[prost(uint64, tag = "1")]
    pub code_id: u64,
    #[prost(bytes = "vec", tag = "2")]
    pub creator: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub admin: Vec<u8>,
    #[prost(string, tag = "4")]
    pub label: String,
    #[prost(message, optional, tag = "5")]
    pub created: Option<RawAbsoluteTxPosition>,
    #[prost(string, tag = "6")]
    pub ibc_port_id: String,
    #[prost(message, optional, tag = "7")]
    pub extension: Option<prost_types::Any>,
    #[prost(string, tag = "8")]
    pub ibc2_port_id: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct RawParams {
    #[prost(message, optional, tag = "1")]
    pub code_upload_access: Option<RawAccessConfig>,
    #[prost(enumeration = "AccessType", tag = "2")]
    pub instantiate_default_permission: i32,
}

/// Records that can be written to and read from the store
pub trait StoreCodec: Sized {
    /// Record kind reported in decode failures
    const KIND: &'static str;

    fn to_store_bytes(&self) -> Vec<u8>;

    fn from_store_bytes(bytes: &[u8]) -> Result<Self>;
}

fn decode_address(kind: &'static str, bytes: Vec<u8>) -> Result<Address> {
    Address::new(bytes).map_err(|e| WasmError::decode(kind, e))
}

fn decode_access_type(kind: &'static str, value: i32) -> Result<AccessType> {
    AccessType::try_from(value).map_err(|_| WasmError::decode(kind, format!("unknown access type {}", value)))
}

impl From<&AccessConfig> for RawAccessConfig {
    fn from(config: &AccessConfig) -> Self {
        let mut raw = RawAccessConfig {
            permission: config.access_type() as i32,
            ..Default::default()
        };
        match config {
            AccessConfig::Nobody | AccessConfig::Everybody => {}
            AccessConfig::OnlyAddress(addr) => raw.address = addr.as_bytes().to_vec(),
            AccessConfig::AnyOfAddresses(addrs) => {
                raw.addresses = addrs.iter().map(|a| a.as_bytes().to_vec()).collect();
            }
        }
        raw
    }
}

impl TryFrom<RawAccessConfig> for AccessConfig {
    type Error = WasmError;

    fn try_from(raw: RawAccessConfig) -> Result<Self> {
        const KIND: &str = "access config";
        let access_type = decode_access_type(KIND, raw.permission)?;
        let has_list = !raw.addresses.is_empty();
        let has_single = !raw.address.is_empty();
        match access_type {
            AccessType::Unspecified => Err(WasmError::decode(KIND, "type: empty")),
            AccessType::Nobody | AccessType::Everybody if has_list || has_single => {
                Err(WasmError::decode(KIND, "addresses not allowed for this type"))
            }
            AccessType::Nobody => Ok(AccessConfig::Nobody),
            AccessType::Everybody => Ok(AccessConfig::Everybody),
            AccessType::OnlyAddress if has_list => {
                Err(WasmError::decode(KIND, "only address: unexpected address list"))
            }
            AccessType::OnlyAddress => Ok(AccessConfig::OnlyAddress(decode_address(KIND, raw.address)?)),
            AccessType::AnyOfAddresses if has_single => {
                Err(WasmError::decode(KIND, "any of addresses: unexpected single address"))
            }
            AccessType::AnyOfAddresses => {
                let addrs = raw
                    .addresses
                    .into_iter()
                    .map(|a| decode_address(KIND, a))
                    .collect::<Result<Vec<_>>>()?;
                let set = unique_addresses(addrs).map_err(|e| WasmError::decode(KIND, e))?;
                Ok(AccessConfig::AnyOfAddresses(set))
            }
        }
    }
}

impl From<&CodeInfo> for RawCodeInfo {
    fn from(info: &CodeInfo) -> Self {
        RawCodeInfo {
            code_hash: info.code_hash.as_bytes().to_vec(),
            creator: info.creator.as_bytes().to_vec(),
            instantiate_config: Some(RawAccessConfig::from(&info.instantiate_config)),
        }
    }
}

impl TryFrom<RawCodeInfo> for CodeInfo {
    type Error = WasmError;

    fn try_from(raw: RawCodeInfo) -> Result<Self> {
        const KIND: &str = "code info";
        let config = raw
            .instantiate_config
            .ok_or_else(|| WasmError::decode(KIND, "missing instantiate config"))?;
        Ok(CodeInfo {
            code_hash: Checksum::from_slice(&raw.code_hash)?,
            creator: decode_address(KIND, raw.creator)?,
            instantiate_config: AccessConfig::try_from(config)?,
        })
    }
}

impl From<AbsoluteTxPosition> for RawAbsoluteTxPosition {
    fn from(pos: AbsoluteTxPosition) -> Self {
        RawAbsoluteTxPosition {
            block_height: pos.block_height,
            tx_index: pos.tx_index,
        }
    }
}

impl From<RawAbsoluteTxPosition> for AbsoluteTxPosition {
    fn from(raw: RawAbsoluteTxPosition) -> Self {
        AbsoluteTxPosition::new(raw.block_height, raw.tx_index)
    }
}

impl From<&ContractInfo> for RawContractInfo {
    fn from(info: &ContractInfo) -> Self {
        RawContractInfo {
            code_id: info.code_id,
            creator: info.creator.as_bytes().to_vec(),
            admin: info.admin.as_ref().map(|a| a.as_bytes().to_vec()).unwrap_or_default(),
            label: info.label.clone(),
            created: Some(info.created.into()),
            ibc_port_id: info.ibc_port_id.clone(),
            extension: info.extension.clone(),
            ibc2_port_id: info.ibc2_port_id.clone(),
        }
    }
}

impl TryFrom<RawContractInfo> for ContractInfo {
    type Error = WasmError;

    fn try_from(raw: RawContractInfo) -> Result<Self> {
        const KIND: &str = "contract info";
        let admin = if raw.admin.is_empty() {
            None
        } else {
            Some(decode_address(KIND, raw.admin)?)
        };
        Ok(ContractInfo {
            code_id: raw.code_id,
            creator: decode_address(KIND, raw.creator)?,
            admin,
            label: raw.label,
            created: raw
                .created
                .ok_or_else(|| WasmError::decode(KIND, "missing created position"))?
                .into(),
            ibc_port_id: raw.ibc_port_id,
            extension: raw.extension,
            ibc2_port_id: raw.ibc2_port_id,
        })
    }
}

impl From<&Params> for RawParams {
    fn from(params: &Params) -> Self {
        RawParams {
            code_upload_access: Some(RawAccessConfig::from(&params.code_upload_access)),
            instantiate_default_permission: params.instantiate_default_permission as i32,
        }
    }
}

impl TryFrom<RawParams> for Params {
    type Error = WasmError;

    fn try_from(raw: RawParams) -> Result<Self> {
        const KIND: &str = "params";
        let upload = raw
            .code_upload_access
            .ok_or_else(|| WasmError::decode(KIND, "missing code upload access"))?;
        Ok(Params {
            code_upload_access: AccessConfig::try_from(upload)?,
            instantiate_default_permission: decode_access_type(KIND, raw.instantiate_default_permission)?,
        })
    }
}

macro_rules! impl_store_codec {
    ($domain:ty, $raw:ty, $kind:literal) => {
        impl StoreCodec for $domain {
            const KIND: &'static str = $kind;

            fn to_store_bytes(&self) -> Vec<u8> {
                <$raw>::from(self).encode_to_vec()
            }

            fn from_store_bytes(bytes: &[u8]) -> Result<Self> {
                let raw = <$raw>::decode(bytes).map_err(|e| WasmError::decode($kind, e))?;
                <$domain>::try_from(raw)
            }
        }
    };
}

impl_store_codec!(CodeInfo, RawCodeInfo, "code info");
impl_store_codec!(ContractInfo, RawContractInfo, "contract info");
impl_store_codec!(Params, RawParams, "params");
