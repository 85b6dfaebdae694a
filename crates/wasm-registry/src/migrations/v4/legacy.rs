// Contract info as written by releases with the two trailing fields swapped:
// tag 7 held ibc2_port_id and tag 8 held the extension. Frozen: do not change.

use prost::Message;

use crate::types::codec::{RawAbsoluteTxPosition, RawContractInfo};

#[derive(Clone, PartialEq, Message)]
pub struct LegacyAbsoluteTxPosition {
    #[prost(uint64, tag = "1")]
    pub block_height: u64,
    #[prost(uint64, tag = "2")]
    pub tx_index: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct LegacyContractInfo {
    #[prost(uint64, tag = "1")]
    pub code_id: u64,
    #[prost(bytes = "vec", tag = "2")]
    pub creator: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub admin: Vec<u8>,
    #[prost(string, tag = "4")]
    pub label: String,
    #[prost(message, optional, tag = "5")]
    pub created: Option<LegacyAbsoluteTxPosition>,
    #[prost(string, tag = "6")]
    pub ibc_port_id: String,
    #[prost(string, tag = "7")]
    pub ibc2_port_id: String,
    #[prost(message, optional, tag = "8")]
    pub extension: Option<prost_types::Any>,
}

impl From<LegacyContractInfo> for RawContractInfo {
    fn from(legacy: LegacyContractInfo) -> Self {
        RawContractInfo {
            code_id: legacy.code_id,
            creator: legacy.creator,
            admin: legacy.admin,
            label: legacy.label,
            created: legacy.created.map(|c| RawAbsoluteTxPosition {
                block_height: c.block_height,
                tx_index: c.tx_index,
            }),
            ibc_port_id: legacy.ibc_port_id,
            extension: legacy.extension,
            ibc2_port_id: legacy.ibc2_port_id,
        }
    }
}
