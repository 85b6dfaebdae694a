/// x/wasm Module Types
///
/// Access policies, persisted records and their store layout.

pub mod access;
pub mod codec;
pub mod keys;
pub mod records;
pub mod validation;

pub use access::{AccessConfig, AccessType};
pub use codec::StoreCodec;
pub use records::{AbsoluteTxPosition, Checksum, CodeID, CodeInfo, ContractInfo, Params};
