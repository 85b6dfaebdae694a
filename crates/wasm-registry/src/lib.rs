// x/wasm Registry Library
// Access policies, code and contract registry, store migrations and payload admission

pub mod address;
pub mod authz;
pub mod config;
pub mod engine;
pub mod error;
pub mod ioutils;
pub mod keeper;
pub mod migrations;
pub mod msg;
pub mod registry;
pub mod store;
pub mod types;

// Re-export commonly used types for convenience
pub use address::{build_contract_address_classic, Address};
pub use authz::{AuthorizationPolicy, ChainAccessConfigs, DefaultAuthorizationPolicy, GovAuthorizationPolicy};
pub use config::WasmConfig;
pub use engine::{MemoryEngine, WasmEngine};
pub use error::{Result, WasmError};
pub use keeper::{InstantiateResponse, Keeper};
pub use migrations::{MigrationChain, Migrator, CONSENSUS_VERSION};
pub use msg::{AccessConfigMsg, MsgServer, WasmMsg, WasmResponse};
pub use registry::{PrunedCodes, Registry};
pub use store::{KvStore, MemStore};
pub use types::{AbsoluteTxPosition, AccessConfig, AccessType, Checksum, CodeID, CodeInfo, ContractInfo, Params};
