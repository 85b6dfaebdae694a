/// x/wasm Messages
///
/// Transaction messages as submitted by accounts, with bech32 addresses, and
/// the server that dispatches them to the keeper under the default policy.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::address::Address;
use crate::authz::DefaultAuthorizationPolicy;
use crate::engine::WasmEngine;
use crate::error::{Result, WasmError};
use crate::keeper::Keeper;
use crate::store::KvStore;
use crate::types::{AccessConfig, AccessType, CodeID};

/// AccessConfig as it appears in a message
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AccessConfigMsg {
    Nobody {},
    OnlyAddress { address: String },
    Everybody {},
    AnyOfAddresses { addresses: Vec<String> },
}

impl TryFrom<AccessConfigMsg> for AccessConfig {
    type Error = WasmError;

    fn try_from(msg: AccessConfigMsg) -> Result<Self> {
        let (access_type, addresses) = match msg {
            AccessConfigMsg::Nobody {} => (AccessType::Nobody, Vec::new()),
            AccessConfigMsg::OnlyAddress { address } => (AccessType::OnlyAddress, vec![address]),
            AccessConfigMsg::Everybody {} => (AccessType::Everybody, Vec::new()),
            AccessConfigMsg::AnyOfAddresses { addresses } => (AccessType::AnyOfAddresses, addresses),
        };
        let addresses = addresses
            .iter()
            .map(|a| Address::from_bech32(a))
            .collect::<Result<Vec<_>>>()?;
        access_type.with(&addresses)
    }
}

/// WasmMsg represents actions that can be taken on the wasm module
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "snake_case")]
pub enum WasmMsg {
    /// StoreCode uploads WASM bytecode, raw or gzip compressed
    StoreCode {
        sender: String,
        wasm_byte_code: Vec<u8>,
        instantiate_permission: Option<AccessConfigMsg>,
    },
    /// Instantiate creates a new contract instance from stored code
    Instantiate {
        sender: String,
        code_id: CodeID,
        admin: Option<String>,
        label: String,
        msg: Vec<u8>, // JSON encoded init message
    },
    /// Migrate updates a contract to use new code
    Migrate {
        sender: String,
        contract_addr: String,
        new_code_id: CodeID,
        msg: Vec<u8>, // JSON encoded migrate message
    },
    UpdateAdmin {
        sender: String,
        contract_addr: String,
        new_admin: String,
    },
    ClearAdmin {
        sender: String,
        contract_addr: String,
    },
    UpdateContractLabel {
        sender: String,
        contract_addr: String,
        new_label: String,
    },
    UpdateInstantiateConfig {
        sender: String,
        code_id: CodeID,
        new_instantiate_permission: AccessConfigMsg,
    },
}

impl WasmMsg {
    pub fn sender(&self) -> &str {
        match self {
            WasmMsg::StoreCode { sender, .. }
            | WasmMsg::Instantiate { sender, .. }
            | WasmMsg::Migrate { sender, .. }
            | WasmMsg::UpdateAdmin { sender, .. }
            | WasmMsg::ClearAdmin { sender, .. }
            | WasmMsg::UpdateContractLabel { sender, .. }
            | WasmMsg::UpdateInstantiateConfig { sender, .. } => sender,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum WasmResponse {
    StoreCode { code_id: CodeID, checksum: String },
    Instantiate { address: String, data: Option<Vec<u8>> },
    Migrate { data: Option<Vec<u8>> },
    Empty {},
}

/// Dispatches account messages to the keeper
pub struct MsgServer<S, E> {
    keeper: Keeper<S, E>,
}

impl<S: KvStore, E: WasmEngine> MsgServer<S, E> {
    pub fn new(keeper: Keeper<S, E>) -> Self {
        Self { keeper }
    }

    pub fn keeper(&self) -> &Keeper<S, E> {
        &self.keeper
    }

    pub fn into_keeper(self) -> Keeper<S, E> {
        self.keeper
    }

    pub fn handle(&mut self, block_height: u64, msg: WasmMsg) -> Result<WasmResponse> {
        let sender = Address::from_bech32(msg.sender())?;
        let policy = DefaultAuthorizationPolicy;
        debug!(%sender, block_height, "handling wasm message");

        match msg {
            WasmMsg::StoreCode {
                wasm_byte_code,
                instantiate_permission,
                ..
            } => {
                let permission = instantiate_permission.map(AccessConfig::try_from).transpose()?;
                let (code_id, checksum) = self
                    .keeper
                    .store_code(&sender, &wasm_byte_code, permission, &policy)?;
                Ok(WasmResponse::StoreCode {
                    code_id,
                    checksum: checksum.to_string(),
                })
            }
            WasmMsg::Instantiate {
                code_id,
                admin,
                label,
                msg,
                ..
            } => {
                let admin = admin
                    .filter(|a| !a.is_empty())
                    .map(|a| Address::from_bech32(&a))
                    .transpose()?;
                let res = self
                    .keeper
                    .instantiate(block_height, &sender, code_id, admin, &label, &msg, &policy)?;
                Ok(WasmResponse::Instantiate {
                    address: res
                        .address
                        .to_bech32(&self.keeper.config().module.bech32_prefix),
                    data: res.data,
                })
            }
            WasmMsg::Migrate {
                contract_addr,
                new_code_id,
                msg,
                ..
            } => {
                let contract = Address::from_bech32(&contract_addr)?;
                let data = self
                    .keeper
                    .migrate_contract(&contract, &sender, new_code_id, &msg, &policy)?;
                Ok(WasmResponse::Migrate { data })
            }
            WasmMsg::UpdateAdmin {
                contract_addr,
                new_admin,
                ..
            } => {
                let contract = Address::from_bech32(&contract_addr)?;
                let new_admin = Address::from_bech32(&new_admin)?;
                self.keeper
                    .update_admin(&contract, &sender, Some(new_admin), &policy)?;
                Ok(WasmResponse::Empty {})
            }
            WasmMsg::ClearAdmin { contract_addr, .. } => {
                let contract = Address::from_bech32(&contract_addr)?;
                self.keeper.clear_admin(&contract, &sender, &policy)?;
                Ok(WasmResponse::Empty {})
            }
            WasmMsg::UpdateContractLabel {
                contract_addr,
                new_label,
                ..
            } => {
                let contract = Address::from_bech32(&contract_addr)?;
                self.keeper.update_label(&contract, &sender, &new_label, &policy)?;
                Ok(WasmResponse::Empty {})
            }
            WasmMsg::UpdateInstantiateConfig {
                code_id,
                new_instantiate_permission,
                ..
            } => {
                let config = AccessConfig::try_from(new_instantiate_permission)?;
                self.keeper
                    .update_instantiate_config(code_id, &sender, config, &policy)?;
                Ok(WasmResponse::Empty {})
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WasmConfig;
    use crate::engine::MemoryEngine;
    use crate::store::MemStore;

    fn bech32(n: u8) -> String {
        Address::new(vec![n; 20]).unwrap().to_string()
    }

    fn server() -> MsgServer<MemStore, MemoryEngine> {
        MsgServer::new(Keeper::new(MemStore::new(), MemoryEngine::new(), WasmConfig::default()))
    }

    #[test]
    fn test_access_config_msg_conversion() {
        let msg = AccessConfigMsg::AnyOfAddresses {
            addresses: vec![bech32(1), bech32(2)],
        };
        let config = AccessConfig::try_from(msg).unwrap();
        assert_eq!(config.authorized_addresses().len(), 2);

        let dup = AccessConfigMsg::AnyOfAddresses {
            addresses: vec![bech32(1), bech32(1)],
        };
        assert!(matches!(
            AccessConfig::try_from(dup),
            Err(WasmError::InvalidPolicyShape(_))
        ));
        assert!(AccessConfig::try_from(AccessConfigMsg::OnlyAddress {
            address: "not-bech32".to_string()
        })
        .is_err());
    }

    #[test]
    fn test_msg_json_shape() {
        let json = r#"{"clear_admin":{"sender":"s","contract_addr":"c"}}"#;
        let msg: WasmMsg = serde_json::from_str(json).unwrap();
        assert_eq!(msg.sender(), "s");
    }

    #[test]
    fn test_store_and_instantiate_through_server() {
        let mut server = server();
        let store = WasmMsg::StoreCode {
            sender: bech32(1),
            wasm_byte_code: b"\0asm\x01\0\0\0server".to_vec(),
            instantiate_permission: Some(AccessConfigMsg::Everybody {}),
        };
        let code_id = match server.handle(1, store).unwrap() {
            WasmResponse::StoreCode { code_id, checksum } => {
                assert_eq!(checksum.len(), 64);
                code_id
            }
            other => panic!("unexpected response {:?}", other),
        };

        let instantiate = WasmMsg::Instantiate {
            sender: bech32(2),
            code_id,
            admin: Some(String::new()),
            label: "demo".to_string(),
            msg: b"{}".to_vec(),
        };
        match server.handle(2, instantiate).unwrap() {
            WasmResponse::Instantiate { address, .. } => assert!(address.starts_with("wasm1")),
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_bad_sender_rejected() {
        let mut server = server();
        let msg = WasmMsg::ClearAdmin {
            sender: "garbage".to_string(),
            contract_addr: bech32(3),
        };
        assert!(matches!(server.handle(1, msg), Err(WasmError::Invalid(_))));
    }
}
