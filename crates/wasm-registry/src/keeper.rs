/// x/wasm Keeper
///
/// Module operations on top of the registry: code upload through the admission
/// guard, instantiation, admin actions and governance pruning. Every check runs
/// before the first write, so a rejected action leaves the store untouched.

use tracing::{debug, info, warn};

use crate::address::{build_contract_address_classic, Address};
use crate::authz::{AuthorizationPolicy, ChainAccessConfigs};
use crate::config::WasmConfig;
use crate::engine::WasmEngine;
use crate::error::{Result, WasmError};
use crate::ioutils;
use crate::registry::Registry;
use crate::store::KvStore;
use crate::types::keys;
use crate::types::validation::{validate_label, validate_wasm_code};
use crate::types::{AccessConfig, Checksum, CodeID, CodeInfo, ContractInfo, Params};

/// Result of a successful instantiation
#[derive(Clone, Debug, PartialEq)]
pub struct InstantiateResponse {
    pub address: Address,
    pub data: Option<Vec<u8>>,
}

pub struct Keeper<S, E> {
    registry: Registry<S>,
    engine: E,
    config: WasmConfig,
}

impl<S: KvStore, E: WasmEngine> Keeper<S, E> {
    pub fn new(store: S, engine: E, config: WasmConfig) -> Self {
        Self {
            registry: Registry::new(store),
            engine,
            config,
        }
    }

    pub fn registry(&self) -> &Registry<S> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry<S> {
        &mut self.registry
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &WasmConfig {
        &self.config
    }

    pub fn into_parts(self) -> (S, E) {
        (self.registry.into_inner(), self.engine)
    }

    pub fn params(&self) -> Result<Params> {
        self.registry.params()
    }

    pub fn set_params(&mut self, params: &Params) -> Result<()> {
        self.registry.set_params(params)?;
        info!(
            upload = %params.code_upload_access,
            instantiate_default = %params.instantiate_default_permission,
            "params updated"
        );
        Ok(())
    }

    pub fn code_info(&self, code_id: CodeID) -> Result<CodeInfo> {
        self.registry
            .get_code(code_id)?
            .ok_or_else(|| WasmError::NotFound(format!("code id {}", code_id)))
    }

    pub fn contract_info(&self, contract: &Address) -> Result<ContractInfo> {
        self.registry
            .get_contract(contract)?
            .ok_or_else(|| WasmError::NotFound(format!("contract {}", contract)))
    }

    /// Store a wasm binary (raw or gzip) and register it under a new CodeID
    pub fn store_code(
        &mut self,
        creator: &Address,
        wasm_byte_code: &[u8],
        instantiate_permission: Option<AccessConfig>,
        authz: &dyn AuthorizationPolicy,
    ) -> Result<(CodeID, Checksum)> {
        let max_size = self.config.limits.max_wasm_size;
        validate_wasm_code(wasm_byte_code, max_size)?;

        let params = self.registry.params()?;
        let default_config = params.instantiate_default_permission.bind_to(creator)?;
        let instantiate_config = match instantiate_permission {
            Some(config) => {
                config.validate()?;
                config
            }
            None => default_config.clone(),
        };
        let chain_configs = ChainAccessConfigs::new(params.code_upload_access, default_config);
        if !authz.can_create_code(&chain_configs, creator, &instantiate_config) {
            return Err(WasmError::Unauthorized("can not create code".to_string()));
        }

        let wasm_code = ioutils::admit(wasm_byte_code, max_size as u64)?;
        let checksum = self.engine.store_code(&wasm_code)?;
        if checksum != Checksum::generate(&wasm_code) {
            return Err(WasmError::Engine(format!("engine returned unexpected checksum {}", checksum)));
        }

        let code_info = CodeInfo::new(checksum, creator.clone(), instantiate_config);
        let code_id = self.registry.put_code(None, &code_info)?;
        info!(
            code_id,
            %checksum,
            %creator,
            permission = %code_info.instantiate_config,
            "stored code"
        );
        Ok((code_id, checksum))
    }

    /// Create a contract from stored code at the classic address for the next instance id
    #[allow(clippy::too_many_arguments)]
    pub fn instantiate(
        &mut self,
        block_height: u64,
        creator: &Address,
        code_id: CodeID,
        admin: Option<Address>,
        label: &str,
        init_msg: &[u8],
        authz: &dyn AuthorizationPolicy,
    ) -> Result<InstantiateResponse> {
        validate_label(label, self.config.limits.max_label_size)?;
        let code_info = self.code_info(code_id)?;
        if !authz.can_instantiate_contract(&code_info.instantiate_config, creator) {
            return Err(WasmError::Unauthorized("can not instantiate".to_string()));
        }

        let instance_key = keys::key_last_instance_id();
        let instance_id = self.registry.peek_auto_increment_id(&instance_key)?;
        let address = build_contract_address_classic(code_id, instance_id);
        if self.registry.has_contract(&address) {
            return Err(WasmError::Duplicate(format!("contract address {} already exists", address)));
        }
        self.registry.peek_position(block_height)?;

        let data = self
            .engine
            .instantiate(&code_info.code_hash, &address, creator, init_msg)?;

        self.registry.auto_increment_id(&instance_key)?;
        let created = self.registry.next_position(block_height)?;
        let contract_info = ContractInfo::new(code_id, creator.clone(), admin, label.to_string(), created);
        self.registry.add_to_code_index(code_id, &created, &address);
        self.registry.add_to_creator_index(creator, &created, &address);
        self.registry.put_contract(&address, &contract_info);

        info!(
            contract = %address.to_bech32(&self.config.module.bech32_prefix),
            code_id,
            %creator,
            "instantiated contract"
        );
        Ok(InstantiateResponse { address, data })
    }

    /// Replace the instantiate permission of a code; the creator may only narrow it
    /// to types within the module default
    pub fn update_instantiate_config(
        &mut self,
        code_id: CodeID,
        caller: &Address,
        new_config: AccessConfig,
        authz: &dyn AuthorizationPolicy,
    ) -> Result<()> {
        new_config.validate()?;
        let mut code_info = self.code_info(code_id)?;
        let default_type = self.registry.params()?.instantiate_default_permission;
        let is_subset = new_config.access_type().is_subset(default_type);
        if !authz.can_modify_code_access_config(&code_info.creator, caller, is_subset) {
            return Err(WasmError::Unauthorized("can not modify code access config".to_string()));
        }

        code_info.instantiate_config = new_config;
        self.registry.put_code(Some(code_id), &code_info)?;
        info!(code_id, permission = %code_info.instantiate_config, "updated code access config");
        Ok(())
    }

    pub fn update_admin(
        &mut self,
        contract: &Address,
        caller: &Address,
        new_admin: Option<Address>,
        authz: &dyn AuthorizationPolicy,
    ) -> Result<()> {
        let mut contract_info = self.modifiable_contract(contract, caller, authz)?;
        contract_info.admin = new_admin;
        self.registry.put_contract(contract, &contract_info);
        info!(
            %contract,
            admin = contract_info.admin.as_ref().map(|a| a.to_string()).unwrap_or_default(),
            "updated contract admin"
        );
        Ok(())
    }

    pub fn clear_admin(&mut self, contract: &Address, caller: &Address, authz: &dyn AuthorizationPolicy) -> Result<()> {
        self.update_admin(contract, caller, None, authz)
    }

    pub fn update_label(
        &mut self,
        contract: &Address,
        caller: &Address,
        new_label: &str,
        authz: &dyn AuthorizationPolicy,
    ) -> Result<()> {
        validate_label(new_label, self.config.limits.max_label_size)?;
        let mut contract_info = self.modifiable_contract(contract, caller, authz)?;
        contract_info.label = new_label.to_string();
        self.registry.put_contract(contract, &contract_info);
        info!(%contract, label = new_label, "updated contract label");
        Ok(())
    }

    /// Move a contract to new code. The caller must be the admin and allowed to instantiate the new code.
    pub fn migrate_contract(
        &mut self,
        contract: &Address,
        caller: &Address,
        new_code_id: CodeID,
        migrate_msg: &[u8],
        authz: &dyn AuthorizationPolicy,
    ) -> Result<Option<Vec<u8>>> {
        let mut contract_info = self.modifiable_contract(contract, caller, authz)?;
        let new_code = self.code_info(new_code_id)?;
        if !authz.can_instantiate_contract(&new_code.instantiate_config, caller) {
            return Err(WasmError::Unauthorized("to use new code".to_string()));
        }

        let data = self
            .engine
            .migrate(&new_code.code_hash, contract, caller, migrate_msg)?;

        let old_code_id = contract_info.code_id;
        self.registry
            .remove_from_code_index(old_code_id, &contract_info.created, contract);
        self.registry
            .add_to_code_index(new_code_id, &contract_info.created, contract);
        contract_info.code_id = new_code_id;
        self.registry.put_contract(contract, &contract_info);

        info!(%contract, from = old_code_id, to = new_code_id, "migrated contract");
        Ok(data)
    }

    /// Delete unreferenced code records up to `max_code_id` and drop their binaries from the engine
    pub fn prune_wasm_codes(&mut self, max_code_id: CodeID) -> Result<Vec<CodeID>> {
        let pruned = self.registry.prune_codes(max_code_id)?;
        for checksum in &pruned.orphaned_checksums {
            if self.engine.has_code(checksum) {
                if let Err(e) = self.engine.remove_code(checksum) {
                    warn!(%checksum, error = %e, "failed to remove pruned code from engine");
                }
            }
            debug!(%checksum, "removed orphaned checksum");
        }
        info!(
            count = pruned.code_ids.len(),
            orphaned = pruned.orphaned_checksums.len(),
            max_code_id,
            "pruned wasm codes"
        );
        Ok(pruned.code_ids)
    }

    fn modifiable_contract(
        &self,
        contract: &Address,
        caller: &Address,
        authz: &dyn AuthorizationPolicy,
    ) -> Result<ContractInfo> {
        let contract_info = self.contract_info(contract)?;
        if !authz.can_modify_contract(contract_info.admin.as_ref(), caller) {
            return Err(WasmError::Unauthorized("can not modify contract".to_string()));
        }
        Ok(contract_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{DefaultAuthorizationPolicy, GovAuthorizationPolicy};
    use crate::engine::MemoryEngine;
    use crate::store::MemStore;
    use crate::types::AccessType;

    fn addr(n: u8) -> Address {
        Address::new(vec![n; 20]).unwrap()
    }

    fn wasm() -> Vec<u8> {
        b"\0asm\x01\0\0\0keeper test".to_vec()
    }

    fn keeper() -> Keeper<MemStore, MemoryEngine> {
        Keeper::new(MemStore::new(), MemoryEngine::new(), WasmConfig::default())
    }

    #[test]
    fn test_store_code_uses_default_permission() {
        let mut k = keeper();
        let creator = addr(1);
        let (code_id, checksum) = k
            .store_code(&creator, &wasm(), None, &DefaultAuthorizationPolicy)
            .unwrap();

        assert_eq!(code_id, 1);
        assert_eq!(checksum, Checksum::generate(&wasm()));
        let info = k.code_info(code_id).unwrap();
        assert_eq!(info.instantiate_config, AccessConfig::Everybody);
        assert!(k.engine().has_code(&checksum));
    }

    #[test]
    fn test_store_code_rejects_unknown_payload_without_writes() {
        let mut k = keeper();
        let err = k
            .store_code(&addr(1), b"not a module", None, &DefaultAuthorizationPolicy)
            .unwrap_err();
        assert!(matches!(err, WasmError::UnrecognizedFormat));
        assert!(k.registry().store().is_empty());
        assert_eq!(k.engine().code_count(), 0);
    }

    #[test]
    fn test_update_instantiate_config_must_stay_within_default() {
        let mut k = keeper();
        let creator = addr(1);
        k.set_params(&Params {
            code_upload_access: AccessConfig::Everybody,
            instantiate_default_permission: AccessType::AnyOfAddresses,
        })
        .unwrap();
        let (code_id, _) = k
            .store_code(&creator, &wasm(), None, &DefaultAuthorizationPolicy)
            .unwrap();

        let err = k
            .update_instantiate_config(code_id, &creator, AccessConfig::Everybody, &DefaultAuthorizationPolicy)
            .unwrap_err();
        assert!(matches!(err, WasmError::Unauthorized(_)));

        k.update_instantiate_config(code_id, &creator, AccessConfig::Nobody, &DefaultAuthorizationPolicy)
            .unwrap();
        assert_eq!(k.code_info(code_id).unwrap().instantiate_config, AccessConfig::Nobody);

        // governance bypasses the creator and subset checks
        k.update_instantiate_config(code_id, &addr(9), AccessConfig::Everybody, &GovAuthorizationPolicy)
            .unwrap();
        assert_eq!(k.code_info(code_id).unwrap().instantiate_config, AccessConfig::Everybody);
    }

    #[test]
    fn test_failed_instantiate_leaves_no_state() {
        let mut k = keeper();
        let creator = addr(1);
        let (code_id, _) = k
            .store_code(&creator, &wasm(), None, &DefaultAuthorizationPolicy)
            .unwrap();
        let before = k.registry().store().clone();

        let err = k
            .instantiate(5, &creator, code_id, None, "label", b"{broken", &DefaultAuthorizationPolicy)
            .unwrap_err();
        assert!(matches!(err, WasmError::Engine(_)));
        assert_eq!(k.registry().store(), &before);

        assert!(matches!(
            k.instantiate(5, &creator, 99, None, "label", b"{}", &DefaultAuthorizationPolicy),
            Err(WasmError::NotFound(_))
        ));
        assert!(matches!(
            k.instantiate(5, &creator, code_id, None, "", b"{}", &DefaultAuthorizationPolicy),
            Err(WasmError::Invalid(_))
        ));
        assert_eq!(k.registry().store(), &before);
    }

    #[test]
    fn test_prune_removes_engine_code() {
        let mut k = keeper();
        let (code_id, checksum) = k
            .store_code(&addr(1), &wasm(), None, &DefaultAuthorizationPolicy)
            .unwrap();

        assert_eq!(k.prune_wasm_codes(u64::MAX).unwrap(), vec![code_id]);
        assert!(!k.engine().has_code(&checksum));
        assert!(matches!(k.code_info(code_id), Err(WasmError::NotFound(_))));
    }
}
