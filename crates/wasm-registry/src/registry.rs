/// Code and Contract Registry
///
/// Keyed storage of code and contract records with their secondary indexes,
/// id sequences, module params and the schema version marker. Every read that
/// fails to decode is returned as an error; corrupt entries are never skipped.

use std::collections::BTreeSet;

use tracing::debug;

use crate::address::Address;
use crate::error::{Result, WasmError};
use crate::store::KvStore;
use crate::types::keys;
use crate::types::records::ABSOLUTE_TX_POSITION_LEN;
use crate::types::{AbsoluteTxPosition, Checksum, CodeID, CodeInfo, ContractInfo, Params, StoreCodec};

/// Outcome of a pruning pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrunedCodes {
    pub code_ids: Vec<CodeID>,
    /// Checksums no remaining code record uses
    pub orphaned_checksums: Vec<Checksum>,
}

/// Typed view over a `KvStore` holding the x/wasm module state
#[derive(Debug)]
pub struct Registry<S> {
    store: S,
}

fn read_u64(kind: &'static str, bytes: &[u8]) -> Result<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| WasmError::decode(kind, format!("expected 8 bytes, got {}", bytes.len())))?;
    Ok(u64::from_be_bytes(arr))
}

fn read_code_id(key: &[u8]) -> Result<CodeID> {
    read_u64("code key", &key[1..])
}

impl<S: KvStore> Registry<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Raw store access for migrations that must read older layouts
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    fn get_record<T: StoreCodec>(&self, key: &[u8]) -> Result<Option<T>> {
        self.store.get(key).map(|bz| T::from_store_bytes(&bz)).transpose()
    }

    // Sequences

    /// Next value of the sequence without incrementing it; sequences start at 1
    pub fn peek_auto_increment_id(&self, sequence_key: &[u8]) -> Result<u64> {
        match self.store.get(sequence_key) {
            Some(bz) => read_u64("sequence", &bz),
            None => Ok(1),
        }
    }

    /// Return the next value of the sequence and advance it
    pub fn auto_increment_id(&mut self, sequence_key: &[u8]) -> Result<u64> {
        let id = self.peek_auto_increment_id(sequence_key)?;
        let next = id
            .checked_add(1)
            .ok_or_else(|| WasmError::Invalid("sequence overflow".to_string()))?;
        self.store.set(sequence_key, &next.to_be_bytes());
        Ok(id)
    }

    /// Assign the creation position for the next write at `block_height`.
    ///
    /// Positions within a block count up from zero; heights must not go backwards.
    pub fn next_position(&mut self, block_height: u64) -> Result<AbsoluteTxPosition> {
        let position = self.peek_position(block_height)?;
        self.store.set(&keys::tx_counter_key(), &position.to_bytes());
        Ok(position)
    }

    /// Position the next write at `block_height` would get, without recording it
    pub fn peek_position(&self, block_height: u64) -> Result<AbsoluteTxPosition> {
        let position = match self.store.get(&keys::tx_counter_key()) {
            None => AbsoluteTxPosition::new(block_height, 0),
            Some(bz) => {
                let last = AbsoluteTxPosition::from_bytes(&bz)?;
                if block_height < last.block_height {
                    return Err(WasmError::Invalid(format!(
                        "block height {} is before last recorded height {}",
                        block_height, last.block_height
                    )));
                }
                if block_height == last.block_height {
                    AbsoluteTxPosition::new(block_height, last.tx_index + 1)
                } else {
                    AbsoluteTxPosition::new(block_height, 0)
                }
            }
        };
        Ok(position)
    }

    // Params and schema version

    /// Module params; defaults when none were stored yet
    pub fn params(&self) -> Result<Params> {
        Ok(self.get_record(&keys::PARAMS_KEY)?.unwrap_or_default())
    }

    pub fn has_params(&self) -> bool {
        self.store.has(&keys::PARAMS_KEY)
    }

    pub fn set_params(&mut self, params: &Params) -> Result<()> {
        params.validate()?;
        self.store.set(&keys::PARAMS_KEY, &params.to_store_bytes());
        Ok(())
    }

    pub fn schema_version(&self) -> Result<Option<u64>> {
        self.store
            .get(&keys::SCHEMA_VERSION_KEY)
            .map(|bz| read_u64("schema version", &bz))
            .transpose()
    }

    pub fn set_schema_version(&mut self, version: u64) {
        self.store.set(&keys::SCHEMA_VERSION_KEY, &version.to_be_bytes());
    }

    // Codes

    /// Write a code record, allocating the next CodeID when none is given.
    ///
    /// Writing an explicit id rewrites that record and keeps the sequence ahead of it,
    /// so retrying the same write is a no-op.
    pub fn put_code(&mut self, code_id: Option<CodeID>, info: &CodeInfo) -> Result<CodeID> {
        info.instantiate_config.validate()?;
        let seq_key = keys::key_last_code_id();
        let code_id = match code_id {
            Some(id) => {
                if id == 0 {
                    return Err(WasmError::Invalid("code id 0 is reserved".to_string()));
                }
                if id >= self.peek_auto_increment_id(&seq_key)? {
                    let next = id
                        .checked_add(1)
                        .ok_or_else(|| WasmError::Invalid("sequence overflow".to_string()))?;
                    self.store.set(&seq_key, &next.to_be_bytes());
                }
                id
            }
            None => self.auto_increment_id(&seq_key)?,
        };
        self.store.set(&keys::code_key(code_id), &info.to_store_bytes());
        debug!(code_id, checksum = %info.code_hash, "stored code info");
        Ok(code_id)
    }

    pub fn get_code(&self, code_id: CodeID) -> Result<Option<CodeInfo>> {
        self.get_record(&keys::code_key(code_id))
    }

    pub fn has_code(&self, code_id: CodeID) -> bool {
        self.store.has(&keys::code_key(code_id))
    }

    pub fn delete_code(&mut self, code_id: CodeID) {
        self.store.delete(&keys::code_key(code_id));
    }

    /// Visit code records in ascending CodeID order; return `true` from the visitor to stop
    pub fn iterate_codes<F>(&self, mut visitor: F) -> Result<()>
    where
        F: FnMut(CodeID, CodeInfo) -> bool,
    {
        for (key, value) in self.store.prefix_entries(&[keys::CODE_KEY_PREFIX]) {
            let code_id = read_code_id(&key)?;
            let info = CodeInfo::from_store_bytes(&value)?;
            if visitor(code_id, info) {
                break;
            }
        }
        Ok(())
    }

    /// True when some code record other than `except` uses `checksum`
    pub fn is_checksum_in_use(&self, checksum: &Checksum, except: Option<CodeID>) -> Result<bool> {
        let mut found = false;
        self.iterate_codes(|id, info| {
            found = Some(id) != except && info.code_hash == *checksum;
            found
        })?;
        Ok(found)
    }

    // Contracts

    pub fn put_contract(&mut self, address: &Address, info: &ContractInfo) {
        self.store
            .set(&keys::contract_address_key(address), &info.to_store_bytes());
    }

    pub fn get_contract(&self, address: &Address) -> Result<Option<ContractInfo>> {
        self.get_record(&keys::contract_address_key(address))
    }

    pub fn has_contract(&self, address: &Address) -> bool {
        self.store.has(&keys::contract_address_key(address))
    }

    /// Visit contracts ordered by address bytes; return `true` from the visitor to stop
    pub fn iterate_contracts<F>(&self, mut visitor: F) -> Result<()>
    where
        F: FnMut(Address, ContractInfo) -> bool,
    {
        for (key, value) in self.store.prefix_entries(&[keys::CONTRACT_KEY_PREFIX]) {
            let address = Address::new(key[1..].to_vec()).map_err(|e| WasmError::decode("contract key", e))?;
            let info = ContractInfo::from_store_bytes(&value)?;
            if visitor(address, info) {
                break;
            }
        }
        Ok(())
    }

    /// All contracts ordered by creation position, for replay in global order
    pub fn iterate_contracts_by_creation_order(&self) -> Result<Vec<(Address, ContractInfo)>> {
        let mut contracts = Vec::new();
        self.iterate_contracts(|addr, info| {
            contracts.push((addr, info));
            false
        })?;
        contracts.sort_by(|(a_addr, a), (b_addr, b)| a.created.cmp(&b.created).then_with(|| a_addr.cmp(b_addr)));
        Ok(contracts)
    }

    // Secondary indexes

    pub fn add_to_creator_index(&mut self, creator: &Address, position: &AbsoluteTxPosition, contract: &Address) {
        self.store
            .set(&keys::contract_by_creator_key(creator, position, contract), &[]);
    }

    /// Contracts created by `creator`, oldest first
    pub fn iterate_by_creator(&self, creator: &Address) -> Result<Vec<Address>> {
        let prefix = keys::contracts_by_creator_prefix(creator);
        self.index_addresses(&prefix)
    }

    pub fn add_to_code_index(&mut self, code_id: CodeID, position: &AbsoluteTxPosition, contract: &Address) {
        self.store
            .set(&keys::contract_by_code_id_key(code_id, position, contract), &[]);
    }

    pub fn remove_from_code_index(&mut self, code_id: CodeID, position: &AbsoluteTxPosition, contract: &Address) {
        self.store
            .delete(&keys::contract_by_code_id_key(code_id, position, contract));
    }

    /// Contracts currently running `code_id`, oldest first
    pub fn iterate_contracts_by_code(&self, code_id: CodeID) -> Result<Vec<Address>> {
        self.index_addresses(&keys::contract_by_code_id_prefix(code_id))
    }

    fn index_addresses(&self, prefix: &[u8]) -> Result<Vec<Address>> {
        self.store
            .prefix_entries(prefix)
            .into_iter()
            .map(|(key, _)| {
                let start = prefix.len() + ABSOLUTE_TX_POSITION_LEN;
                if key.len() <= start {
                    return Err(WasmError::decode("index key", "truncated entry"));
                }
                Address::new(key[start..].to_vec()).map_err(|e| WasmError::decode("index key", e))
            })
            .collect()
    }

    /// Drop both secondary indexes and derive them again from contract records
    pub fn rebuild_secondary_indexes(&mut self) -> Result<usize> {
        for prefix in [keys::CONTRACTS_BY_CREATOR_PREFIX, keys::CONTRACT_BY_CODE_ID_PREFIX] {
            for (key, _) in self.store.prefix_entries(&[prefix]) {
                self.store.delete(&key);
            }
        }
        let mut contracts = Vec::new();
        self.iterate_contracts(|addr, info| {
            contracts.push((addr, info));
            false
        })?;
        for (addr, info) in &contracts {
            self.add_to_creator_index(&info.creator, &info.created, addr);
            self.add_to_code_index(info.code_id, &info.created, addr);
        }
        Ok(contracts.len())
    }

    /// Code ids referenced by any contract record or code index entry
    pub fn referenced_code_ids(&self) -> Result<BTreeSet<CodeID>> {
        let mut referenced = BTreeSet::new();
        self.iterate_contracts(|_, info| {
            referenced.insert(info.code_id);
            false
        })?;
        for (key, _) in self.store.prefix_entries(&[keys::CONTRACT_BY_CODE_ID_PREFIX]) {
            if key.len() < 9 {
                return Err(WasmError::decode("index key", "truncated entry"));
            }
            referenced.insert(read_u64("index key", &key[1..9])?);
        }
        Ok(referenced)
    }

    /// Delete code records with id up to `max_code_id` that no contract references.
    ///
    /// References come from the contract records themselves, so a missing or stale
    /// code index never lets a live code be deleted.
    pub fn prune_codes(&mut self, max_code_id: CodeID) -> Result<PrunedCodes> {
        let referenced = self.referenced_code_ids()?;
        let mut candidates = Vec::new();
        self.iterate_codes(|code_id, info| {
            if code_id > max_code_id {
                return true;
            }
            candidates.push((code_id, info.code_hash));
            false
        })?;

        let mut result = PrunedCodes::default();
        let mut removed = Vec::new();
        for (code_id, checksum) in candidates {
            if referenced.contains(&code_id) {
                continue;
            }
            self.delete_code(code_id);
            result.code_ids.push(code_id);
            removed.push(checksum);
        }

        removed.sort();
        removed.dedup();
        for checksum in removed {
            if !self.is_checksum_in_use(&checksum, None)? {
                result.orphaned_checksums.push(checksum);
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use crate::types::AccessConfig;

    fn addr(n: u8) -> Address {
        Address::new(vec![n; 20]).unwrap()
    }

    fn code_info(n: u8) -> CodeInfo {
        CodeInfo::new(Checksum([n; 32]), addr(n), AccessConfig::Everybody)
    }

    fn registry() -> Registry<MemStore> {
        Registry::new(MemStore::new())
    }

    #[test]
    fn test_code_ids_are_sequential() {
        let mut reg = registry();
        let ids: Vec<CodeID> = (1..=5).map(|n| reg.put_code(None, &code_info(n)).unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(reg.peek_auto_increment_id(&keys::key_last_code_id()).unwrap(), 6);
    }

    #[test]
    fn test_put_code_retry_is_idempotent() {
        let mut reg = registry();
        let id = reg.put_code(None, &code_info(1)).unwrap();
        let before = reg.store().clone();

        reg.put_code(Some(id), &code_info(1)).unwrap();
        assert_eq!(reg.store(), &before);
        assert_eq!(reg.put_code(None, &code_info(2)).unwrap(), 2);
    }

    #[test]
    fn test_explicit_code_id_moves_sequence() {
        let mut reg = registry();
        reg.put_code(Some(10), &code_info(1)).unwrap();
        assert_eq!(reg.put_code(None, &code_info(2)).unwrap(), 11);
        assert!(reg.put_code(Some(0), &code_info(3)).is_err());
    }

    #[test]
    fn test_iterate_codes_ascending_with_early_stop() {
        let mut reg = registry();
        for id in [300u64, 2, 256, 1] {
            reg.put_code(Some(id), &code_info(id as u8)).unwrap();
        }
        let mut seen = Vec::new();
        reg.iterate_codes(|id, _| {
            seen.push(id);
            false
        })
        .unwrap();
        assert_eq!(seen, vec![1, 2, 256, 300]);

        let mut first = Vec::new();
        reg.iterate_codes(|id, _| {
            first.push(id);
            first.len() == 2
        })
        .unwrap();
        assert_eq!(first, vec![1, 2]);
    }

    #[test]
    fn test_corrupt_code_record_surfaces() {
        let mut reg = registry();
        reg.put_code(None, &code_info(1)).unwrap();
        reg.store_mut().set(&keys::code_key(2), &[0x0a, 0xff]);

        assert!(matches!(reg.get_code(2), Err(WasmError::DecodeFailure { .. })));
        assert!(reg.iterate_codes(|_, _| false).is_err());
    }

    #[test]
    fn test_positions_are_unique_and_ordered() {
        let mut reg = registry();
        let p1 = reg.next_position(10).unwrap();
        let p2 = reg.next_position(10).unwrap();
        let p3 = reg.next_position(11).unwrap();

        assert_eq!(p1, AbsoluteTxPosition::new(10, 0));
        assert_eq!(p2, AbsoluteTxPosition::new(10, 1));
        assert_eq!(p3, AbsoluteTxPosition::new(11, 0));
        assert!(reg.next_position(9).is_err());
    }

    #[test]
    fn test_creator_and_code_indexes() {
        let mut reg = registry();
        let creator = addr(1);
        let (c1, c2) = (addr(0xF0), addr(0x0F));
        let p1 = AbsoluteTxPosition::new(1, 0);
        let p2 = AbsoluteTxPosition::new(2, 0);

        for (contract, pos) in [(&c1, &p1), (&c2, &p2)] {
            reg.put_contract(contract, &ContractInfo::new(1, creator.clone(), None, "l".into(), *pos));
            reg.add_to_creator_index(&creator, pos, contract);
            reg.add_to_code_index(1, pos, contract);
        }

        // creation order, not address order
        assert_eq!(reg.iterate_by_creator(&creator).unwrap(), vec![c1.clone(), c2.clone()]);
        assert_eq!(reg.iterate_contracts_by_code(1).unwrap(), vec![c1.clone(), c2.clone()]);
        assert!(reg.iterate_by_creator(&addr(2)).unwrap().is_empty());

        reg.remove_from_code_index(1, &p1, &c1);
        assert_eq!(reg.iterate_contracts_by_code(1).unwrap(), vec![c2]);
    }

    #[test]
    fn test_contract_iteration_orders() {
        let mut reg = registry();
        let late = addr(0x01);
        let early = addr(0x02);
        reg.put_contract(&late, &ContractInfo::new(1, addr(9), None, "a".into(), AbsoluteTxPosition::new(5, 0)));
        reg.put_contract(&early, &ContractInfo::new(1, addr(9), None, "b".into(), AbsoluteTxPosition::new(1, 0)));

        let mut by_address = Vec::new();
        reg.iterate_contracts(|a, _| {
            by_address.push(a);
            false
        })
        .unwrap();
        assert_eq!(by_address, vec![late.clone(), early.clone()]);

        let by_creation: Vec<Address> = reg
            .iterate_contracts_by_creation_order()
            .unwrap()
            .into_iter()
            .map(|(a, _)| a)
            .collect();
        assert_eq!(by_creation, vec![early, late]);
    }

    #[test]
    fn test_rebuild_secondary_indexes() {
        let mut reg = registry();
        let creator = addr(1);
        let contract = addr(0xAA);
        let pos = AbsoluteTxPosition::new(3, 0);
        reg.put_contract(&contract, &ContractInfo::new(4, creator.clone(), None, "x".into(), pos));
        // stale entry without a primary record
        reg.add_to_creator_index(&creator, &AbsoluteTxPosition::new(1, 0), &addr(0xBB));

        assert_eq!(reg.rebuild_secondary_indexes().unwrap(), 1);
        assert_eq!(reg.iterate_by_creator(&creator).unwrap(), vec![contract.clone()]);
        assert_eq!(reg.iterate_contracts_by_code(4).unwrap(), vec![contract]);
    }

    #[test]
    fn test_params_default_and_roundtrip() {
        let mut reg = registry();
        assert!(!reg.has_params());
        assert_eq!(reg.params().unwrap(), Params::default());

        let params = Params {
            code_upload_access: AccessConfig::Nobody,
            instantiate_default_permission: crate::types::AccessType::AnyOfAddresses,
        };
        reg.set_params(&params).unwrap();
        assert_eq!(reg.params().unwrap(), params);
    }

    #[test]
    fn test_schema_version_marker() {
        let mut reg = registry();
        assert_eq!(reg.schema_version().unwrap(), None);
        reg.set_schema_version(4);
        assert_eq!(reg.schema_version().unwrap(), Some(4));
    }

    #[test]
    fn test_prune_keeps_referenced_codes() {
        let mut reg = registry();
        for n in 1..=3 {
            reg.put_code(None, &code_info(n)).unwrap();
        }
        // code 4 shares its checksum with code 1
        reg.put_code(None, &code_info(1)).unwrap();
        let contract = addr(0xCC);
        let pos = AbsoluteTxPosition::new(1, 0);
        reg.add_to_code_index(2, &pos, &contract);

        let pruned = reg.prune_codes(3).unwrap();

        assert!(reg.has_code(2));
        assert!(!reg.has_code(1));
        assert!(!reg.has_code(3));
        assert!(reg.has_code(4));
        assert_eq!(pruned.code_ids, vec![1, 3]);
        assert_eq!(pruned.orphaned_checksums, vec![Checksum([3; 32])]);
    }

    #[test]
    fn test_prune_keeps_codes_of_unindexed_contracts() {
        let mut reg = registry();
        reg.put_code(None, &code_info(1)).unwrap();
        reg.put_code(None, &code_info(2)).unwrap();
        // primary record only, no code index entry
        let contract = addr(0xDD);
        reg.put_contract(&contract, &ContractInfo::new(1, addr(1), None, "l".into(), AbsoluteTxPosition::new(1, 0)));

        let pruned = reg.prune_codes(u64::MAX).unwrap();

        assert!(reg.has_code(1));
        assert!(!reg.has_code(2));
        assert_eq!(pruned.code_ids, vec![2]);
    }

    #[test]
    fn test_put_code_at_max_id_does_not_overflow() {
        let mut reg = registry();
        let before = reg.store().clone();
        assert!(matches!(
            reg.put_code(Some(u64::MAX), &code_info(1)),
            Err(WasmError::Invalid(_))
        ));
        assert_eq!(reg.store(), &before);

        reg.put_code(Some(u64::MAX - 1), &code_info(1)).unwrap();
        assert_eq!(reg.peek_auto_increment_id(&keys::key_last_code_id()).unwrap(), u64::MAX);
    }
}
