// Store key layout. Every key starts with a one byte prefix; numeric parts are
// big-endian so lexicographic iteration matches numeric order.

use super::records::{AbsoluteTxPosition, CodeID};
use crate::address::Address;

pub const CODE_KEY_PREFIX: u8 = 0x01;
pub const CONTRACT_KEY_PREFIX: u8 = 0x02;
pub const SEQUENCE_KEY_PREFIX: u8 = 0x04;
pub const CONTRACT_BY_CODE_ID_PREFIX: u8 = 0x06;
pub const TX_COUNTER_PREFIX: u8 = 0x08;
pub const CONTRACTS_BY_CREATOR_PREFIX: u8 = 0x09;
pub const LEGACY_PARAMS_SUBSPACE_PREFIX: u8 = 0x0F;
pub const PARAMS_KEY: [u8; 1] = [0x10];
pub const SCHEMA_VERSION_KEY: [u8; 1] = [0x11];

pub fn key_last_code_id() -> Vec<u8> {
    sequence_key(b"lastCodeId")
}

pub fn key_last_instance_id() -> Vec<u8> {
    sequence_key(b"lastContractId")
}

pub fn tx_counter_key() -> Vec<u8> {
    vec![TX_COUNTER_PREFIX]
}

fn sequence_key(name: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + name.len());
    key.push(SEQUENCE_KEY_PREFIX);
    key.extend_from_slice(name);
    key
}

/// `0x01 | code_id`
pub fn code_key(code_id: CodeID) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(CODE_KEY_PREFIX);
    key.extend_from_slice(&code_id.to_be_bytes());
    key
}

/// `0x02 | contract_addr`
pub fn contract_address_key(addr: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + addr.len());
    key.push(CONTRACT_KEY_PREFIX);
    key.extend_from_slice(addr.as_bytes());
    key
}

/// `0x06 | code_id`
pub fn contract_by_code_id_prefix(code_id: CodeID) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(CONTRACT_BY_CODE_ID_PREFIX);
    key.extend_from_slice(&code_id.to_be_bytes());
    key
}

/// `0x06 | code_id | created | contract_addr`
pub fn contract_by_code_id_key(code_id: CodeID, created: &AbsoluteTxPosition, contract: &Address) -> Vec<u8> {
    let mut key = contract_by_code_id_prefix(code_id);
    key.extend_from_slice(&created.to_bytes());
    key.extend_from_slice(contract.as_bytes());
    key
}

/// `0x09 | len(creator) | creator`
pub fn contracts_by_creator_prefix(creator: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + creator.len());
    key.push(CONTRACTS_BY_CREATOR_PREFIX);
    // addresses are capped at 255 bytes
    key.push(creator.len() as u8);
    key.extend_from_slice(creator.as_bytes());
    key
}

/// `0x09 | len(creator) | creator | created | contract_addr`
pub fn contract_by_creator_key(creator: &Address, created: &AbsoluteTxPosition, contract: &Address) -> Vec<u8> {
    let mut key = contracts_by_creator_prefix(creator);
    key.extend_from_slice(&created.to_bytes());
    key.extend_from_slice(contract.as_bytes());
    key
}

/// `0x0F | name`, the parameter subspace used before params moved into the module store
pub fn legacy_params_key(name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + name.len());
    key.push(LEGACY_PARAMS_SUBSPACE_PREFIX);
    key.extend_from_slice(name.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_keys_sort_numerically() {
        assert!(code_key(2) < code_key(256));
        assert!(code_key(255) < code_key(256));
    }

    #[test]
    fn test_index_keys_share_prefix() {
        let creator = Address::new(vec![1u8; 20]).unwrap();
        let contract = Address::new(vec![2u8; 32]).unwrap();
        let pos = AbsoluteTxPosition::new(5, 1);

        let key = contract_by_creator_key(&creator, &pos, &contract);
        assert!(key.starts_with(&contracts_by_creator_prefix(&creator)));
        assert_eq!(key.len(), 2 + 20 + 16 + 32);

        let key = contract_by_code_id_key(3, &pos, &contract);
        assert!(key.starts_with(&contract_by_code_id_prefix(3)));
    }
}
