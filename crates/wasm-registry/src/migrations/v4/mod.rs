// 4 -> 5: rewrite every contract record from the swapped field layout into the
// live one. This is the only pass that tolerates unreadable records: an entry
// that does not decode under the legacy layout is logged and left as it is.

use prost::Message;
use tracing::{info, warn};

use super::Migrator;
use crate::address::Address;
use crate::error::Result;
use crate::registry::Registry;
use crate::store::KvStore;
use crate::types::codec::RawContractInfo;
use crate::types::keys::CONTRACT_KEY_PREFIX;
use crate::types::ContractInfo;

pub mod legacy;

use legacy::LegacyContractInfo;

pub struct ContractInfoFieldOrderRepair;

fn repair(key: &[u8], value: &[u8]) -> std::result::Result<(Address, ContractInfo), String> {
    let address = Address::new(key[1..].to_vec()).map_err(|e| e.to_string())?;
    let legacy = LegacyContractInfo::decode(value).map_err(|e| e.to_string())?;
    let info = ContractInfo::try_from(RawContractInfo::from(legacy)).map_err(|e| e.to_string())?;
    Ok((address, info))
}

impl<S: KvStore> Migrator<S> for ContractInfoFieldOrderRepair {
    fn from_version(&self) -> u64 {
        4
    }

    fn name(&self) -> &'static str {
        "contract info field order repair"
    }

    fn migrate(&self, registry: &mut Registry<S>) -> Result<()> {
        let mut repaired = 0usize;
        let mut skipped = 0usize;
        for (key, value) in registry.store().prefix_entries(&[CONTRACT_KEY_PREFIX]) {
            match repair(&key, &value) {
                Ok((address, info)) => {
                    registry.put_contract(&address, &info);
                    repaired += 1;
                }
                Err(reason) => {
                    warn!(key = %hex::encode(&key), %reason, "skipping contract record that does not decode under the legacy layout");
                    skipped += 1;
                }
            }
        }
        info!(repaired, skipped, "repaired contract info field order");
        Ok(())
    }
}
