// 1 -> 2: backfill the creator secondary index from contract records.
// Index writes are keyed by the record itself, so restarting the pass rewrites
// the same entries.

use tracing::info;

use super::Migrator;
use crate::error::Result;
use crate::registry::Registry;
use crate::store::KvStore;

pub struct CreatorIndexBackfill;

impl<S: KvStore> Migrator<S> for CreatorIndexBackfill {
    fn from_version(&self) -> u64 {
        1
    }

    fn name(&self) -> &'static str {
        "creator index backfill"
    }

    fn migrate(&self, registry: &mut Registry<S>) -> Result<()> {
        let mut contracts = Vec::new();
        registry.iterate_contracts(|address, info| {
            contracts.push((address, info.creator, info.created));
            false
        })?;

        for (address, creator, created) in &contracts {
            registry.add_to_creator_index(creator, created, address);
        }
        info!(count = contracts.len(), "backfilled creator index");
        Ok(())
    }
}
