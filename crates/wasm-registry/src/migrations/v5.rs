// 5 -> 6: delete code records up to a watermark that no contract references.
// References come from the contract records and the code index; the binaries of orphaned
// checksums are left for the engine owner to collect.

use tracing::info;

use super::Migrator;
use crate::error::Result;
use crate::registry::Registry;
use crate::store::KvStore;
use crate::types::CodeID;

pub struct PruneUnreferencedCodes {
    max_code_id: CodeID,
}

impl PruneUnreferencedCodes {
    pub fn new(max_code_id: CodeID) -> Self {
        Self { max_code_id }
    }
}

impl<S: KvStore> Migrator<S> for PruneUnreferencedCodes {
    fn from_version(&self) -> u64 {
        5
    }

    fn name(&self) -> &'static str {
        "prune unreferenced codes"
    }

    fn migrate(&self, registry: &mut Registry<S>) -> Result<()> {
        let pruned = registry.prune_codes(self.max_code_id)?;
        for checksum in &pruned.orphaned_checksums {
            info!(%checksum, "checksum no longer referenced by any code");
        }
        info!(
            count = pruned.code_ids.len(),
            max_code_id = self.max_code_id,
            "pruned unreferenced codes"
        );
        Ok(())
    }
}
