/// Store Migrations
///
/// A linear chain of in-place rewrites, one `Migrator` per schema version
/// boundary. The schema version marker only moves after a step completes, and a
/// failing step is rolled back to the state it started from.

use std::collections::BTreeMap;

use tracing::{error, info};

use crate::config::MigrationsConfig;
use crate::error::{Result, WasmError};
use crate::registry::Registry;
use crate::store::KvStore;

pub mod v1;
pub mod v2;
pub mod v3;
pub mod v4;
pub mod v5;

/// Schema version of a store that has never recorded one
pub const INITIAL_VERSION: u64 = 1;

/// Schema version written by this release
pub const CONSENSUS_VERSION: u64 = 6;

/// One schema version boundary, `from_version() -> from_version() + 1`
pub trait Migrator<S: KvStore> {
    fn from_version(&self) -> u64;

    fn name(&self) -> &'static str;

    fn migrate(&self, registry: &mut Registry<S>) -> Result<()>;
}

pub struct MigrationChain<S: KvStore> {
    steps: BTreeMap<u64, Box<dyn Migrator<S>>>,
}

impl<S: KvStore + Clone> MigrationChain<S> {
    pub fn new() -> Self {
        Self { steps: BTreeMap::new() }
    }

    /// The module's registered steps from version 1 up to `CONSENSUS_VERSION`
    pub fn module_default(config: &MigrationsConfig) -> Self
    where
        S: 'static,
    {
        let mut chain = Self::new();
        chain.steps.insert(1, Box::new(v1::CreatorIndexBackfill));
        chain.steps.insert(2, Box::new(v2::ParamsRelocation));
        chain.steps.insert(3, Box::new(v3::AccessConfigNormalization));
        chain.steps.insert(4, Box::new(v4::ContractInfoFieldOrderRepair));
        chain.steps.insert(5, Box::new(v5::PruneUnreferencedCodes::new(config.prune_watermark())));
        chain
    }

    pub fn register(&mut self, step: Box<dyn Migrator<S>>) -> Result<()> {
        let from = step.from_version();
        if self.steps.contains_key(&from) {
            return Err(WasmError::Duplicate(format!("migration from version {}", from)));
        }
        self.steps.insert(from, step);
        Ok(())
    }

    /// Highest version reachable from `INITIAL_VERSION` without a gap
    pub fn latest_version(&self) -> u64 {
        let mut version = INITIAL_VERSION;
        while self.steps.contains_key(&version) {
            version += 1;
        }
        version
    }

    /// Run every step from `current` to `target` in ascending order; returns the version reached.
    pub fn run(&self, registry: &mut Registry<S>, current: u64, target: u64) -> Result<u64> {
        if target < current {
            return Err(WasmError::Invalid(format!(
                "cannot migrate backwards from version {} to {}",
                current, target
            )));
        }
        for from in current..target {
            let to = from + 1;
            let step = self.steps.get(&from).ok_or_else(|| WasmError::MigrationAborted {
                from,
                to,
                source: Box::new(WasmError::NotFound(format!("migration from version {}", from))),
            })?;

            info!(from, to, step = step.name(), "running store migration");
            let checkpoint = registry.store().clone();
            if let Err(e) = step.migrate(registry) {
                *registry.store_mut() = checkpoint;
                error!(from, to, step = step.name(), error = %e, "store migration failed");
                return Err(WasmError::MigrationAborted {
                    from,
                    to,
                    source: Box::new(e),
                });
            }
            registry.set_schema_version(to);
            info!(from, to, step = step.name(), "store migration complete");
        }
        Ok(target)
    }

    /// Migrate from the persisted schema version to `target`
    pub fn upgrade(&self, registry: &mut Registry<S>, target: u64) -> Result<u64> {
        let current = registry.schema_version()?.unwrap_or(INITIAL_VERSION);
        if current == target {
            info!(version = current, "store schema is up to date");
            return Ok(current);
        }
        self.run(registry, current, target)
    }
}

impl<S: KvStore + Clone> Default for MigrationChain<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    struct Touch(u64);

    impl Migrator<MemStore> for Touch {
        fn from_version(&self) -> u64 {
            self.0
        }

        fn name(&self) -> &'static str {
            "touch"
        }

        fn migrate(&self, registry: &mut Registry<MemStore>) -> Result<()> {
            registry.store_mut().set(&[0xAA, self.0 as u8], b"done");
            Ok(())
        }
    }

    struct Fail;

    impl Migrator<MemStore> for Fail {
        fn from_version(&self) -> u64 {
            2
        }

        fn name(&self) -> &'static str {
            "fail"
        }

        fn migrate(&self, registry: &mut Registry<MemStore>) -> Result<()> {
            registry.store_mut().set(b"half-written", b"x");
            Err(WasmError::Invalid("boom".to_string()))
        }
    }

    #[test]
    fn test_run_advances_marker_per_step() {
        let mut chain: MigrationChain<MemStore> = MigrationChain::new();
        chain.register(Box::new(Touch(1))).unwrap();
        chain.register(Box::new(Touch(2))).unwrap();
        assert!(chain.register(Box::new(Touch(2))).is_err());
        assert_eq!(chain.latest_version(), 3);

        let mut registry = Registry::new(MemStore::new());
        assert_eq!(chain.upgrade(&mut registry, 3).unwrap(), 3);
        assert_eq!(registry.schema_version().unwrap(), Some(3));
        assert!(registry.store().has(&[0xAA, 1]));
        assert!(registry.store().has(&[0xAA, 2]));

        // already at target
        let before = registry.store().clone();
        assert_eq!(chain.upgrade(&mut registry, 3).unwrap(), 3);
        assert_eq!(registry.store(), &before);
    }

    #[test]
    fn test_failed_step_rolls_back_and_keeps_marker() {
        let mut chain: MigrationChain<MemStore> = MigrationChain::new();
        chain.register(Box::new(Touch(1))).unwrap();
        chain.register(Box::new(Fail)).unwrap();
        chain.register(Box::new(Touch(3))).unwrap();

        let mut registry = Registry::new(MemStore::new());
        let err = chain.run(&mut registry, 1, 4).unwrap_err();

        assert!(matches!(err, WasmError::MigrationAborted { from: 2, to: 3, .. }));
        assert!(err.is_fatal());
        assert_eq!(registry.schema_version().unwrap(), Some(2));
        assert!(!registry.store().has(b"half-written"));
        assert!(!registry.store().has(&[0xAA, 3]));
    }

    #[test]
    fn test_missing_step_aborts() {
        let mut chain: MigrationChain<MemStore> = MigrationChain::new();
        chain.register(Box::new(Touch(1))).unwrap();

        let mut registry = Registry::new(MemStore::new());
        let err = chain.run(&mut registry, 1, 3).unwrap_err();
        assert!(matches!(err, WasmError::MigrationAborted { from: 2, to: 3, .. }));
        assert_eq!(registry.schema_version().unwrap(), Some(2));

        assert!(chain.run(&mut registry, 3, 2).is_err());
    }

    #[test]
    fn test_module_default_reaches_consensus_version() {
        let chain: MigrationChain<MemStore> = MigrationChain::module_default(&MigrationsConfig::default());
        assert_eq!(chain.latest_version(), CONSENSUS_VERSION);
    }
}
