// 3 -> 4: collapse the legacy `OnlyAddress` access type into `AnyOfAddresses`
// in module params and every code record. Records already in the new shape are
// not rewritten.

use tracing::{debug, info};

use super::Migrator;
use crate::error::Result;
use crate::registry::Registry;
use crate::store::KvStore;
use crate::types::{AccessType, Params};

pub struct AccessConfigNormalization;

impl<S: KvStore> Migrator<S> for AccessConfigNormalization {
    fn from_version(&self) -> u64 {
        3
    }

    fn name(&self) -> &'static str {
        "access config normalization"
    }

    fn migrate(&self, registry: &mut Registry<S>) -> Result<()> {
        if registry.has_params() {
            let params = registry.params()?;
            let normalized = Params {
                code_upload_access: params.code_upload_access.normalized(),
                instantiate_default_permission: match params.instantiate_default_permission {
                    AccessType::OnlyAddress => AccessType::AnyOfAddresses,
                    other => other,
                },
            };
            if normalized != params {
                registry.set_params(&normalized)?;
                info!(upload = %normalized.code_upload_access, "normalized params");
            }
        }

        let mut legacy = Vec::new();
        registry.iterate_codes(|code_id, info| {
            if info.instantiate_config.access_type() == AccessType::OnlyAddress {
                legacy.push((code_id, info));
            }
            false
        })?;

        let count = legacy.len();
        for (code_id, mut info) in legacy {
            info.instantiate_config = info.instantiate_config.normalized();
            registry.put_code(Some(code_id), &info)?;
            debug!(code_id, permission = %info.instantiate_config, "normalized code access config");
        }
        info!(count, "normalized code access configs");
        Ok(())
    }
}
