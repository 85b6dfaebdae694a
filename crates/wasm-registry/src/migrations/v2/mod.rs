// 2 -> 3: move module params out of the legacy parameter subspace and into the
// module params key. The legacy entries are removed once the params are written.

use tracing::{info, warn};

use super::Migrator;
use crate::error::{Result, WasmError};
use crate::registry::Registry;
use crate::store::KvStore;
use crate::types::keys::legacy_params_key;
use crate::types::{AccessType, Params};

pub mod legacy;

use legacy::{access_type_from_text, LegacyAccessConfig, PARAM_STORE_KEY_INSTANTIATE_ACCESS, PARAM_STORE_KEY_UPLOAD_ACCESS};

pub struct ParamsRelocation;

fn read_legacy_params<S: KvStore>(registry: &Registry<S>) -> Result<Option<Params>> {
    let upload = registry.store().get(&legacy_params_key(PARAM_STORE_KEY_UPLOAD_ACCESS));
    let instantiate = registry
        .store()
        .get(&legacy_params_key(PARAM_STORE_KEY_INSTANTIATE_ACCESS));

    let (upload, instantiate) = match (upload, instantiate) {
        (None, None) => return Ok(None),
        (Some(u), Some(i)) => (u, i),
        (Some(_), None) => {
            return Err(WasmError::decode("legacy params", "missing instantiateAccess"));
        }
        (None, Some(_)) => return Err(WasmError::decode("legacy params", "missing uploadAccess")),
    };

    let upload: LegacyAccessConfig =
        serde_json::from_slice(&upload).map_err(|e| WasmError::decode("legacy params", e))?;
    let instantiate: String =
        serde_json::from_slice(&instantiate).map_err(|e| WasmError::decode("legacy params", e))?;

    let params = Params {
        code_upload_access: upload
            .to_access_config()
            .map_err(|e| WasmError::decode("legacy params", e))?,
        instantiate_default_permission: access_type_from_text(&instantiate),
    };
    if params.instantiate_default_permission == AccessType::Unspecified {
        return Err(WasmError::decode(
            "legacy params",
            format!("unknown instantiate access {:?}", instantiate),
        ));
    }
    Ok(Some(params))
}

impl<S: KvStore> Migrator<S> for ParamsRelocation {
    fn from_version(&self) -> u64 {
        2
    }

    fn name(&self) -> &'static str {
        "params relocation"
    }

    fn migrate(&self, registry: &mut Registry<S>) -> Result<()> {
        match read_legacy_params(registry)? {
            Some(params) => {
                registry.set_params(&params)?;
                registry
                    .store_mut()
                    .delete(&legacy_params_key(PARAM_STORE_KEY_UPLOAD_ACCESS));
                registry
                    .store_mut()
                    .delete(&legacy_params_key(PARAM_STORE_KEY_INSTANTIATE_ACCESS));
                info!(
                    upload = %params.code_upload_access,
                    instantiate_default = %params.instantiate_default_permission,
                    "relocated legacy params"
                );
            }
            None if registry.has_params() => {
                info!("no legacy params found, keeping module params");
            }
            None => {
                warn!("no legacy params found, writing defaults");
                registry.set_params(&Params::default())?;
            }
        }
        Ok(())
    }
}
