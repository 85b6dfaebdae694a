// JSON snapshot files of a store: an object of hex keys to hex values

use std::collections::BTreeMap;
use std::path::Path;

use super::MemStore;
use crate::error::{Result, WasmError};

/// Load a store snapshot from a JSON file
pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<MemStore> {
    let content = std::fs::read_to_string(path)?;
    let encoded: BTreeMap<String, String> =
        serde_json::from_str(&content).map_err(|e| WasmError::decode("snapshot", e))?;

    encoded
        .into_iter()
        .map(|(k, v)| {
            let key = hex::decode(&k).map_err(|e| WasmError::decode("snapshot key", e))?;
            let value = hex::decode(&v).map_err(|e| WasmError::decode("snapshot value", e))?;
            Ok::<_, WasmError>((key, value))
        })
        .collect()
}

/// Save a store snapshot to a JSON file
pub fn save_snapshot<P: AsRef<Path>>(store: &MemStore, path: P) -> Result<()> {
    let encoded: BTreeMap<String, String> = store
        .iter()
        .map(|(k, v)| (hex::encode(k), hex::encode(v)))
        .collect();
    let content = serde_json::to_string_pretty(&encoded)
        .map_err(|e| WasmError::Invalid(format!("snapshot serialization: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::KvStore;

    #[test]
    fn test_snapshot_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let mut store = MemStore::new();
        store.set(&[0x01, 0, 0, 0, 0, 0, 0, 0, 1], &[0xde, 0xad]);
        store.set(&[0x11], &[0, 0, 0, 0, 0, 0, 0, 5]);

        save_snapshot(&store, &path).unwrap();
        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded, store);
    }

    #[test]
    fn test_snapshot_rejects_bad_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"zz": "00"}"#).unwrap();

        assert!(matches!(load_snapshot(&path), Err(WasmError::DecodeFailure { .. })));
    }
}
