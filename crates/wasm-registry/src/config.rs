use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::address::DEFAULT_BECH32_PREFIX;
use crate::types::validation::{DEFAULT_MAX_LABEL_SIZE, DEFAULT_MAX_WASM_SIZE};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WasmConfig {
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub module: ModuleConfig,
    #[serde(default)]
    pub migrations: MigrationsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Largest accepted wasm binary, after decompression
    pub max_wasm_size: usize,
    /// Longest accepted contract label
    pub max_label_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Bech32 prefix used when rendering addresses
    pub bech32_prefix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationsConfig {
    /// Highest code id the pruning step may delete; unset prunes every unreferenced code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prune_max_code_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub log_level: String,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_wasm_size: DEFAULT_MAX_WASM_SIZE,
            max_label_size: DEFAULT_MAX_LABEL_SIZE,
        }
    }
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            bech32_prefix: DEFAULT_BECH32_PREFIX.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl MigrationsConfig {
    pub fn prune_watermark(&self) -> u64 {
        self.prune_max_code_id.unwrap_or(u64::MAX)
    }
}

impl WasmConfig {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: WasmConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.limits.max_wasm_size == 0 {
            anyhow::bail!("limits.max_wasm_size must be positive");
        }
        if self.limits.max_label_size == 0 {
            anyhow::bail!("limits.max_label_size must be positive");
        }
        if self.module.bech32_prefix.is_empty() {
            anyhow::bail!("module.bech32_prefix cannot be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wasm.toml");

        let mut config = WasmConfig::default();
        config.limits.max_wasm_size = 1024;
        config.migrations.prune_max_code_id = Some(42);
        config.save(&path).unwrap();

        let loaded = WasmConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.migrations.prune_watermark(), 42);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: WasmConfig = toml::from_str("[module]\nbech32_prefix = \"juno\"\n").unwrap();
        assert_eq!(config.module.bech32_prefix, "juno");
        assert_eq!(config.limits.max_wasm_size, 800 * 1024);
        assert_eq!(config.migrations.prune_watermark(), u64::MAX);
        assert_eq!(config.logging.log_level, "info");
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/wasm.toml");
        assert_eq!(WasmConfig::load(path).unwrap(), WasmConfig::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[limits]\nmax_wasm_size = 0\nmax_label_size = 10\n").unwrap();
        assert!(WasmConfig::load(&path).is_err());
    }
}
