/// Execution Engine Seam
///
/// The module never runs contract code itself. It hands admitted binaries and
/// init/migrate messages to a `WasmEngine`, keyed by checksum.

use std::collections::HashMap;

use tracing::debug;

use crate::address::Address;
use crate::error::{Result, WasmError};
use crate::ioutils::WASM_IDENT;
use crate::types::Checksum;

const WASM_VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// Storage and execution of contract binaries
pub trait WasmEngine {
    /// Persist a raw wasm binary and return its checksum
    fn store_code(&mut self, wasm_code: &[u8]) -> Result<Checksum>;

    fn has_code(&self, checksum: &Checksum) -> bool;

    fn remove_code(&mut self, checksum: &Checksum) -> Result<()>;

    /// Run the contract's instantiate entry point; returns the optional response data
    fn instantiate(
        &mut self,
        checksum: &Checksum,
        contract: &Address,
        sender: &Address,
        init_msg: &[u8],
    ) -> Result<Option<Vec<u8>>>;

    /// Run the migrate entry point of the new code against an existing contract
    fn migrate(
        &mut self,
        checksum: &Checksum,
        contract: &Address,
        sender: &Address,
        migrate_msg: &[u8],
    ) -> Result<Option<Vec<u8>>>;
}

/// In-process engine that keeps binaries in memory and accepts any JSON message
#[derive(Debug, Default)]
pub struct MemoryEngine {
    codes: HashMap<Checksum, Vec<u8>>,
    /// contract -> checksum of the code it last ran
    instances: HashMap<Address, Checksum>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn code_count(&self) -> usize {
        self.codes.len()
    }

    /// Checksum of the code the contract was last instantiated or migrated with
    pub fn instance_code(&self, contract: &Address) -> Option<&Checksum> {
        self.instances.get(contract)
    }

    fn check_code(&self, checksum: &Checksum) -> Result<()> {
        if self.codes.contains_key(checksum) {
            Ok(())
        } else {
            Err(WasmError::Engine(format!("no code for checksum {}", checksum)))
        }
    }

    fn check_msg(msg: &[u8]) -> Result<()> {
        serde_json::from_slice::<serde_json::Value>(msg)
            .map(|_| ())
            .map_err(|e| WasmError::Engine(format!("invalid message: {}", e)))
    }
}

impl WasmEngine for MemoryEngine {
    fn store_code(&mut self, wasm_code: &[u8]) -> Result<Checksum> {
        if wasm_code.len() < 8 || wasm_code[..4] != WASM_IDENT || wasm_code[4..8] != WASM_VERSION {
            return Err(WasmError::Engine("invalid wasm module header".to_string()));
        }
        let checksum = Checksum::generate(wasm_code);
        self.codes.entry(checksum).or_insert_with(|| wasm_code.to_vec());
        debug!(%checksum, size = wasm_code.len(), "engine stored code");
        Ok(checksum)
    }

    fn has_code(&self, checksum: &Checksum) -> bool {
        self.codes.contains_key(checksum)
    }

    fn remove_code(&mut self, checksum: &Checksum) -> Result<()> {
        self.codes
            .remove(checksum)
            .map(|_| ())
            .ok_or_else(|| WasmError::Engine(format!("no code for checksum {}", checksum)))
    }

    fn instantiate(
        &mut self,
        checksum: &Checksum,
        contract: &Address,
        _sender: &Address,
        init_msg: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        self.check_code(checksum)?;
        Self::check_msg(init_msg)?;
        self.instances.insert(contract.clone(), *checksum);
        Ok(None)
    }

    fn migrate(
        &mut self,
        checksum: &Checksum,
        contract: &Address,
        _sender: &Address,
        migrate_msg: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        self.check_code(checksum)?;
        Self::check_msg(migrate_msg)?;
        let current = self
            .instances
            .get_mut(contract)
            .ok_or_else(|| WasmError::Engine(format!("unknown contract {}", contract)))?;
        *current = *checksum;
        Ok(None)
    }
}
