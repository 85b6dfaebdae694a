use crate::error::{Result, WasmError};

/// MaxWasmSize is the largest a compiled contract code can be when storing code on chain
pub const DEFAULT_MAX_WASM_SIZE: usize = 800 * 1024;

/// MaxLabelSize is the longest label that can be used when instantiating a contract
pub const DEFAULT_MAX_LABEL_SIZE: usize = 128;

pub fn validate_wasm_code(code: &[u8], max_size: usize) -> Result<()> {
    if code.is_empty() {
        return Err(WasmError::Invalid("wasm code is required".to_string()));
    }
    if code.len() > max_size {
        return Err(WasmError::SizeLimitExceeded { limit: max_size as u64 });
    }
    Ok(())
}

pub fn validate_label(label: &str, max_size: usize) -> Result<()> {
    if label.trim().is_empty() {
        return Err(WasmError::Invalid("label is required".to_string()));
    }
    if label.len() > max_size {
        return Err(WasmError::Invalid(format!(
            "label cannot be longer than {} characters",
            max_size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_rules() {
        assert!(validate_label("", 10).is_err());
        assert!(validate_label("   ", 10).is_err());
        assert!(validate_label("counter", 10).is_ok());
        assert!(validate_label(&"x".repeat(11), 10).is_err());
    }

    #[test]
    fn test_wasm_code_rules() {
        assert!(validate_wasm_code(&[], 10).is_err());
        assert!(matches!(
            validate_wasm_code(&[0u8; 11], 10),
            Err(WasmError::SizeLimitExceeded { limit: 10 })
        ));
        assert!(validate_wasm_code(&[0u8; 10], 10).is_ok());
    }
}
