/// Payload Admission
///
/// Sniffs and bounds untrusted code payloads before they become code records.
/// Decompression is bounded by a reader that fails as soon as the output would
/// exceed the limit, so a small archive can never expand into unbounded memory.

use flate2::read::GzDecoder;
use std::io::{self, Read};
use thiserror::Error;

use crate::error::{Result, WasmError};

/// Magic bytes to identify gzip (RFC 1952, deflate method)
pub const GZIP_IDENT: [u8; 3] = [0x1F, 0x8B, 0x08];

/// Magic bytes to identify a wasm module (`\0asm`)
pub const WASM_IDENT: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];

/// Limit on how much of a payload is looked at when sniffing its format
pub const MAX_SNIFF_SIZE: usize = 400 * 1024;

/// Format of an admitted payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadKind {
    Gzip,
    Wasm,
}

fn sniff_prefix(input: &[u8]) -> &[u8] {
    &input[..input.len().min(MAX_SNIFF_SIZE)]
}

/// Returns true when the payload starts with the gzip magic bytes
pub fn is_gzip(input: &[u8]) -> bool {
    sniff_prefix(input).starts_with(&GZIP_IDENT)
}

/// Returns true when the payload starts with the wasm magic bytes
pub fn is_wasm(input: &[u8]) -> bool {
    sniff_prefix(input).starts_with(&WASM_IDENT)
}

pub fn classify(input: &[u8]) -> Result<PayloadKind> {
    if is_gzip(input) {
        Ok(PayloadKind::Gzip)
    } else if is_wasm(input) {
        Ok(PayloadKind::Wasm)
    } else {
        Err(WasmError::UnrecognizedFormat)
    }
}

/// Marker carried inside the io error raised by `LimitedReader`
#[derive(Debug, Error)]
#[error("exceeds limit")]
pub struct LimitExceeded;

/// Reader that yields at most `limit` bytes and errors if the source has more
pub struct LimitedReader<R> {
    inner: R,
    remaining: u64,
    exceeded: bool,
}

impl<R: Read> LimitedReader<R> {
    pub fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            remaining: limit,
            exceeded: false,
        }
    }

    /// True once the source produced more than the limit
    pub fn exceeded(&self) -> bool {
        self.exceeded
    }
}

impl<R: Read> Read for LimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.remaining == 0 {
            // output of exactly `limit` bytes is fine; one more byte is not
            let mut probe = [0u8; 1];
            loop {
                match self.inner.read(&mut probe) {
                    Ok(0) => return Ok(0),
                    Ok(_) => {
                        self.exceeded = true;
                        return Err(io::Error::new(io::ErrorKind::Other, LimitExceeded));
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
        }
        let max = if (buf.len() as u64) > self.remaining {
            self.remaining as usize
        } else {
            buf.len()
        };
        let n = self.inner.read(&mut buf[..max])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Uncompress a single-member gzip payload, failing once the output exceeds `limit` bytes.
///
/// Callers are expected to check `is_gzip` first.
pub fn uncompress(gzip_src: &[u8], limit: u64) -> Result<Vec<u8>> {
    if gzip_src.len() as u64 > limit {
        return Err(WasmError::SizeLimitExceeded { limit });
    }
    let mut reader = LimitedReader::new(GzDecoder::new(gzip_src), limit);
    let mut out = Vec::new();
    match reader.read_to_end(&mut out) {
        Ok(_) => Ok(out),
        Err(_) if reader.exceeded() => Err(WasmError::SizeLimitExceeded { limit }),
        Err(e) => Err(WasmError::Io(e)),
    }
}

/// Classify a payload and return the raw wasm bytes, bounded by `limit`
pub fn admit(payload: &[u8], limit: u64) -> Result<Vec<u8>> {
    match classify(payload)? {
        PayloadKind::Gzip => {
            let raw = uncompress(payload, limit)?;
            if !is_wasm(&raw) {
                return Err(WasmError::UnrecognizedFormat);
            }
            Ok(raw)
        }
        PayloadKind::Wasm => {
            if payload.len() as u64 > limit {
                return Err(WasmError::SizeLimitExceeded { limit });
            }
            Ok(payload.to_vec())
        }
    }
}
