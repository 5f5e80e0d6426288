//! wasm2c — ahead-of-time WebAssembly to C transpiler.
//!
//! This crate converts a WebAssembly module into a single portable C
//! translation unit, for bootstrap environments where the only available
//! tool is a C compiler. The translation is a single forward pass over
//! the binary: no intermediate representation, no optimizer. Input
//! modules are trusted output of a cooperating compiler, so every
//! decode or validation inconsistency is a fatal error.

pub mod codegen;
pub mod reader;
pub mod types;

pub use anyhow::{Context, Result};
use codegen::ModuleEmitter;
use reader::ByteReader;
use std::io::Read;

/// Configuration options for transpilation.
#[derive(Debug, Clone)]
pub struct TranspileOptions {
    /// Prefix for exported C symbols (`{prefix}_{export_name}`).
    pub export_prefix: String,
    /// Emit byte-by-byte memory accesses so the output also runs on
    /// big-endian hosts.
    pub big_endian_target: bool,
}

impl Default for TranspileOptions {
    fn default() -> Self {
        Self {
            export_prefix: "wasm".to_string(),
            big_endian_target: false,
        }
    }
}

/// Transpile an uncompressed WebAssembly module to C source code.
///
/// # Example
/// ```no_run
/// use wasm2c::{transpile, TranspileOptions};
///
/// let wasm_bytes = std::fs::read("input.wasm").unwrap();
/// let c_code = transpile(&wasm_bytes, &TranspileOptions::default()).unwrap();
/// std::fs::write("output.c", c_code).unwrap();
/// ```
pub fn transpile(wasm_bytes: &[u8], options: &TranspileOptions) -> Result<String> {
    let mut reader = ByteReader::new(wasm_bytes);
    ModuleEmitter::new(options.clone()).run(&mut reader)
}

/// Transpile a zstd-compressed WebAssembly module, decompressing as it
/// reads. The whole pipeline is streaming; the module is never held in
/// memory at once.
pub fn transpile_compressed<R: Read>(input: R, options: &TranspileOptions) -> Result<String> {
    let decoder =
        zstd::stream::read::Decoder::new(input).context("initializing zstd decoder")?;
    let mut reader = ByteReader::new(decoder);
    ModuleEmitter::new(options.clone()).run(&mut reader)
}
