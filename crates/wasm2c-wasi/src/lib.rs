//! wasm2c-wasi — WASI preview1 host-call shim.
//!
//! Runtime support for wasm binaries that went through the wasm2c
//! pipeline and import the `wasi_snapshot_preview1` namespace. The C
//! output declares those imports as plain external functions
//! (`wasi_snapshot_preview1_fd_write` and so on); a host embedding
//! links them to a `WasiCtx` instance from this crate.
//!
//! The transpiler itself never calls into this crate; it exists for
//! *running* transpiled programs, not for producing them.

pub mod ctx;
pub mod errno;

pub use ctx::{FdEntry, WasiCtx};
pub use errno::Errno;
