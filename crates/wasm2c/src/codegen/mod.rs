//! C code generation.
//!
//! Split by granularity: `prologue` holds the fixed helper preamble,
//! `module` drives the section walk and owns module-level state,
//! `function` holds the per-function generator state, and `instruction`
//! emits one instruction at a time.

pub mod function;
pub mod instruction;
pub mod module;
pub mod prologue;

pub use module::ModuleEmitter;
