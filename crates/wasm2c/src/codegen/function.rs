//! Per-function code generation state.
//!
//! The generator's state is three stacks plus the unreachable-depth
//! counter; there is no separate state enum. Locals, operand temporaries,
//! block result/parameter joins and label ids all come from one unified
//! slot arena (`l{n}` variables, `label{n}` labels), so "pop returns an
//! index, push allocates the next index" is the whole protocol.

use crate::codegen::module::ModuleContext;
use crate::reader::ByteReader;
use crate::types::ValueType;
use anyhow::{bail, Context, Result};
use std::fmt::Write as _;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Block,
    Loop,
    If,
}

/// One open `block`/`loop`/`if`. Branches address these by relative
/// nesting depth, innermost last.
#[derive(Debug, Clone)]
pub struct Block {
    pub kind: BlockKind,
    /// Branch target: the head label for a loop, the exit label otherwise.
    pub label: u32,
    /// Operand-stack depth at entry (after the parameter stash).
    pub stack_depth: usize,
    /// Fresh locals holding the block's incoming parameters.
    pub param_slots: Vec<u32>,
    /// Pre-declared locals that joins copy results into.
    pub result_slots: Vec<u32>,
    pub else_seen: bool,
}

/// Reusable per-function generator. The slot arena, operand stack and
/// block stack grow as needed and are reset (not freed) between
/// functions.
pub struct FuncGen {
    pub(crate) locals: Vec<ValueType>,
    pub(crate) stack: Vec<u32>,
    pub(crate) blocks: Vec<Block>,
    pub(crate) unreachable_depth: u32,
    pub(crate) param_count: usize,
    pub(crate) param_used: Vec<bool>,
    pub(crate) big_endian: bool,
}

impl FuncGen {
    pub fn new() -> FuncGen {
        FuncGen {
            locals: Vec::new(),
            stack: Vec::new(),
            blocks: Vec::new(),
            unreachable_depth: 0,
            param_count: 0,
            param_used: Vec::new(),
            big_endian: false,
        }
    }

    fn reset(&mut self, params: &[ValueType], big_endian: bool) {
        self.locals.clear();
        self.locals.extend_from_slice(params);
        self.stack.clear();
        self.blocks.clear();
        self.unreachable_depth = 0;
        self.param_count = params.len();
        self.param_used.clear();
        self.param_used.resize(params.len(), false);
        self.big_endian = big_endian;
    }

    pub(crate) fn dead(&self) -> bool {
        self.unreachable_depth > 0
    }

    pub(crate) fn alloc_local(&mut self, ty: ValueType) -> u32 {
        let slot = self.locals.len() as u32;
        self.locals.push(ty);
        slot
    }

    /// Labels share the slot arena so every id is unique; the entry's
    /// type is never used.
    pub(crate) fn alloc_label(&mut self) -> u32 {
        self.alloc_local(ValueType::I32)
    }

    pub(crate) fn slot_type(&self, slot: u32) -> ValueType {
        self.locals[slot as usize]
    }

    pub(crate) fn push(&mut self, slot: u32) {
        self.stack.push(slot);
    }

    pub(crate) fn pop(&mut self) -> Result<u32> {
        match self.stack.pop() {
            Some(slot) => Ok(slot),
            None => bail!("operand stack underflow"),
        }
    }

    /// Peek `from_top` entries below the top without popping.
    pub(crate) fn peek(&self, from_top: usize) -> Result<u32> {
        if from_top >= self.stack.len() {
            bail!("operand stack underflow");
        }
        Ok(self.stack[self.stack.len() - 1 - from_top])
    }

    pub(crate) fn mark_param_used(&mut self, local: u32) {
        if (local as usize) < self.param_count {
            self.param_used[local as usize] = true;
        }
    }

    /// Statement indentation: one level for the function body plus one
    /// per open block.
    pub(crate) fn indent(&self) -> String {
        "    ".repeat(self.blocks.len() + 1)
    }

    /// Indentation of the current block's closing brace.
    pub(crate) fn indent_close(&self) -> String {
        "    ".repeat(self.blocks.len())
    }

    pub(crate) fn stmt(&self, out: &mut String, text: &str) {
        out.push_str(&self.indent());
        out.push_str(text);
        out.push('\n');
    }

    /// Declare a fresh local of `ty` initialized to `expr` and push it as
    /// the new operand-stack top.
    pub(crate) fn push_value(&mut self, out: &mut String, ty: ValueType, expr: &str) -> u32 {
        let slot = self.alloc_local(ty);
        let line = format!("{} l{} = {};", ty.c_type(), slot, expr);
        self.stmt(out, &line);
        self.push(slot);
        slot
    }
}

impl Default for FuncGen {
    fn default() -> Self {
        FuncGen::new()
    }
}

/// Translate one Code-section entry into a complete static C function.
pub fn generate<R: Read>(
    gen: &mut FuncGen,
    ctx: &ModuleContext,
    reader: &mut ByteReader<R>,
    out: &mut String,
    func_index: usize,
) -> Result<()> {
    let decl = &ctx.funcs[func_index];
    let func_type = ctx.catalog.get(decl.type_idx)?;
    let params = func_type.params.clone();
    let result = func_type.results.first().copied();

    // The body size only delimits the entry; the instruction stream is
    // self-terminating.
    let _body_size = reader.read_leb_u32()?;

    gen.reset(&params, ctx.options.big_endian_target);

    // Signature: parameters become the first local slots, in order.
    let _ = write!(out, "static {} {}(", func_type.c_return_type(), decl.name);
    if params.is_empty() {
        out.push_str("void");
    } else {
        for (i, ty) in params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{} l{}", ty.c_type(), i);
        }
    }
    out.push_str(") {\n");

    // Declared locals, zero-initialized.
    let group_count = reader.read_leb_u32()?;
    for _ in 0..group_count {
        let count = reader.read_leb_u32()?;
        let tag = reader.read_leb_i64()?;
        let ty = ValueType::from_tag(tag).context("reading local declaration")?;
        for _ in 0..count {
            let slot = gen.alloc_local(ty);
            let _ = writeln!(out, "    {} l{} = 0;", ty.c_type(), slot);
        }
    }

    // One pre-declared slot per function result, filled on every exit
    // path that does not return directly.
    let mut result_slots = Vec::new();
    for ty in func_type.results.iter() {
        let slot = gen.alloc_local(*ty);
        let _ = writeln!(out, "    {} l{} = 0;", ty.c_type(), slot);
        result_slots.push(slot);
    }

    // Implicit outer block scoped to the whole body; its label is the
    // function-level return target.
    let label = gen.alloc_label();
    gen.blocks.push(Block {
        kind: BlockKind::Block,
        label,
        stack_depth: 0,
        param_slots: Vec::new(),
        result_slots: result_slots.clone(),
        else_seen: false,
    });
    out.push_str("    {\n");

    // Run loop: one instruction at a time until the outer block's `end`
    // has been consumed.
    while !gen.blocks.is_empty() {
        gen.step(reader, ctx, out)
            .with_context(|| format!("translating body of {}", decl.name))?;
    }

    for (i, used) in gen.param_used.iter().enumerate() {
        if !used {
            let _ = writeln!(out, "    (void)l{i};");
        }
    }
    if result.is_some() {
        let _ = writeln!(out, "    return l{};", result_slots[0]);
    }
    out.push_str("}\n\n");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_arena_is_monotonic() {
        let mut gen = FuncGen::new();
        assert_eq!(gen.alloc_local(ValueType::I32), 0);
        assert_eq!(gen.alloc_local(ValueType::F64), 1);
        assert_eq!(gen.alloc_label(), 2);
        assert_eq!(gen.alloc_local(ValueType::I64), 3);
        assert_eq!(gen.slot_type(1), ValueType::F64);
    }

    #[test]
    fn stack_underflow_is_an_error() {
        let mut gen = FuncGen::new();
        assert!(gen.pop().is_err());
        gen.push(0);
        assert_eq!(gen.peek(0).unwrap(), 0);
        assert!(gen.peek(1).is_err());
        assert_eq!(gen.pop().unwrap(), 0);
    }

    #[test]
    fn push_value_declares_and_pushes() {
        let mut gen = FuncGen::new();
        let mut out = String::new();
        let slot = gen.push_value(&mut out, ValueType::I32, "1u + 2u");
        assert_eq!(slot, 0);
        assert!(out.contains("uint32_t l0 = 1u + 2u;"));
        assert_eq!(gen.pop().unwrap(), 0);
    }
}
