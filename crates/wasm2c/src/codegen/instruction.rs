//! Per-instruction emission.
//!
//! Every arm follows the same protocol: read the instruction's
//! immediates, then — only if the current region is live — pop operands
//! by slot, push result slots, and append C statements. Dead regions
//! (`unreachable_depth > 0`) are parsed for cursor advancement only;
//! nested constructs inside them still balance their own begin/end.

use crate::codegen::function::{Block, BlockKind, FuncGen};
use crate::codegen::module::ModuleContext;
use crate::reader::ByteReader;
use crate::types::{FuncType, ValueType};
use anyhow::{bail, Result};
use std::io::Read;

fn args_list(args: &[u32]) -> String {
    args.iter()
        .map(|a| format!("l{a}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// C function-pointer cast for an indirect call through a table slot.
fn func_ptr_cast(func_type: &FuncType) -> String {
    let params = if func_type.params.is_empty() {
        "void".to_string()
    } else {
        func_type
            .params
            .iter()
            .map(|ty| ty.c_type())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!("{} (*)({})", func_type.c_return_type(), params)
}

impl FuncGen {
    fn bin(
        &mut self,
        out: &mut String,
        ty: ValueType,
        f: impl FnOnce(String, String) -> String,
    ) -> Result<()> {
        if self.dead() {
            return Ok(());
        }
        let b = self.pop()?;
        let a = self.pop()?;
        let expr = f(format!("l{a}"), format!("l{b}"));
        self.push_value(out, ty, &expr);
        Ok(())
    }

    fn un(
        &mut self,
        out: &mut String,
        ty: ValueType,
        f: impl FnOnce(String) -> String,
    ) -> Result<()> {
        if self.dead() {
            return Ok(());
        }
        let a = self.pop()?;
        let expr = f(format!("l{a}"));
        self.push_value(out, ty, &expr);
        Ok(())
    }

    fn block_begin<R: Read>(
        &mut self,
        reader: &mut ByteReader<R>,
        ctx: &ModuleContext,
        out: &mut String,
        kind: BlockKind,
    ) -> Result<()> {
        let raw = reader.read_leb_i64()?;
        if self.dead() {
            self.unreachable_depth += 1;
            return Ok(());
        }
        let cond = if kind == BlockKind::If {
            Some(self.pop()?)
        } else {
            None
        };
        let func_type = ctx.catalog.block_type(raw)?;
        let param_types = func_type.params.clone();
        let result_types = func_type.results.clone();

        // Stash the incoming parameters into dedicated fresh locals; the
        // body (and, for loops, every back edge) sees those.
        let mut sources = vec![0u32; param_types.len()];
        for i in (0..param_types.len()).rev() {
            sources[i] = self.pop()?;
        }
        let mut param_slots = Vec::with_capacity(param_types.len());
        for (ty, src) in param_types.iter().zip(&sources) {
            let slot = self.alloc_local(*ty);
            self.stmt(out, &format!("{} l{} = l{};", ty.c_type(), slot, src));
            param_slots.push(slot);
        }
        let mut result_slots = Vec::with_capacity(result_types.len());
        for ty in &result_types {
            let slot = self.alloc_local(*ty);
            self.stmt(out, &format!("{} l{} = 0;", ty.c_type(), slot));
            result_slots.push(slot);
        }
        let label = self.alloc_label();
        match (kind, cond) {
            (BlockKind::If, Some(c)) => self.stmt(out, &format!("if (l{c}) {{")),
            // A branch to a loop re-enters at the head, after the stash.
            (BlockKind::Loop, _) => self.stmt(out, &format!("label{label}: {{")),
            _ => self.stmt(out, "{"),
        }
        self.blocks.push(Block {
            kind,
            label,
            stack_depth: self.stack.len(),
            param_slots: param_slots.clone(),
            result_slots,
            else_seen: false,
        });
        for slot in param_slots {
            self.push(slot);
        }
        Ok(())
    }

    fn else_op(&mut self, out: &mut String) -> Result<()> {
        if self.dead() {
            if self.unreachable_depth > 1 {
                return Ok(());
            }
            // The then arm ended in a branch; the else arm is live again.
            self.unreachable_depth = 0;
        } else {
            let block = match self.blocks.last() {
                Some(b) => b.clone(),
                None => bail!("else without an open block"),
            };
            if block.kind != BlockKind::If {
                bail!("else outside of an if block");
            }
            for i in (0..block.result_slots.len()).rev() {
                let src = self.pop()?;
                self.stmt(out, &format!("l{} = l{};", block.result_slots[i], src));
            }
            if self.stack.len() != block.stack_depth {
                bail!(
                    "operand stack depth mismatch at else (expected {}, found {})",
                    block.stack_depth,
                    self.stack.len()
                );
            }
        }
        let block = match self.blocks.last_mut() {
            Some(b) => {
                b.else_seen = true;
                b.clone()
            }
            None => bail!("else without an open block"),
        };
        self.stack.truncate(block.stack_depth);
        for slot in &block.param_slots {
            self.push(*slot);
        }
        let line = format!("{}}} else {{\n", self.indent_close());
        out.push_str(&line);
        Ok(())
    }

    fn end_op(&mut self, out: &mut String) -> Result<()> {
        if self.dead() {
            self.unreachable_depth -= 1;
            if self.unreachable_depth > 0 {
                return Ok(());
            }
            return self.close_block(out, true);
        }
        self.close_block(out, false)
    }

    fn close_block(&mut self, out: &mut String, from_dead: bool) -> Result<()> {
        let block = match self.blocks.pop() {
            Some(b) => b,
            None => bail!("end without an open block"),
        };
        let inner = "    ".repeat(self.blocks.len() + 2);
        let close = "    ".repeat(self.blocks.len() + 1);
        match block.kind {
            BlockKind::Loop => {
                // Loops have no end-of-block join: nothing branches past
                // the body, so fall-through operands are the results.
                if !from_dead
                    && self.stack.len() != block.stack_depth + block.result_slots.len()
                {
                    bail!(
                        "operand stack depth mismatch at end of loop (expected {}, found {})",
                        block.stack_depth + block.result_slots.len(),
                        self.stack.len()
                    );
                }
                out.push_str(&close);
                out.push_str("}\n");
                if from_dead {
                    self.stack.truncate(block.stack_depth);
                    for slot in &block.result_slots {
                        self.push(*slot);
                    }
                }
            }
            BlockKind::Block | BlockKind::If => {
                if from_dead {
                    self.stack.truncate(block.stack_depth);
                } else {
                    for i in (0..block.result_slots.len()).rev() {
                        let src = self.pop()?;
                        out.push_str(&inner);
                        out.push_str(&format!("l{} = l{};\n", block.result_slots[i], src));
                    }
                    if self.stack.len() != block.stack_depth {
                        bail!(
                            "operand stack depth mismatch at end of block (expected {}, found {})",
                            block.stack_depth,
                            self.stack.len()
                        );
                    }
                }
                if block.kind == BlockKind::If
                    && !block.else_seen
                    && !block.result_slots.is_empty()
                {
                    // Wasm typing guarantees params == results for an if
                    // without else; the false path forwards them.
                    if block.param_slots.len() != block.result_slots.len() {
                        bail!("if without else has mismatched parameter and result arity");
                    }
                    out.push_str(&close);
                    out.push_str("} else {");
                    for (r, p) in block.result_slots.iter().zip(&block.param_slots) {
                        out.push_str(&format!(" l{r} = l{p};"));
                    }
                    out.push_str(" }\n");
                } else {
                    out.push_str(&close);
                    out.push_str("}\n");
                }
                out.push_str(&close);
                out.push_str(&format!("label{}: ;\n", block.label));
                for slot in &block.result_slots {
                    self.push(*slot);
                }
            }
        }
        Ok(())
    }

    /// Resolve a relative label index to (label id, join slots). Branches
    /// to a loop join at its parameter locals, everything else at its
    /// result locals.
    fn branch_target(&self, label_index: u32) -> Result<(u32, Vec<u32>)> {
        let idx = match self.blocks.len().checked_sub(1 + label_index as usize) {
            Some(idx) => idx,
            None => bail!("branch label {label_index} out of range"),
        };
        let block = &self.blocks[idx];
        let dest = if block.kind == BlockKind::Loop {
            block.param_slots.clone()
        } else {
            block.result_slots.clone()
        };
        Ok((block.label, dest))
    }

    fn br<R: Read>(&mut self, reader: &mut ByteReader<R>, out: &mut String) -> Result<()> {
        let label_index = reader.read_leb_u32()?;
        if self.dead() {
            return Ok(());
        }
        let (label, dest) = self.branch_target(label_index)?;
        for i in (0..dest.len()).rev() {
            let src = self.pop()?;
            self.stmt(out, &format!("l{} = l{};", dest[i], src));
        }
        self.stmt(out, &format!("goto label{label};"));
        self.unreachable_depth = 1;
        Ok(())
    }

    fn br_if<R: Read>(&mut self, reader: &mut ByteReader<R>, out: &mut String) -> Result<()> {
        let label_index = reader.read_leb_u32()?;
        if self.dead() {
            return Ok(());
        }
        let cond = self.pop()?;
        let (label, dest) = self.branch_target(label_index)?;
        self.stmt(out, &format!("if (l{cond}) {{"));
        // Control may fall through, so the join values are peeked, not
        // popped.
        for (i, d) in dest.iter().enumerate() {
            let src = self.peek(dest.len() - 1 - i)?;
            self.stmt(out, &format!("    l{d} = l{src};"));
        }
        self.stmt(out, &format!("    goto label{label};"));
        self.stmt(out, "}");
        Ok(())
    }

    fn br_table<R: Read>(&mut self, reader: &mut ByteReader<R>, out: &mut String) -> Result<()> {
        let count = reader.read_leb_u32()?;
        let mut targets = Vec::with_capacity(count as usize);
        for _ in 0..count {
            targets.push(reader.read_leb_u32()?);
        }
        let default = reader.read_leb_u32()?;
        if self.dead() {
            return Ok(());
        }
        let selector = self.pop()?;
        self.stmt(out, &format!("switch (l{selector}) {{"));
        for (case, target) in targets.iter().enumerate() {
            let (label, dest) = self.branch_target(*target)?;
            self.stmt(out, &format!("case {case}:"));
            for (i, d) in dest.iter().enumerate() {
                let src = self.peek(dest.len() - 1 - i)?;
                self.stmt(out, &format!("    l{d} = l{src};"));
            }
            self.stmt(out, &format!("    goto label{label};"));
        }
        let (label, dest) = self.branch_target(default)?;
        self.stmt(out, "default:");
        for (i, d) in dest.iter().enumerate() {
            let src = self.peek(dest.len() - 1 - i)?;
            self.stmt(out, &format!("    l{d} = l{src};"));
        }
        self.stmt(out, &format!("    goto label{label};"));
        self.stmt(out, "}");
        self.unreachable_depth = 1;
        Ok(())
    }

    fn return_op(&mut self, out: &mut String) -> Result<()> {
        if self.dead() {
            return Ok(());
        }
        if self.blocks[0].result_slots.is_empty() {
            self.stmt(out, "return;");
        } else {
            let value = self.pop()?;
            self.stmt(out, &format!("return l{value};"));
        }
        self.unreachable_depth = 1;
        Ok(())
    }

    fn call<R: Read>(
        &mut self,
        reader: &mut ByteReader<R>,
        ctx: &ModuleContext,
        out: &mut String,
    ) -> Result<()> {
        let func_index = reader.read_leb_u32()?;
        if self.dead() {
            return Ok(());
        }
        let decl = match ctx.funcs.get(func_index as usize) {
            Some(decl) => decl,
            None => bail!("function index {func_index} out of range"),
        };
        let func_type = ctx.catalog.get(decl.type_idx)?;
        let name = decl.name.clone();
        let result = func_type.results.first().copied();
        let mut args = vec![0u32; func_type.params.len()];
        for i in (0..args.len()).rev() {
            args[i] = self.pop()?;
        }
        let call = format!("{}({})", name, args_list(&args));
        match result {
            Some(ty) => {
                self.push_value(out, ty, &call);
            }
            None => self.stmt(out, &format!("{call};")),
        }
        Ok(())
    }

    fn call_indirect<R: Read>(
        &mut self,
        reader: &mut ByteReader<R>,
        ctx: &ModuleContext,
        out: &mut String,
    ) -> Result<()> {
        let type_index = reader.read_leb_u32()?;
        let table_index = reader.read_byte()?;
        if table_index != 0 {
            bail!("call_indirect through table {table_index} is not supported");
        }
        if self.dead() {
            return Ok(());
        }
        if ctx.tables.is_empty() {
            bail!("call_indirect without a table section");
        }
        let func_type = ctx.catalog.get(type_index)?;
        let result = func_type.results.first().copied();
        let cast = func_ptr_cast(func_type);
        let selector = self.pop()?;
        let mut args = vec![0u32; func_type.params.len()];
        for i in (0..args.len()).rev() {
            args[i] = self.pop()?;
        }
        let call = format!("(({cast})t0[l{selector}])({})", args_list(&args));
        match result {
            Some(ty) => {
                self.push_value(out, ty, &call);
            }
            None => self.stmt(out, &format!("{call};")),
        }
        Ok(())
    }

    fn mem_load<R: Read>(
        &mut self,
        reader: &mut ByteReader<R>,
        ctx: &ModuleContext,
        out: &mut String,
        ty: ValueType,
        width: u32,
        signed: bool,
    ) -> Result<()> {
        let align = reader.read_leb_u32()?;
        let offset = reader.read_leb_u32()?;
        if self.dead() {
            return Ok(());
        }
        if ctx.memories.is_empty() {
            bail!("memory access without a memory section");
        }
        let base = self.pop()?;
        let full = matches!(
            (ty, width),
            (ValueType::I32, 4) | (ValueType::I64, 8) | (ValueType::F32, 4) | (ValueType::F64, 8)
        );
        let hinted = 1u64.checked_shl(align).unwrap_or(u64::MAX);
        let direct = hinted >= u64::from(width) && !self.big_endian;
        let (wide_u, wide_s) = match ty {
            ValueType::I32 | ValueType::F32 => ("uint32_t", "int32_t"),
            ValueType::I64 | ValueType::F64 => ("uint64_t", "int64_t"),
        };
        if direct {
            let addr = format!("m0 + (uint64_t)l{base} + {offset}u");
            let expr = if full {
                match ty {
                    ValueType::I32 => format!("*(const uint32_t *)({addr})"),
                    ValueType::I64 => format!("*(const uint64_t *)({addr})"),
                    ValueType::F32 => format!("*(const float *)({addr})"),
                    ValueType::F64 => format!("*(const double *)({addr})"),
                }
            } else {
                let bits = width * 8;
                if signed {
                    format!("({wide_u})({wide_s})*(const int{bits}_t *)({addr})")
                } else {
                    format!("({wide_u})*(const uint{bits}_t *)({addr})")
                }
            };
            self.push_value(out, ty, &expr);
        } else {
            // Byte-by-byte little-endian reconstruction: correct for any
            // host alignment and endianness.
            let addr = self.alloc_local(ValueType::I64);
            self.stmt(
                out,
                &format!("uint64_t l{addr} = (uint64_t)l{base} + {offset}u;"),
            );
            let chain_ty = if width == 8 { "uint64_t" } else { "uint32_t" };
            let mut chain = String::new();
            for k in 0..width {
                if k == 0 {
                    chain.push_str(&format!("({chain_ty})m0[l{addr}]"));
                } else {
                    chain.push_str(&format!(" | (({chain_ty})m0[l{addr} + {k}] << {})", k * 8));
                }
            }
            let expr = match ty {
                ValueType::F32 => format!("f32_reinterpret_i32({chain})"),
                ValueType::F64 => format!("f64_reinterpret_i64({chain})"),
                ValueType::I32 | ValueType::I64 => {
                    if full || !signed {
                        chain
                    } else {
                        let bits = width * 8;
                        format!("({wide_u})({wide_s})(int{bits}_t)(uint{bits}_t)({chain})")
                    }
                }
            };
            self.push_value(out, ty, &expr);
        }
        Ok(())
    }

    fn mem_store<R: Read>(
        &mut self,
        reader: &mut ByteReader<R>,
        ctx: &ModuleContext,
        out: &mut String,
        ty: ValueType,
        width: u32,
    ) -> Result<()> {
        let align = reader.read_leb_u32()?;
        let offset = reader.read_leb_u32()?;
        if self.dead() {
            return Ok(());
        }
        if ctx.memories.is_empty() {
            bail!("memory access without a memory section");
        }
        let value = self.pop()?;
        let base = self.pop()?;
        let full = matches!(
            (ty, width),
            (ValueType::I32, 4) | (ValueType::I64, 8) | (ValueType::F32, 4) | (ValueType::F64, 8)
        );
        let hinted = 1u64.checked_shl(align).unwrap_or(u64::MAX);
        let direct = hinted >= u64::from(width) && !self.big_endian;
        if direct {
            let addr = format!("m0 + (uint64_t)l{base} + {offset}u");
            let line = if full {
                match ty {
                    ValueType::I32 => format!("*(uint32_t *)({addr}) = l{value};"),
                    ValueType::I64 => format!("*(uint64_t *)({addr}) = l{value};"),
                    ValueType::F32 => format!("*(float *)({addr}) = l{value};"),
                    ValueType::F64 => format!("*(double *)({addr}) = l{value};"),
                }
            } else {
                let bits = width * 8;
                format!("*(uint{bits}_t *)({addr}) = (uint{bits}_t)l{value};")
            };
            self.stmt(out, &line);
        } else {
            let addr = self.alloc_local(ValueType::I64);
            self.stmt(
                out,
                &format!("uint64_t l{addr} = (uint64_t)l{base} + {offset}u;"),
            );
            let src = match ty {
                ValueType::F32 => {
                    let bits = self.alloc_local(ValueType::I32);
                    self.stmt(
                        out,
                        &format!("uint32_t l{bits} = i32_reinterpret_f32(l{value});"),
                    );
                    bits
                }
                ValueType::F64 => {
                    let bits = self.alloc_local(ValueType::I64);
                    self.stmt(
                        out,
                        &format!("uint64_t l{bits} = i64_reinterpret_f64(l{value});"),
                    );
                    bits
                }
                _ => value,
            };
            for k in 0..width {
                if k == 0 {
                    self.stmt(out, &format!("m0[l{addr}] = (uint8_t)l{src};"));
                } else {
                    self.stmt(
                        out,
                        &format!("m0[l{addr} + {k}] = (uint8_t)(l{src} >> {});", k * 8),
                    );
                }
            }
        }
        Ok(())
    }

    fn prefixed<R: Read>(
        &mut self,
        reader: &mut ByteReader<R>,
        ctx: &ModuleContext,
        out: &mut String,
    ) -> Result<()> {
        let sub = reader.read_leb_u32()?;
        match sub {
            // memory.copy
            10 => {
                let dst_mem = reader.read_byte()?;
                let src_mem = reader.read_byte()?;
                if dst_mem != 0 || src_mem != 0 {
                    bail!("memory.copy between memories is not supported");
                }
                if self.dead() {
                    return Ok(());
                }
                if ctx.memories.is_empty() {
                    bail!("memory access without a memory section");
                }
                let len = self.pop()?;
                let src = self.pop()?;
                let dst = self.pop()?;
                self.stmt(
                    out,
                    &format!("memcpy(m0 + l{dst}, m0 + l{src}, l{len});"),
                );
            }
            // memory.fill
            11 => {
                let mem = reader.read_byte()?;
                if mem != 0 {
                    bail!("memory.fill on memory {mem} is not supported");
                }
                if self.dead() {
                    return Ok(());
                }
                if ctx.memories.is_empty() {
                    bail!("memory access without a memory section");
                }
                let len = self.pop()?;
                let value = self.pop()?;
                let dst = self.pop()?;
                self.stmt(out, &format!("memset(m0 + l{dst}, l{value}, l{len});"));
            }
            0..=7 => bail!("saturating truncation opcodes are not supported"),
            _ => bail!("unsupported prefixed opcode {sub}"),
        }
        Ok(())
    }

    /// Decode and emit one instruction. The caller loops until the block
    /// stack is empty.
    pub(crate) fn step<R: Read>(
        &mut self,
        reader: &mut ByteReader<R>,
        ctx: &ModuleContext,
        out: &mut String,
    ) -> Result<()> {
        use ValueType::{F32, F64, I32, I64};

        let op = reader.read_byte()?;
        match op {
            // unreachable
            0x00 => {
                if !self.dead() {
                    // One abort per dead region; the rest is only parsed.
                    self.stmt(out, "abort();");
                    self.unreachable_depth = 1;
                }
            }
            // nop
            0x01 => {}
            0x02 => self.block_begin(reader, ctx, out, BlockKind::Block)?,
            0x03 => self.block_begin(reader, ctx, out, BlockKind::Loop)?,
            0x04 => self.block_begin(reader, ctx, out, BlockKind::If)?,
            0x05 => self.else_op(out)?,
            0x0B => self.end_op(out)?,
            0x0C => self.br(reader, out)?,
            0x0D => self.br_if(reader, out)?,
            0x0E => self.br_table(reader, out)?,
            0x0F => self.return_op(out)?,
            0x10 => self.call(reader, ctx, out)?,
            0x11 => self.call_indirect(reader, ctx, out)?,

            // drop
            0x1A => {
                if !self.dead() {
                    self.pop()?;
                }
            }
            // select
            0x1B => {
                if !self.dead() {
                    let cond = self.pop()?;
                    let if_false = self.pop()?;
                    let if_true = self.pop()?;
                    let ty = self.slot_type(if_true);
                    self.push_value(out, ty, &format!("l{cond} ? l{if_true} : l{if_false}"));
                }
            }
            0x1C => bail!("typed select is not supported"),

            // local.get
            0x20 => {
                let local = reader.read_leb_u32()?;
                if !self.dead() {
                    if local as usize >= self.locals.len() {
                        bail!("local index {local} out of range");
                    }
                    self.mark_param_used(local);
                    let ty = self.slot_type(local);
                    self.push_value(out, ty, &format!("l{local}"));
                }
            }
            // local.set
            0x21 => {
                let local = reader.read_leb_u32()?;
                if !self.dead() {
                    if local as usize >= self.locals.len() {
                        bail!("local index {local} out of range");
                    }
                    self.mark_param_used(local);
                    let value = self.pop()?;
                    self.stmt(out, &format!("l{local} = l{value};"));
                }
            }
            // local.tee: leaves the value on the stack
            0x22 => {
                let local = reader.read_leb_u32()?;
                if !self.dead() {
                    if local as usize >= self.locals.len() {
                        bail!("local index {local} out of range");
                    }
                    self.mark_param_used(local);
                    let value = self.peek(0)?;
                    self.stmt(out, &format!("l{local} = l{value};"));
                }
            }
            // global.get
            0x23 => {
                let global = reader.read_leb_u32()?;
                if !self.dead() {
                    let ty = match ctx.globals.get(global as usize) {
                        Some(ty) => *ty,
                        None => bail!("global index {global} out of range"),
                    };
                    self.push_value(out, ty, &format!("g{global}"));
                }
            }
            // global.set
            0x24 => {
                let global = reader.read_leb_u32()?;
                if !self.dead() {
                    if global as usize >= ctx.globals.len() {
                        bail!("global index {global} out of range");
                    }
                    let value = self.pop()?;
                    self.stmt(out, &format!("g{global} = l{value};"));
                }
            }

            // table.get / table.set: parsed, but unsupported in live code
            0x25 => {
                let _table = reader.read_leb_u32()?;
                if !self.dead() {
                    bail!("table.get is not supported");
                }
            }
            0x26 => {
                let _table = reader.read_leb_u32()?;
                if !self.dead() {
                    bail!("table.set is not supported");
                }
            }

            0x28 => self.mem_load(reader, ctx, out, I32, 4, false)?,
            0x29 => self.mem_load(reader, ctx, out, I64, 8, false)?,
            0x2A => self.mem_load(reader, ctx, out, F32, 4, false)?,
            0x2B => self.mem_load(reader, ctx, out, F64, 8, false)?,
            0x2C => self.mem_load(reader, ctx, out, I32, 1, true)?,
            0x2D => self.mem_load(reader, ctx, out, I32, 1, false)?,
            0x2E => self.mem_load(reader, ctx, out, I32, 2, true)?,
            0x2F => self.mem_load(reader, ctx, out, I32, 2, false)?,
            0x30 => self.mem_load(reader, ctx, out, I64, 1, true)?,
            0x31 => self.mem_load(reader, ctx, out, I64, 1, false)?,
            0x32 => self.mem_load(reader, ctx, out, I64, 2, true)?,
            0x33 => self.mem_load(reader, ctx, out, I64, 2, false)?,
            0x34 => self.mem_load(reader, ctx, out, I64, 4, true)?,
            0x35 => self.mem_load(reader, ctx, out, I64, 4, false)?,
            0x36 => self.mem_store(reader, ctx, out, I32, 4)?,
            0x37 => self.mem_store(reader, ctx, out, I64, 8)?,
            0x38 => self.mem_store(reader, ctx, out, F32, 4)?,
            0x39 => self.mem_store(reader, ctx, out, F64, 8)?,
            0x3A => self.mem_store(reader, ctx, out, I32, 1)?,
            0x3B => self.mem_store(reader, ctx, out, I32, 2)?,
            0x3C => self.mem_store(reader, ctx, out, I64, 1)?,
            0x3D => self.mem_store(reader, ctx, out, I64, 2)?,
            0x3E => self.mem_store(reader, ctx, out, I64, 4)?,

            // memory.size
            0x3F => {
                let mem = reader.read_byte()?;
                if mem != 0 {
                    bail!("memory index {mem} is not supported");
                }
                if !self.dead() {
                    if ctx.memories.is_empty() {
                        bail!("memory.size without a memory section");
                    }
                    self.push_value(out, I32, "p0");
                }
            }
            // memory.grow
            0x40 => {
                let mem = reader.read_byte()?;
                if mem != 0 {
                    bail!("memory index {mem} is not supported");
                }
                if !self.dead() {
                    if ctx.memories.is_empty() {
                        bail!("memory.grow without a memory section");
                    }
                    let delta = self.pop()?;
                    self.push_value(out, I32, &format!("memory_grow(&m0, &p0, l{delta})"));
                }
            }

            // i32.const
            0x41 => {
                let value = reader.read_leb_i32()?;
                if !self.dead() {
                    self.push_value(out, I32, &format!("{}u", value as u32));
                }
            }
            // i64.const
            0x42 => {
                let value = reader.read_leb_i64()?;
                if !self.dead() {
                    self.push_value(out, I64, &format!("{}ull", value as u64));
                }
            }
            // f32.const: emitted by bit pattern to stay exact
            0x43 => {
                let value = reader.read_f32()?;
                if !self.dead() {
                    self.push_value(
                        out,
                        F32,
                        &format!("f32_reinterpret_i32(0x{:08x}u)", value.to_bits()),
                    );
                }
            }
            // f64.const
            0x44 => {
                let value = reader.read_f64()?;
                if !self.dead() {
                    self.push_value(
                        out,
                        F64,
                        &format!("f64_reinterpret_i64(0x{:016x}ull)", value.to_bits()),
                    );
                }
            }

            // i32 comparisons
            0x45 => self.un(out, I32, |a| format!("(uint32_t)({a} == 0)"))?,
            0x46 => self.bin(out, I32, |a, b| format!("(uint32_t)({a} == {b})"))?,
            0x47 => self.bin(out, I32, |a, b| format!("(uint32_t)({a} != {b})"))?,
            0x48 => self.bin(out, I32, |a, b| {
                format!("(uint32_t)((int32_t){a} < (int32_t){b})")
            })?,
            0x49 => self.bin(out, I32, |a, b| format!("(uint32_t)({a} < {b})"))?,
            0x4A => self.bin(out, I32, |a, b| {
                format!("(uint32_t)((int32_t){a} > (int32_t){b})")
            })?,
            0x4B => self.bin(out, I32, |a, b| format!("(uint32_t)({a} > {b})"))?,
            0x4C => self.bin(out, I32, |a, b| {
                format!("(uint32_t)((int32_t){a} <= (int32_t){b})")
            })?,
            0x4D => self.bin(out, I32, |a, b| format!("(uint32_t)({a} <= {b})"))?,
            0x4E => self.bin(out, I32, |a, b| {
                format!("(uint32_t)((int32_t){a} >= (int32_t){b})")
            })?,
            0x4F => self.bin(out, I32, |a, b| format!("(uint32_t)({a} >= {b})"))?,

            // i64 comparisons (results are i32)
            0x50 => self.un(out, I32, |a| format!("(uint32_t)({a} == 0)"))?,
            0x51 => self.bin(out, I32, |a, b| format!("(uint32_t)({a} == {b})"))?,
            0x52 => self.bin(out, I32, |a, b| format!("(uint32_t)({a} != {b})"))?,
            0x53 => self.bin(out, I32, |a, b| {
                format!("(uint32_t)((int64_t){a} < (int64_t){b})")
            })?,
            0x54 => self.bin(out, I32, |a, b| format!("(uint32_t)({a} < {b})"))?,
            0x55 => self.bin(out, I32, |a, b| {
                format!("(uint32_t)((int64_t){a} > (int64_t){b})")
            })?,
            0x56 => self.bin(out, I32, |a, b| format!("(uint32_t)({a} > {b})"))?,
            0x57 => self.bin(out, I32, |a, b| {
                format!("(uint32_t)((int64_t){a} <= (int64_t){b})")
            })?,
            0x58 => self.bin(out, I32, |a, b| format!("(uint32_t)({a} <= {b})"))?,
            0x59 => self.bin(out, I32, |a, b| {
                format!("(uint32_t)((int64_t){a} >= (int64_t){b})")
            })?,
            0x5A => self.bin(out, I32, |a, b| format!("(uint32_t)({a} >= {b})"))?,

            // f32 comparisons
            0x5B => self.bin(out, I32, |a, b| format!("(uint32_t)({a} == {b})"))?,
            0x5C => self.bin(out, I32, |a, b| format!("(uint32_t)({a} != {b})"))?,
            0x5D => self.bin(out, I32, |a, b| format!("(uint32_t)({a} < {b})"))?,
            0x5E => self.bin(out, I32, |a, b| format!("(uint32_t)({a} > {b})"))?,
            0x5F => self.bin(out, I32, |a, b| format!("(uint32_t)({a} <= {b})"))?,
            0x60 => self.bin(out, I32, |a, b| format!("(uint32_t)({a} >= {b})"))?,

            // f64 comparisons
            0x61 => self.bin(out, I32, |a, b| format!("(uint32_t)({a} == {b})"))?,
            0x62 => self.bin(out, I32, |a, b| format!("(uint32_t)({a} != {b})"))?,
            0x63 => self.bin(out, I32, |a, b| format!("(uint32_t)({a} < {b})"))?,
            0x64 => self.bin(out, I32, |a, b| format!("(uint32_t)({a} > {b})"))?,
            0x65 => self.bin(out, I32, |a, b| format!("(uint32_t)({a} <= {b})"))?,
            0x66 => self.bin(out, I32, |a, b| format!("(uint32_t)({a} >= {b})"))?,

            // i32 arithmetic
            0x67 => self.un(out, I32, |a| format!("i32_clz({a})"))?,
            0x68 => self.un(out, I32, |a| format!("i32_ctz({a})"))?,
            0x69 => self.un(out, I32, |a| format!("i32_popcnt({a})"))?,
            0x6A => self.bin(out, I32, |a, b| format!("{a} + {b}"))?,
            0x6B => self.bin(out, I32, |a, b| format!("{a} - {b}"))?,
            0x6C => self.bin(out, I32, |a, b| format!("{a} * {b}"))?,
            0x6D => self.bin(out, I32, |a, b| {
                format!("(uint32_t)((int32_t){a} / (int32_t){b})")
            })?,
            0x6E => self.bin(out, I32, |a, b| format!("{a} / {b}"))?,
            0x6F => self.bin(out, I32, |a, b| {
                format!("(uint32_t)((int32_t){a} % (int32_t){b})")
            })?,
            0x70 => self.bin(out, I32, |a, b| format!("{a} % {b}"))?,
            0x71 => self.bin(out, I32, |a, b| format!("{a} & {b}"))?,
            0x72 => self.bin(out, I32, |a, b| format!("{a} | {b}"))?,
            0x73 => self.bin(out, I32, |a, b| format!("{a} ^ {b}"))?,
            // shift amounts are masked to width - 1 per the wasm spec
            0x74 => self.bin(out, I32, |a, b| format!("{a} << ({b} & 31)"))?,
            0x75 => self.bin(out, I32, |a, b| {
                format!("(uint32_t)((int32_t){a} >> ({b} & 31))")
            })?,
            0x76 => self.bin(out, I32, |a, b| format!("{a} >> ({b} & 31)"))?,
            0x77 => self.bin(out, I32, |a, b| {
                format!("({a} << ({b} & 31)) | ({a} >> ((0u - {b}) & 31))")
            })?,
            0x78 => self.bin(out, I32, |a, b| {
                format!("({a} >> ({b} & 31)) | ({a} << ((0u - {b}) & 31))")
            })?,

            // i64 arithmetic
            0x79 => self.un(out, I64, |a| format!("i64_clz({a})"))?,
            0x7A => self.un(out, I64, |a| format!("i64_ctz({a})"))?,
            0x7B => self.un(out, I64, |a| format!("i64_popcnt({a})"))?,
            0x7C => self.bin(out, I64, |a, b| format!("{a} + {b}"))?,
            0x7D => self.bin(out, I64, |a, b| format!("{a} - {b}"))?,
            0x7E => self.bin(out, I64, |a, b| format!("{a} * {b}"))?,
            0x7F => self.bin(out, I64, |a, b| {
                format!("(uint64_t)((int64_t){a} / (int64_t){b})")
            })?,
            0x80 => self.bin(out, I64, |a, b| format!("{a} / {b}"))?,
            0x81 => self.bin(out, I64, |a, b| {
                format!("(uint64_t)((int64_t){a} % (int64_t){b})")
            })?,
            0x82 => self.bin(out, I64, |a, b| format!("{a} % {b}"))?,
            0x83 => self.bin(out, I64, |a, b| format!("{a} & {b}"))?,
            0x84 => self.bin(out, I64, |a, b| format!("{a} | {b}"))?,
            0x85 => self.bin(out, I64, |a, b| format!("{a} ^ {b}"))?,
            0x86 => self.bin(out, I64, |a, b| format!("{a} << ({b} & 63)"))?,
            0x87 => self.bin(out, I64, |a, b| {
                format!("(uint64_t)((int64_t){a} >> ({b} & 63))")
            })?,
            0x88 => self.bin(out, I64, |a, b| format!("{a} >> ({b} & 63)"))?,
            0x89 => self.bin(out, I64, |a, b| {
                format!("({a} << ({b} & 63)) | ({a} >> ((0u - {b}) & 63))")
            })?,
            0x8A => self.bin(out, I64, |a, b| {
                format!("({a} >> ({b} & 63)) | ({a} << ((0u - {b}) & 63))")
            })?,

            // f32 arithmetic
            0x8B => self.un(out, F32, |a| format!("fabsf({a})"))?,
            0x8C => self.un(out, F32, |a| format!("-{a}"))?,
            0x8D => self.un(out, F32, |a| format!("ceilf({a})"))?,
            0x8E => self.un(out, F32, |a| format!("floorf({a})"))?,
            0x8F => self.un(out, F32, |a| format!("truncf({a})"))?,
            0x90 => self.un(out, F32, |a| format!("nearbyintf({a})"))?,
            0x91 => self.un(out, F32, |a| format!("sqrtf({a})"))?,
            0x92 => self.bin(out, F32, |a, b| format!("{a} + {b}"))?,
            0x93 => self.bin(out, F32, |a, b| format!("{a} - {b}"))?,
            0x94 => self.bin(out, F32, |a, b| format!("{a} * {b}"))?,
            0x95 => self.bin(out, F32, |a, b| format!("{a} / {b}"))?,
            0x96 => self.bin(out, F32, |a, b| format!("f32_min({a}, {b})"))?,
            0x97 => self.bin(out, F32, |a, b| format!("f32_max({a}, {b})"))?,
            0x98 => self.bin(out, F32, |a, b| format!("copysignf({a}, {b})"))?,

            // f64 arithmetic
            0x99 => self.un(out, F64, |a| format!("fabs({a})"))?,
            0x9A => self.un(out, F64, |a| format!("-{a}"))?,
            0x9B => self.un(out, F64, |a| format!("ceil({a})"))?,
            0x9C => self.un(out, F64, |a| format!("floor({a})"))?,
            0x9D => self.un(out, F64, |a| format!("trunc({a})"))?,
            0x9E => self.un(out, F64, |a| format!("nearbyint({a})"))?,
            0x9F => self.un(out, F64, |a| format!("sqrt({a})"))?,
            0xA0 => self.bin(out, F64, |a, b| format!("{a} + {b}"))?,
            0xA1 => self.bin(out, F64, |a, b| format!("{a} - {b}"))?,
            0xA2 => self.bin(out, F64, |a, b| format!("{a} * {b}"))?,
            0xA3 => self.bin(out, F64, |a, b| format!("{a} / {b}"))?,
            0xA4 => self.bin(out, F64, |a, b| format!("f64_min({a}, {b})"))?,
            0xA5 => self.bin(out, F64, |a, b| format!("f64_max({a}, {b})"))?,
            0xA6 => self.bin(out, F64, |a, b| format!("copysign({a}, {b})"))?,

            // conversions
            0xA7 => self.un(out, I32, |a| format!("(uint32_t){a}"))?,
            0xA8 => self.un(out, I32, |a| format!("(uint32_t)(int32_t){a}"))?,
            0xA9 => self.un(out, I32, |a| format!("(uint32_t){a}"))?,
            0xAA => self.un(out, I32, |a| format!("(uint32_t)(int32_t){a}"))?,
            0xAB => self.un(out, I32, |a| format!("(uint32_t){a}"))?,
            0xAC => self.un(out, I64, |a| format!("(uint64_t)(int64_t)(int32_t){a}"))?,
            0xAD => self.un(out, I64, |a| format!("(uint64_t){a}"))?,
            0xAE => self.un(out, I64, |a| format!("(uint64_t)(int64_t){a}"))?,
            0xAF => self.un(out, I64, |a| format!("(uint64_t){a}"))?,
            0xB0 => self.un(out, I64, |a| format!("(uint64_t)(int64_t){a}"))?,
            0xB1 => self.un(out, I64, |a| format!("(uint64_t){a}"))?,
            0xB2 => self.un(out, F32, |a| format!("(float)(int32_t){a}"))?,
            0xB3 => self.un(out, F32, |a| format!("(float){a}"))?,
            0xB4 => self.un(out, F32, |a| format!("(float)(int64_t){a}"))?,
            0xB5 => self.un(out, F32, |a| format!("(float){a}"))?,
            0xB6 => self.un(out, F32, |a| format!("(float){a}"))?,
            0xB7 => self.un(out, F64, |a| format!("(double)(int32_t){a}"))?,
            0xB8 => self.un(out, F64, |a| format!("(double){a}"))?,
            0xB9 => self.un(out, F64, |a| format!("(double)(int64_t){a}"))?,
            0xBA => self.un(out, F64, |a| format!("(double){a}"))?,
            0xBB => self.un(out, F64, |a| format!("(double){a}"))?,
            0xBC => self.un(out, I32, |a| format!("i32_reinterpret_f32({a})"))?,
            0xBD => self.un(out, I64, |a| format!("i64_reinterpret_f64({a})"))?,
            0xBE => self.un(out, F32, |a| format!("f32_reinterpret_i32({a})"))?,
            0xBF => self.un(out, F64, |a| format!("f64_reinterpret_i64({a})"))?,

            // sign extension
            0xC0 => self.un(out, I32, |a| format!("(uint32_t)(int32_t)(int8_t){a}"))?,
            0xC1 => self.un(out, I32, |a| format!("(uint32_t)(int32_t)(int16_t){a}"))?,
            0xC2 => self.un(out, I64, |a| format!("(uint64_t)(int64_t)(int8_t){a}"))?,
            0xC3 => self.un(out, I64, |a| format!("(uint64_t)(int64_t)(int16_t){a}"))?,
            0xC4 => self.un(out, I64, |a| format!("(uint64_t)(int64_t)(int32_t){a}"))?,

            0xFC => self.prefixed(reader, ctx, out)?,

            _ => bail!("unsupported opcode 0x{op:02x}"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn func_ptr_casts() {
        let ty = FuncType {
            params: vec![ValueType::I32, ValueType::F64],
            results: vec![ValueType::I32],
        };
        assert_eq!(func_ptr_cast(&ty), "uint32_t (*)(uint32_t, double)");
        let void = FuncType {
            params: vec![],
            results: vec![],
        };
        assert_eq!(func_ptr_cast(&void), "void (*)(void)");
    }

    #[test]
    fn args_lists() {
        assert_eq!(args_list(&[3, 7]), "l3, l7");
        assert_eq!(args_list(&[]), "");
    }
}
