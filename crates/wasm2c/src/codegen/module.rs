//! Module-level emission.
//!
//! `ModuleEmitter` walks the sections in id order, building the module
//! context (types, function declarations, globals, tables, memories) and
//! appending C to a single output buffer. Runtime state lives in static
//! C objects named by index: functions `f{n}`, tables `t{n}`, memories
//! `m{n}` with page counts `p{n}`, globals `g{n}`, data segments `d{n}`.
//! Everything is `static` except the exported wrappers.

use crate::codegen::function::{self, FuncGen};
use crate::codegen::prologue::C_PROLOGUE;
use crate::reader::ByteReader;
use crate::types::{TypeCatalog, ValueType};
use crate::TranspileOptions;
use anyhow::{bail, Context, Result};
use std::fmt::Write as _;
use std::io::Read;

/// One function visible to `call`: an import (by its mangled import
/// name) or a module-defined `f{n}`.
pub struct FuncDecl {
    pub name: String,
    pub type_idx: u32,
}

/// Read-only module facts the per-function generator consults.
pub struct ModuleContext {
    pub options: TranspileOptions,
    pub catalog: TypeCatalog,
    pub funcs: Vec<FuncDecl>,
    pub import_count: usize,
    pub globals: Vec<ValueType>,
    /// Fixed element counts, one per table.
    pub tables: Vec<u32>,
    /// Initial page counts, one per memory.
    pub memories: Vec<u32>,
}

/// Replace every byte that cannot appear in a C identifier with `_`.
fn sanitize_ident(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// A float literal usable in a static initializer. `{:?}` prints the
/// shortest decimal that round-trips, so the C value is bit-exact.
fn const_f32(value: f32) -> String {
    if value.is_nan() {
        "NAN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "INFINITY" } else { "-INFINITY" }.to_string()
    } else {
        format!("{value:?}f")
    }
}

fn const_f64(value: f64) -> String {
    if value.is_nan() {
        "NAN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "INFINITY" } else { "-INFINITY" }.to_string()
    } else {
        format!("{value:?}")
    }
}

fn param_list(params: &[ValueType]) -> String {
    if params.is_empty() {
        "void".to_string()
    } else {
        params
            .iter()
            .map(|ty| ty.c_type())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// One pending active data segment: destination offset and payload.
struct DataSegment {
    offset: u32,
    len: usize,
}

pub struct ModuleEmitter {
    ctx: ModuleContext,
    gen: FuncGen,
    out: String,
}

impl ModuleEmitter {
    pub fn new(options: TranspileOptions) -> ModuleEmitter {
        ModuleEmitter {
            ctx: ModuleContext {
                options,
                catalog: TypeCatalog::new(Vec::new()),
                funcs: Vec::new(),
                import_count: 0,
                globals: Vec::new(),
                tables: Vec::new(),
                memories: Vec::new(),
            },
            gen: FuncGen::new(),
            out: String::new(),
        }
    }

    /// Translate one module stream into a complete C translation unit.
    pub fn run<R: Read>(mut self, reader: &mut ByteReader<R>) -> Result<String> {
        let magic = reader.read_bytes(4).context("reading module header")?;
        if magic != b"\0asm" {
            bail!("input is not a WebAssembly module (bad magic)");
        }
        let version = reader.read_u32().context("reading module header")?;
        if version != 1 {
            bail!("unsupported module version {version}");
        }

        self.out.push_str(C_PROLOGUE);

        if reader.skip_to_section(1)?.is_some() {
            let count = reader.read_leb_u32()?;
            self.ctx.catalog =
                TypeCatalog::parse(reader, count).context("reading type section")?;
        }
        if reader.skip_to_section(2)?.is_some() {
            self.imports(reader).context("reading import section")?;
        }
        self.ctx.import_count = self.ctx.funcs.len();
        if reader.skip_to_section(3)?.is_some() {
            self.declarations(reader).context("reading function section")?;
        }
        if reader.skip_to_section(4)?.is_some() {
            self.tables(reader).context("reading table section")?;
        }
        if reader.skip_to_section(5)?.is_some() {
            self.memories(reader).context("reading memory section")?;
        }
        if reader.skip_to_section(6)?.is_some() {
            self.globals(reader).context("reading global section")?;
        }
        if reader.skip_to_section(7)?.is_some() {
            self.exports(reader).context("reading export section")?;
        }
        let elem_lines = if reader.skip_to_section(9)?.is_some() {
            self.elements(reader).context("reading element section")?
        } else {
            Vec::new()
        };
        self.out.push_str("static void init_elem(void) {\n");
        for line in &elem_lines {
            self.out.push_str(line);
        }
        self.out.push_str("}\n\n");

        if reader.skip_to_section(10)?.is_some() {
            self.code(reader).context("reading code section")?;
        } else if self.ctx.funcs.len() > self.ctx.import_count {
            bail!("function section without a code section");
        }

        let segments = if reader.skip_to_section(11)?.is_some() {
            self.data(reader).context("reading data section")?
        } else {
            Vec::new()
        };
        self.out.push_str("static void init_data(void) {\n");
        for (i, pages) in self.ctx.memories.iter().enumerate() {
            let _ = writeln!(
                self.out,
                "    m{i} = calloc({pages}, UINT64_C(65536));"
            );
            if *pages > 0 {
                let _ = writeln!(self.out, "    if (m{i} == NULL) abort();");
            }
            let _ = writeln!(self.out, "    p{i} = {pages};");
        }
        for (k, seg) in segments.iter().enumerate() {
            if seg.len > 0 {
                let _ = writeln!(
                    self.out,
                    "    memcpy(m0 + {}u, d{}, {});",
                    seg.offset, k, seg.len
                );
            }
        }
        self.out.push_str("}\n\n");

        self.out.push_str(
            "static int inited = 0;\n\
             static void init(void) {\n\
             \x20   if (inited) return;\n\
             \x20   inited = 1;\n\
             \x20   init_elem();\n\
             \x20   init_data();\n\
             }\n",
        );
        Ok(self.out)
    }

    fn imports<R: Read>(&mut self, reader: &mut ByteReader<R>) -> Result<()> {
        let count = reader.read_leb_u32()?;
        for i in 0..count {
            let module = reader.read_name()?;
            let name = reader.read_name()?;
            let kind = reader.read_byte()?;
            if kind != 0 {
                bail!("import {i} ({module}.{name}): only function imports are supported");
            }
            let type_idx = reader.read_leb_u32()?;
            let func_type = self.ctx.catalog.get(type_idx)?;
            let c_name = format!("{}_{}", sanitize_ident(&module), sanitize_ident(&name));
            // Host-side definition expected at link time.
            let _ = writeln!(
                self.out,
                "{} {}({});",
                func_type.c_return_type(),
                c_name,
                param_list(&func_type.params)
            );
            self.ctx.funcs.push(FuncDecl {
                name: c_name,
                type_idx,
            });
        }
        self.out.push('\n');
        Ok(())
    }

    fn declarations<R: Read>(&mut self, reader: &mut ByteReader<R>) -> Result<()> {
        let count = reader.read_leb_u32()?;
        for k in 0..count {
            let type_idx = reader.read_leb_u32()?;
            let func_type = self.ctx.catalog.get(type_idx)?;
            let name = format!("f{}", self.ctx.import_count + k as usize);
            let _ = writeln!(
                self.out,
                "static {} {}({});",
                func_type.c_return_type(),
                name,
                param_list(&func_type.params)
            );
            self.ctx.funcs.push(FuncDecl { name, type_idx });
        }
        self.out.push('\n');
        Ok(())
    }

    fn tables<R: Read>(&mut self, reader: &mut ByteReader<R>) -> Result<()> {
        let count = reader.read_leb_u32()?;
        for i in 0..count {
            let elem_type = reader.read_byte()?;
            if elem_type != 0x70 {
                bail!("table {i}: only funcref tables are supported");
            }
            let limits = reader.read_limits()?;
            // Tables are plain C arrays and never grow.
            if limits.max != limits.min {
                bail!("table {i} must have equal minimum and maximum size");
            }
            let _ = writeln!(
                self.out,
                "static void (*t{i}[{}])(void);",
                limits.min
            );
            self.ctx.tables.push(limits.min);
        }
        self.out.push('\n');
        Ok(())
    }

    fn memories<R: Read>(&mut self, reader: &mut ByteReader<R>) -> Result<()> {
        let count = reader.read_leb_u32()?;
        if count > 1 {
            bail!("at most one memory is supported");
        }
        for i in 0..count {
            let limits = reader.read_limits()?;
            let _ = writeln!(self.out, "static uint8_t *m{i};");
            let _ = writeln!(self.out, "static uint32_t p{i};");
            self.ctx.memories.push(limits.min);
        }
        self.out.push('\n');
        Ok(())
    }

    fn globals<R: Read>(&mut self, reader: &mut ByteReader<R>) -> Result<()> {
        let count = reader.read_leb_u32()?;
        for i in 0..count {
            let tag = reader.read_leb_i64()?;
            let ty = ValueType::from_tag(tag).with_context(|| format!("global {i}"))?;
            let mutability = reader.read_byte()?;
            if mutability > 1 {
                bail!("global {i}: bad mutability flag 0x{mutability:02x}");
            }
            let op = reader.read_byte()?;
            let init = match (op, ty) {
                (0x41, ValueType::I32) => format!("{}u", reader.read_leb_i32()? as u32),
                (0x42, ValueType::I64) => format!("{}ull", reader.read_leb_i64()? as u64),
                (0x43, ValueType::F32) => const_f32(reader.read_f32()?),
                (0x44, ValueType::F64) => const_f64(reader.read_f64()?),
                _ => bail!("global {i}: unsupported initializer opcode 0x{op:02x}"),
            };
            let end = reader.read_byte()?;
            if end != 0x0B {
                bail!("global {i}: initializer is not a single constant");
            }
            let _ = writeln!(self.out, "static {} g{i} = {init};", ty.c_type());
            self.ctx.globals.push(ty);
        }
        self.out.push('\n');
        Ok(())
    }

    fn exports<R: Read>(&mut self, reader: &mut ByteReader<R>) -> Result<()> {
        let count = reader.read_leb_u32()?;
        let prefix = self.ctx.options.export_prefix.clone();
        for _ in 0..count {
            let name = reader.read_name()?;
            let kind = reader.read_byte()?;
            let index = reader.read_leb_u32()?;
            let c_name = format!("{}_{}", prefix, sanitize_ident(&name));
            match kind {
                // Function: a public wrapper that guarantees initialization.
                0 => {
                    let decl = match self.ctx.funcs.get(index as usize) {
                        Some(decl) => decl,
                        None => bail!("export {name}: function index {index} out of range"),
                    };
                    let func_type = self.ctx.catalog.get(decl.type_idx)?;
                    let _ = write!(
                        self.out,
                        "{} {}(",
                        func_type.c_return_type(),
                        c_name
                    );
                    if func_type.params.is_empty() {
                        self.out.push_str("void");
                    } else {
                        for (i, ty) in func_type.params.iter().enumerate() {
                            if i > 0 {
                                self.out.push_str(", ");
                            }
                            let _ = write!(self.out, "{} a{i}", ty.c_type());
                        }
                    }
                    self.out.push_str(") {\n    init();\n");
                    let args = (0..func_type.params.len())
                        .map(|i| format!("a{i}"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    if func_type.results.is_empty() {
                        let _ = writeln!(self.out, "    {}({args});", decl.name);
                    } else {
                        let _ = writeln!(self.out, "    return {}({args});", decl.name);
                    }
                    self.out.push_str("}\n\n");
                }
                // Memory: expose the base-pointer cell; callers must init()
                // through an exported function before dereferencing.
                2 => {
                    if index as usize >= self.ctx.memories.len() {
                        bail!("export {name}: memory index {index} out of range");
                    }
                    let _ = writeln!(
                        self.out,
                        "uint8_t **const {c_name} = &m{index};\n"
                    );
                }
                _ => bail!("export {name}: unsupported export kind {kind}"),
            }
        }
        Ok(())
    }

    fn elements<R: Read>(&mut self, reader: &mut ByteReader<R>) -> Result<Vec<String>> {
        let count = reader.read_leb_u32()?;
        let mut lines = Vec::new();
        for i in 0..count {
            let flags = reader.read_leb_u32()?;
            if flags != 0 {
                bail!("element segment {i}: only active funcref segments into table 0 are supported");
            }
            if self.ctx.tables.is_empty() {
                bail!("element segment {i} without a table section");
            }
            let op = reader.read_byte()?;
            if op != 0x41 {
                bail!("element segment {i}: offset is not an i32 constant");
            }
            let offset = reader.read_leb_i32()? as u32;
            if reader.read_byte()? != 0x0B {
                bail!("element segment {i}: offset is not a single constant");
            }
            let len = reader.read_leb_u32()?;
            for k in 0..len {
                let func_index = reader.read_leb_u32()?;
                let decl = match self.ctx.funcs.get(func_index as usize) {
                    Some(decl) => decl,
                    None => bail!(
                        "element segment {i}: function index {func_index} out of range"
                    ),
                };
                lines.push(format!(
                    "    t0[{}] = (void (*)(void)){};\n",
                    offset + k,
                    decl.name
                ));
            }
        }
        Ok(lines)
    }

    fn code<R: Read>(&mut self, reader: &mut ByteReader<R>) -> Result<()> {
        let count = reader.read_leb_u32()? as usize;
        if count != self.ctx.funcs.len() - self.ctx.import_count {
            bail!(
                "code section has {count} bodies for {} declared functions",
                self.ctx.funcs.len() - self.ctx.import_count
            );
        }
        for k in 0..count {
            function::generate(
                &mut self.gen,
                &self.ctx,
                reader,
                &mut self.out,
                self.ctx.import_count + k,
            )?;
        }
        Ok(())
    }

    fn data<R: Read>(&mut self, reader: &mut ByteReader<R>) -> Result<Vec<DataSegment>> {
        let count = reader.read_leb_u32()?;
        let mut segments = Vec::new();
        for i in 0..count {
            let flags = reader.read_leb_u32()?;
            if flags != 0 {
                bail!("data segment {i}: only active segments into memory 0 are supported");
            }
            if self.ctx.memories.is_empty() {
                bail!("data segment {i} without a memory section");
            }
            let op = reader.read_byte()?;
            if op != 0x41 {
                bail!("data segment {i}: offset is not an i32 constant");
            }
            let offset = reader.read_leb_i32()? as u32;
            if reader.read_byte()? != 0x0B {
                bail!("data segment {i}: offset is not a single constant");
            }
            let len = reader.read_leb_u32()? as usize;
            let bytes = reader
                .read_bytes(len)
                .with_context(|| format!("reading data segment {i}"))?;
            if !bytes.is_empty() {
                let k = segments.len();
                let _ = write!(self.out, "static const uint8_t d{k}[] = {{");
                for (j, b) in bytes.iter().enumerate() {
                    if j % 16 == 0 {
                        self.out.push_str("\n    ");
                    } else {
                        self.out.push(' ');
                    }
                    let _ = write!(self.out, "0x{b:02x},");
                }
                self.out.push_str("\n};\n\n");
            }
            segments.push(DataSegment { offset, len });
        }
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_punctuation() {
        assert_eq!(sanitize_ident("wasi_snapshot_preview1"), "wasi_snapshot_preview1");
        assert_eq!(sanitize_ident("fd-write.2"), "fd_write_2");
        assert_eq!(sanitize_ident("__main"), "__main");
    }

    #[test]
    fn float_constants_round_trip() {
        assert_eq!(const_f32(1.5), "1.5f");
        assert_eq!(const_f64(-0.1), "-0.1");
        assert_eq!(const_f32(f32::INFINITY), "INFINITY");
        assert_eq!(const_f64(f64::NAN), "NAN");
    }

    #[test]
    fn param_lists() {
        assert_eq!(param_list(&[]), "void");
        assert_eq!(
            param_list(&[ValueType::I32, ValueType::F64]),
            "uint32_t, double"
        );
    }
}
