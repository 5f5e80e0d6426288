//! Value types, function types and the module-wide type catalog.

use crate::reader::ByteReader;
use anyhow::{bail, Context, Result};
use std::io::Read;

/// One of the four numeric WebAssembly value types.
///
/// Carries no runtime tag in the output; it only determines the C type of
/// the local variable that holds a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
}

impl ValueType {
    /// Decode a signed-LEB value-type tag. `funcref`/`externref` are only
    /// meaningful as table element types and are rejected here, as is
    /// `v128`.
    pub fn from_tag(tag: i64) -> Result<ValueType> {
        match tag {
            -0x01 => Ok(ValueType::I32),
            -0x02 => Ok(ValueType::I64),
            -0x03 => Ok(ValueType::F32),
            -0x04 => Ok(ValueType::F64),
            -0x05 => bail!("v128 value type is not supported"),
            _ => bail!("unknown value type tag {tag}"),
        }
    }

    /// The C type used for locals of this type.
    pub fn c_type(self) -> &'static str {
        match self {
            ValueType::I32 => "uint32_t",
            ValueType::I64 => "uint64_t",
            ValueType::F32 => "float",
            ValueType::F64 => "double",
        }
    }
}

/// An ordered (parameters, results) pair. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncType {
    pub params: Vec<ValueType>,
    pub results: Vec<ValueType>,
}

impl FuncType {
    /// The C return type: the single result, or `void`.
    pub fn c_return_type(&self) -> &'static str {
        match self.results.first() {
            Some(ty) => ty.c_type(),
            None => "void",
        }
    }
}

/// The module-wide table of function types, built once from the Type
/// section, plus the five synthesized short-form block types.
#[derive(Debug)]
pub struct TypeCatalog {
    types: Vec<FuncType>,
    // Index order: empty, i32, i64, f32, f64.
    block_types: [FuncType; 5],
}

fn single_result(ty: ValueType) -> FuncType {
    FuncType {
        params: Vec::new(),
        results: vec![ty],
    }
}

impl TypeCatalog {
    /// Parse the Type section body (`count` entries follow).
    pub fn parse<R: Read>(reader: &mut ByteReader<R>, count: u32) -> Result<TypeCatalog> {
        let mut types = Vec::with_capacity(count as usize);
        for i in 0..count {
            let tag = reader.read_byte()?;
            if tag != 0x60 {
                bail!("bad function type tag 0x{tag:02x} for type {i}");
            }
            let params = reader
                .read_result_type()
                .with_context(|| format!("reading parameters of type {i}"))?;
            let results = reader
                .read_result_type()
                .with_context(|| format!("reading results of type {i}"))?;
            if results.len() > 1 {
                bail!("multi-value returns are not supported (type {i})");
            }
            types.push(FuncType { params, results });
        }
        Ok(TypeCatalog::new(types))
    }

    pub fn new(types: Vec<FuncType>) -> TypeCatalog {
        TypeCatalog {
            types,
            block_types: [
                FuncType {
                    params: Vec::new(),
                    results: Vec::new(),
                },
                single_result(ValueType::I32),
                single_result(ValueType::I64),
                single_result(ValueType::F32),
                single_result(ValueType::F64),
            ],
        }
    }

    pub fn get(&self, index: u32) -> Result<&FuncType> {
        match self.types.get(index as usize) {
            Some(ty) => Ok(ty),
            None => bail!("function type index {index} out of range"),
        }
    }

    /// Resolve a raw block type: negative values denote the inline
    /// short-form signatures, non-negative values index the Type section.
    /// O(1); this runs for every `block`/`loop`/`if` label resolution.
    pub fn block_type(&self, raw: i64) -> Result<&FuncType> {
        match raw {
            -0x40 => Ok(&self.block_types[0]),
            -0x01 => Ok(&self.block_types[1]),
            -0x02 => Ok(&self.block_types[2]),
            -0x03 => Ok(&self.block_types[3]),
            -0x04 => Ok(&self.block_types[4]),
            idx if idx >= 0 => {
                let ty = self.get(idx as u32)?;
                if ty.results.len() > 1 {
                    bail!("multi-value block type {idx} is not supported");
                }
                Ok(ty)
            }
            _ => bail!("unknown block type tag {raw}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_form_block_types() {
        let catalog = TypeCatalog::new(Vec::new());
        assert!(catalog.block_type(-0x40).unwrap().results.is_empty());
        assert_eq!(
            catalog.block_type(-0x01).unwrap().results,
            vec![ValueType::I32]
        );
        assert_eq!(
            catalog.block_type(-0x04).unwrap().results,
            vec![ValueType::F64]
        );
        assert!(catalog.block_type(-0x07).is_err());
    }

    #[test]
    fn indexed_block_types() {
        let catalog = TypeCatalog::new(vec![FuncType {
            params: vec![ValueType::I32],
            results: vec![ValueType::I64],
        }]);
        let ty = catalog.block_type(0).unwrap();
        assert_eq!(ty.params, vec![ValueType::I32]);
        assert_eq!(ty.results, vec![ValueType::I64]);
        assert!(catalog.block_type(1).is_err());
    }

    #[test]
    fn parse_rejects_multi_value() {
        // (func (result i32 i32)): tag 0x60, no params, two i32 results
        let bytes = [0x60, 0x00, 0x02, 0x7f, 0x7f];
        let mut reader = ByteReader::new(&bytes[..]);
        let err = TypeCatalog::parse(&mut reader, 1).unwrap_err();
        assert!(err.to_string().contains("multi-value"));
    }

    #[test]
    fn c_types() {
        assert_eq!(ValueType::I32.c_type(), "uint32_t");
        assert_eq!(ValueType::F64.c_type(), "double");
        let void = FuncType {
            params: vec![],
            results: vec![],
        };
        assert_eq!(void.c_return_type(), "void");
    }
}
