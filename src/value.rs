//! Typed variable values.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;

use crate::error::{Error, Operation, Result};
use crate::types::VarType;

/// Value of a variable, one variant per [`VarType`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    Blob(Bytes),
    /// Table rows keyed by row index. Empty rows are not represented.
    Table(BTreeMap<u32, Bytes>),
}

impl Value {
    /// The variable type this value belongs to.
    pub fn var_type(&self) -> VarType {
        match self {
            Value::Int8(_) => VarType::Int8,
            Value::Int16(_) => VarType::Int16,
            Value::Int32(_) => VarType::Int32,
            Value::Int64(_) => VarType::Int64,
            Value::UInt8(_) => VarType::UInt8,
            Value::UInt16(_) => VarType::UInt16,
            Value::UInt32(_) => VarType::UInt32,
            Value::UInt64(_) => VarType::UInt64,
            Value::Float32(_) => VarType::Float32,
            Value::Float64(_) => VarType::Float64,
            Value::String(_) => VarType::String,
            Value::Blob(_) => VarType::Blob,
            Value::Table(_) => VarType::TableBlob,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            Value::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&BTreeMap<u32, Bytes>> {
        match self {
            Value::Table(rows) => Some(rows),
            _ => None,
        }
    }

    /// Any integer variant widened to `i128`.
    pub fn as_integer(&self) -> Option<i128> {
        match *self {
            Value::Int8(v) => Some(v.into()),
            Value::Int16(v) => Some(v.into()),
            Value::Int32(v) => Some(v.into()),
            Value::Int64(v) => Some(v.into()),
            Value::UInt8(v) => Some(v.into()),
            Value::UInt16(v) => Some(v.into()),
            Value::UInt32(v) => Some(v.into()),
            Value::UInt64(v) => Some(v.into()),
            _ => None,
        }
    }

    /// Parse command-line style text as a value of type `ty`.
    ///
    /// Integers accept decimal or `0x` hex (signed types also a leading `-`).
    /// Blobs are hex digits with an optional `0x` prefix; an odd trailing
    /// digit fills the high nibble of the last byte. Strings are taken
    /// verbatim.
    pub fn parse(ty: VarType, text: &str) -> Result<Value> {
        let bad = || Error::parse(ty, text);
        let value = match ty {
            VarType::Int8 => Value::Int8(int(text).ok_or_else(bad)?),
            VarType::Int16 => Value::Int16(int(text).ok_or_else(bad)?),
            VarType::Int32 => Value::Int32(int(text).ok_or_else(bad)?),
            VarType::Int64 => Value::Int64(int(text).ok_or_else(bad)?),
            VarType::UInt8 => Value::UInt8(int(text).ok_or_else(bad)?),
            VarType::UInt16 => Value::UInt16(int(text).ok_or_else(bad)?),
            VarType::UInt32 => Value::UInt32(int(text).ok_or_else(bad)?),
            VarType::UInt64 => Value::UInt64(int(text).ok_or_else(bad)?),
            VarType::Float32 => Value::Float32(text.trim().parse().map_err(|_| bad())?),
            VarType::Float64 => Value::Float64(text.trim().parse().map_err(|_| bad())?),
            VarType::String => Value::String(text.to_owned()),
            VarType::Blob => Value::Blob(parse_hex(text).ok_or_else(bad)?),
            VarType::TableBlob => {
                return Err(Error::UnsupportedOperation {
                    op: Operation::Set,
                    ty,
                });
            }
        };
        Ok(value)
    }
}

fn int<T: TryFrom<i128>>(text: &str) -> Option<T> {
    parse_int(text)?.try_into().ok()
}

fn parse_int(text: &str) -> Option<i128> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i128::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i128>().ok()?,
    };
    // from_str_radix accepts its own sign; reject "--1" and "0x-1"
    if magnitude < 0 {
        return None;
    }
    Some(if negative { -magnitude } else { magnitude })
}

fn parse_hex(text: &str) -> Option<Bytes> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    let mut out = Vec::with_capacity(digits.len().div_ceil(2));
    for pair in digits.as_bytes().chunks(2) {
        let high = hex_nibble(pair[0])?;
        let low = match pair.get(1) {
            Some(&c) => hex_nibble(c)?,
            None => 0,
        };
        out.push(high << 4 | low);
    }
    Some(Bytes::from(out))
}

fn hex_nibble(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}

fn write_blob(f: &mut fmt::Formatter<'_>, data: &[u8]) -> fmt::Result {
    write!(f, "{{")?;
    for byte in data {
        write!(f, " 0x{:02x}", byte)?;
    }
    write!(f, " }}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int8(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt8(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::Blob(b) => write_blob(f, b),
            Value::Table(rows) => {
                for (i, (index, row)) in rows.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{:3} ", index)?;
                    write_blob(f, row)?;
                }
                Ok(())
            }
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    String => String,
    Bytes => Blob,
    BTreeMap<u32, Bytes> => Table,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(Bytes::from(v))
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(Bytes::copy_from_slice(v))
    }
}
