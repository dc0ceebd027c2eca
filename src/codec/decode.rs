//! Value decoding.

use bytes::Bytes;

use super::Table;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::types::VarType;
use crate::value::Value;

/// Decode a raw buffer held for a variable of type `ty`.
///
/// Numeric types require exactly their width. Strings decode lossily, so
/// invalid UTF-8 never fails. Table blobs omit empty rows.
pub fn decode(ty: VarType, data: &[u8]) -> Result<Value> {
    let value = match ty {
        VarType::Int8 => Value::Int8(i8::from_be_bytes(array(ty, data)?)),
        VarType::Int16 => Value::Int16(i16::from_be_bytes(array(ty, data)?)),
        VarType::Int32 => Value::Int32(i32::from_be_bytes(array(ty, data)?)),
        VarType::Int64 => Value::Int64(i64::from_be_bytes(array(ty, data)?)),
        VarType::UInt8 => Value::UInt8(u8::from_be_bytes(array(ty, data)?)),
        VarType::UInt16 => Value::UInt16(u16::from_be_bytes(array(ty, data)?)),
        VarType::UInt32 => Value::UInt32(u32::from_be_bytes(array(ty, data)?)),
        VarType::UInt64 => Value::UInt64(u64::from_be_bytes(array(ty, data)?)),
        VarType::Float32 => Value::Float32(f32::from_be_bytes(array(ty, data)?)),
        VarType::Float64 => Value::Float64(f64::from_be_bytes(array(ty, data)?)),
        VarType::String => Value::String(String::from_utf8_lossy(data).into_owned()),
        VarType::Blob => Value::Blob(Bytes::copy_from_slice(data)),
        VarType::TableBlob => Value::Table(Table::from_raw(data)?.into_map()),
    };
    Ok(value)
}

fn array<const N: usize>(ty: VarType, data: &[u8]) -> Result<[u8; N]> {
    data.try_into().map_err(|_| {
        Error::decode(
            ty,
            DecodeErrorKind::BufferSize {
                expected: N,
                actual: data.len(),
            },
        )
    })
}

/// Forward reader over a table buffer.
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if len > available {
            return Err(Error::decode(
                VarType::TableBlob,
                DecodeErrorKind::InsufficientData {
                    needed: len,
                    available,
                },
            ));
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }
}
