//! Value encoding.

use bytes::Bytes;

use super::MAX_VARIABLE_SIZE;
use crate::error::{Error, Operation, Result};
use crate::types::VarType;
use crate::value::Value;

/// Encode `value` for a variable of type `ty`.
///
/// The value's variant must match `ty` exactly; no numeric widening or
/// narrowing is performed. Table blobs cannot be written whole, use a row
/// update instead.
pub fn encode(ty: VarType, value: &Value) -> Result<Bytes> {
    if ty == VarType::TableBlob {
        return Err(Error::UnsupportedOperation {
            op: Operation::Set,
            ty,
        });
    }
    if value.var_type() != ty {
        return Err(Error::TypeMismatch {
            expected: ty,
            actual: value.var_type(),
        });
    }

    let bytes = match value {
        Value::Int8(v) => Bytes::copy_from_slice(&v.to_be_bytes()),
        Value::Int16(v) => Bytes::copy_from_slice(&v.to_be_bytes()),
        Value::Int32(v) => Bytes::copy_from_slice(&v.to_be_bytes()),
        Value::Int64(v) => Bytes::copy_from_slice(&v.to_be_bytes()),
        Value::UInt8(v) => Bytes::copy_from_slice(&v.to_be_bytes()),
        Value::UInt16(v) => Bytes::copy_from_slice(&v.to_be_bytes()),
        Value::UInt32(v) => Bytes::copy_from_slice(&v.to_be_bytes()),
        Value::UInt64(v) => Bytes::copy_from_slice(&v.to_be_bytes()),
        Value::Float32(v) => Bytes::copy_from_slice(&v.to_be_bytes()),
        Value::Float64(v) => Bytes::copy_from_slice(&v.to_be_bytes()),
        Value::String(s) => {
            check_size(s.len())?;
            Bytes::copy_from_slice(s.as_bytes())
        }
        Value::Blob(b) => {
            check_size(b.len())?;
            b.clone()
        }
        Value::Table(_) => {
            return Err(Error::UnsupportedOperation {
                op: Operation::Set,
                ty: VarType::TableBlob,
            });
        }
    };
    Ok(bytes)
}

fn check_size(len: usize) -> Result<()> {
    if len > MAX_VARIABLE_SIZE {
        return Err(Error::ValueTooLong {
            len,
            max: MAX_VARIABLE_SIZE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_big_endian() {
        assert_eq!(
            encode(VarType::UInt16, &Value::UInt16(0x1234)).unwrap().as_ref(),
            &[0x12, 0x34]
        );
        assert_eq!(
            encode(VarType::Int32, &Value::Int32(-2)).unwrap().as_ref(),
            &[0xff, 0xff, 0xff, 0xfe]
        );
        assert_eq!(
            encode(VarType::Float32, &Value::Float32(1.0)).unwrap().as_ref(),
            &[0x3f, 0x80, 0x00, 0x00]
        );
    }

    #[test]
    fn test_encode_string_has_no_terminator() {
        let bytes = encode(VarType::String, &Value::from("Lamp")).unwrap();
        assert_eq!(bytes.as_ref(), b"Lamp");
    }

    #[test]
    fn test_encode_type_mismatch() {
        let err = encode(VarType::UInt8, &Value::Int8(1)).unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch {
                expected: VarType::UInt8,
                actual: VarType::Int8
            }
        ));

        let err = encode(VarType::Blob, &Value::from("text")).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_encode_table_unsupported() {
        let err = encode(VarType::TableBlob, &Value::Table(Default::default())).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedOperation {
                op: Operation::Set,
                ty: VarType::TableBlob
            }
        ));
    }

    #[test]
    fn test_encode_too_long() {
        let long = "x".repeat(256);
        let err = encode(VarType::String, &Value::String(long)).unwrap_err();
        assert!(matches!(err, Error::ValueTooLong { len: 256, max: 255 }));

        let max = vec![0u8; 255];
        assert_eq!(encode(VarType::Blob, &Value::from(max)).unwrap().len(), 255);
    }
}
