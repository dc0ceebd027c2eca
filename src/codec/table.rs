//! Table blob layout.

use std::collections::BTreeMap;

use bytes::{BufMut, Bytes, BytesMut};

use super::{Cursor, MAX_TABLE_ROWS};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::types::VarType;

/// Rows of a table blob variable, including empty slots.
///
/// Engines use this to maintain the raw buffer of a table variable; clients
/// normally see the decoded [`Value::Table`](crate::Value::Table) map instead.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    rows: Vec<Bytes>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from rows in index order.
    pub fn from_rows<I, R>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Bytes>,
    {
        Self {
            rows: rows.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a raw table buffer.
    pub fn from_raw(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let count = cursor.read_u32()?;
        // Every row needs at least its length prefix.
        let mut rows = Vec::with_capacity((count as usize).min(cursor.remaining() / 4));
        for _ in 0..count {
            let len = cursor.read_u32()? as usize;
            rows.push(Bytes::copy_from_slice(cursor.read_bytes(len)?));
        }
        if cursor.remaining() > 0 {
            return Err(Error::decode(
                VarType::TableBlob,
                DecodeErrorKind::TrailingData {
                    remaining: cursor.remaining(),
                },
            ));
        }
        Ok(Self { rows })
    }

    /// Serialize to the raw table layout.
    pub fn to_raw(&self) -> Bytes {
        let size = 4 + self.rows.iter().map(|r| 4 + r.len()).sum::<usize>();
        let mut buf = BytesMut::with_capacity(size);
        buf.put_u32(self.rows.len() as u32);
        for row in &self.rows {
            buf.put_u32(row.len() as u32);
            buf.put_slice(row);
        }
        buf.freeze()
    }

    /// Number of row slots, empty ones included.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row contents; `None` for empty or missing rows.
    pub fn row(&self, index: u32) -> Option<&Bytes> {
        self.rows.get(index as usize).filter(|r| !r.is_empty())
    }

    /// Replace one row, growing the table with empty rows as needed.
    ///
    /// Fails with [`Error::RowOutOfRange`] for indices at or past
    /// [`MAX_TABLE_ROWS`]; the table is left unchanged.
    pub fn set_row(&mut self, index: u32, data: impl Into<Bytes>) -> Result<()> {
        if index >= MAX_TABLE_ROWS {
            return Err(Error::RowOutOfRange {
                row: index,
                max: MAX_TABLE_ROWS,
            });
        }
        let index = index as usize;
        if index >= self.rows.len() {
            self.rows.resize(index + 1, Bytes::new());
        }
        self.rows[index] = data.into();
        Ok(())
    }

    /// Non-empty rows with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Bytes)> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_empty())
            .map(|(i, r)| (i as u32, r))
    }

    /// Non-empty rows keyed by index.
    pub fn into_map(self) -> BTreeMap<u32, Bytes> {
        self.rows
            .into_iter()
            .enumerate()
            .filter(|(_, r)| !r.is_empty())
            .map(|(i, r)| (i as u32, r))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;
    use crate::value::Value;

    fn raw(rows: &[&[u8]]) -> Vec<u8> {
        let mut out = (rows.len() as u32).to_be_bytes().to_vec();
        for row in rows {
            out.extend_from_slice(&(row.len() as u32).to_be_bytes());
            out.extend_from_slice(row);
        }
        out
    }

    #[test]
    fn test_empty_rows_omitted() {
        let data = raw(&[&[1, 2], &[], &[3, 4, 5]]);
        let value = decode(VarType::TableBlob, &data).unwrap();
        let rows = value.as_table().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[&0].as_ref(), &[1, 2]);
        assert_eq!(rows[&2].as_ref(), &[3, 4, 5]);
        assert!(!rows.contains_key(&1));
    }

    #[test]
    fn test_empty_table() {
        let value = decode(VarType::TableBlob, &[0, 0, 0, 0]).unwrap();
        assert_eq!(value, Value::Table(BTreeMap::new()));
    }

    #[test]
    fn test_to_raw_matches_layout() {
        let table = Table::from_rows([vec![1u8, 2], vec![], vec![3, 4, 5]]);
        assert_eq!(table.to_raw().as_ref(), raw(&[&[1, 2], &[], &[3, 4, 5]]).as_slice());
        assert_eq!(Table::from_raw(&table.to_raw()).unwrap(), table);
    }

    #[test]
    fn test_set_row_grows() {
        let mut table = Table::new();
        table.set_row(3, Bytes::from_static(b"abc")).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.row(0), None);
        assert_eq!(table.row(3).unwrap().as_ref(), b"abc");

        table.set_row(3, Bytes::new()).unwrap();
        assert_eq!(table.row(3), None);
        assert_eq!(table.iter().count(), 0);
    }

    #[test]
    fn test_set_row_out_of_range() {
        let mut table = Table::from_rows([vec![1u8]]);
        for index in [MAX_TABLE_ROWS, u32::MAX] {
            assert!(matches!(
                table.set_row(index, vec![2u8]),
                Err(Error::RowOutOfRange { row, max: MAX_TABLE_ROWS }) if row == index
            ));
        }
        assert_eq!(table.len(), 1);

        table.set_row(MAX_TABLE_ROWS - 1, vec![2u8]).unwrap();
        assert_eq!(table.len(), MAX_TABLE_ROWS as usize);
        assert_eq!(table.row(0).unwrap().as_ref(), &[1]);
    }

    #[test]
    fn test_truncated_row() {
        let mut data = raw(&[&[1, 2, 3]]);
        data.pop();
        let err = Table::from_raw(&data).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                kind: DecodeErrorKind::InsufficientData {
                    needed: 3,
                    available: 2
                },
                ..
            }
        ));
    }

    #[test]
    fn test_huge_row_count_rejected() {
        let err = Table::from_raw(&[0xff, 0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_trailing_data() {
        let mut data = raw(&[&[1]]);
        data.push(9);
        assert!(matches!(
            Table::from_raw(&data),
            Err(Error::Decode {
                kind: DecodeErrorKind::TrailingData { remaining: 1 },
                ..
            })
        ));
    }

    #[test]
    fn test_missing_header() {
        assert!(Table::from_raw(&[]).is_err());
    }
}
