//! Marshalling between typed values and the raw buffers held by the engine.
//!
//! Numeric values travel in network byte order. Strings and blobs are the
//! bare bytes (no terminator). Table blobs use a row-prefixed layout:
//!
//! ```text
//! u32 row_count | (u32 row_len | row_len bytes) * row_count
//! ```

mod decode;
mod encode;
mod table;

pub(crate) use decode::Cursor;
pub use decode::decode;
pub use encode::encode;
pub use table::Table;

/// Largest String/Blob payload a variable's size field can describe.
pub const MAX_VARIABLE_SIZE: usize = u8::MAX as usize;

/// Row slots a table blob may hold; row indices stay below this.
pub const MAX_TABLE_ROWS: u32 = u16::MAX as u32 + 1;
