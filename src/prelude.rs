//! Prelude module for convenient imports.
//!
//! ```rust
//! use jip_model::prelude::*;
//! ```
//!
//! This imports:
//! - Core types: [`Context`], [`Value`], [`VarType`], [`NodeSnapshot`],
//!   [`VariableSnapshot`]
//! - Error handling: [`Error`], [`Result`], [`Status`]
//! - Request and subscription types: [`GetFlags`], [`DeviceFilter`],
//!   [`ChangeKind`]

pub use crate::context::Context;
pub use crate::error::{Error, Result, Status};
pub use crate::network::{NodeSnapshot, VariableSnapshot};
pub use crate::types::{AccessType, ChangeKind, DeviceFilter, GetFlags, VarType};
pub use crate::value::Value;
