// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Value-set schemas with range refinement, the values they describe, and
//! the column naming scheme that maps nested schemas onto flat stripes.
//!
//! Everything else in the workspace builds on this crate: the language
//! front end refines these schemas during inference, the columnar crate
//! shreds values along their column names, and the engine derives work
//! array dtypes from them.

pub mod bound;
pub mod column;
pub mod error;
pub mod schema;
pub mod value;

pub use bound::Bound;
pub use column::{ColumnName, Segment, Suffix};
pub use error::{Diagnostic, Error, IntoDiagnostic};
pub use schema::{Charset, Dtype, Schema, SchemaContext};
pub use value::Value;

pub type Result<T> = std::result::Result<T, Error>;
