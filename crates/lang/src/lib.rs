// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! The femtocode front end: expression trees as handed over by an
//! embedding layer, the typing pass that annotates them with refined
//! schemas, the columnar statement list they lower to, and the standard
//! function library driving both.

pub mod error;
pub mod expr;
pub mod frame;
pub mod library;
pub mod statements;
pub mod typed;

pub use error::LangError;
pub use expr::Expr;
pub use femtocode_type::Result;
pub use frame::Frame;
pub use library::{Builtin, FunctionTable};
pub use statements::{SlRef, Statement, StatementList};
pub use typed::{Typed, TypedExpr, TypedKind};
