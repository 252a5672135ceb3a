// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Shredding and assembly: nested typed values to and from flat
//! per-column arrays with size and tag sidecars, plus the dataset
//! metadata that describes where those stripes live.

pub mod assemble;
pub mod buffers;
pub mod dataset;
pub mod layout;
pub mod shred;

pub use assemble::{Cursors, assemble, assemble_all};
pub use buffers::{ArrayBuffer, ColumnBuffers};
pub use dataset::{ColumnDescriptor, Dataset, Group, Segment};
pub use femtocode_type::Result;
pub use layout::{Column, ColumnKind, columns_of, size_depths};
pub use shred::shred;
