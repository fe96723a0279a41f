//! cqlbind Core
//!
//! Type resolution and value encoding for the CQL native protocol: resolves
//! the server's marshal class names into a type model, binds application
//! values into length-framed wire buffers with schema checks, and decodes
//! response values through zero-copy views.
//!
//! ```rust
//! use cqlbind_core::{parser, codec::BindValue, decode::DecodeView};
//!
//! let int = parser::parse_one("org.apache.cassandra.db.marshal.Int32Type")?;
//! BindValue::Int32(42).validate(&int)?;
//!
//! let encoded = BindValue::Int32(42).encode(4)?;
//! let (view, _) = DecodeView::from_frame(&int, &encoded, 4)?;
//! assert_eq!(view.as_i32()?, 42);
//! # Ok::<(), cqlbind_core::Error>(())
//! ```

#![allow(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod codec;
pub mod config;
pub mod decode;
pub mod error;
pub mod metadata;
pub mod parser;
pub mod schema;
pub mod types;

// Re-export main types for convenience
pub use crate::{
    buffer::{Buffer, BufferBuilder},
    codec::{BindValue, BoundValues, Collection, Decimal, TupleValue, UserTypeValue},
    config::CodecConfig,
    decode::{DecodeView, RowsView},
    error::{Error, ErrorCategory, Result},
    metadata::{ColumnDefinition, ResultMetadata},
    parser::{ParseResult, TypeParser},
    schema::{SchemaRefresh, SchemaRegistry},
    types::*,
};
