//! Marshal class name parsing
//!
//! The server reports schema types as Java marshal class names. This module
//! resolves them into [`crate::types::DataType`] trees.

mod lexer;
pub mod type_parser;

pub use type_parser::{
    is_collection, is_composite, is_frozen, is_reversed, is_tuple_type, is_user_type,
    lookup_scalar, parse_one, parse_with_composite, KeyComponent, ParseResult, TypeParser,
};
