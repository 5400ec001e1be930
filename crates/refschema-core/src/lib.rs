//! # refschema-core — Value & Pointer Primitives
//!
//! The leaf crate of the refschema workspace. It holds the small set of
//! primitives every other part of the engine leans on when it looks at a
//! dynamically typed JSON value:
//!
//! - [`JsonPointer`]: RFC 6901 pointers, used both to address instance
//!   locations in validation errors and to descend into schema documents
//!   when a `$ref` carries a `#/...` fragment.
//! - [`DataType`] and [`data_type`]: the JSON Schema type vocabulary and the
//!   inference rules that map a `serde_json::Value` onto it, including the
//!   hint-assisted reinterpretation of textual values.
//! - [`values_equal`]: structural equality in which `1` and `1.0` are the
//!   same number.
//! - [`invalid_value_string`]: the short rendering of a value used inside
//!   validation messages.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `refschema-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod pointer;
pub mod value;

pub use error::{PointerError, UnknownTypeError};
pub use pointer::{parse_index, JsonPointer};
pub use value::{
    data_type, data_type_with_hint, invalid_value_string, parse_bool, values_equal, DataType,
};
