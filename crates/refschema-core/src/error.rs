//! Error types for the value and pointer primitives.

use thiserror::Error;

/// Error produced while parsing a JSON Pointer or a pointer-bearing fragment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PointerError {
    /// A non-empty pointer must start with `/`.
    #[error("json pointer \"{0}\" must be empty or start with '/'")]
    MissingLeadingSlash(String),

    /// `~` must be followed by `0` or `1`.
    #[error("json pointer \"{pointer}\" contains an invalid escape at byte {offset}")]
    InvalidEscape {
        /// The pointer text as given.
        pointer: String,
        /// Byte offset of the offending `~`.
        offset: usize,
    },

    /// A `%XX` sequence in a URI fragment was not valid hex or not UTF-8.
    #[error("fragment \"{0}\" is not validly percent-encoded")]
    InvalidPercentEncoding(String),
}

/// A data type name outside the JSON Schema vocabulary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("\"{0}\" is not a valid type")]
pub struct UnknownTypeError(pub String);
