//! Custom error types for bamlens operations.

use thiserror::Error;

/// Result type alias for bamlens operations
pub type Result<T> = std::result::Result<T, BamlensError>;

/// Error type for bamlens operations
#[derive(Error, Debug)]
pub enum BamlensError {
    /// The BAM header does not start with the `BAM\1` magic number
    #[error("BAM header error: bad magic number. This could be caused by either a corrupt or missing file.")]
    BadMagic,

    /// The BAM header block ends before its declared contents
    #[error("BAM header is truncated at byte {offset}")]
    TruncatedHeader {
        /// Byte offset at which the header ran out of data
        offset: usize,
    },

    /// A tag value type the decoder does not implement (e.g. float)
    #[error("unsupported value type '{value_type}' for tag {tag}")]
    UnsupportedTagType {
        /// Two-character tag name
        tag: String,
        /// The type byte as a character
        value_type: char,
    },

    /// Input violated the coordinate-sorted precondition
    #[error(
        "input is not coordinate-sorted: record at ref {ref_id}, position {position} \
         follows ref {prev_ref_id}, position {prev_position}"
    )]
    UnsortedInput {
        /// Reference index of the offending record
        ref_id: i32,
        /// Position of the offending record
        position: i64,
        /// Reference index of the preceding record
        prev_ref_id: i32,
        /// Position of the preceding record
        prev_position: i64,
    },

    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },
}
