//! Error types shared by the byte-level, type-spec, and JSON codec layers.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure modes for decoding/encoding a `ClickHouse` JSON column.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying reader/writer failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A read ran past the end of the supplied buffer.
    #[error("truncated input: {0}")]
    TruncatedInput(&'static str),

    /// A path/spec length or count in a header made no sense.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// A type-spec string failed to parse.
    #[error("invalid type spec: {0}")]
    InvalidTypeSpec(String),

    /// `column_for_spec` returned no codec for a leaf spec encountered on read.
    #[error("unknown column spec: {0}")]
    UnknownSpec(String),

    /// A write-side value could not be coerced into its inferred spec.
    #[error("value cannot be encoded as {spec}: {reason}")]
    UnencodableValue {
        /// The spec inference chose for the value.
        spec: String,
        /// Why the coercion failed.
        reason: String,
    },

    /// A shared-paths sub-branch was encountered on read in strict mode.
    #[error("unsupported shared-paths branch: {0}")]
    UnsupportedBranch(String),
}
