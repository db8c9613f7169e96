use nrbf_codec::CodecError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("unknown class: {0}")]
    UnknownClass(String),

    #[error("class {class} has no field {field}")]
    UnknownField { class: String, field: String },

    #[error("schema mismatch at {context}: {reason}")]
    SchemaMismatch { context: String, reason: String },

    #[error("root object {0} not found in stream")]
    RootNotFound(i32),

    #[error("stream has no header record")]
    MissingHeader,

    #[error("reference cycle through object {0}")]
    CyclicReference(i32),

    #[error("cannot encode {class}.{field}: {reason}")]
    UnmappedField {
        class: String,
        field: String,
        reason: String,
    },

    #[error("invalid file preamble: {0}")]
    InvalidPreamble(String),
}

impl GraphError {
    /// Corrupt input: bad bytes, truncation, or a broken preamble.
    pub fn is_structural(&self) -> bool {
        match self {
            Self::Codec(e) => e.is_structural(),
            Self::InvalidPreamble(_) => true,
            _ => false,
        }
    }

    /// The stream is well-formed but does not fit the target schema.
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(
            self,
            Self::UnknownClass(_) | Self::UnknownField { .. } | Self::SchemaMismatch { .. }
        )
    }
}

pub type GraphResult<T> = Result<T, GraphError>;
