use nrbf_types::TypeError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("unexpected end of stream at offset {offset}: {needed} more bytes needed")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("invalid tag at offset {offset}: {source}")]
    InvalidTag {
        offset: usize,
        #[source]
        source: TypeError,
    },

    #[error("malformed length prefix at offset {offset}")]
    MalformedVarint { offset: usize },

    #[error("invalid UTF-8 at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("invalid value at offset {offset}: {source}")]
    InvalidValue {
        offset: usize,
        #[source]
        source: TypeError,
    },

    #[error("class record refers to unknown metadata id {metadata_id}")]
    UnknownMetadata { metadata_id: i32 },

    #[error("unresolved object reference: {id}")]
    UnresolvedReference { id: i32 },

    #[error("record nesting deeper than {max_depth} at offset {offset}")]
    NestingTooDeep { offset: usize, max_depth: usize },

    #[error("malformed record at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },

    #[error("cannot encode record: {0}")]
    Encode(String),
}

impl CodecError {
    /// Corrupt or truncated input. Fatal for the whole parse.
    pub fn is_structural(&self) -> bool {
        !matches!(self, Self::UnresolvedReference { .. } | Self::Encode(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Self::UnresolvedReference { .. })
    }
}

pub type CodecResult<T> = Result<T, CodecError>;
