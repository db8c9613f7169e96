use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown {kind} tag: {tag}")]
    UnknownTag { kind: &'static str, tag: u8 },

    #[error("invalid decimal literal: {0:?}")]
    InvalidDecimal(String),

    #[error("date/time ticks out of range: {0}")]
    TicksOutOfRange(u64),

    #[error("invalid date/time kind: {0}")]
    InvalidDateTimeKind(u8),
}
