use nrbf_graph::GraphError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SvipError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid line parameter: {0}")]
    InvalidLine(String),

    #[error("unexpected project shape: {0}")]
    Shape(String),
}

impl SvipError {
    /// Corrupt file contents, as opposed to a schema or usage problem.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Graph(e) if e.is_structural())
    }
}

pub type SvipResult<T> = Result<T, SvipError>;
