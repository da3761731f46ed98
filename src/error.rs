use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while turning a CSV directory into EX documents.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("input directory does not exist: {0}")]
    MissingInputPath(PathBuf),

    #[error("no surface data could be read from {0}")]
    EmptyIngestionResult(PathBuf),

    /// A cell in one of the first three columns is not a float.
    #[error("{path}: line {line}, column {column}: cannot parse {value:?} as a number")]
    RowParse {
        path: PathBuf,
        line: u64,
        column: usize,
        value: String,
    },

    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to write '{path}': {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("field '{0}' is not defined on the document")]
    UndefinedField(String),

    #[error("nodeset '{0}' does not exist")]
    MissingNodeset(String),

    #[error("EX parse error at line {line}: {message}")]
    ExParse { line: usize, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ConvertError {
    /// Process exit status reported by the command-line tool.
    pub fn exit_code(&self) -> i32 {
        match self {
            ConvertError::MissingInputPath(_) => -1,
            ConvertError::EmptyIngestionResult(_) => -2,
            _ => 1,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
