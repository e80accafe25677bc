//! Error types shared by the matrix and tree pipeline.

use crate::libs::phylo::TreeError;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// I/O failure on a specific file
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bad argument or unusable input location
    #[error("configuration error: {0}")]
    Config(String),

    /// A line of an input file that could not be parsed
    #[error("{}:{line}: {message}", file.display())]
    Format {
        file: PathBuf,
        line: usize,
        message: String,
    },

    /// Matrices of different regions disagree on size or sample order
    #[error("consistency error at region {index}: {message}")]
    Consistency { index: String, message: String },

    /// A distance cell is undefined for the group's aggregate
    #[error("group {group}: {source}")]
    Distance {
        group: String,
        #[source]
        source: DistanceError,
    },

    /// External program could not be run or produced no usable output
    #[error("external tool `{program}` failed: {message}")]
    ExternalTool { program: String, message: String },

    #[error(transparent)]
    Tree(#[from] TreeError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub fn io(path: impl AsRef<Path>) -> impl FnOnce(std::io::Error) -> PipelineError {
        let path = path.as_ref().to_path_buf();
        move |source| PipelineError::Io { path, source }
    }

    pub fn format(file: impl AsRef<Path>, line: usize, message: impl Into<String>) -> Self {
        PipelineError::Format {
            file: file.as_ref().to_path_buf(),
            line,
            message: message.into(),
        }
    }

    pub fn consistency(index: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Consistency {
            index: index.into(),
            message: message.into(),
        }
    }

    pub fn tool(program: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::ExternalTool {
            program: program.into(),
            message: message.into(),
        }
    }
}

/// Cell-level failures of the distance model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DistanceError {
    #[error("no comparable sites between rows {row} and {col}")]
    NoSites { row: usize, col: usize },

    #[error("p-distance {p} at ({row}, {col}) is saturated for Jukes-Cantor (p >= 0.75)")]
    Saturated { row: usize, col: usize, p: f64 },

    #[error("invalid proportion {p} at ({row}, {col})")]
    InvalidProportion { row: usize, col: usize, p: f64 },

    #[error("matrix sizes differ: {0} vs {1}")]
    SizeMismatch(usize, usize),
}

impl DistanceError {
    /// Cell coordinates, when the error refers to one.
    pub fn cell(&self) -> Option<(usize, usize)> {
        match self {
            DistanceError::NoSites { row, col }
            | DistanceError::Saturated { row, col, .. }
            | DistanceError::InvalidProportion { row, col, .. } => Some((*row, *col)),
            DistanceError::SizeMismatch(..) => None,
        }
    }
}
