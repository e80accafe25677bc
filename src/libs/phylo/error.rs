use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Malformed Newick text
    ParseError {
        message: String,
        /// 1-based
        line: usize,
        /// 1-based
        column: usize,
        /// Input starting at the failure
        snippet: String,
    },
    /// No leaf carries this name
    MissingLeaf(String),
    /// Invalid structural operation
    LogicError(String),
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::ParseError {
                message,
                line,
                column,
                snippet,
            } => {
                write!(
                    f,
                    "Newick parse error at line {}, column {}:\n{}Snippet: \"{}\"",
                    line, column, message, snippet
                )
            }
            TreeError::MissingLeaf(name) => write!(f, "no leaf named `{}` in the tree", name),
            TreeError::LogicError(msg) => write!(f, "tree error: {}", msg),
        }
    }
}

impl std::error::Error for TreeError {}

impl From<String> for TreeError {
    fn from(msg: String) -> Self {
        TreeError::LogicError(msg)
    }
}
