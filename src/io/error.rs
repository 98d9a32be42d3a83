//! # Error reporting for reading of matrix files
use std::io;

use thiserror::Error;

/// Created when an error was encountered during IO or parsing.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The file to read isn't found, or the reading of the file couldn't start or was interrupted.
    #[error("could not read matrix file: {0}")]
    Io(#[from] io::Error),
    /// A line of the file could not be parsed.
    ///
    /// Line numbers start at one, like in an editor.
    #[error("line {line_number} (\"{line}\"): {description}")]
    Parse {
        /// Where the problem is.
        line_number: usize,
        /// The offending line.
        line: String,
        /// What is wrong with it.
        description: String,
    },
    /// The file holds no matrix at all.
    #[error("matrix file contains no entries")]
    Empty,
}

impl ImportError {
    pub(super) fn parse(line_number: usize, line: &str, description: impl Into<String>) -> Self {
        Self::Parse {
            line_number: line_number + 1,
            line: line.to_string(),
            description: description.into(),
        }
    }
}
