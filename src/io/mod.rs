//! # Reading matrices from files
//!
//! Two plain text formats are supported:
//!
//! * sparse: one `col row value` triple per line, until the first blank line;
//! * dense: a rectangular grid of whitespace separated values, one matrix row per line.
//!
//! Only the coordinator reads files, the loaded matrix is distributed by the operations
//! themselves.
use std::fs;
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::data::linear_algebra::{Direction, Element};
use crate::data::linear_algebra::matrix::SparseMatrix;
pub use crate::io::error::ImportError;

pub mod error;

/// Layout of a matrix file.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Format {
    /// `col row value` triples.
    Sparse,
    /// A full grid of values.
    Dense,
}

/// The contents of a matrix file before it is put into a matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    /// Nonzero values of the matrix.
    pub elements: Vec<Element>,
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
}

impl Loaded {
    /// Store the loaded values in a matrix.
    #[must_use]
    pub fn into_matrix(self, direction: Direction) -> SparseMatrix {
        SparseMatrix::with_dimensions(self.elements, self.width, self.height, direction)
    }
}

/// Import a matrix from a file.
///
/// # Arguments
///
/// * `path`: File to read.
/// * `format`: How the file is laid out.
/// * `direction`: Storage direction of the resulting matrix.
///
/// # Errors
///
/// When the file can't be read, a line can't be parsed or the file holds no entries.
pub fn import<P: AsRef<Path>>(path: P, format: Format, direction: Direction) -> Result<SparseMatrix, ImportError> {
    let path = path.as_ref();
    let loaded = match format {
        Format::Sparse => load_sparse(path)?,
        Format::Dense => load_dense(path)?,
    };
    debug!(path = %path.display(), ?format, width = loaded.width, height = loaded.height, nnz = loaded.elements.len(), "imported matrix");

    Ok(loaded.into_matrix(direction))
}

/// Read a file of `col row value` lines.
pub fn load_sparse<P: AsRef<Path>>(path: P) -> Result<Loaded, ImportError> {
    parse_sparse(&fs::read_to_string(path)?)
}

/// Read a file with a dense grid of values.
pub fn load_dense<P: AsRef<Path>>(path: P) -> Result<Loaded, ImportError> {
    parse_dense(&fs::read_to_string(path)?)
}

/// Lines up to the first blank one, with their index.
fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .take_while(|(_, line)| !line.trim().is_empty())
}

/// Largest index accepted, so that the dimensions still fit a message.
const MAX_INDEX: usize = i32::MAX as usize - 1;

fn field<T: FromStr>(line_number: usize, line: &str, word: &str, what: &str) -> Result<T, ImportError> {
    word.parse().map_err(|_| ImportError::parse(line_number, line, format!("invalid {what} \"{word}\"")))
}

fn index(line_number: usize, line: &str, word: &str, what: &str) -> Result<usize, ImportError> {
    let index = field::<usize>(line_number, line, word, what)?;
    if index > MAX_INDEX {
        return Err(ImportError::parse(line_number, line, format!("{what} {index} exceeds {MAX_INDEX}")));
    }
    Ok(index)
}

/// Parse `col row value` lines.
///
/// The dimensions are the largest indices plus one, also counting entries with value zero. Zero
/// values are not stored.
pub fn parse_sparse(text: &str) -> Result<Loaded, ImportError> {
    let mut elements = Vec::new();
    let (mut width, mut height) = (0, 0);

    for (line_number, line) in content_lines(text) {
        let (col, row, value) = match line.split_whitespace().collect::<Vec<_>>().as_slice() {
            &[col, row, value] => (
                index(line_number, line, col, "column index")?,
                index(line_number, line, row, "row index")?,
                field::<f64>(line_number, line, value, "value")?,
            ),
            words => return Err(ImportError::parse(
                line_number, line, format!("expected 3 fields, found {}", words.len()),
            )),
        };

        width = width.max(col + 1);
        height = height.max(row + 1);
        if value != 0_f64 {
            elements.push(Element::new(col, row, value));
        }
    }

    if width == 0 {
        Err(ImportError::Empty)
    } else {
        Ok(Loaded { elements, width, height })
    }
}

/// Parse a grid of values, where line `i` holds row `i` of the matrix.
///
/// All lines should have the same number of values. Zero values are not stored.
pub fn parse_dense(text: &str) -> Result<Loaded, ImportError> {
    let mut elements = Vec::new();
    let mut width = None;
    let mut height = 0;

    for (line_number, line) in content_lines(text) {
        let values = line.split_whitespace()
            .map(|word| field::<f64>(line_number, line, word, "value"))
            .collect::<Result<Vec<_>, _>>()?;

        match width {
            None => width = Some(values.len()),
            Some(width) if width != values.len() => return Err(ImportError::parse(
                line_number, line, format!("expected {width} values, found {}", values.len()),
            )),
            Some(_) => {},
        }

        elements.extend(values.into_iter()
            .enumerate()
            .filter(|&(_, value)| value != 0_f64)
            .map(|(j, value)| Element::new(j, height, value)));
        height += 1;
    }

    match width {
        Some(width) => Ok(Loaded { elements, width, height }),
        None => Err(ImportError::Empty),
    }
}
