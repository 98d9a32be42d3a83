//! # Wire format
//!
//! Byte layout of everything that moves between ranks. Matrices and vectors travel as arrays of
//! fixed-layout element records with a few `i32` header fields.
use bytemuck::{Pod, Zeroable};

use crate::data::linear_algebra::{Direction, Element, MatrixError};
use crate::data::linear_algebra::matrix::SparseMatrix;
use crate::data::linear_algebra::vector::SparseVector;
use crate::distributed::protocol::Decision;

/// An element as it is laid out on the wire.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireElement {
    /// Column index.
    pub col: i32,
    /// Row index.
    pub row: i32,
    /// Value.
    pub value: f64,
}

/// Size of a single element record in bytes.
pub const ELEMENT_SIZE: usize = size_of::<WireElement>();

fn to_i32(value: usize) -> Result<i32, MatrixError> {
    i32::try_from(value)
        .map_err(|_| MatrixError::Encoding(format!("{value} does not fit a 32 bit index")))
}

fn to_usize(value: i32) -> Result<usize, MatrixError> {
    usize::try_from(value)
        .map_err(|_| MatrixError::Encoding(format!("negative index {value}")))
}

/// Check ahead of time that a matrix of these dimensions can be sent.
pub fn check_dimensions(width: usize, height: usize) -> Result<(), MatrixError> {
    to_i32(width)?;
    to_i32(height)?;
    Ok(())
}

impl TryFrom<Element> for WireElement {
    type Error = MatrixError;

    fn try_from(element: Element) -> Result<Self, Self::Error> {
        Ok(Self { col: to_i32(element.col)?, row: to_i32(element.row)?, value: element.value })
    }
}

impl TryFrom<WireElement> for Element {
    type Error = MatrixError;

    fn try_from(element: WireElement) -> Result<Self, Self::Error> {
        Ok(Self::new(to_usize(element.col)?, to_usize(element.row)?, element.value))
    }
}

fn direction_tag(direction: Direction) -> i32 {
    match direction {
        Direction::ColumnWise => 0,
        Direction::RowWise => 1,
    }
}

/// Appends fields to a message.
#[derive(Default)]
struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    fn index(&mut self, value: usize) -> Result<&mut Self, MatrixError> {
        self.bytes.extend_from_slice(bytemuck::bytes_of(&to_i32(value)?));
        Ok(self)
    }

    fn direction(&mut self, direction: Direction) -> &mut Self {
        self.bytes.extend_from_slice(bytemuck::bytes_of(&direction_tag(direction)));
        self
    }

    fn elements(&mut self, elements: Vec<Element>) -> Result<&mut Self, MatrixError> {
        let records = elements.into_iter()
            .map(WireElement::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        self.index(records.len())?;
        self.bytes.extend_from_slice(bytemuck::cast_slice(&records));
        Ok(self)
    }

    fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }
}

/// Reads fields from a message, front to back.
struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], MatrixError> {
        if self.bytes.len() < count {
            return Err(MatrixError::Encoding(format!(
                "message truncated: needed {count} more bytes, {} left", self.bytes.len(),
            )));
        }
        let (head, tail) = self.bytes.split_at(count);
        self.bytes = tail;
        Ok(head)
    }

    fn raw_i32(&mut self) -> Result<i32, MatrixError> {
        Ok(bytemuck::pod_read_unaligned(self.take(size_of::<i32>())?))
    }

    fn index(&mut self) -> Result<usize, MatrixError> {
        to_usize(self.raw_i32()?)
    }

    fn direction(&mut self) -> Result<Direction, MatrixError> {
        match self.raw_i32()? {
            0 => Ok(Direction::ColumnWise),
            1 => Ok(Direction::RowWise),
            other => Err(MatrixError::Encoding(format!("unknown direction tag {other}"))),
        }
    }

    fn elements(&mut self) -> Result<Vec<Element>, MatrixError> {
        let count = self.index()?;
        let bytes = self.take(count * ELEMENT_SIZE)?;
        bytes.chunks_exact(ELEMENT_SIZE)
            .map(|chunk| Element::try_from(bytemuck::pod_read_unaligned::<WireElement>(chunk)))
            .collect()
    }

    fn finish(&self) -> Result<(), MatrixError> {
        if self.bytes.is_empty() {
            Ok(())
        } else {
            Err(MatrixError::Encoding(format!("{} trailing bytes", self.bytes.len())))
        }
    }
}

/// Element count, elements, width, height and direction.
pub fn encode_matrix(matrix: &SparseMatrix) -> Result<Vec<u8>, MatrixError> {
    Ok(Writer::default()
        .elements(matrix.elements())?
        .index(matrix.width())?
        .index(matrix.height())?
        .direction(matrix.direction())
        .finish())
}

/// Inverse of `encode_matrix`.
pub fn decode_matrix(bytes: &[u8]) -> Result<SparseMatrix, MatrixError> {
    let mut reader = Reader::new(bytes);
    let elements = reader.elements()?;
    let (width, height) = (reader.index()?, reader.index()?);
    let direction = reader.direction()?;
    reader.finish()?;

    if let Some(element) = elements.iter().find(|e| e.col >= width || e.row >= height) {
        return Err(MatrixError::Encoding(format!(
            "element at ({}, {}) outside of {width}x{height} matrix", element.col, element.row,
        )));
    }
    Ok(SparseMatrix::with_dimensions(elements, width, height, direction))
}

fn write_vector(writer: &mut Writer, vector: &SparseVector) -> Result<(), MatrixError> {
    writer.index(vector.len())?
        .direction(vector.direction())
        .elements(vector.get_elements(vector.direction(), 0))?;
    Ok(())
}

fn read_vector(reader: &mut Reader) -> Result<SparseVector, MatrixError> {
    let len = reader.index()?;
    let direction = reader.direction()?;
    let elements = reader.elements()?;

    if let Some(element) = elements.iter().find(|e| e.minor(direction) >= len) {
        return Err(MatrixError::Encoding(format!(
            "index {} outside of vector of length {len}", element.minor(direction),
        )));
    }
    Ok(SparseVector::from_elements(elements, len, direction))
}

/// Length, direction, element count and elements on the natural axis of the vector.
pub fn encode_vector(vector: &SparseVector) -> Result<Vec<u8>, MatrixError> {
    let mut writer = Writer::default();
    write_vector(&mut writer, vector)?;
    Ok(writer.finish())
}

/// Inverse of `encode_vector`.
pub fn decode_vector(bytes: &[u8]) -> Result<SparseVector, MatrixError> {
    let mut reader = Reader::new(bytes);
    let vector = read_vector(&mut reader)?;
    reader.finish()?;
    Ok(vector)
}

/// A pivot index followed by the eliminated column.
pub fn encode_pivot(pivot: usize, column: &SparseVector) -> Result<Vec<u8>, MatrixError> {
    let mut writer = Writer::default();
    writer.index(pivot)?;
    write_vector(&mut writer, column)?;
    Ok(writer.finish())
}

/// Inverse of `encode_pivot`.
pub fn decode_pivot(bytes: &[u8]) -> Result<(usize, SparseVector), MatrixError> {
    let mut reader = Reader::new(bytes);
    let pivot = reader.index()?;
    let column = read_vector(&mut reader)?;
    reader.finish()?;
    Ok((pivot, column))
}

/// A single index.
pub fn encode_index(index: usize) -> Result<Vec<u8>, MatrixError> {
    Ok(Writer::default().index(index)?.finish())
}

/// Inverse of `encode_index`.
pub fn decode_index(bytes: &[u8]) -> Result<usize, MatrixError> {
    let mut reader = Reader::new(bytes);
    let index = reader.index()?;
    reader.finish()?;
    Ok(index)
}

/// The residual of an iteration and whether iteration stops.
pub fn encode_residual(residual: f64, stop: bool) -> Vec<u8> {
    let mut bytes = residual.to_le_bytes().to_vec();
    bytes.push(u8::from(stop));
    bytes
}

/// Inverse of `encode_residual`.
pub fn decode_residual(bytes: &[u8]) -> Result<(f64, bool), MatrixError> {
    match bytes {
        [value @ .., stop] if value.len() == size_of::<f64>() => {
            let mut raw = [0_u8; size_of::<f64>()];
            raw.copy_from_slice(value);
            Ok((f64::from_le_bytes(raw), *stop != 0))
        },
        _ => Err(MatrixError::Encoding(format!("residual message of {} bytes", bytes.len()))),
    }
}

/// One byte.
pub fn encode_decision(decision: Decision) -> Vec<u8> {
    vec![match decision {
        Decision::Sequential => 0,
        Decision::Distributed => 1,
        Decision::Abort => 2,
    }]
}

/// Inverse of `encode_decision`.
pub fn decode_decision(bytes: &[u8]) -> Result<Decision, MatrixError> {
    match bytes {
        [0] => Ok(Decision::Sequential),
        [1] => Ok(Decision::Distributed),
        [2] => Ok(Decision::Abort),
        _ => Err(MatrixError::Encoding(format!("invalid decision {bytes:?}"))),
    }
}

#[cfg(test)]
mod test {
    use crate::data::linear_algebra::{Direction, Element, MatrixError};
    use crate::data::linear_algebra::matrix::{generator, SparseMatrix};
    use crate::data::linear_algebra::vector::SparseVector;
    use crate::distributed::protocol::Decision;
    use crate::distributed::wire::{
        decode_decision, decode_index, decode_matrix, decode_pivot, decode_residual, decode_vector,
        ELEMENT_SIZE, encode_decision, encode_index, encode_matrix, encode_pivot, encode_residual,
        encode_vector,
    };

    #[test]
    fn element_layout() {
        assert_eq!(ELEMENT_SIZE, 16);

        let matrix = SparseMatrix::from_elements(vec![Element::new(1, 2, 0.5)], Direction::ColumnWise);
        let bytes = encode_matrix(&matrix).unwrap();
        // count, one element, width, height, direction
        assert_eq!(bytes.len(), 4 + 16 + 4 + 4 + 4);
    }

    #[test]
    fn matrix() {
        let matrix = generator::uniform(6, 9, 20, Direction::RowWise, Some(7));
        let decoded = decode_matrix(&encode_matrix(&matrix).unwrap()).unwrap();
        assert_eq!(decoded.shape(), (6, 9));
        assert_eq!(decoded.direction(), Direction::RowWise);
        assert_eq!(decoded.elements(), matrix.elements());

        // Trailing empty columns survive.
        let empty = SparseMatrix::new(4, 2, Direction::ColumnWise);
        assert_eq!(decode_matrix(&encode_matrix(&empty).unwrap()).unwrap().shape(), (4, 2));
    }

    #[test]
    fn unaligned() {
        let matrix = generator::uniform(3, 3, 5, Direction::ColumnWise, Some(1));
        let mut bytes = vec![0_u8];
        bytes.extend(encode_matrix(&matrix).unwrap());
        assert_eq!(decode_matrix(&bytes[1..]).unwrap(), matrix);
    }

    #[test]
    fn vectors_and_pivots() {
        let column = SparseVector::from_dense(&[0_f64, 1.5, 0_f64, -2_f64], Direction::ColumnWise);
        let decoded = decode_vector(&encode_vector(&column).unwrap()).unwrap();
        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded.to_dense(), column.to_dense());

        let row = column.clone().transpose();
        assert_eq!(decode_vector(&encode_vector(&row).unwrap()).unwrap().direction(), Direction::RowWise);

        let (pivot, received) = decode_pivot(&encode_pivot(3, &column).unwrap()).unwrap();
        assert_eq!(pivot, 3);
        assert_eq!(received.to_dense(), column.to_dense());
    }

    #[test]
    fn scalars() {
        assert_eq!(decode_index(&encode_index(12).unwrap()), Ok(12));
        assert_eq!(decode_residual(&encode_residual(0.25, true)), Ok((0.25, true)));
        for decision in [Decision::Sequential, Decision::Distributed, Decision::Abort] {
            assert_eq!(decode_decision(&encode_decision(decision)), Ok(decision));
        }
    }

    #[test]
    fn malformed() {
        let bytes = encode_matrix(&SparseMatrix::identity(2, Direction::ColumnWise)).unwrap();
        assert!(matches!(decode_matrix(&bytes[..bytes.len() - 1]), Err(MatrixError::Encoding(_))));
        assert!(matches!(decode_index(&[1, 2]), Err(MatrixError::Encoding(_))));
        assert!(matches!(decode_decision(&[7]), Err(MatrixError::Encoding(_))));
        assert!(matches!(encode_index(usize::MAX), Err(MatrixError::Encoding(_))));
        assert!(matches!(decode_index(&(-1_i32).to_ne_bytes()), Err(MatrixError::Encoding(_))));
    }
}
