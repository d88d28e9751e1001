use serde::{ Serialize, Deserialize };

use crate::internal::*;


/// The shape of a [Tensor](crate::Tensor).
///
/// Tensors are stored contiguously in row-major order, so the
/// dimensions alone determine the memory layout.

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
  pub dims: Vec<usize>,
}

impl Shape {
  pub fn new(dims: &[usize]) -> Self {
    Self { dims: dims.to_vec() }
  }

  pub fn size(&self) -> usize {
    self.dims.iter().product()
  }

  pub fn rank(&self) -> usize {
    self.dims.len()
  }

  /// Number of rows when viewed as a matrix. Scalars and vectors have one row.

  pub fn rows(&self) -> usize {
    if self.rank() < 2 { 1 } else { self.dims[..self.rank() - 1].iter().product() }
  }

  /// Size of the innermost dimension.

  pub fn cols(&self) -> usize {
    self.dims.last().copied().unwrap_or(1)
  }

  pub fn at_or(&self, idx: isize, or: usize) -> usize {
    let off_bounds = if idx < 0 {
      idx.unsigned_abs() > self.rank()
    } else {
      idx as usize >= self.rank()
    };
    if off_bounds { or } else { self[idx] }
  }

  /// Whether `other` can be stretched to this shape by repeating it
  /// along leading dimensions.

  pub fn accepts(&self, other: &Self) -> bool {
    if other.size() == 1 { return true }
    if other.rank() > self.rank() { return false }
    let offset = self.rank() - other.rank();
    other.dims.iter()
      .zip(&self.dims[offset..])
      .all(|(a, b)| a == b )
  }

  pub fn transpose(&self) -> Self {
    assert_eq!(self.rank(), 2, "Only matrices can be transposed, got {self}");
    Self::new(&[self.dims[1], self.dims[0]])
  }
}

impl std::ops::Index<isize> for Shape {
  type Output = usize;

  fn index(&self, i: isize) -> &usize {
    let idx = negative_index(i, self.rank(), false);
    &self.dims[idx]
  }
}

impl std::fmt::Display for Shape {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Shape{:?}", self.dims)
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn index() {
    let shape = Shape::new(&[64, 784]);
    assert_eq!(shape[0], 64);
    assert_eq!(shape[-1], 784);
    assert_eq!(shape.size(), 64 * 784);
    assert_eq!(shape.at_or(-3, 1), 1);
  }

  #[test]
  fn rows_and_cols() {
    assert_eq!(Shape::new(&[3, 4]).rows(), 3);
    assert_eq!(Shape::new(&[4]).rows(), 1);
    assert_eq!(Shape::new(&[]).cols(), 1);
  }

  #[test]
  fn accepts() {
    let shape = Shape::new(&[8, 3]);
    assert!(shape.accepts(&Shape::new(&[3])));
    assert!(shape.accepts(&Shape::new(&[])));
    assert!(shape.accepts(&Shape::new(&[8, 3])));
    assert!(!shape.accepts(&Shape::new(&[8])));
  }
}
