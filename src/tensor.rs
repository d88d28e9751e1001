use std::rc::Rc;
use std::cell::{ Ref, RefCell };

use rand::Rng;
use serde::{ Serialize, Deserialize };

mod lops;

use crate::{
  internal::*,
  shape::Shape,
  variable::Variable,
  scalar::Real,
};


/// Dense row-major array of [Real] values.
///
/// Cloning a tensor is cheap and shares its storage, so in-place
/// updates through [assign](Tensor::assign) and friends are visible
/// to every clone. Use [detach](Tensor::detach) for an independent copy.
///
/// Tensors can be wrapped in a [Variable] by calling
/// [tracked](Tensor::tracked) or [trained](Tensor::trained).

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Tensor<T: Real> {
  shape: Shape,
  data: Rc<RefCell<Vec<T>>>,
}

impl<T: Real> PartialEq for Tensor<T> {
  fn eq(&self, rhs: &Self) -> bool {
    self.shape == rhs.shape && *self.data.borrow() == *rhs.data.borrow()
  }
}

impl<T: Real> Tensor<T> {
  pub fn from_shape(shape: Shape, data: Vec<T>) -> Self {
    assert_eq!(shape.size(), data.len(),
      "{} doesn't match data length {}", shape, data.len());
    Self { shape, data: Rc::new(RefCell::new(data)) }
  }

  pub fn new(shape: &[usize], data: Vec<T>) -> Self {
    Self::from_shape(Shape::new(shape), data)
  }

  pub fn vec(vec: &[T]) -> Self {
    Self::new(&[vec.len()], vec.to_vec())
  }

  pub fn fill(shape: &[usize], filler: T) -> Self {
    Self::new(shape, vec![filler; shape.iter().product()])
  }

  pub fn zeros(shape: &[usize]) -> Self {
    Self::fill(shape, T::zero())
  }

  pub fn ones(shape: &[usize]) -> Self {
    Self::fill(shape, T::one())
  }

  pub fn init(shape: &[usize], mut cb: impl FnMut() -> T) -> Self {
    let data = (0..shape.iter().product()).map(|_| cb() ).collect();
    Self::new(shape, data)
  }

  pub fn randn(shape: &[usize]) -> Self {
    Self::randn_with(shape, &mut rand::thread_rng())
  }

  pub fn randn_with(shape: &[usize], rng: &mut impl Rng) -> Self {
    let len = shape.iter().product();
    let mut data = Vec::with_capacity(len + 1);
    while data.len() < len {
      let (r1, r2): (T, T) = randn(rng);
      data.push(r1);
      data.push(r2);
    }
    data.truncate(len);
    Self::new(shape, data)
  }

  /// Glorot (Xavier) uniform initialization for an `[inputs, outputs]` matrix.

  pub fn glorot_uniform(dims: &[usize]) -> Self {
    let fan = T::cast((dims[0] + dims[dims.len() - 1]) as f64);
    let limit = (T::cast(6.0) / fan).sqrt();
    let mut rng = rand::thread_rng();
    Self::init(dims, || rng.gen_range(-limit, limit) )
  }

  /// Sample a 0/1 mask where each entry is one with the probability
  /// given by the corresponding entry in self.

  pub fn bernoulli(&self) -> Self {
    let mut rng = rand::thread_rng();
    self.vectorize(|a| if rng.gen_range(T::zero(), T::one()) < a {
      T::one()
    } else {
      T::zero()
    })
  }

  pub fn shape(&self) -> &Shape {
    &self.shape
  }

  pub fn size(&self) -> usize {
    self.shape.size()
  }

  pub fn rank(&self) -> usize {
    self.shape.rank()
  }

  pub fn dim(&self, idx: isize) -> usize {
    self.shape[idx]
  }

  pub fn raw(&self) -> Ref<Vec<T>> {
    self.data.borrow()
  }

  pub fn to_vec(&self) -> Vec<T> {
    self.data.borrow().clone()
  }

  /// Whether the stored data matches the size announced by the shape.
  /// Only deserialized tensors can violate this.

  pub fn is_consistent(&self) -> bool {
    self.data.borrow().len() == self.shape.size()
  }

  pub fn item(&self) -> T {
    assert!(self.size() == 1,
      "Can't extract item from non-scalar {}", self.shape);
    self.data.borrow()[0]
  }

  pub fn row(&self, index: usize) -> Vec<T> {
    let cols = self.shape.cols();
    self.data.borrow()[index * cols..(index + 1) * cols].to_vec()
  }

  pub fn shared_with(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.data, &other.data)
  }

  pub fn detach(&self) -> Self {
    Self::from_shape(self.shape.clone(), self.to_vec())
  }

  /// Copy other's values into this tensor's storage.

  pub fn assign(&self, other: &Self) {
    assert_eq!(self.size(), other.size(),
      "Could not assign {} tensor to {} tensor", other.shape, self.shape);
    if self.shared_with(other) { return }
    self.data.borrow_mut().copy_from_slice(&other.data.borrow());
  }

  pub fn refill(&self, filler: T) {
    self.data.borrow_mut().iter_mut().for_each(|a| *a = filler );
  }

  /// Combine other into this tensor in place, broadcasting other if needed.

  pub fn op_assign(&self, other: &Self, cb: impl Fn(&mut T, T)) {
    assert!(self.shape.accepts(&other.shape),
      "Could not broadcast {} onto {}", other.shape, self.shape);
    let other = if self.shared_with(other) { other.detach() } else { other.clone() };
    let mut data = self.data.borrow_mut();
    let other_data = other.data.borrow();
    let n = other_data.len();
    for (i, a) in data.iter_mut().enumerate() {
      cb(a, other_data[i % n]);
    }
  }

  pub fn vectorize(&self, mut cb: impl FnMut(T) -> T) -> Self {
    let data = self.data.borrow().iter().map(|&a| cb(a) ).collect();
    Self::from_shape(self.shape.clone(), data)
  }

  /// Elementwise combination. The smaller operand gets repeated
  /// along the leading dimensions of the larger one.

  pub fn zip(&self, rhs: &Self, cb: impl Fn(T, T) -> T) -> Self {
    let (shape, flipped) = if self.shape.accepts(&rhs.shape) {
      (self.shape.clone(), false)
    } else if rhs.shape.accepts(&self.shape) {
      (rhs.shape.clone(), true)
    } else {
      panic!("Cannot broadcast {} and {}", self.shape, rhs.shape)
    };
    let lhs_data = self.data.borrow();
    let rhs_data = rhs.data.borrow();
    let (nl, nr) = (lhs_data.len(), rhs_data.len());
    let data = (0..shape.size())
      .map(|i| {
        let (a, b) = if flipped {
          (lhs_data[i % nl], rhs_data[i])
        } else {
          (lhs_data[i], rhs_data[i % nr])
        };
        cb(a, b)
      })
      .collect();
    Self::from_shape(shape, data)
  }

  /// Sum a broadcasted gradient back down to the given shape.

  pub fn reduce_to(&self, shape: &Shape) -> Self {
    if &self.shape == shape { return self.clone() }
    assert!(self.shape.accepts(shape),
      "Cannot reduce {} to {}", self.shape, shape);
    let n = shape.size();
    let mut data = vec![T::zero(); n];
    for (i, &a) in self.data.borrow().iter().enumerate() {
      data[i % n] += a;
    }
    Self::from_shape(shape.clone(), data)
  }

  /// Collapse the last dimension using the given reduction.

  pub fn collapse(&self, cb: impl Fn(&[T]) -> T) -> Self {
    let cols = self.shape.cols();
    let dims = &self.shape.dims[..self.rank().saturating_sub(1)];
    let data = self.data.borrow()
      .chunks(cols.max(1))
      .map(|row| cb(row) )
      .collect();
    Self::new(dims, data)
  }

  /// Index of the greatest value in every row.

  pub fn argmax(&self) -> Vec<usize> {
    let cols = self.shape.cols().max(1);
    self.data.borrow()
      .chunks(cols)
      .map(|row| {
        row.iter()
          .enumerate()
          .fold((0, T::neg_infinity()), |(best, max), (i, &a)| if a > max { (i, a) } else { (best, max) })
          .0
      })
      .collect()
  }

  /// Pick one entry per row.

  pub fn gather(&self, indices: &[usize]) -> Vec<T> {
    let cols = self.shape.cols();
    assert_eq!(indices.len(), self.shape.rows(),
      "Need one index per row of {}", self.shape);
    let data = self.data.borrow();
    indices.iter()
      .enumerate()
      .map(|(row, &col)| {
        assert!(col < cols, "Index {col} out of bounds for {}", self.shape);
        data[row * cols + col]
      })
      .collect()
  }

  pub fn all_finite(&self) -> bool {
    self.data.borrow().iter().all(|a| a.is_finite() )
  }

  pub fn trained(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), true)
  }

  pub fn tracked(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), false)
  }
}

impl<T: Real> std::fmt::Display for Tensor<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Tensor{:?} ", self.shape.dims)?;
    let data = self.data.borrow();
    if self.rank() < 2 {
      return write!(f, "{:?}", &data[..])
    }
    writeln!(f, "[")?;
    for row in data.chunks(self.shape.cols().max(1)) {
      writeln!(f, "  {:?}", row)?;
    }
    write!(f, "]")
  }
}
