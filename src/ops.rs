use crate::scalar::Real;


/// Mid-level operations shared by [Tensor](crate::Tensor) and
/// [Variable](crate::Variable). When called on a Variable, they are
/// recorded and become differentiable.

pub trait BaseOps<T: Real>: Clone {
  fn scalar(item: T) -> Self;
  /// Number of elements.
  fn numel(&self) -> usize;
  fn transpose(&self) -> Self;
}


/// Differentiable arithmetic and reductions.

pub trait NumericOps<T: Real>: Sized {
  /// Sum of all elements, as a scalar.
  fn sum(&self) -> Self;
  /// Matrix product of two 2-D operands.
  fn mm(&self, rhs: &Self) -> Self;
  /// Greatest value per row.
  fn max(&self) -> Self;
}


/// Differentiable non-linear operations.

pub trait RealOps<T: Real> {
  fn exp(&self) -> Self;
  fn relu(&self) -> Self;

  /// Row-wise log-softmax over the last dimension.
  /// The row maximum is subtracted before exponentiating.
  fn log_softmax(&self) -> Self;

  /// Mean negative log-likelihood of the labelled entry in every row.
  fn nll(&self, labels: &[usize]) -> Self;
}


/// High-level operations, implemented exclusively on top of
/// the lower level ones. As a result, these are all
/// differentiable when called on a [Variable](crate::Variable).

pub trait Hops<T: Real>: BaseOps<T> + NumericOps<T> + RealOps<T>
where
  for<'a> &'a Self: std::ops::Mul<T, Output = Self>,
{
  fn mean(&self) -> Self {
    let n = T::cast(self.numel() as f64);
    &self.sum() * (T::one() / n)
  }

  fn softmax(&self) -> Self {
    self.log_softmax().exp()
  }
}
