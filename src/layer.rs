use crate::{ ops::*, scalar::Real, Variable, Tensor };


/// Fully connected affine transform `x * W + b`.
///
/// Weights are stored as `[inputs, outputs]`, so a batch of row
/// vectors can be multiplied from the left.

#[derive(Debug, Clone)]
pub struct Dense<T: Real> {
  pub weights: Variable<T>,
  pub bias: Variable<T>,
}

impl<T: Real> Dense<T> {
  pub fn new(inputs: usize, outputs: usize) -> Self {
    Self {
      weights: Tensor::glorot_uniform(&[inputs, outputs]).trained(),
      bias: Tensor::zeros(&[outputs]).trained(),
    }
  }

  pub fn inputs(&self) -> usize {
    self.weights.dim(0)
  }

  pub fn outputs(&self) -> usize {
    self.weights.dim(1)
  }
}


/// Layer operations on differentiable batches.

pub trait Layer<T: Real> {
  fn affine(&self, dense: &Dense<T>) -> Self;
  fn dropout(&self, probability: T, train: bool) -> Self;
}

impl<T: Real> Layer<T> for Variable<T> {
  fn affine(&self, dense: &Dense<T>) -> Self {
    self.mm(&dense.weights) + &dense.bias
  }

  // Inverted dropout: survivors get scaled by 1 / (1 - p),
  // so nothing needs to change at evaluation time.
  fn dropout(&self, probability: T, train: bool) -> Self {
    if !train || probability <= T::zero() { return self.clone() }
    let keep = T::one() - probability;
    let mask = Tensor::fill(&self.shape().dims, keep).bernoulli() / keep;
    self * mask.tracked()
  }
}
