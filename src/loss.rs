use crate::{
  ops::RealOps,
  error::{ Error, Result },
  scalar::Real,
  Variable,
};


/// Scalar objective comparing a batch of predictions with integer class labels.

pub trait Loss<T: Real> {
  fn compute(&self, predictions: &Variable<T>, labels: &[usize]) -> Result<Variable<T>>;
}


/// Categorical cross-entropy on raw logits.

#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropy;

impl<T: Real> Loss<T> for CrossEntropy {
  fn compute(&self, predictions: &Variable<T>, labels: &[usize]) -> Result<Variable<T>> {
    check_labels(predictions, labels)?;
    Ok(predictions.log_softmax().nll(labels))
  }
}


/// Negative log-likelihood on log-probabilities.

#[derive(Debug, Clone, Copy, Default)]
pub struct NllLoss;

impl<T: Real> Loss<T> for NllLoss {
  fn compute(&self, predictions: &Variable<T>, labels: &[usize]) -> Result<Variable<T>> {
    check_labels(predictions, labels)?;
    Ok(predictions.nll(labels))
  }
}


fn check_labels<T: Real>(predictions: &Variable<T>, labels: &[usize]) -> Result<()> {
  let (rows, classes) = (predictions.shape().rows(), predictions.shape().cols());
  if labels.len() != rows {
    return Err(Error::LabelCount { expected: rows, actual: labels.len() })
  }
  match labels.iter().find(|&&label| label >= classes ) {
    Some(&label) => Err(Error::Label { label, classes }),
    None => Ok(()),
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::Tensor;

  #[test]
  fn uniform_logits() {
    let logits = Tensor::<f64>::zeros(&[4, 10]).trained();
    let loss = CrossEntropy.compute(&logits, &[0, 3, 9, 1]).unwrap();
    assert!((loss.item() - 10f64.ln()).abs() < 1e-12);
  }

  #[test]
  fn cross_entropy_equals_nll_of_log_softmax() {
    let logits = Tensor::<f64>::randn(&[5, 3]).trained();
    let labels = [2, 0, 1, 1, 0];
    let a = CrossEntropy.compute(&logits, &labels).unwrap();
    let b = NllLoss.compute(&logits.log_softmax(), &labels).unwrap();
    assert!((a.item() - b.item()).abs() < 1e-12);
  }

  #[test]
  fn gradient_points_towards_label() {
    let logits = Tensor::<f64>::zeros(&[1, 3]).trained();
    CrossEntropy.compute(&logits, &[1]).unwrap().backward();
    let grad = logits.grad().unwrap().to_vec();
    assert!(grad[1] < 0.0 && grad[0] > 0.0 && grad[2] > 0.0);
    assert!(grad.iter().sum::<f64>().abs() < 1e-12);
  }

  #[test]
  fn rejects_bad_labels() {
    let logits = Tensor::<f32>::zeros(&[2, 3]).tracked();
    assert!(matches!(CrossEntropy.compute(&logits, &[0]), Err(Error::LabelCount { expected: 2, actual: 1 })));
    assert!(matches!(CrossEntropy.compute(&logits, &[0, 3]), Err(Error::Label { label: 3, classes: 3 })));
  }
}
