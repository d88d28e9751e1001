use itertools::Itertools;
use thiserror::Error;


pub type Result<T> = std::result::Result<T, Error>;


#[derive(Error, Debug)]
pub enum Error {
  #[error("Invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("Input has {actual} features, model expects {expected}")]
  InputShape { expected: usize, actual: usize },

  #[error("Got {actual} labels for a batch of {expected} rows")]
  LabelCount { expected: usize, actual: usize },

  #[error("Label {label} out of range for {classes} classes")]
  Label { label: usize, classes: usize },

  #[error("No batches in {0} data")]
  EmptyBatches(&'static str),

  #[error("Loss became {value} in epoch {epoch}, step {step}")]
  NonFiniteLoss { epoch: usize, step: usize, value: f64 },

  #[error("Parameter state does not fit the model:\n{}", .0.iter().join("\n"))]
  State(Vec<Mismatch>),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Checkpoint codec error: {0}")]
  Codec(#[from] postcard::Error),
}


/// A single disagreement between a recorded parameter state and a model.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
  Shape { name: String, expected: Vec<usize>, actual: Vec<usize> },
  Missing(String),
  Unexpected(String),
  Corrupt { name: String, expected: usize, actual: usize },
}

impl Mismatch {
  pub fn name(&self) -> &str {
    match self {
      Self::Shape { name, .. } | Self::Corrupt { name, .. } => name,
      Self::Missing(name) | Self::Unexpected(name) => name,
    }
  }
}

impl std::fmt::Display for Mismatch {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    match self {
      Self::Shape { name, expected, actual } =>
        write!(f, "  size mismatch for {name}: checkpoint has {actual:?}, model has {expected:?}"),
      Self::Missing(name) => write!(f, "  missing key {name}"),
      Self::Unexpected(name) => write!(f, "  unexpected key {name}"),
      Self::Corrupt { name, expected, actual } =>
        write!(f, "  corrupt values for {name}: {actual} stored, shape needs {expected}"),
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn state_error_lists_every_mismatch() {
    let err = Error::State(vec![
      Mismatch::Shape { name: "output.weight".into(), expected: vec![128, 10], actual: vec![100, 10] },
      Mismatch::Missing("output.bias".into()),
    ]);
    let text = err.to_string();
    assert!(text.contains("size mismatch for output.weight"));
    assert!(text.contains("[100, 10]"));
    assert!(text.contains("missing key output.bias"));
    assert_eq!(text.lines().count(), 3);
  }
}
