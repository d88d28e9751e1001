//! Configurable feed-forward classifier.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::debug;
use serde::{ Serialize, Deserialize };

use crate::{
  ops::*,
  error::{ Error, Mismatch, Result },
  layer::{ Dense, Layer },
  scalar::Real,
  Tensor, Variable,
};


/// Mapping from parameter name to its current value.

pub type StateDict<T> = BTreeMap<String, Tensor<T>>;


/// Structural description of a [Classifier].

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Architecture {
  pub input_size: usize,
  pub output_size: usize,
  pub hidden_layers: Vec<usize>,
}

impl Architecture {
  /// Name and dims of every parameter a model of this shape holds,
  /// in layer order.

  pub fn parameter_shapes(&self) -> Vec<(String, Vec<usize>)> {
    let widths: Vec<usize> = std::iter::once(self.input_size)
      .chain(self.hidden_layers.iter().copied())
      .collect();
    let hidden = widths.iter()
      .tuple_windows()
      .enumerate()
      .flat_map(|(i, (&inputs, &outputs))| [
        (format!("hidden_layers.{i}.weight"), vec![inputs, outputs]),
        (format!("hidden_layers.{i}.bias"), vec![outputs]),
      ]);
    let last = widths.last().copied().unwrap_or(self.input_size);
    hidden
      .chain([
        ("output.weight".to_string(), vec![last, self.output_size]),
        ("output.bias".to_string(), vec![self.output_size]),
      ])
      .collect()
  }

  /// Check that `state` holds exactly the parameters of this architecture.
  /// No tensors get allocated, so this is safe to run on untrusted input.

  pub fn check_state<T: Real>(&self, state: &StateDict<T>) -> Result<()> {
    let shapes = self.parameter_shapes();
    let mut mismatches = vec![];
    for (name, dims) in &shapes {
      match state.get(name) {
        None => mismatches.push(Mismatch::Missing(name.clone())),
        Some(value) if &value.shape().dims != dims => mismatches.push(Mismatch::Shape {
          name: name.clone(),
          expected: dims.clone(),
          actual: value.shape().dims.clone(),
        }),
        Some(value) if !value.is_consistent() => mismatches.push(Mismatch::Corrupt {
          name: name.clone(),
          expected: value.size(),
          actual: value.raw().len(),
        }),
        Some(_) => {},
      }
    }
    mismatches.extend(state.keys()
      .filter(|key| !shapes.iter().any(|(name, _)| name == *key ))
      .map(|key| Mismatch::Unexpected(key.clone()) ));
    if mismatches.is_empty() { Ok(()) } else { Err(Error::State(mismatches)) }
  }
}

impl std::fmt::Display for Architecture {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    let widths = std::iter::once(self.input_size)
      .chain(self.hidden_layers.iter().copied())
      .chain(std::iter::once(self.output_size))
      .join(" -> ");
    write!(f, "{widths}")
  }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
  pub input_size: usize,
  pub output_size: usize,
  pub hidden_layers: Vec<usize>,
  pub dropout: f64,
}

impl ModelConfig {
  pub const DEFAULT_DROPOUT: f64 = 0.2;

  pub fn new(input_size: usize, output_size: usize, hidden_layers: &[usize]) -> Self {
    Self {
      input_size,
      output_size,
      hidden_layers: hidden_layers.to_vec(),
      dropout: Self::DEFAULT_DROPOUT,
    }
  }

  pub fn with_dropout(mut self, probability: f64) -> Self {
    self.dropout = probability;
    self
  }

  pub fn validate(&self) -> Result<()> {
    if self.input_size == 0 || self.output_size == 0 {
      return Err(Error::InvalidConfig(format!(
        "input and output sizes must be positive, got {} and {}",
        self.input_size, self.output_size)))
    }
    if let Some(i) = self.hidden_layers.iter().position(|&width| width == 0 ) {
      return Err(Error::InvalidConfig(format!("hidden layer {i} has zero width")))
    }
    if !(0.0..1.0).contains(&self.dropout) {
      return Err(Error::InvalidConfig(format!(
        "dropout probability must be in [0, 1), got {}", self.dropout)))
    }
    Ok(())
  }
}

impl From<&Architecture> for ModelConfig {
  fn from(arch: &Architecture) -> Self {
    Self::new(arch.input_size, arch.output_size, &arch.hidden_layers)
  }
}


/// Whether dropout is active.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
  #[default]
  Training,
  Evaluation,
}


/// Multi-layer perceptron for single-label classification.
///
/// Hidden layers apply an affine transform, ReLU and, in training
/// mode, dropout. The output layer is a plain affine transform
/// producing logits.

#[derive(Debug)]
pub struct Classifier<T: Real = f32> {
  hidden: Vec<Dense<T>>,
  output: Dense<T>,
  dropout: T,
  mode: Mode,
}

impl<T: Real> Classifier<T> {
  pub fn new(config: ModelConfig) -> Result<Self> {
    config.validate()?;
    let widths: Vec<usize> = std::iter::once(config.input_size)
      .chain(config.hidden_layers.iter().copied())
      .collect();
    let hidden = widths.iter()
      .tuple_windows()
      .map(|(&inputs, &outputs)| Dense::new(inputs, outputs) )
      .collect();
    let last = widths.last().copied().unwrap_or(config.input_size);
    let model = Self {
      hidden,
      output: Dense::new(last, config.output_size),
      dropout: T::cast(config.dropout),
      mode: Mode::default(),
    };
    debug!("Created classifier {} with dropout {}", model.architecture(), config.dropout);
    Ok(model)
  }

  /// Describe the layer widths of this model.

  pub fn architecture(&self) -> Architecture {
    Architecture {
      input_size: self.input_size(),
      output_size: self.output.outputs(),
      hidden_layers: self.hidden.iter().map(Dense::outputs).collect(),
    }
  }

  pub fn input_size(&self) -> usize {
    self.hidden.first().unwrap_or(&self.output).inputs()
  }

  pub fn output_size(&self) -> usize {
    self.output.outputs()
  }

  pub fn dropout(&self) -> T {
    self.dropout
  }

  pub fn mode(&self) -> Mode {
    self.mode
  }

  pub fn train(&mut self) {
    self.mode = Mode::Training;
  }

  pub fn eval(&mut self) {
    self.mode = Mode::Evaluation;
  }

  /// Run `cb` in evaluation mode, restoring the previous mode afterwards.

  pub fn evaluating<R>(&mut self, cb: impl FnOnce(&Self) -> R) -> R {
    let previous = std::mem::replace(&mut self.mode, Mode::Evaluation);
    let result = cb(self);
    self.mode = previous;
    result
  }

  /// Compute logits for a `[batch, input_size]` batch.

  pub fn forward(&self, input: &Tensor<T>) -> Result<Variable<T>> {
    self.run(input, self.mode == Mode::Training)
  }

  /// Log-probabilities per class, computed with dropout disabled.

  pub fn predict_log_probabilities(&self, input: &Tensor<T>) -> Result<Variable<T>> {
    Ok(self.run(input, false)?.log_softmax())
  }

  fn run(&self, input: &Tensor<T>, train: bool) -> Result<Variable<T>> {
    let features = input.shape().at_or(-1, 0);
    if input.rank() != 2 || features != self.input_size() {
      return Err(Error::InputShape { expected: self.input_size(), actual: features })
    }
    let hidden = self.hidden.iter().fold(input.tracked(), |x, layer| {
      x.affine(layer)
        .relu()
        .dropout(self.dropout, train)
    });
    Ok(hidden.affine(&self.output))
  }

  /// All trainable parameters, in layer order.

  pub fn parameters(&self) -> Vec<Variable<T>> {
    self.named_parameters()
      .into_iter()
      .map(|(_, param)| param )
      .collect()
  }

  pub fn named_parameters(&self) -> Vec<(String, Variable<T>)> {
    let hidden = self.hidden.iter()
      .enumerate()
      .flat_map(|(i, layer)| [
        (format!("hidden_layers.{i}.weight"), layer.weights.clone()),
        (format!("hidden_layers.{i}.bias"), layer.bias.clone()),
      ]);
    hidden
      .chain([
        ("output.weight".to_string(), self.output.weights.clone()),
        ("output.bias".to_string(), self.output.bias.clone()),
      ])
      .collect()
  }

  /// Detached copy of every parameter.

  pub fn state(&self) -> StateDict<T> {
    self.named_parameters()
      .into_iter()
      .map(|(name, param)| (name, param.detach()) )
      .collect()
  }

  /// Copy the given state into this model's parameters.
  ///
  /// Every name and shape is checked before anything is written.
  /// On any disagreement, all of them are reported and the model
  /// stays untouched.

  pub fn load_state(&self, state: &StateDict<T>) -> Result<()> {
    self.architecture().check_state(state)?;
    for (name, param) in self.named_parameters() {
      param.assign(&state[&name]);
    }
    Ok(())
  }
}

impl<T: Real> std::fmt::Display for Classifier<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    writeln!(f, "Classifier ({:?} mode)", self.mode)?;
    for (i, layer) in self.hidden.iter().enumerate() {
      writeln!(f, "  hidden_layers.{i}: Dense({} -> {}), ReLU, Dropout({})",
        layer.inputs(), layer.outputs(), self.dropout)?;
    }
    write!(f, "  output: Dense({} -> {})", self.output.inputs(), self.output.outputs())
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  fn model(hidden: &[usize]) -> Classifier<f64> {
    Classifier::new(ModelConfig::new(6, 3, hidden)).unwrap()
  }

  #[test]
  fn output_shape_for_any_batch() {
    for hidden in [vec![], vec![4], vec![8, 5, 2]] {
      let model = model(&hidden);
      for batch in [1, 2, 17] {
        let out = model.forward(&Tensor::randn(&[batch, 6])).unwrap();
        assert_eq!(out.shape().dims, vec![batch, 3]);
      }
    }
  }

  #[test]
  fn digits_scenario() {
    let model = Classifier::<f32>::new(ModelConfig::new(784, 10, &[128, 64])).unwrap();
    let input = Tensor::zeros(&[64, 784]);
    assert_eq!(model.forward(&input).unwrap().shape().dims, vec![64, 10]);
    let log_probs = model.predict_log_probabilities(&input).unwrap();
    assert_eq!(log_probs.shape().dims, vec![64, 10]);
    for i in 0..64 {
      let total: f32 = log_probs.row(i).iter().map(|p| p.exp() ).sum();
      assert!((total - 1.0).abs() < 1e-5);
    }
  }

  #[test]
  fn log_probabilities_normalize() {
    let model = model(&[5]);
    let log_probs = model.predict_log_probabilities(&(Tensor::randn(&[9, 6]) * 10.0)).unwrap();
    for i in 0..9 {
      let total: f64 = log_probs.row(i).iter().map(|p| p.exp() ).sum();
      assert!((total - 1.0).abs() < 1e-9);
    }
  }

  #[test]
  fn evaluation_is_deterministic() {
    let mut model = Classifier::<f64>::new(ModelConfig::new(6, 3, &[16, 16]).with_dropout(0.5)).unwrap();
    model.eval();
    let input = Tensor::randn(&[4, 6]);
    assert_eq!(model.forward(&input).unwrap(), model.forward(&input).unwrap());
  }

  #[test]
  fn training_mode_is_stochastic_but_unbiased() {
    let model = Classifier::<f64>::new(ModelConfig::new(6, 3, &[32]).with_dropout(0.5)).unwrap();
    let input = Tensor::randn(&[2, 6]);
    let first = model.forward(&input).unwrap();
    let differs = (0..10).any(|_| model.forward(&input).unwrap() != first );
    assert!(differs);

    // With a single hidden layer the output is linear in the dropout mask,
    // so the average approaches the evaluation output.
    let runs = 4000;
    let mut total = Tensor::zeros(&[2, 3]);
    for _ in 0..runs {
      total = total + model.forward(&input).unwrap().tensor();
    }
    let mean = total / runs as f64;
    let logits = model.run(&input, false).unwrap();
    let scale = logits.raw().iter().fold(1.0f64, |m, a| m.max(a.abs()) );
    for (a, b) in mean.raw().iter().zip(logits.raw().iter()) {
      assert!((a - b).abs() < 0.15 * scale, "{a} vs {b}");
    }
  }

  #[test]
  fn evaluating_restores_mode() {
    let mut model = model(&[4]);
    assert_eq!(model.mode(), Mode::Training);
    let seen = model.evaluating(|m| m.mode() );
    assert_eq!(seen, Mode::Evaluation);
    assert_eq!(model.mode(), Mode::Training);
    model.eval();
    model.evaluating(|_| ());
    assert_eq!(model.mode(), Mode::Evaluation);
  }

  #[test]
  fn architecture_and_names() {
    let deep = model(&[8, 5]);
    assert_eq!(deep.architecture(), Architecture { input_size: 6, output_size: 3, hidden_layers: vec![8, 5] });
    assert_eq!(deep.architecture().to_string(), "6 -> 8 -> 5 -> 3");
    let names: Vec<_> = deep.named_parameters().into_iter().map(|(name, _)| name ).collect();
    assert_eq!(names, vec![
      "hidden_layers.0.weight", "hidden_layers.0.bias",
      "hidden_layers.1.weight", "hidden_layers.1.bias",
      "output.weight", "output.bias",
    ]);
    assert_eq!(model(&[]).architecture().hidden_layers, Vec::<usize>::new());
  }

  #[test]
  fn rejects_invalid_config() {
    for config in [
      ModelConfig::new(0, 3, &[4]),
      ModelConfig::new(6, 0, &[4]),
      ModelConfig::new(6, 3, &[4, 0]),
      ModelConfig::new(6, 3, &[4]).with_dropout(1.0),
      ModelConfig::new(6, 3, &[4]).with_dropout(-0.1),
    ] {
      assert!(matches!(Classifier::<f32>::new(config), Err(Error::InvalidConfig(_))));
    }
  }

  #[test]
  fn non_finite_inputs_propagate() {
    let mut model = model(&[4, 4]);
    model.eval();
    let logits = model.forward(&Tensor::fill(&[2, 6], f64::NAN)).unwrap();
    assert!(logits.raw().iter().all(|a| a.is_nan() ));
  }

  #[test]
  fn rejects_wrong_input_width() {
    let model = model(&[4]);
    let err = model.forward(&Tensor::zeros(&[2, 5])).unwrap_err();
    assert!(matches!(err, Error::InputShape { expected: 6, actual: 5 }));
  }

  #[test]
  fn state_round_trip() {
    let a = model(&[4]);
    let b = model(&[4]);
    b.load_state(&a.state()).unwrap();
    let input = Tensor::randn(&[3, 6]);
    assert_eq!(a.predict_log_probabilities(&input).unwrap(), b.predict_log_probabilities(&input).unwrap());
  }

  #[test]
  fn failed_load_leaves_model_untouched() {
    let source = model(&[5]);
    let target = model(&[4]);
    let before = target.state();
    let err = target.load_state(&source.state()).unwrap_err();
    let Error::State(mismatches) = err else { panic!("expected state error") };
    let names: Vec<_> = mismatches.iter().map(Mismatch::name).collect();
    assert_eq!(names, vec!["hidden_layers.0.weight", "hidden_layers.0.bias", "output.weight"]);
    assert_eq!(target.state(), before);
  }

  #[test]
  fn reports_missing_and_unexpected_names() {
    let model = model(&[4]);
    let mut state = model.state();
    let bias = state.remove("output.bias").unwrap();
    state.insert("output.gain".into(), bias);
    let Err(Error::State(mismatches)) = model.load_state(&state) else { panic!("expected state error") };
    assert_eq!(mismatches, vec![
      Mismatch::Missing("output.bias".into()),
      Mismatch::Unexpected("output.gain".into()),
    ]);
  }
}
