//! Self-describing model artifacts.
//!
//! A checkpoint records the layer widths of a [Classifier] together with
//! all of its parameters, so a model can be rebuilt without knowing its
//! architecture in advance.

use std::fs;
use std::path::{ Path, PathBuf };

use log::info;
use serde::{ Serialize, Deserialize };

use crate::{
  error::Result,
  model::{ Architecture, Classifier, ModelConfig, StateDict },
  scalar::Real,
};


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Checkpoint<T: Real> {
  pub input_size: usize,
  pub output_size: usize,
  pub hidden_layers: Vec<usize>,
  pub state: StateDict<T>,
}

impl<T: Real> Checkpoint<T> {
  pub fn from_model(model: &Classifier<T>) -> Self {
    let Architecture { input_size, output_size, hidden_layers } = model.architecture();
    Self {
      input_size,
      output_size,
      hidden_layers,
      state: model.state(),
    }
  }

  pub fn architecture(&self) -> Architecture {
    Architecture {
      input_size: self.input_size,
      output_size: self.output_size,
      hidden_layers: self.hidden_layers.clone(),
    }
  }

  /// Build a fresh model from the recorded architecture and load
  /// the recorded parameters into it.
  ///
  /// Dropout is not part of the artifact, so the model gets
  /// the default probability.

  pub fn into_model(self) -> Result<Classifier<T>> {
    let architecture = self.architecture();
    let config = ModelConfig::from(&architecture);
    config.validate()?;
    architecture.check_state(&self.state)?;
    let model = Classifier::new(config)?;
    model.load_state(&self.state)?;
    Ok(model)
  }

  pub fn to_bytes(&self) -> Result<Vec<u8>> {
    Ok(postcard::to_allocvec(self)?)
  }

  pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
    Ok(postcard::from_bytes(bytes)?)
  }
}


/// Write `model` to `path`.
///
/// The artifact is written next to its destination first and then
/// moved into place, so readers never see a partial file.

pub fn save<T: Real>(model: &Classifier<T>, path: impl AsRef<Path>) -> Result<()> {
  let path = path.as_ref();
  let bytes = Checkpoint::from_model(model).to_bytes()?;
  let staging = staging_path(path);
  fs::write(&staging, &bytes)?;
  if let Err(err) = fs::rename(&staging, path) {
    let _ = fs::remove_file(&staging);
    return Err(err.into())
  }
  info!("Saved {} to {} ({} bytes)", model.architecture(), path.display(), bytes.len());
  Ok(())
}


/// Rebuild a model from the artifact at `path`.

pub fn load<T: Real>(path: impl AsRef<Path>) -> Result<Classifier<T>> {
  let path = path.as_ref();
  let checkpoint = Checkpoint::from_bytes(&fs::read(path)?)?;
  let architecture = checkpoint.architecture();
  let model = checkpoint.into_model()?;
  info!("Loaded {architecture} from {}", path.display());
  Ok(model)
}


fn staging_path(path: &Path) -> PathBuf {
  let mut name = path.file_name().unwrap_or_default().to_os_string();
  name.push(".partial");
  path.with_file_name(name)
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::{ error::{ Error, Mismatch }, Tensor };

  fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("densenet-{}-{name}", std::process::id()))
  }

  #[test]
  fn round_trip() {
    let mut model = Classifier::<f32>::new(ModelConfig::new(12, 4, &[10, 6])).unwrap();
    let path = temp_path("round_trip.ckpt");
    save(&model, &path).unwrap();
    let mut loaded = load::<f32>(&path).unwrap();
    fs::remove_file(&path).unwrap();
    assert!(!staging_path(&path).exists());
    assert_eq!(loaded.architecture(), model.architecture());
    assert_eq!(loaded.state(), model.state());
    model.eval();
    loaded.eval();
    let input = Tensor::randn(&[5, 12]);
    assert_eq!(loaded.forward(&input).unwrap().tensor(), model.forward(&input).unwrap().tensor());
  }

  #[test]
  fn loaded_model_is_independent() {
    let model = Classifier::<f64>::new(ModelConfig::new(3, 2, &[4])).unwrap();
    let loaded = Checkpoint::from_model(&model).into_model().unwrap();
    loaded.parameters()[0].refill(0.0);
    assert!(model.parameters()[0].to_vec().iter().any(|&a| a != 0.0 ));
  }

  #[test]
  fn bytes_round_trip() {
    let model = Classifier::<f64>::new(ModelConfig::new(5, 3, &[])).unwrap();
    let checkpoint = Checkpoint::from_model(&model);
    let decoded = Checkpoint::<f64>::from_bytes(&checkpoint.to_bytes().unwrap()).unwrap();
    assert_eq!(decoded, checkpoint);
    assert_eq!(decoded.hidden_layers, Vec::<usize>::new());
  }

  #[test]
  fn mismatched_architecture_lists_every_parameter() {
    let small = Classifier::<f32>::new(ModelConfig::new(784, 10, &[400, 200, 100])).unwrap();
    let large = Classifier::<f32>::new(ModelConfig::new(784, 10, &[512, 256, 128])).unwrap();
    let before = large.state();
    let Err(Error::State(mismatches)) = large.load_state(&small.state()) else {
      panic!("Expected a state error")
    };
    let names: Vec<&str> = mismatches.iter().map(Mismatch::name).collect();
    assert_eq!(names, vec![
      "hidden_layers.0.weight",
      "hidden_layers.0.bias",
      "hidden_layers.1.weight",
      "hidden_layers.1.bias",
      "hidden_layers.2.weight",
      "hidden_layers.2.bias",
      "output.weight",
    ]);
    assert_eq!(mismatches[0], Mismatch::Shape {
      name: "hidden_layers.0.weight".to_string(),
      expected: vec![784, 512],
      actual: vec![784, 400],
    });
    assert_eq!(large.state(), before);
  }

  #[test]
  fn inconsistent_architecture_is_rejected() {
    let model = Classifier::<f32>::new(ModelConfig::new(8, 3, &[6])).unwrap();
    let mut checkpoint = Checkpoint::from_model(&model);
    checkpoint.hidden_layers = vec![5];
    assert!(matches!(checkpoint.clone().into_model(), Err(Error::State(_))));
    checkpoint.hidden_layers = vec![6];
    checkpoint.state.remove("output.bias");
    checkpoint.state.insert("output.scale".to_string(), Tensor::ones(&[3]));
    let Err(Error::State(mismatches)) = checkpoint.into_model() else {
      panic!("Expected a state error")
    };
    assert_eq!(mismatches, vec![
      Mismatch::Missing("output.bias".to_string()),
      Mismatch::Unexpected("output.scale".to_string()),
    ]);
  }

  #[test]
  fn oversized_architecture_is_rejected_before_allocation() {
    let model = Classifier::<f32>::new(ModelConfig::new(8, 3, &[6])).unwrap();
    let mut checkpoint = Checkpoint::from_model(&model);
    checkpoint.hidden_layers = vec![usize::MAX / 2];
    let bytes = checkpoint.to_bytes().unwrap();
    let Err(Error::State(mismatches)) = Checkpoint::<f32>::from_bytes(&bytes).unwrap().into_model() else {
      panic!("Expected a state error")
    };
    assert_eq!(mismatches[0], Mismatch::Shape {
      name: "hidden_layers.0.weight".to_string(),
      expected: vec![8, usize::MAX / 2],
      actual: vec![8, 6],
    });
  }

  #[test]
  fn corrupt_tensor_data_is_rejected() {
    let model = Classifier::<f64>::new(ModelConfig::new(4, 2, &[3])).unwrap();
    let mut checkpoint = Checkpoint::from_model(&model);
    let bias = &checkpoint.state["output.bias"];
    let bytes = postcard::to_allocvec(&(bias.shape(), vec![1.0f64])).unwrap();
    let truncated: Tensor<f64> = postcard::from_bytes(&bytes).unwrap();
    checkpoint.state.insert("output.bias".to_string(), truncated);
    let Err(Error::State(mismatches)) = checkpoint.into_model() else {
      panic!("Expected a state error")
    };
    assert_eq!(mismatches, vec![
      Mismatch::Corrupt { name: "output.bias".to_string(), expected: 2, actual: 1 },
    ]);
  }

  #[test]
  fn unreadable_artifacts() {
    assert!(matches!(load::<f32>(temp_path("does-not-exist.ckpt")), Err(Error::Io(_))));
    let path = temp_path("garbage.ckpt");
    fs::write(&path, [0xff; 7]).unwrap();
    let result = load::<f32>(&path);
    fs::remove_file(&path).unwrap();
    assert!(matches!(result, Err(Error::Codec(_))));
  }
}
