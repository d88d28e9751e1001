// This example demonstrates saving a trained model to a file and
// restoring it elsewhere, without knowing its architecture up front.

use densenet::{
  Classifier, ModelConfig, Tensor,
  checkpoint,
  data::{ Dataset, DataLoader },
  loss::CrossEntropy,
  optimize::{ Optimizer, SGD },
  train::{ train, TrainConfig },
};

fn main() -> densenet::Result<()> {
  env_logger::init();
  let filename = std::env::temp_dir().join("densenet-demo.ckpt");

  // Build and train a model
  build_model(&filename)?;

  // Load it elsewhere
  load_model(&filename)
}

fn build_model(filename: &std::path::Path) -> densenet::Result<()> {
  let data = Dataset::<f32>::clusters(3, 8, 200, 0.5, 3)?;
  let (training, validation) = data.split(0.25)?;
  let training = DataLoader::new(training, 32)?.shuffled(true);
  let validation = DataLoader::new(validation, 32)?;

  let mut model = Classifier::new(ModelConfig::new(8, 3, &[32, 16]))?;
  let mut optimizer = Optimizer::new(model.parameters(), 0.05, SGD)?;
  train(&mut model, &training, &validation, &CrossEntropy, &mut optimizer, &TrainConfig::default())?;

  // Architecture and weights get written together
  checkpoint::save(&model, filename)
}

fn load_model(filename: &std::path::Path) -> densenet::Result<()> {
  let mut model: Classifier<f32> = checkpoint::load(filename)?;
  println!("Restored {}", model.architecture());

  // Predict without dropout
  model.eval();
  let log_probs = model.predict_log_probabilities(&Tensor::randn(&[4, 8]))?;
  println!("Predicted classes {:?}", log_probs.argmax());
  Ok(())
}
