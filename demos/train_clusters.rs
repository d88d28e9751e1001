// This example demonstrates training a dropout classifier on synthetic
// data, reporting progress along the way.

// Run with RUST_LOG=info to see the progress reports.

use densenet::{
  Classifier, ModelConfig,
  data::{ Dataset, DataLoader },
  loss::CrossEntropy,
  optimize::{ Optimizer, Adam },
  train::{ train, TrainConfig },
};

fn main() -> densenet::Result<()> {
  env_logger::init();

  // --- Insert real data here ---
  let data = Dataset::<f32>::clusters(5, 16, 400, 1.0, 7)?.normalize(0.0, 4.0)?;
  let (training, validation) = data.split(0.2)?;
  let training = DataLoader::new(training, 64)?.shuffled(true);
  let validation = DataLoader::new(validation, 64)?;

  // Model and optimizer are separate, the optimizer only borrows parameters
  let mut model = Classifier::new(ModelConfig::new(16, 5, &[64, 32]).with_dropout(0.2))?;
  let mut optimizer = Optimizer::new(model.parameters(), 0.003, Adam::default())?;
  println!("{model}");

  let config = TrainConfig { epochs: 5, report_interval: 10 };
  let report = train(&mut model, &training, &validation, &CrossEntropy, &mut optimizer, &config)?;

  for progress in &report.history {
    println!("{progress}");
  }
  Ok(())
}
