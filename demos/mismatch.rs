// This example demonstrates what happens when parameters get loaded
// into a model of a different shape.

// Every offending parameter is listed and the target model stays untouched.

use densenet::{ Classifier, ModelConfig, Error };

fn main() {
  env_logger::init();

  let trained = Classifier::<f32>::new(ModelConfig::new(784, 10, &[400, 200, 100])).unwrap();
  let target = Classifier::<f32>::new(ModelConfig::new(784, 10, &[512, 256, 128])).unwrap();

  match target.load_state(&trained.state()) {
    Err(Error::State(mismatches)) => {
      println!("{} parameters did not fit:", mismatches.len());
      for mismatch in mismatches {
        println!("{mismatch}");
      }
    },
    Err(err) => println!("{err}"),
    Ok(()) => println!("Loaded successfully"),
  }
}
