use log::{ debug, info };
use serde::{ Serialize, Deserialize };

use crate::{
  data::BatchSource,
  error::{ Error, Result },
  loss::Loss,
  model::Classifier,
  ops::RealOps,
  optimize::{ Optimizer, Strategy },
  scalar::Real,
  no_grad,
};


/// Settings for [train].

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainConfig {
  pub epochs: usize,
  /// Number of optimization steps between progress reports.
  pub report_interval: usize,
}

impl Default for TrainConfig {
  fn default() -> Self {
    Self { epochs: 2, report_interval: 40 }
  }
}

impl TrainConfig {
  pub fn validate(&self) -> Result<()> {
    if self.epochs == 0 {
      return Err(Error::InvalidConfig("Need at least one epoch".to_string()))
    }
    if self.report_interval == 0 {
      return Err(Error::InvalidConfig("Report interval must be positive".to_string()))
    }
    Ok(())
  }
}


/// Snapshot of training progress, taken every few steps.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
  pub epoch: usize,
  pub epochs: usize,
  pub step: usize,
  pub training_loss: f64,
  pub validation_loss: f64,
  pub validation_accuracy: f64,
}

impl std::fmt::Display for Progress {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Epoch: {}/{}.. Training Loss: {:.3}.. Validation Loss: {:.3}.. Validation Accuracy: {:.3}",
      self.epoch, self.epochs, self.training_loss, self.validation_loss, self.validation_accuracy)
  }
}


#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
  pub history: Vec<Progress>,
}

impl TrainReport {
  pub fn last(&self) -> Option<&Progress> {
    self.history.last()
  }
}


/// Average loss and accuracy over a set of batches.

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
  pub loss: f64,
  pub accuracy: f64,
}


fn as_f64<T: Real>(value: T) -> f64 {
  value.to_f64().unwrap_or(f64::NAN)
}


/// Measure `model` on every batch of `batches`, with dropout disabled
/// and without recording gradients.
///
/// The loss is averaged over batches, the accuracy over rows.

pub fn validate<T: Real>(
  model: &mut Classifier<T>,
  batches: &impl BatchSource<T>,
  loss: &impl Loss<T>,
) -> Result<Evaluation> {
  model.evaluating(|model| no_grad(|| {
    let mut total_loss = 0.0;
    let mut num_batches = 0;
    let mut correct = 0;
    let mut rows = 0;
    for batch in batches.batches() {
      if batch.is_empty() {
        return Err(Error::EmptyBatches("validation"))
      }
      let logits = model.forward(&batch.inputs)?;
      total_loss += as_f64(loss.compute(&logits, &batch.labels)?.item());
      num_batches += 1;
      let predicted = logits.log_softmax().argmax();
      correct += predicted.iter()
        .zip(&batch.labels)
        .filter(|(predicted, label)| predicted == label )
        .count();
      rows += batch.len();
    }
    if num_batches == 0 {
      return Err(Error::EmptyBatches("validation"))
    }
    Ok(Evaluation {
      loss: total_loss / num_batches as f64,
      accuracy: correct as f64 / rows as f64,
    })
  }))
}


/// Fit `model` to the `training` batches, periodically measuring it
/// on the `validation` batches.
///
/// Progress gets reported every `report_interval` steps and at the end
/// of each epoch. Any failure aborts training immediately, leaving the
/// model with whatever updates were applied so far.

pub fn train<T, L, S>(
  model: &mut Classifier<T>,
  training: &impl BatchSource<T>,
  validation: &impl BatchSource<T>,
  loss: &L,
  optimizer: &mut Optimizer<T, S>,
  config: &TrainConfig,
) -> Result<TrainReport>
where
  T: Real,
  L: Loss<T>,
  S: Strategy<T>,
{
  config.validate()?;
  model.train();
  let mut report = TrainReport::default();
  let mut step = 0;
  for epoch in 1..=config.epochs {
    let mut running_loss = 0.0;
    let mut pending = 0;
    let mut epoch_steps = 0;
    for batch in training.batches() {
      if batch.is_empty() {
        return Err(Error::EmptyBatches("training"))
      }
      step += 1;
      epoch_steps += 1;
      optimizer.zero_grad();
      let predictions = model.forward(&batch.inputs)?;
      let batch_loss = loss.compute(&predictions, &batch.labels)?;
      let value = as_f64(batch_loss.item());
      if !value.is_finite() {
        return Err(Error::NonFiniteLoss { epoch, step, value })
      }
      batch_loss.backward();
      optimizer.step();
      debug!("Step {step}: loss {value:.5}");
      running_loss += value;
      pending += 1;
      if pending == config.report_interval {
        report.history.push(measure(model, validation, loss, epoch, config.epochs, step, running_loss / pending as f64)?);
        running_loss = 0.0;
        pending = 0;
      }
    }
    if epoch_steps == 0 {
      return Err(Error::EmptyBatches("training"))
    }
    if pending > 0 {
      report.history.push(measure(model, validation, loss, epoch, config.epochs, step, running_loss / pending as f64)?);
    }
  }
  Ok(report)
}

fn measure<T: Real>(
  model: &mut Classifier<T>,
  validation: &impl BatchSource<T>,
  loss: &impl Loss<T>,
  epoch: usize,
  epochs: usize,
  step: usize,
  training_loss: f64,
) -> Result<Progress> {
  let evaluation = validate(model, validation, loss)?;
  let progress = Progress {
    epoch,
    epochs,
    step,
    training_loss,
    validation_loss: evaluation.loss,
    validation_accuracy: evaluation.accuracy,
  };
  info!("{progress}");
  Ok(progress)
}
