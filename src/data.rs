use rand::{ Rng, SeedableRng, rngs::StdRng, seq::SliceRandom };

use crate::{
  error::{ Error, Result },
  scalar::Real,
  Tensor,
};


/// A batch of input rows `[batch, features]` with one class label per row.

#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T: Real> {
  pub inputs: Tensor<T>,
  pub labels: Vec<usize>,
}

impl<T: Real> Batch<T> {
  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }
}


/// Anything that can be iterated as a finite sequence of batches.
///
/// Every call to [batches](BatchSource::batches) starts over from the
/// beginning, so the same source serves every epoch.

pub trait BatchSource<T: Real> {
  fn batches(&self) -> Box<dyn Iterator<Item = Batch<T>> + '_>;
}

impl<T: Real> BatchSource<T> for Vec<Batch<T>> {
  fn batches(&self) -> Box<dyn Iterator<Item = Batch<T>> + '_> {
    Box::new(self.iter().cloned())
  }
}


/// Labelled samples held in memory.

#[derive(Debug, Clone)]
pub struct Dataset<T: Real> {
  inputs: Tensor<T>,
  labels: Vec<usize>,
}

impl<T: Real> Dataset<T> {
  pub fn new(inputs: Tensor<T>, labels: Vec<usize>) -> Result<Self> {
    if inputs.rank() != 2 {
      return Err(Error::InvalidConfig(format!("Dataset inputs must be a matrix, got {}", inputs.shape())))
    }
    if inputs.dim(0) != labels.len() {
      return Err(Error::LabelCount { expected: inputs.dim(0), actual: labels.len() })
    }
    if labels.is_empty() {
      return Err(Error::InvalidConfig("Dataset is empty".to_string()))
    }
    Ok(Self { inputs, labels })
  }

  /// Gaussian blobs around random centers, one blob per class.
  ///
  /// Samples are interleaved by class, so any prefix of the
  /// dataset contains every class in equal measure.

  pub fn clusters(classes: usize, features: usize, per_class: usize, spread: T, seed: u64) -> Result<Self> {
    if classes == 0 || features == 0 || per_class == 0 {
      return Err(Error::InvalidConfig(format!(
        "Cluster dimensions must be positive, got {classes} classes, {features} features, {per_class} per class"
      )))
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let radius = T::cast(4.0);
    let centers: Vec<Vec<T>> = (0..classes)
      .map(|_| (0..features).map(|_| rng.gen_range(-radius, radius) ).collect() )
      .collect();
    let count = classes * per_class;
    let noise = Tensor::<T>::randn_with(&[count, features], &mut rng);
    let noise = noise.raw();
    let mut data = Vec::with_capacity(count * features);
    let mut labels = Vec::with_capacity(count);
    for i in 0..count {
      let label = i % classes;
      let row = &noise[i * features..(i + 1) * features];
      data.extend(centers[label].iter().zip(row).map(|(&c, &n)| c + n * spread ));
      labels.push(label);
    }
    Self::new(Tensor::new(&[count, features], data), labels)
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn features(&self) -> usize {
    self.inputs.dim(1)
  }

  /// Number of distinct classes, assuming labels start at zero.

  pub fn classes(&self) -> usize {
    self.labels.iter().max().map(|&max| max + 1 ).unwrap_or(0)
  }

  pub fn inputs(&self) -> &Tensor<T> {
    &self.inputs
  }

  pub fn labels(&self) -> &[usize] {
    &self.labels
  }

  /// Shift and scale every feature: `(x - mean) / std`.

  pub fn normalize(&self, mean: T, std: T) -> Result<Self> {
    if !(std > T::zero()) {
      return Err(Error::InvalidConfig(format!("Standard deviation must be positive, got {std}")))
    }
    Ok(Self {
      inputs: self.inputs.vectorize(|a| (a - mean) / std ),
      labels: self.labels.clone(),
    })
  }

  /// Split off the trailing `fraction` of samples, usually for validation.

  pub fn split(&self, fraction: f64) -> Result<(Self, Self)> {
    let tail = if (0.0..1.0).contains(&fraction) {
      (self.len() as f64 * fraction).round() as usize
    } else {
      0
    };
    let at = self.len() - tail;
    if tail == 0 || at == 0 {
      return Err(Error::InvalidConfig(format!(
        "Splitting {} samples at {fraction} would leave one side empty", self.len()
      )))
    }
    let indices: Vec<usize> = (0..self.len()).collect();
    let (head, tail) = indices.split_at(at);
    let head = self.select(head);
    let tail = self.select(tail);
    Ok((
      Self { inputs: head.inputs, labels: head.labels },
      Self { inputs: tail.inputs, labels: tail.labels },
    ))
  }

  /// Copy the given rows into a new batch.

  pub fn select(&self, indices: &[usize]) -> Batch<T> {
    let features = self.features();
    let raw = self.inputs.raw();
    let mut data = Vec::with_capacity(indices.len() * features);
    for &i in indices {
      data.extend_from_slice(&raw[i * features..(i + 1) * features]);
    }
    Batch {
      inputs: Tensor::new(&[indices.len(), features], data),
      labels: indices.iter().map(|&i| self.labels[i] ).collect(),
    }
  }
}


/// Cuts a [Dataset] into batches of a fixed size.
/// The last batch may be smaller.

#[derive(Debug, Clone)]
pub struct DataLoader<T: Real> {
  dataset: Dataset<T>,
  batch_size: usize,
  shuffle: bool,
}

impl<T: Real> DataLoader<T> {
  pub fn new(dataset: Dataset<T>, batch_size: usize) -> Result<Self> {
    if batch_size == 0 {
      return Err(Error::InvalidConfig("Batch size must be positive".to_string()))
    }
    Ok(Self { dataset, batch_size, shuffle: false })
  }

  /// Draw a new sample order every time batches are requested.

  pub fn shuffled(mut self, shuffle: bool) -> Self {
    self.shuffle = shuffle;
    self
  }

  pub fn dataset(&self) -> &Dataset<T> {
    &self.dataset
  }

  pub fn batch_size(&self) -> usize {
    self.batch_size
  }

  pub fn num_batches(&self) -> usize {
    (self.dataset.len() + self.batch_size - 1) / self.batch_size
  }
}

impl<T: Real> BatchSource<T> for DataLoader<T> {
  fn batches(&self) -> Box<dyn Iterator<Item = Batch<T>> + '_> {
    let mut order: Vec<usize> = (0..self.dataset.len()).collect();
    if self.shuffle {
      order.shuffle(&mut rand::thread_rng());
    }
    let chunks: Vec<Vec<usize>> = order.chunks(self.batch_size)
      .map(|chunk| chunk.to_vec() )
      .collect();
    Box::new(chunks.into_iter().map(move |indices| self.dataset.select(&indices) ))
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  fn toy() -> Dataset<f32> {
    let inputs = Tensor::new(&[5, 2], (0..10).map(|i| i as f32 ).collect());
    Dataset::new(inputs, vec![0, 1, 2, 0, 1]).unwrap()
  }

  #[test]
  fn new_validates() {
    let inputs = Tensor::<f32>::zeros(&[3, 2]);
    assert!(matches!(Dataset::new(inputs.clone(), vec![0, 1]), Err(Error::LabelCount { expected: 3, actual: 2 })));
    assert!(Dataset::new(Tensor::<f32>::zeros(&[6]), vec![0; 6]).is_err());
    assert!(Dataset::new(Tensor::<f32>::zeros(&[0, 2]), vec![]).is_err());
    assert_eq!(toy().classes(), 3);
    assert_eq!(toy().features(), 2);
  }

  #[test]
  fn select_rows() {
    let batch = toy().select(&[4, 1]);
    assert_eq!(batch.inputs, Tensor::new(&[2, 2], vec![8.0, 9.0, 2.0, 3.0]));
    assert_eq!(batch.labels, vec![1, 1]);
  }

  #[test]
  fn split() {
    let (train, valid) = toy().split(0.4).unwrap();
    assert_eq!((train.len(), valid.len()), (3, 2));
    assert_eq!(valid.labels(), &[0, 1]);
    assert!(toy().split(0.0).is_err());
    assert!(toy().split(1.0).is_err());
  }

  #[test]
  fn normalize() {
    let data = toy().normalize(4.5, 2.0).unwrap();
    assert_eq!(data.inputs().raw()[0], -2.25);
    assert!(toy().normalize(0.0, 0.0).is_err());
  }

  #[test]
  fn loader_covers_every_sample() {
    let loader = DataLoader::new(toy(), 2).unwrap().shuffled(true);
    assert_eq!(loader.num_batches(), 3);
    for _ in 0..2 {
      let batches: Vec<_> = loader.batches().collect();
      assert_eq!(batches.iter().map(Batch::len).collect::<Vec<_>>(), vec![2, 2, 1]);
      let mut seen: Vec<f32> = batches.iter().flat_map(|batch| batch.inputs.to_vec() ).collect();
      seen.sort_by(|a, b| a.partial_cmp(b).unwrap() );
      assert_eq!(seen, (0..10).map(|i| i as f32 ).collect::<Vec<_>>());
    }
    assert!(DataLoader::new(toy(), 0).is_err());
  }

  #[test]
  fn clusters_are_reproducible() {
    let a = Dataset::<f64>::clusters(3, 4, 10, 0.5, 7).unwrap();
    let b = Dataset::<f64>::clusters(3, 4, 10, 0.5, 7).unwrap();
    assert_eq!(a.inputs(), b.inputs());
    assert_eq!(a.len(), 30);
    assert_eq!(a.classes(), 3);
    assert_eq!(&a.labels()[..4], &[0, 1, 2, 0]);
  }

  #[test]
  fn vec_source_restarts() {
    let batches = vec![toy().select(&[0, 1]), toy().select(&[2])];
    assert_eq!(batches.batches().count(), 2);
    assert_eq!(batches.batches().count(), 2);
  }
}
