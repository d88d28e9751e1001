//! Dropout MLP classifiers with a training loop and self-describing checkpoints.
//! Tiny. Few dependencies. CPU only.
//!
//! # Features
//!
//! - **Configurable depth**: Any number of hidden layers of any width, each
//! followed by ReLU and inverted dropout. The output layer produces raw logits.
//!
//! - **Auto-grad**: Built on a small reverse-mode [Variable] graph over dense
//! row-major [Tensor]s. Gradients accumulate until they get reset.
//!
//! - **Pluggable optimization**: SGD, Momentum, Nesterov and ADAM
//! [strategies](optimize::Strategy) drive a single [Optimizer](optimize::Optimizer).
//!
//! - **Checkpoints**: Architecture and weights get stored together, so a model
//! can be [loaded](checkpoint::load) without knowing its layer widths.
//! Mismatched parameters are reported all at once, and never partially applied.
//!
//! # Examples
//!
//! Training on synthetic data:
//! ```
//! use densenet::{
//!   Classifier, ModelConfig,
//!   data::{ Dataset, DataLoader },
//!   loss::CrossEntropy,
//!   optimize::{ Optimizer, Adam },
//!   train::{ train, TrainConfig },
//! };
//!
//! let data = Dataset::<f32>::clusters(3, 4, 50, 0.5, 1).unwrap();
//! let (training, validation) = data.split(0.2).unwrap();
//! let training = DataLoader::new(training, 16).unwrap().shuffled(true);
//! let validation = DataLoader::new(validation, 32).unwrap();
//!
//! let mut model = Classifier::new(ModelConfig::new(4, 3, &[16, 8])).unwrap();
//! let mut optimizer = Optimizer::new(model.parameters(), 0.01, Adam::default()).unwrap();
//!
//! let config = TrainConfig { epochs: 2, report_interval: 5 };
//! let report = train(&mut model, &training, &validation, &CrossEntropy, &mut optimizer, &config).unwrap();
//! assert!(report.last().is_some());
//! ```
//!
//! Differentiating a function directly:
//! ```
//! use densenet::{ ops::*, Tensor };
//!
//! let x = Tensor::vec(&[1.0, 2.0, 3.0]).trained();
//! let y = (&x * &x).sum();
//! y.backward();
//! assert_eq!(x.grad().unwrap().to_vec(), vec![2.0, 4.0, 6.0]);
//! ```
//!
//! ## More examples
//! Check the `/demos` folder for more example code.
//!
//!
//! # Optional features
//!
//! - `unsafe` *(default)*: Accelerated matrix math using [matrixmultiply] crate.

mod internal;
mod shape;
mod tensor;
mod variable;

pub mod ops;
pub mod scalar;
pub mod error;
pub mod layer;
pub mod model;
pub mod loss;
pub mod optimize;
pub mod data;
pub mod train;
pub mod checkpoint;

pub use shape::Shape;
pub use tensor::Tensor;
pub use variable::{ Variable, UnaryOp, BinaryOp, no_grad, grad_enabled };
pub use error::{ Error, Mismatch, Result };
pub use model::{ Classifier, ModelConfig, Architecture, Mode, StateDict };
