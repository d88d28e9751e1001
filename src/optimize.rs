use std::collections::HashMap;

use crate::{
  error::{ Error, Result },
  scalar::Real,
  tensor::Tensor,
  variable::Variable,
};


/// An optimization strategy to be used with [Optimizer].

pub trait Strategy<R: Real> {
  /// Compute the change to apply to `param`, given its gradient.
  fn update(&mut self, param: &Variable<R>, grad: &Tensor<R>, rate: R, step: usize) -> Tensor<R>;
}


/// Generic optimizer that allows for several optimization [strategies](Strategy) to be used.
///
/// The optimizer holds handles to the parameters it updates, but the
/// parameters keep belonging to their model.

#[derive(Debug)]
pub struct Optimizer<R: Real, S: Strategy<R>> {
  strategy: S,
  params: Vec<Variable<R>>,
  pub learning_rate: R,
  step: usize,
}

impl<R: Real, S: Strategy<R>> Optimizer<R, S> {
  pub fn new(params: Vec<Variable<R>>, learning_rate: R, strategy: S) -> Result<Self> {
    if let Some(param) = params.iter().find(|param| !param.is_trainable() ) {
      return Err(Error::InvalidConfig(format!("{param} cannot be optimized")))
    }
    if !(learning_rate > R::zero()) {
      return Err(Error::InvalidConfig(format!("learning rate must be positive, got {learning_rate}")))
    }
    Ok(Self { strategy, params, learning_rate, step: 1 })
  }

  pub fn parameters(&self) -> &[Variable<R>] {
    &self.params
  }

  /// Reset the gradients of all parameters.
  /// Gradients accumulate otherwise.

  pub fn zero_grad(&self) {
    for param in &self.params {
      if let Some(grad) = param.grad() {
        grad.refill(R::zero());
      }
    }
  }

  /// Apply one update to every parameter, using its current gradient.

  pub fn step(&mut self) {
    for param in &self.params {
      let Some(grad) = param.grad() else { continue };
      let change = self.strategy.update(param, grad, self.learning_rate, self.step);
      param.op_assign(&change, |a, b| *a += b );
    }
    self.step += 1;
  }
}


/// Stochastic Gradient Descent strategy

#[derive(Debug, Clone, Default)]
pub struct SGD;

impl<R: Real> Strategy<R> for SGD {
  fn update(&mut self, _param: &Variable<R>, grad: &Tensor<R>, rate: R, _step: usize) -> Tensor<R> {
    grad * -rate
  }
}


/// Stochastic Gradient Descent with momentum

#[derive(Debug, Clone)]
pub struct Momentum<R: Real> {
  pub momentum: R,
  v: HashMap<usize, Tensor<R>>,
}

impl<R: Real> Momentum<R> {
  pub fn new(momentum: R) -> Self {
    Self {
      momentum,
      v: HashMap::new(),
    }
  }
}

impl<R: Real> Default for Momentum<R> {
  fn default() -> Self {
    Self::new(R::cast(0.9))
  }
}

impl<R: Real> Strategy<R> for Momentum<R> {
  fn update(&mut self, param: &Variable<R>, grad: &Tensor<R>, rate: R, _step: usize) -> Tensor<R> {
    let v = self.v.entry(param.id())
      .or_insert_with(|| Tensor::zeros(&param.shape().dims) );
    v.assign(&(&*v * self.momentum - grad * rate));
    v.detach()
  }
}


/// Stochastic Gradient Descent with Nesterov momentum

#[derive(Debug, Clone)]
pub struct Nesterov<R: Real> {
  pub momentum: R,
  v: HashMap<usize, Tensor<R>>,
}

impl<R: Real> Nesterov<R> {
  pub fn new(momentum: R) -> Self {
    Self {
      momentum,
      v: HashMap::new(),
    }
  }
}

impl<R: Real> Default for Nesterov<R> {
  fn default() -> Self {
    Self::new(R::cast(0.9))
  }
}

impl<R: Real> Strategy<R> for Nesterov<R> {
  fn update(&mut self, param: &Variable<R>, grad: &Tensor<R>, rate: R, _step: usize) -> Tensor<R> {
    let v = self.v.entry(param.id())
      .or_insert_with(|| Tensor::zeros(&param.shape().dims) );
    let v_prev = v.detach();
    v.assign(&(&*v * self.momentum - grad * rate));
    v_prev * -self.momentum + &*v * (R::one() + self.momentum)
  }
}


/// Adaptive Moment Estimation strategy (ADAM)

#[derive(Debug, Clone)]
pub struct Adam<R: Real> {
  pub beta1: R,
  pub beta2: R,
  pub epsilon: R,
  m: HashMap<usize, Tensor<R>>,
  v: HashMap<usize, Tensor<R>>,
}

impl<R: Real> Adam<R> {
  pub fn new(beta1: R, beta2: R) -> Self {
    Self {
      beta1,
      beta2,
      epsilon: R::cast(1e-8),
      m: HashMap::new(),
      v: HashMap::new(),
    }
  }
}

impl<R: Real> Default for Adam<R> {
  fn default() -> Self {
    Self::new(R::cast(0.9), R::cast(0.999))
  }
}

impl<R: Real> Strategy<R> for Adam<R> {
  fn update(&mut self, param: &Variable<R>, grad: &Tensor<R>, rate: R, step: usize) -> Tensor<R> {
    let dims = &param.shape().dims;
    let m = self.m.entry(param.id()).or_insert_with(|| Tensor::zeros(dims) );
    let v = self.v.entry(param.id()).or_insert_with(|| Tensor::zeros(dims) );
    m.assign(&(&*m * self.beta1 + grad        * (R::one() - self.beta1)));
    v.assign(&(&*v * self.beta2 + grad * grad * (R::one() - self.beta2)));
    let step = R::cast(step as f64);
    let mt = &*m / (R::one() - self.beta1.powf(step));
    let vt = &*v / (R::one() - self.beta2.powf(step));
    mt * -rate / (vt.vectorize(|a| a.sqrt() ) + self.epsilon)
  }
}
