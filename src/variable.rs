use std::rc::Rc;
use std::cell::Cell;
use std::collections::HashSet;
use std::fmt::Debug;

mod mops;

use crate::{
  internal::*,
  tensor::Tensor,
  scalar::Real,
  ops::{ BaseOps, NumericOps },
};


thread_local! {
  static GRAD_ENABLED: Cell<bool> = Cell::new(true);
}

/// Whether operations on [Variable]s currently get recorded.

pub fn grad_enabled() -> bool {
  GRAD_ENABLED.with(|enabled| enabled.get() )
}

/// Run `cb` without recording a computation graph.
///
/// Variables produced inside carry no gradient and keep no
/// reference to their inputs. The previous setting is restored
/// on return, even when `cb` panics.

pub fn no_grad<R>(cb: impl FnOnce() -> R) -> R {
  struct Restore(bool);

  impl Drop for Restore {
    fn drop(&mut self) {
      let previous = self.0;
      GRAD_ENABLED.with(|enabled| enabled.set(previous) );
    }
  }

  let _restore = Restore(GRAD_ENABLED.with(|enabled| enabled.replace(false) ));
  cb()
}


/// Unary computational operation that can also compute its derivative.

pub trait UnaryOp<T: Real>: Debug {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T>;
  fn derive(&self, lhs: &Tensor<T>, out: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T>;
}


/// Binary computational operation that can also compute its derivative.

pub trait BinaryOp<T: Real>: Debug {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T>;
  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>);
}


#[derive(Debug)]
enum Op<T: Real> {
  Unary(Box<dyn UnaryOp<T>>),
  Binary(Box<dyn BinaryOp<T>>),
}


/// Node in a computation graph, containing a [Variable]'s data and gradient,
/// as well as the operation used to create it.

#[derive(Debug)]
struct Node<T: Real> {
  id: usize,
  data: Tensor<T>,
  grad: Option<Tensor<T>>,
  op: Option<Op<T>>,
  previous: Vec<Rc<Self>>,
  trainable: bool,
}

impl<T: Real> Node<T> {
  fn reset_gradient(&self, filler: T) {
    if let Some(grad) = &self.grad {
      grad.refill(filler);
    }
  }

  fn backward(&self) {
    let (Some(op), Some(grad)) = (&self.op, &self.grad) else { return };
    let lhs = &self.previous[0];
    let changes = match op {
      Op::Unary(op) => vec![op.derive(&lhs.data, &self.data, grad)],
      Op::Binary(op) => {
        let rhs = &self.previous[1];
        let (l, r) = op.derive(&lhs.data, &rhs.data, grad);
        vec![l, r]
      },
    };
    for (change, prev) in changes.iter().zip(&self.previous) {
      if let Some(grad) = &prev.grad {
        grad.op_assign(change, |a, b| *a += b );
      }
    }
  }
}


/// Variables track the computational operations used to create them and allow
/// for computing their gradient with respect to all input variables involved.
///
/// They get created by calling [tracked](Tensor::tracked) or
/// [trained](Tensor::trained) on any [Tensor].
///
/// Variables dereference to their underlying [Tensor] automatically for
/// non-differentiable operations. Differentiable operations, on the other hand,
/// will always return another Variable.
///
/// Gradients of trainable variables accumulate across calls to
/// [backward](Variable::backward) until they get [reset](Variable::reset).

#[derive(Debug, Clone)]
pub struct Variable<T: Real> {
  node: Rc<Node<T>>,
}

impl<T: Real> std::ops::Deref for Variable<T> {
  type Target = Tensor<T>;

  fn deref(&self) -> &Self::Target {
    &self.node.data
  }
}

impl<T: Real> PartialEq for Variable<T> {
  fn eq(&self, rhs: &Self) -> bool {
    self.node.data == rhs.node.data
  }
}

impl<T: Real> Variable<T> {
  pub(crate) fn from_tensor(tensor: Tensor<T>, trainable: bool) -> Self {
    Self {
      node: Rc::new(Node {
        id: make_id(),
        grad: trainable.then(|| Tensor::zeros(&tensor.shape().dims) ),
        data: tensor,
        op: None,
        previous: vec![],
        trainable,
      }),
    }
  }

  fn operation(op: Op<T>, data: Tensor<T>, inputs: &[&Self]) -> Self {
    let tracked = grad_enabled() && inputs.iter().any(|input| input.grad().is_some() );
    Self {
      node: Rc::new(Node {
        id: make_id(),
        grad: tracked.then(|| Tensor::zeros(&data.shape().dims) ),
        data,
        op: tracked.then_some(op),
        previous: if tracked {
          inputs.iter().map(|input| input.node.clone() ).collect()
        } else {
          vec![]
        },
        trainable: false,
      }),
    }
  }

  pub fn id(&self) -> usize {
    self.node.id
  }

  pub fn tensor(&self) -> &Tensor<T> {
    &self.node.data
  }

  pub fn grad(&self) -> Option<&Tensor<T>> {
    self.node.grad.as_ref()
  }

  pub fn is_trainable(&self) -> bool {
    self.node.trainable
  }

  pub fn unary_op(&self, op: impl UnaryOp<T> + 'static) -> Self {
    let data = op.run(&self.node.data);
    Self::operation(Op::Unary(Box::new(op)), data, &[self])
  }

  pub fn binary_op(&self, op: impl BinaryOp<T> + 'static, rhs: &Self) -> Self {
    let data = op.run(&self.node.data, &rhs.node.data);
    Self::operation(Op::Binary(Box::new(op)), data, &[self, rhs])
  }

  /// Compute gradients across this Variable's entire graph.

  pub fn backward(&self) {
    if self.grad().is_none() { panic!("Cannot compute gradients for constant {self}") }
    let history = self.history();
    // Only trainable gradients accumulate across calls
    for node in history.iter().filter(|node| !node.trainable ) {
      node.reset_gradient(T::zero());
    }
    self.node.reset_gradient(T::one());
    for node in history.iter().rev() {
      node.backward();
    }
  }

  /// List all trainable parameters in this Variable's graph.

  pub fn parameters(&self) -> Vec<Self> {
    self.history()
      .into_iter()
      .filter(|node| node.trainable )
      .map(|node| Self { node } )
      .collect()
  }

  /// Set gradients to zero for this Variable's entire graph.

  pub fn reset(&self) {
    for node in self.history() {
      node.reset_gradient(T::zero());
    }
  }

  fn history(&self) -> Vec<Rc<Node<T>>> {
    let mut history = vec![];
    Self::history_recurse(&self.node, &mut history, &mut HashSet::new());
    history
  }

  fn history_recurse(node: &Rc<Node<T>>, history: &mut Vec<Rc<Node<T>>>, visited: &mut HashSet<usize>) {
    if !visited.insert(node.id) { return }
    for prev in &node.previous {
      Self::history_recurse(prev, history, visited);
    }
    history.push(node.clone());
  }

  /// Compute a function's gradient with respect to a generated
  /// input numerically and compare it to the automatically derived
  /// solution.
  ///
  /// Supply any function to check that it gets differentiated correctly.

  pub fn check_gradients<F>(shape: &[usize], generator: F) -> T
  where
    F: Fn(&Self) -> Self
  {
    let eps = T::cast(1e-4);
    let two = T::cast(2.0);
    // Generate random input
    let input = Tensor::randn(shape);
    let var = input.trained();
    // Compute gradient using auto diff
    let output = generator(&var).sum();
    output.backward();
    let grad = var.grad().map(Tensor::detach).unwrap_or_else(|| Tensor::zeros(shape) );
    // Compute gradient numerically for every param in input
    let len = input.size();
    let num_grad: Vec<T> = (0..len).map(|i| {
      let mut hot = vec![T::zero(); len];
      hot[i] = eps;
      let epst = Tensor::new(shape, hot);
      let prev = generator(&(&input - &epst).tracked()).sum();
      let next = generator(&(&input + &epst).tracked()).sum();
      (next.item() - prev.item()) / (two * eps)
    }).collect();
    let num_grad = Tensor::new(shape, num_grad);
    // Return average difference between both gradients
    let diff = (grad - num_grad).vectorize(|a| a.abs() );
    diff.sum().item() / T::cast(len as f64)
  }

  pub fn tracked(&self) -> Self { panic!("Tensor is already being tracked") }
  pub fn trained(&self) -> Self { panic!("Tensor is already being tracked") }
}

impl<T: Real> std::fmt::Display for Variable<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    let title = if self.node.trainable { "Trainable" } else if self.node.grad.is_some() {
      "Computed"
    } else {
      "Tracked"
    };
    write!(f, "{title} {}", self.tensor())
  }
}

impl<T: Real> From<T> for Variable<T> {
  fn from(value: T) -> Self {
    Self::scalar(value)
  }
}
