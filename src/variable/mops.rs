use crate::{
  tensor::Tensor,
  variable::{ Variable, BinaryOp, UnaryOp },
  scalar::Real,
  ops::{ BaseOps, NumericOps, RealOps, Hops },
};


impl<T: Real> BaseOps<T> for Variable<T> {
  fn scalar(item: T) -> Self {
    Self::from_tensor(Tensor::scalar(item), false)
  }

  fn numel(&self) -> usize {
    self.size()
  }

  fn transpose(&self) -> Self {
    self.unary_op(Transpose)
  }
}

impl<T: Real> NumericOps<T> for Variable<T> {
  fn sum(&self) -> Self {
    self.unary_op(Sum)
  }

  fn mm(&self, rhs: &Self) -> Self {
    self.binary_op(MatMul, rhs)
  }

  fn max(&self) -> Self {
    self.unary_op(Max)
  }
}

impl<T: Real> RealOps<T> for Variable<T> {
  fn exp(&self) -> Self {
    self.unary_op(Exp)
  }

  fn relu(&self) -> Self {
    self.unary_op(ReLU)
  }

  fn log_softmax(&self) -> Self {
    self.unary_op(LogSoftmax)
  }

  fn nll(&self, labels: &[usize]) -> Self {
    self.unary_op(Nll { labels: labels.to_vec() })
  }
}

impl<T: Real> Hops<T> for Variable<T> {}

impl<T: Real> std::ops::Neg for &Variable<T> {
  type Output = Variable<T>;

  fn neg(self) -> Self::Output {
    self * -T::one()
  }
}

impl<T: Real> std::ops::Neg for Variable<T> {
  type Output = Variable<T>;

  fn neg(self) -> Self::Output {
    -&self
  }
}

macro_rules! add_operator {
  ($op:ident, $meth:ident, $symbol:tt) => {
    impl<T: Real> std::ops::$op for &Variable<T> { // &var * &other
      type Output = Variable<T>;

      fn $meth(self, rhs: Self) -> Variable<T> {
        self.binary_op($op, rhs)
      }
    }

    impl<T: Real> std::ops::$op for Variable<T> { // var * other
      type Output = Variable<T>;

      fn $meth(self, rhs: Self) -> Variable<T> {
        &self $symbol &rhs
      }
    }

    impl<T: Real> std::ops::$op<Variable<T>> for &Variable<T> { // &var * other
      type Output = Variable<T>;

      fn $meth(self, rhs: Variable<T>) -> Variable<T> {
        self $symbol &rhs
      }
    }

    impl<T: Real> std::ops::$op<&Variable<T>> for Variable<T> { // var * &other
      type Output = Variable<T>;

      fn $meth(self, rhs: &Variable<T>) -> Variable<T> {
        &self $symbol rhs
      }
    }

    impl<T: Real> std::ops::$op<T> for &Variable<T> { // &var * T
      type Output = Variable<T>;

      fn $meth(self, rhs: T) -> Variable<T> {
        self $symbol &Variable::scalar(rhs)
      }
    }

    impl<T: Real> std::ops::$op<T> for Variable<T> { // var * T
      type Output = Variable<T>;

      fn $meth(self, rhs: T) -> Variable<T> {
        &self $symbol &Variable::scalar(rhs)
      }
    }
  };
}

add_operator!(Add, add, +);
add_operator!(Sub, sub, -);
add_operator!(Mul, mul, *);
add_operator!(Div, div, /);


#[derive(Debug, Clone)]
pub struct Add;

impl<T: Real> BinaryOp<T> for Add {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs + rhs
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad.reduce_to(lhs.shape()),
    grad.reduce_to(rhs.shape()),
  )}
}


#[derive(Debug, Clone)]
pub struct Sub;

impl<T: Real> BinaryOp<T> for Sub {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs - rhs
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad.reduce_to(lhs.shape()),
    (-grad).reduce_to(rhs.shape()),
  )}
}


#[derive(Debug, Clone)]
pub struct Mul;

impl<T: Real> BinaryOp<T> for Mul {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs * rhs
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    (grad * rhs).reduce_to(lhs.shape()),
    (grad * lhs).reduce_to(rhs.shape()),
  )}
}


#[derive(Debug, Clone)]
pub struct Div;

impl<T: Real> BinaryOp<T> for Div {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs / rhs
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    (grad / rhs).reduce_to(lhs.shape()),
    (-grad * lhs / rhs / rhs).reduce_to(rhs.shape()),
  )}
}


#[derive(Debug, Clone)]
pub struct MatMul;

impl<T: Real> BinaryOp<T> for MatMul {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs.mm(rhs)
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad.mm(&rhs.transpose()),
    lhs.transpose().mm(grad),
  )}
}


#[derive(Debug, Clone)]
pub struct Transpose;

impl<T: Real> UnaryOp<T> for Transpose {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.transpose()
  }

  fn derive(&self, _lhs: &Tensor<T>, _out: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad.transpose()
  }
}


#[derive(Debug, Clone)]
pub struct Sum;

impl<T: Real> UnaryOp<T> for Sum {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.sum()
  }

  fn derive(&self, lhs: &Tensor<T>, _out: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    Tensor::fill(&lhs.shape().dims, grad.item())
  }
}


#[derive(Debug, Clone)]
pub struct Max;

impl<T: Real> UnaryOp<T> for Max {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.max()
  }

  fn derive(&self, lhs: &Tensor<T>, _out: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let cols = lhs.shape().cols();
    let mut data = vec![T::zero(); lhs.size()];
    let grad = grad.raw();
    for (row, col) in lhs.argmax().into_iter().enumerate() {
      data[row * cols + col] = grad[row];
    }
    Tensor::from_shape(lhs.shape().clone(), data)
  }
}


#[derive(Debug, Clone)]
pub struct Exp;

impl<T: Real> UnaryOp<T> for Exp {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.exp()
  }

  fn derive(&self, _lhs: &Tensor<T>, out: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad * out
  }
}


#[derive(Debug, Clone)]
pub struct ReLU;

impl<T: Real> UnaryOp<T> for ReLU {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.relu()
  }

  fn derive(&self, lhs: &Tensor<T>, _out: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad.zip(lhs, |g, a| if a > T::zero() { g } else { T::zero() })
  }
}


#[derive(Debug, Clone)]
pub struct LogSoftmax;

impl<T: Real> UnaryOp<T> for LogSoftmax {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.log_softmax()
  }

  // d/dx = grad - softmax * sum(grad) per row
  fn derive(&self, _lhs: &Tensor<T>, out: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let cols = out.shape().cols().max(1);
    let out = out.raw();
    let grad_raw = grad.raw();
    let mut data = Vec::with_capacity(out.len());
    for (log_probs, grads) in out.chunks(cols).zip(grad_raw.chunks(cols)) {
      let total: T = grads.iter().copied().sum();
      data.extend(log_probs.iter()
        .zip(grads)
        .map(|(&p, &g)| g - p.exp() * total ));
    }
    Tensor::from_shape(grad.shape().clone(), data)
  }
}


#[derive(Debug, Clone)]
pub struct Nll {
  labels: Vec<usize>,
}

impl<T: Real> UnaryOp<T> for Nll {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.nll(&self.labels)
  }

  fn derive(&self, lhs: &Tensor<T>, _out: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let cols = lhs.shape().cols();
    let scale = -grad.item() / T::cast(self.labels.len() as f64);
    let mut data = vec![T::zero(); lhs.size()];
    for (row, &label) in self.labels.iter().enumerate() {
      data[row * cols + label] = scale;
    }
    Tensor::from_shape(lhs.shape().clone(), data)
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bias_gradient_sums_over_batch() {
    let x = Tensor::new(&[3, 2], vec![1., 2., 3., 4., 5., 6.]).tracked();
    let b = Tensor::vec(&[0.5, -0.5]).trained();
    (&x + &b).sum().backward();
    assert_eq!(b.grad(), Some(&Tensor::vec(&[3., 3.])));
  }

  #[test]
  fn matmul_gradient() {
    let x = Tensor::new(&[1, 2], vec![1., 2.]).tracked();
    let w = Tensor::new(&[2, 2], vec![1., 0., 0., 1.]).trained();
    x.mm(&w).sum().backward();
    assert_eq!(w.grad(), Some(&Tensor::new(&[2, 2], vec![1., 1., 2., 2.])));
  }

  #[test]
  fn nll_gradient() {
    let x = Tensor::new(&[2, 3], vec![0.; 6]).trained();
    x.nll(&[2, 0]).backward();
    assert_eq!(x.grad(), Some(&Tensor::new(&[2, 3], vec![0., 0., -0.5, -0.5, 0., 0.])));
  }

  #[test]
  fn relu_gradient_is_masked() {
    let x = Tensor::vec(&[-1., 2.]).trained();
    x.relu().sum().backward();
    assert_eq!(x.grad(), Some(&Tensor::vec(&[0., 1.])));
  }

  #[test]
  fn max_gradient_routes_to_argmax() {
    let x = Tensor::new(&[2, 2], vec![1., 3., 4., 2.]).trained();
    x.max().sum().backward();
    assert_eq!(x.grad(), Some(&Tensor::new(&[2, 2], vec![0., 1., 1., 0.])));
  }
}
