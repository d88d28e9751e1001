use crate::{
  tensor::Tensor,
  scalar::Real,
  ops::{ BaseOps, NumericOps, RealOps, Hops },
};


impl<T: Real> BaseOps<T> for Tensor<T> {
  fn scalar(item: T) -> Self {
    Self::new(&[], vec![item])
  }

  fn numel(&self) -> usize {
    self.size()
  }

  fn transpose(&self) -> Self {
    let shape = self.shape().transpose();
    let (rows, cols) = (shape[0], shape[1]);
    let raw = self.raw();
    let mut data = Vec::with_capacity(raw.len());
    for i in 0..rows {
      for j in 0..cols {
        data.push(raw[j * rows + i]);
      }
    }
    Self::from_shape(shape, data)
  }
}

impl<T: Real> NumericOps<T> for Tensor<T> {
  fn sum(&self) -> Self {
    Self::scalar(self.raw().iter().copied().sum())
  }

  fn mm(&self, rhs: &Self) -> Self {
    assert!(self.rank() == 2 && rhs.rank() == 2,
      "Matrix multiplication needs two matrices, got {} and {}", self.shape(), rhs.shape());
    let (rows, inner, cols) = (self.dim(0), self.dim(1), rhs.dim(1));
    assert_eq!(inner, rhs.dim(0),
      "Cannot multiply {} by {}", self.shape(), rhs.shape());
    let mut data = vec![T::zero(); rows * cols];
    T::gemm(rows, inner, cols, &self.raw(), &rhs.raw(), &mut data);
    Self::new(&[rows, cols], data)
  }

  fn max(&self) -> Self {
    self.collapse(|row| row.iter().copied().fold(T::neg_infinity(), T::max) )
  }
}

impl<T: Real> RealOps<T> for Tensor<T> {
  fn exp(&self) -> Self {
    self.vectorize(|a| a.exp() )
  }

  fn relu(&self) -> Self {
    self.vectorize(|a| if a > T::zero() || a.is_nan() { a } else { T::zero() })
  }

  fn log_softmax(&self) -> Self {
    let cols = self.shape().cols().max(1);
    let raw = self.raw();
    let mut data = Vec::with_capacity(raw.len());
    for row in raw.chunks(cols) {
      let max = row.iter().copied().fold(T::neg_infinity(), T::max);
      let log_sum = row.iter().map(|&a| (a - max).exp() ).sum::<T>().ln();
      data.extend(row.iter().map(|&a| (a - max) - log_sum ));
    }
    Self::from_shape(self.shape().clone(), data)
  }

  fn nll(&self, labels: &[usize]) -> Self {
    let picked = self.gather(labels);
    let n = T::cast(picked.len() as f64);
    Self::scalar(-picked.into_iter().sum::<T>() / n)
  }
}

impl<T: Real> Hops<T> for Tensor<T> {}

impl<T: Real> std::ops::Neg for &Tensor<T> {
  type Output = Tensor<T>;

  fn neg(self) -> Self::Output {
    self.vectorize(|a| -a )
  }
}

impl<T: Real> std::ops::Neg for Tensor<T> {
  type Output = Tensor<T>;

  fn neg(self) -> Self::Output {
    -&self
  }
}

macro_rules! add_operator {
  ($trait:ident, $meth:ident, $symbol:tt) => {
    impl<T: Real> std::ops::$trait for &Tensor<T> { // &tensor * &other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Self) -> Tensor<T> {
        self.zip(rhs, |a, b| a $symbol b )
      }
    }

    impl<T: Real> std::ops::$trait for Tensor<T> { // tensor * other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Self) -> Tensor<T> {
        &self $symbol &rhs
      }
    }

    impl<T: Real> std::ops::$trait<Tensor<T>> for &Tensor<T> { // &tensor * other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Tensor<T>) -> Tensor<T> {
        self $symbol &rhs
      }
    }

    impl<T: Real> std::ops::$trait<&Tensor<T>> for Tensor<T> { // tensor * &other
      type Output = Tensor<T>;

      fn $meth(self, rhs: &Tensor<T>) -> Tensor<T> {
        &self $symbol rhs
      }
    }

    impl<T: Real> std::ops::$trait<T> for &Tensor<T> { // &tensor * T
      type Output = Tensor<T>;

      fn $meth(self, rhs: T) -> Tensor<T> {
        self.vectorize(|a| a $symbol rhs )
      }
    }

    impl<T: Real> std::ops::$trait<T> for Tensor<T> { // tensor * T
      type Output = Tensor<T>;

      fn $meth(self, rhs: T) -> Tensor<T> {
        &self $symbol rhs
      }
    }
  };
}

add_operator!(Add, add, +);
add_operator!(Sub, sub, -);
add_operator!(Mul, mul, *);
add_operator!(Div, div, /);


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn matmul() {
    let x = Tensor::new(&[2,3], vec![1., 2., 3., 4., 5., 6.]);
    let y = Tensor::new(&[3,2], vec![1., 2., 3., 4., 5., 6.]);
    assert_eq!(x.mm(&y), Tensor::new(&[2,2], vec![22., 28., 49., 64.]));
  }

  #[test]
  fn matmul_vector() {
    let x = Tensor::new(&[2,3], vec![1., 2., 3., 4., 5., 6.]);
    let y = Tensor::new(&[3,1], vec![1., 2., 3.]);
    assert_eq!(x.mm(&y), Tensor::new(&[2,1], vec![14., 32.]));
  }

  #[test]
  fn transpose() {
    let x = Tensor::new(&[2,3], vec![1., 2., 3., 4., 5., 6.]);
    assert_eq!(x.transpose(), Tensor::new(&[3,2], vec![1., 4., 2., 5., 3., 6.]));
  }

  #[test]
  fn log_softmax_is_stable() {
    let x = Tensor::new(&[2,2], vec![1000.0f32, 1000.0, -1000.0, 0.0]);
    let y = x.log_softmax();
    assert!(y.all_finite());
    assert!((y.row(0)[0] - (0.5f32).ln()).abs() < 1e-6);
    assert!(y.row(1)[1].abs() < 1e-6);
  }

  #[test]
  fn relu_keeps_nan() {
    let y = Tensor::vec(&[-1.0, 2.0, f64::NAN]).relu();
    assert_eq!(&y.raw()[..2], &[0.0, 2.0]);
    assert!(y.raw()[2].is_nan());
  }

  #[test]
  fn nll() {
    let log_probs = Tensor::new(&[2,2], vec![-0.5, -1.0, -2.0, -0.25]);
    assert_eq!(log_probs.nll(&[0, 1]).item(), 0.375);
  }

  #[test]
  fn operators() {
    let a = Tensor::vec(&[1., 2.]);
    let b = Tensor::vec(&[3., 4.]);
    assert_eq!(&a + &b, Tensor::vec(&[4., 6.]));
    assert_eq!(&b / 2.0, Tensor::vec(&[1.5, 2.]));
    assert_eq!(-a, Tensor::vec(&[-1., -2.]));
  }
}
