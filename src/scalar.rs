use std::fmt::{ Debug, Display };

use num_traits::{ Float, NumAssignOps };
use rand::distributions::uniform::SampleUniform;
use serde::{ Serialize, de::DeserializeOwned };


/// Continuous element types a [Tensor](crate::Tensor) may hold.
///
/// Implemented for `f32` and `f64`. Besides the numeric bounds, every
/// element type provides its own matrix multiply kernel.

pub trait Real:
  Float + NumAssignOps + std::iter::Sum + SampleUniform
  + Debug + Display + Serialize + DeserializeOwned + 'static
{
  /// Row-major `c = a * b` for an `[m, k]` by `[k, n]` product.
  fn gemm(m: usize, k: usize, n: usize, a: &[Self], b: &[Self], c: &mut [Self]);

  /// Convert from an `f64` constant.
  fn cast(value: f64) -> Self {
    <Self as num_traits::NumCast>::from(value).unwrap_or_else(Self::nan)
  }
}

#[cfg_attr(feature = "unsafe", allow(dead_code))]
fn gemm_naive<T: Real>(m: usize, k: usize, n: usize, a: &[T], b: &[T], c: &mut [T]) {
  for i in 0..m {
    for p in 0..k {
      let lhs = a[i * k + p];
      if lhs == T::zero() { continue }
      for j in 0..n {
        c[i * n + j] += lhs * b[p * n + j];
      }
    }
  }
}

impl Real for f32 {
  #[cfg(feature = "unsafe")]
  fn gemm(m: usize, k: usize, n: usize, a: &[Self], b: &[Self], c: &mut [Self]) {
    assert!(a.len() >= m * k && b.len() >= k * n && c.len() >= m * n);
    unsafe {
      matrixmultiply::sgemm(
        m, k, n,
        1.0,
        a.as_ptr(), k as isize, 1,
        b.as_ptr(), n as isize, 1,
        0.0,
        c.as_mut_ptr(), n as isize, 1,
      );
    }
  }

  #[cfg(not(feature = "unsafe"))]
  fn gemm(m: usize, k: usize, n: usize, a: &[Self], b: &[Self], c: &mut [Self]) {
    gemm_naive(m, k, n, a, b, c)
  }
}

impl Real for f64 {
  #[cfg(feature = "unsafe")]
  fn gemm(m: usize, k: usize, n: usize, a: &[Self], b: &[Self], c: &mut [Self]) {
    assert!(a.len() >= m * k && b.len() >= k * n && c.len() >= m * n);
    unsafe {
      matrixmultiply::dgemm(
        m, k, n,
        1.0,
        a.as_ptr(), k as isize, 1,
        b.as_ptr(), n as isize, 1,
        0.0,
        c.as_mut_ptr(), n as isize, 1,
      );
    }
  }

  #[cfg(not(feature = "unsafe"))]
  fn gemm(m: usize, k: usize, n: usize, a: &[Self], b: &[Self], c: &mut [Self]) {
    gemm_naive(m, k, n, a, b, c)
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gemm_matches_naive() {
    let a: Vec<f32> = (1..=6).map(|x| x as f32 ).collect();
    let b: Vec<f32> = (1..=6).map(|x| x as f32 ).collect();
    let mut fast = vec![0.0; 4];
    let mut slow = vec![0.0; 4];
    f32::gemm(2, 3, 2, &a, &b, &mut fast);
    gemm_naive(2, 3, 2, &a, &b, &mut slow);
    assert_eq!(fast, vec![22.0, 28.0, 49.0, 64.0]);
    assert_eq!(fast, slow);
  }
}
