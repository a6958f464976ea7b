use std::ops::{ Add, Sub, Mul, Div, Neg };

use crate::internal::*;
use crate::Shape;
use crate::scalar::{ Inner, Numeric, Real };


/// The four arithmetic operators with a common output type.
///
/// Implemented automatically for every type that supports them.

pub trait Arithmetic<Rhs = Self, Output = Self>:
  Add<Rhs, Output = Output> +
  Sub<Rhs, Output = Output> +
  Mul<Rhs, Output = Output> +
  Div<Rhs, Output = Output>
{}

impl<T, Rhs, Output> Arithmetic<Rhs, Output> for T
where
  T: Add<Rhs, Output = Output> + Sub<Rhs, Output = Output> + Mul<Rhs, Output = Output> + Div<Rhs, Output = Output>
{}


/// Differentiable mid-level operations that are also implemented
/// for non-differentiable [Inner] types.

pub trait BaseOps<I: Inner>: Clone {
  fn scalar(item: I) -> Self;
  fn shape(&self) -> &Shape;
  fn broadcast(&self, dims: &[usize]) -> Self;
  fn reshape(&self, dims: &[usize]) -> Self;
  fn unsqueeze(&self, dim: isize) -> Self;
}


/// Differentiable mid-level operations that are also implemented
/// for non-differentiable [Numeric] inner types.
///
/// Reductions collapse the given dimension and every dimension after it,
/// so `sum(0)` produces a total and `sum(-1)` sums each row.

pub trait NumericOps<I: Numeric>: Arithmetic + Arithmetic<I, Self> + Sized {
  fn sum(&self, dim: isize) -> Self;
  fn max(&self, dim: isize) -> Self;
  fn mm(&self, rhs: &Self) -> Self;
}


/// Differentiable mid-level operations.

pub trait RealOps<I: Real>: Neg<Output = Self> + Sized {
  fn exp(&self) -> Self;
  fn log(&self) -> Self;
  fn relu(&self) -> Self;
}


/// High-level operations, implemented exclusively on top of
/// the mid-level ones. As a result, these are all
/// differentiable when called on a [Variable](crate::Variable).

pub trait Hops<I>: BaseOps<I> + NumericOps<I> + RealOps<I>
where
  I: Real,
  for<'a> &'a Self: Arithmetic<&'a Self, Self>,
{
  fn mean(&self, dim: isize) -> Self {
    let udim = negative_index(dim, self.shape().rank(), false);
    let n: usize = self.shape().dims[udim..].iter().product();
    self.sum(dim) / I::from(n).unwrap()
  }

  /// Normalize the last dimension into a probability distribution.

  fn softmax(&self) -> Self {
    let shifted = self - &self.max(-1).unsqueeze(-1);
    let exp = shifted.exp();
    &exp / &exp.sum(-1).unsqueeze(-1)
  }

  fn log_softmax(&self) -> Self {
    let shifted = self - &self.max(-1).unsqueeze(-1);
    let normalizer = shifted.exp().sum(-1).log().unsqueeze(-1);
    &shifted - &normalizer
  }

  /// Mean cross-entropy of a batch of logits against target distributions
  /// (usually one-hot encoded labels) of the same shape.

  fn cross_entropy(&self, targets: &Self) -> Self {
    let log_probs = self.log_softmax();
    -(targets * &log_probs).sum(-1).mean(0)
  }
}
