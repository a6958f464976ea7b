use std::collections::HashMap;

use crate::{
  scalar::Real,
  tensor::Tensor,
  variable::Variable,
  ops::BaseOps,
};


/// An optimization strategy to be used with [Optimizer].

pub trait Strategy<R: Real> {
  fn update(&mut self, param: &Variable<R>, rate: R, step: usize) -> Tensor<R>;
}


/// Generic optimizer that allows for several optimization [strategies](Strategy) to be used.

#[derive(Debug)]
pub struct Optimizer<R: Real, S: Strategy<R>> {
  strategy: S,
  pub learning_rate: R,
  step: usize,
}

impl<R: Real, S: Strategy<R>> Optimizer<R, S> {
  pub fn new(learning_rate: R, strategy: S) -> Self {
    Self { strategy, learning_rate, step: 1 }
  }

  /// Number of updates applied so far.

  pub fn steps(&self) -> usize {
    self.step - 1
  }

  /// Apply one update to every parameter, using the gradients
  /// they currently hold.

  pub fn step(&mut self, params: &[Variable<R>]) {
    for param in params {
      assert!(param.is_trainable(), "Non-trainable parameters cannot be optimized");
      let change = self.strategy.update(param, self.learning_rate, self.step);
      param.tensor().op_assign(&change, |a, b| *a += b );
    }
    self.step += 1;
  }

  /// Back-propagate from `loss`, update `params` and clear all gradients.

  pub fn minimize(&mut self, loss: &Variable<R>, params: &[Variable<R>]) {
    loss.backward();
    self.step(params);
    loss.reset();
  }
}


/// Stochastic Gradient Descent strategy

#[derive(Debug, Clone, Default)]
pub struct SGD;

impl<R: Real> Strategy<R> for SGD {
  fn update(&mut self, param: &Variable<R>, rate: R, _step: usize) -> Tensor<R> {
    match param.grad() {
      Some(grad) => grad * -rate,
      None => Tensor::zeros(&param.shape().dims),
    }
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
    Self::new(R::from(0.9).unwrap())
  }
}

impl<R: Real> Strategy<R> for Momentum<R> {
  fn update(&mut self, param: &Variable<R>, rate: R, _step: usize) -> Tensor<R> {
    let dims = &param.shape().dims;
    let v = self.v
      .entry(param.id())
      .or_insert_with(|| Tensor::zeros(dims) );
    if let Some(grad) = param.grad() {
      v.assign(&(&*v * self.momentum - grad * rate));
    }
    v.clone()
  }
}
