use std::rc::Rc;
use std::collections::HashSet;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::fmt::Debug;

use rand::Rng;

mod mops;

use crate::{
  tensor::Tensor,
  scalar::Real,
  ops::{ BaseOps, NumericOps },
};


pub fn make_id() -> usize {
  static LAST_ID: AtomicUsize = AtomicUsize::new(0);
  LAST_ID.fetch_add(1, Ordering::Relaxed)
}


/// Unary computational operation that can also compute its derivative.

pub trait UnaryOp<T: Real>: Debug {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T>;
  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T>;
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
    if let (Some(op), Some(grad)) = (&self.op, &self.grad) {
      let lhs = &self.previous[0].data;
      let changes = match op {
        Op::Unary(op) => vec![op.derive(lhs, grad)],
        Op::Binary(op) => {
          let rhs = &self.previous[1].data;
          let (change_l, change_r) = op.derive(lhs, rhs, grad);
          vec![change_l, change_r]
        },
      };
      for (change, prev) in changes.iter().zip(self.previous.iter()) {
        if let Some(grad) = &prev.grad {
          grad.op_assign(change, |a, b| *a += b );
        }
      }
    }
  }
}


/// Variables track the computational operations used to create them and allow
/// for computing their gradient with respect to all input variables involved.
///
/// They get created by calling [tracked](Tensor::tracked) or
/// [trained](Tensor::trained) on any differentiable [Tensor] type.
///
/// Variables dereference to their underlying [Tensor] automatically for
/// non-differentiable operations. Differentiable operations, on the other hand,
/// will always return another Variable.
///
/// Gradients accumulate across calls to [backward](Variable::backward)
/// until they get cleared with [reset](Variable::reset).

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

  fn operation(op: Op<T>, data: Tensor<T>, grad: bool, previous: Vec<Rc<Node<T>>>) -> Self {
    Self {
      node: Rc::new(Node {
        id: make_id(),
        grad: grad.then(|| Tensor::zeros(&data.shape().dims) ),
        data,
        op: Some(op),
        previous,
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
    Self::operation(
      Op::Unary(Box::new(op)),
      data,
      self.grad().is_some(),
      vec![self.node.clone()],
    )
  }

  pub fn binary_op(&self, op: impl BinaryOp<T> + 'static, rhs: &Self) -> Self {
    let data = op.run(&self.node.data, &rhs.node.data);
    Self::operation(
      Op::Binary(Box::new(op)),
      data,
      self.grad().is_some() || rhs.grad().is_some(),
      vec![self.node.clone(), rhs.node.clone()],
    )
  }

  /// Compute gradients across this Variable's entire graph.

  pub fn backward(&self) {
    if self.grad().is_none() { panic!("Cannot compute gradients for constant {self}") }
    let history = self.history();
    // Only leaves accumulate across passes
    for node in &history {
      if node.op.is_some() { node.reset_gradient(T::zero()) }
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

  // Topologically sorted, with this Variable's node last
  fn history(&self) -> Vec<Rc<Node<T>>> {
    let mut history = vec![];
    let mut visited = HashSet::new();
    let mut stack = vec![(self.node.clone(), false)];
    while let Some((node, expanded)) = stack.pop() {
      if expanded {
        history.push(node);
        continue
      }
      if !visited.insert(node.id) { continue }
      stack.push((node.clone(), true));
      for prev in node.previous.iter().rev() {
        if !visited.contains(&prev.id) {
          stack.push((prev.clone(), false));
        }
      }
    }
    history
  }

  /// Compute a function's gradient with respect to a generated
  /// input numerically and compare it to the automatically derived
  /// solution.
  ///
  /// Returns the average absolute difference between both.

  pub fn check_gradients<F, R>(dims: &[usize], generator: F, rng: &mut R) -> T
  where
    F: Fn(&Self) -> Self,
    R: Rng,
  {
    let eps = T::from(1e-3).unwrap();
    let two = T::from(2.0).unwrap();
    // Generate random input
    let input = Tensor::randn(dims, rng);
    let var = input.trained();
    // Compute gradient using auto diff
    let output = generator(&var).sum(0);
    output.backward();
    let grad = var.grad().unwrap().detach();
    // Compute gradient numerically for every element of input
    let len = input.size();
    let mut num_grad = vec![T::zero(); len];
    for (i, slot) in num_grad.iter_mut().enumerate() {
      let mut hot = vec![T::zero(); len];
      hot[i] = eps;
      let epst = Tensor::new(dims, hot);
      let prev = generator(&(&input - &epst).tracked()).sum(0).item();
      let next = generator(&(&input + &epst).tracked()).sum(0).item();
      *slot = (next - prev) / (two * eps);
    }
    let num_grad = Tensor::new(dims, num_grad);
    let total = (grad - num_grad).vectorize(|a| num_traits::Signed::abs(&a) ).sum(0).item();
    total / T::from(len.max(1)).unwrap()
  }
}

impl<T: Real> std::ops::AddAssign<Tensor<T>> for Variable<T> {
  fn add_assign(&mut self, rhs: Tensor<T>) {
    self.node.data.op_assign(&rhs, |a, b| *a += b );
  }
}

impl<T: Real> std::ops::SubAssign<Tensor<T>> for Variable<T> {
  fn sub_assign(&mut self, rhs: Tensor<T>) {
    self.node.data.op_assign(&rhs, |a, b| *a -= b );
  }
}

impl<T: Real> std::fmt::Display for Variable<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    let title = if self.node.trainable {
      "Trainable"
    } else if self.node.grad.is_some() {
      "Computed"
    } else {
      "Tracked"
    };
    write!(f, "{title} {}", self.tensor())
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use rand::{ SeedableRng, rngs::StdRng };
  use crate::ops::{ Hops, RealOps };

  #[test]
  fn x_squared() {
    let x = Tensor::vec(&[3.0, 5.0]).trained();
    let z = &x * &x + 2.0;
    z.backward();
    assert_eq!(z, Tensor::vec(&[11.0, 27.0]).tracked());
    assert_eq!(x.grad(), Some(&Tensor::vec(&[6.0, 10.0])));
  }

  #[test]
  fn accumulate_and_reset() {
    let x = Tensor::vec(&[1.0, 2.0]).trained();
    let y = (&x * 3.0).sum(0);
    y.backward();
    y.backward();
    assert_eq!(x.grad(), Some(&Tensor::vec(&[6.0, 6.0])));
    y.reset();
    assert_eq!(x.grad(), Some(&Tensor::vec(&[0.0, 0.0])));
  }

  #[test]
  fn shared_node() {
    // Gradient flows through both uses of y
    let x = Tensor::scalar(2.0).trained();
    let y = &x * &x;
    let z = &y + &y;
    z.backward();
    assert_eq!(x.grad().unwrap().item(), 8.0);
  }

  #[test]
  fn broadcast_gradient() {
    let w = Tensor::vec(&[1.0, 2.0, 3.0]).trained();
    let x = Tensor::new(&[2,3], vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]).tracked();
    (&x * &w).sum(0).backward();
    assert_eq!(w.grad(), Some(&Tensor::vec(&[3.0, 3.0, 3.0])));
  }

  #[test]
  fn parameters() {
    let w = Tensor::vec(&[1.0, 2.0]).trained();
    let b = Tensor::scalar(0.5).trained();
    let x = Tensor::vec(&[3.0, 4.0]).tracked();
    let y = (&x * &w + &b).sum(0);
    let ids: Vec<usize> = y.parameters().iter().map(|p| p.id() ).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&w.id()) && ids.contains(&b.id()));
  }

  #[test]
  fn assign_in_place() {
    let data = Tensor::new(&[2,2], vec![1.0, 2.0, 3.0, 4.0]);
    let mut w = data.trained();
    w += Tensor::vec(&[10.0, 20.0]);
    assert_eq!(data, Tensor::new(&[2,2], vec![11.0, 22.0, 13.0, 24.0]));
    w -= Tensor::scalar(1.0);
    assert_eq!(w.tensor(), &Tensor::new(&[2,2], vec![10.0, 21.0, 12.0, 23.0]));
    // Views of the same storage observe the update
    assert_eq!(data.at(&[1]), Tensor::vec(&[12.0, 23.0]));
  }

  #[test]
  #[should_panic]
  fn constant_backward() {
    Tensor::vec(&[1.0f32]).tracked().sum(0).backward();
  }

  #[test]
  fn gradients_match_numerical() {
    let mut rng = StdRng::seed_from_u64(3);
    let w = Tensor::randn(&[4,3], &mut rng).tracked();
    let targets = Tensor::new(&[2,3], vec![0.0, 1.0, 0.0, 1.0, 0.0, 0.0]).tracked();

    let error = Variable::<f64>::check_gradients(&[2,4], |x| x.mm(&w).relu(), &mut rng);
    assert!(error < 1e-4, "matmul/relu error {error}");

    let error = Variable::<f64>::check_gradients(&[2,3], |x| x.softmax(), &mut rng);
    assert!(error < 1e-4, "softmax error {error}");

    let error = Variable::<f64>::check_gradients(&[2,3], |x| x.cross_entropy(&targets), &mut rng);
    assert!(error < 1e-4, "cross entropy error {error}");

    let error = Variable::<f64>::check_gradients(&[3], |x| (x.exp() + 1.0).log() / 2.0, &mut rng);
    assert!(error < 1e-4, "exp/log/div error {error}");
  }
}
