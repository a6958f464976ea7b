use crate::{
  shape::Shape,
  tensor::Tensor,
  scalar::{ Inner, Numeric, Signed, Real },
  ops::{ BaseOps, NumericOps, RealOps },
};


impl<T: Inner> BaseOps<T> for Tensor<T> {
  fn scalar(item: T) -> Self {
    Self::new(&[], vec![item])
  }

  fn shape(&self) -> &Shape {
    &self.shape
  }

  fn broadcast(&self, dims: &[usize]) -> Self {
    Self {
      shape: self.shape.broadcast_to(dims),
      data: self.data.clone(),
    }
  }

  fn reshape(&self, dims: &[usize]) -> Self {
    let this = self.contiguous();
    Self {
      shape: this.shape.view(dims),
      data: this.data,
    }
  }

  fn unsqueeze(&self, dim: isize) -> Self {
    Self {
      shape: self.shape.unsqueeze(dim),
      data: self.data.clone(),
    }
  }
}

impl<T: Numeric> NumericOps<T> for Tensor<T> {
  fn sum(&self, dim: isize) -> Self {
    self.collapse(dim, |values| values.iter().copied().sum() )
  }

  fn max(&self, dim: isize) -> Self {
    self.collapse(dim, |values| {
      values.iter()
        .copied()
        .reduce(|a, b| if b > a { b } else { a } )
        .expect("Cannot take maximum of empty dimension")
    })
  }

  fn mm(&self, rhs: &Self) -> Self {
    assert!(self.rank() == 2 && rhs.rank() == 2,
      "Matrix multiplication needs two matrices, got {} & {}", self.shape, rhs.shape);
    assert_eq!(self.shape[1], rhs.shape[0],
      "Cannot multiply {} with {}", self.shape, rhs.shape);
    let data = self.matmul(rhs);
    Self::new(&[self.shape[0], rhs.shape[1]], data)
  }
}

impl<T: Real> RealOps<T> for Tensor<T> {
  fn exp(&self) -> Self {
    self.vectorize(|a| a.exp() )
  }

  fn log(&self) -> Self {
    self.vectorize(|a| a.ln() )
  }

  fn relu(&self) -> Self {
    self.vectorize(|a| if a > T::zero() { a } else { T::zero() })
  }
}

impl<T: Signed> std::ops::Neg for &Tensor<T> {
  type Output = Tensor<T>;

  fn neg(self) -> Self::Output {
    self.vectorize(|a| -a )
  }
}

impl<T: Signed> std::ops::Neg for Tensor<T> {
  type Output = Tensor<T>;

  fn neg(self) -> Self::Output {
    -&self
  }
}

macro_rules! add_operator {
  ($trait:ident, $meth:ident, $symbol:tt) => {
    impl<T: Numeric> std::ops::$trait for &Tensor<T> { // &tensor * &other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Self) -> Tensor<T> {
        self.zip(rhs, |a, b| a $symbol b )
      }
    }

    impl<T: Numeric> std::ops::$trait for Tensor<T> { // tensor * other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Self) -> Tensor<T> {
        &self $symbol &rhs
      }
    }

    impl<T: Numeric> std::ops::$trait<Tensor<T>> for &Tensor<T> { // &tensor * other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Tensor<T>) -> Tensor<T> {
        self $symbol &rhs
      }
    }

    impl<T: Numeric> std::ops::$trait<&Tensor<T>> for Tensor<T> { // tensor * &other
      type Output = Tensor<T>;

      fn $meth(self, rhs: &Tensor<T>) -> Tensor<T> {
        &self $symbol rhs
      }
    }

    impl<T: Numeric> std::ops::$trait<T> for &Tensor<T> { // &tensor * T
      type Output = Tensor<T>;

      fn $meth(self, rhs: T) -> Tensor<T> {
        self.vectorize(|a| a $symbol rhs )
      }
    }

    impl<T: Numeric> std::ops::$trait<T> for Tensor<T> { // tensor * T
      type Output = Tensor<T>;

      fn $meth(self, rhs: T) -> Tensor<T> {
        &self $symbol rhs
      }
    }

    impl std::ops::$trait<&Tensor<f32>> for f32 { // f32 * &tensor
      type Output = Tensor<f32>;

      fn $meth(self, tensor: &Tensor<f32>) -> Tensor<f32> {
        tensor.vectorize(|a| self $symbol a )
      }
    }

    impl std::ops::$trait<Tensor<f32>> for f32 { // f32 * tensor
      type Output = Tensor<f32>;

      fn $meth(self, tensor: Tensor<f32>) -> Tensor<f32> {
        self $symbol &tensor
      }
    }

    impl std::ops::$trait<&Tensor<f64>> for f64 { // f64 * &tensor
      type Output = Tensor<f64>;

      fn $meth(self, tensor: &Tensor<f64>) -> Tensor<f64> {
        tensor.vectorize(|a| self $symbol a )
      }
    }

    impl std::ops::$trait<Tensor<f64>> for f64 { // f64 * tensor
      type Output = Tensor<f64>;

      fn $meth(self, tensor: Tensor<f64>) -> Tensor<f64> {
        self $symbol &tensor
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
  fn sum() {
    let a = Tensor::new(&[3,2], vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(a.sum(0), Tensor::new(&[], vec![21]));
    assert_eq!(a.sum(-1), Tensor::new(&[3], vec![3, 7, 11]));
  }

  #[test]
  fn max() {
    let a = Tensor::new(&[2,3], vec![1.0, -2.0, 0.5, -4.0, -3.0, -5.0]);
    assert_eq!(a.max(-1), Tensor::vec(&[1.0, -3.0]));
  }

  #[test]
  fn reshape_unsqueeze() {
    let a = Tensor::arrange(&[2,3], 0, 1);
    assert_eq!(a.reshape(&[3,2]).shape().dims, vec![3,2]);
    assert_eq!(a.sum(-1).unsqueeze(-1).shape().dims, vec![2,1]);
    assert_eq!(a.transpose(0,1).reshape(&[6]), Tensor::vec(&[0, 3, 1, 4, 2, 5]));
  }

  #[test]
  fn operators() {
    let a = Tensor::vec(&[1.0f64, 2.0]);
    let b = Tensor::new(&[2,1], vec![10.0, 20.0]);
    assert_eq!(&a + &b, Tensor::new(&[2,2], vec![11.0, 12.0, 21.0, 22.0]));
    assert_eq!(&a * 2.0, Tensor::vec(&[2.0, 4.0]));
    assert_eq!(1.0 - &a, Tensor::vec(&[0.0, -1.0]));
    assert_eq!(-a, Tensor::vec(&[-1.0, -2.0]));
  }

  #[test]
  fn relu() {
    let a = Tensor::vec(&[-1.0f32, 0.0, 2.5]);
    assert_eq!(a.relu(), Tensor::vec(&[0.0, 0.0, 2.5]));
  }
}
