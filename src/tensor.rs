use std::rc::Rc;
use std::cell::{ Ref, RefMut, RefCell };

use rand::Rng;
use num_traits::NumCast;

mod cops;
mod lops;

use crate::{
  internal::*,
  shape::Shape,
  variable::Variable,
  scalar::{ Inner, Numeric, Real, Integer, Unsigned },
  ops::{ BaseOps, NumericOps, Hops },
};


/// Multidimensional array.
///
/// Tensors may contain any type that satisfies [Inner], but
/// additional methods are available for [Numeric], [Real]
/// and [boolean](bool) inner types.
///
/// Cloning a tensor or taking a view of it shares the underlying
/// storage. Use [detach](Tensor::detach) for an independent copy.
///
/// [Real] tensor types can be wrapped in a [Variable] by
/// calling [tracked](Tensor::tracked) or [trained](Tensor::trained).

#[derive(Debug, Clone)]
pub struct Tensor<T: Inner> {
  shape: Shape,
  data: Rc<RefCell<Vec<T>>>,
}

impl<T: Real> Hops<T> for Tensor<T> {}

impl<T: Inner> PartialEq for Tensor<T> {
  fn eq(&self, rhs: &Self) -> bool {
    if self.shape.dims != rhs.shape.dims { return false }
    self.param_iter().zip(rhs.param_iter()).all(|(a, b)| a == b )
  }
}

impl<T: Inner> Tensor<T> {
  pub fn from_shape(shape: Shape, data: Vec<T>) -> Self {
    assert_eq!(shape.size(), data.len(),
      "{} doesn't match data length {}", shape, data.len());
    Self { shape, data: Rc::new(RefCell::new(data)) }
  }

  pub fn new(dims: &[usize], data: Vec<T>) -> Self {
    Self::from_shape(Shape::new(dims), data)
  }

  pub fn vec(vec: &[T]) -> Self {
    Self::new(&[vec.len()], vec.to_vec())
  }

  pub fn fill(dims: &[usize], filler: T) -> Self {
    Self::new(dims, vec![filler; dims.iter().product()])
  }

  pub fn raw(&self) -> Ref<Vec<T>> {
    self.data.borrow()
  }

  pub(crate) fn raw_mut(&self) -> RefMut<Vec<T>> {
    self.data.borrow_mut()
  }

  /// Elements in logical order, taking ownership of the
  /// storage if possible.

  pub fn into_raw(self) -> Vec<T> {
    let whole = self.shape.contiguous()
      && self.shape.offset == 0
      && self.shape.size() == self.data.borrow().len();
    if !whole { return self.to_vec() }
    match Rc::try_unwrap(self.data) {
      Ok(cell) => cell.into_inner(),
      Err(data) => {
        let copy = data.borrow().clone();
        copy
      },
    }
  }

  pub fn to_vec(&self) -> Vec<T> {
    self.param_iter().collect()
  }

  pub fn size(&self) -> usize {
    self.shape.size()
  }

  pub fn rank(&self) -> usize {
    self.shape.rank()
  }

  pub fn dim(&self, dim: isize) -> usize {
    self.shape[dim]
  }

  pub fn shared_with(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.data, &other.data)
  }

  pub fn param_iter(&self) -> TensorIterator<T> {
    TensorIterator::new(self)
  }

  pub fn contiguous(&self) -> Self {
    if self.shape.contiguous() {
      self.clone()
    } else {
      self.detach()
    }
  }

  pub fn detach(&self) -> Self {
    self.vectorize(|a| a )
  }

  pub fn vectorize<O,F>(&self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: FnMut(T) -> O,
  {
    let data = self.param_iter().map(cb).collect();
    Tensor::new(&self.shape.dims, data)
  }

  /// Combine two tensors element by element, broadcasting
  /// them against each other first.

  pub fn zip<O,F>(&self, rhs: &Self, mut cb: F) -> Tensor<O>
  where
    O: Inner,
    F: FnMut(T, T) -> O,
  {
    let dims = Shape::broadcast_dims(&self.shape.dims, &rhs.shape.dims);
    let lhs = self.broadcast(&dims);
    let rhs = rhs.broadcast(&dims);
    let data = lhs.param_iter()
      .zip(rhs.param_iter())
      .map(|(a, b)| cb(a, b) )
      .collect();
    Tensor::new(&dims, data)
  }

  /// Reduce dimension `dim` and all following dimensions
  /// to a single value each.

  pub fn collapse<O,F>(&self, dim: isize, mut cb: F) -> Tensor<O>
  where
    O: Inner,
    F: FnMut(&[T]) -> O,
  {
    let dim = negative_index(dim, self.rank(), false);
    assert!(dim <= self.rank(), "Cannot collapse {} from dimension {}", self.shape, dim);
    let inner: usize = self.shape.dims[dim..].iter().product();
    let this = self.contiguous();
    let data = this.raw();
    let start = this.shape.offset;
    let values = &data[start..start + this.size()];
    let out = if inner == 0 {
      vec![]
    } else {
      values.chunks(inner).map(|chunk| cb(chunk) ).collect()
    };
    Tensor::new(&self.shape.dims[..dim], out)
  }

  pub fn item(&self) -> T {
    assert!(self.size() == 1,
      "Can't extract item from non-scalar {}", self.shape);
    self.raw()[self.shape.offset]
  }

  pub fn at(&self, indices: &[usize]) -> Self {
    for (&i, &n) in indices.iter().zip(&self.shape.dims) {
      assert!(i < n, "Index {:?} out of bounds for {}", indices, self.shape);
    }
    let offset = self.shape.index(indices);
    let dims = &self.shape.dims[indices.len()..];
    let strides = &self.shape.strides[indices.len()..];
    Self {
      shape: Shape::strided(dims, strides, offset),
      data: self.data.clone(),
    }
  }

  pub fn transpose(&self, dim1: isize, dim2: isize) -> Self {
    Self {
      shape: self.shape.transpose(dim1, dim2),
      data: self.data.clone(),
    }
  }

  /// Copy the listed rows (entries of the first dimension)
  /// into a new tensor.

  pub fn gather_rows(&self, indices: &[usize]) -> Self {
    assert!(self.rank() >= 1, "Cannot gather rows of scalar tensor");
    let mut dims = self.shape.dims.clone();
    dims[0] = indices.len();
    let row_len: usize = self.shape.dims[1..].iter().product();
    let this = self.contiguous();
    let data = this.raw();
    let start = this.shape.offset;
    let mut out = Vec::with_capacity(indices.len() * row_len);
    for &i in indices {
      assert!(i < self.shape.dims[0], "Row {} out of bounds for {}", i, self.shape);
      let begin = start + i * row_len;
      out.extend_from_slice(&data[begin..begin + row_len]);
    }
    Tensor::new(&dims, out)
  }

  /// Overwrite this tensor's elements, in place, with those of `other`,
  /// which gets broadcasted to match.
  ///
  /// All tensors sharing this storage observe the change.

  pub fn assign(&self, other: &Self) {
    self.op_assign(other, |a, b| *a = b );
  }

  pub fn op_assign(&self, other: &Self, cb: impl Fn(&mut T, T)) {
    // Avoid clashing borrows when both tensors share storage
    let other = if self.shared_with(other) {
      other.detach()
    } else {
      other.clone()
    };
    let other = other.broadcast(&self.shape.dims);
    let mut data = self.raw_mut();
    let other_data = other.raw();
    for (i, j) in self.shape.iter().zip(other.shape.iter()) {
      cb(&mut data[i], other_data[j]);
    }
  }

  pub fn refill(&self, filler: T) {
    let mut data = self.raw_mut();
    for i in self.shape.iter() {
      data[i] = filler;
    }
  }

  pub fn equal(&self, rhs: &Self) -> Tensor<bool> {
    self.zip(rhs, |a, b| a == b )
  }
}

impl<T: Numeric> Tensor<T> {
  pub fn ones(dims: &[usize]) -> Self {
    Self::fill(dims, T::one())
  }

  pub fn zeros(dims: &[usize]) -> Self {
    Self::fill(dims, T::zero())
  }

  pub fn arrange(dims: &[usize], start: T, step: T) -> Self {
    Self::new(dims, (0..dims.iter().product())
      .map(|i: usize| T::from(i).unwrap() * step + start )
      .collect())
  }

  pub fn gt(&self, rhs: &Self) -> Tensor<bool> {
    self.zip(rhs, |a, b| a > b )
  }

  /// Sum a broadcasted tensor back onto the given dimensions.
  ///
  /// Inverse of [broadcast](BaseOps::broadcast) with respect to gradients.

  pub fn sum_to(&self, dims: &[usize]) -> Self {
    if self.shape.dims == dims { return self.clone() }
    let out = Self::zeros(dims);
    let target = Shape::new(dims).broadcast_to(&self.shape.dims);
    {
      let mut data = out.raw_mut();
      for (j, value) in target.iter().zip(self.param_iter()) {
        data[j] += value;
      }
    }
    out
  }

  /// Collapse dimension using index of its greatest value.
  ///
  /// Ties resolve to the first occurrence.

  pub fn argmax<O: Integer + Unsigned>(&self, dim: isize) -> Tensor<O> {
    self.collapse(dim, |values| {
      let mut index = 0;
      for (i, &value) in values.iter().enumerate() {
        if value > values[index] {
          index = i;
        }
      }
      O::from(index).unwrap()
    })
  }
}

impl<T: Real> Tensor<T> {
  pub fn randn<R: Rng>(dims: &[usize], rng: &mut R) -> Self {
    let len = dims.iter().product();
    let mut data = Vec::with_capacity(len + 1);
    while data.len() < len {
      let (r1, r2): (T, T) = randn(rng);
      data.push(r1);
      data.push(r2);
    }
    data.truncate(len);
    Self::new(dims, data)
  }

  pub fn uniform<R: Rng>(dims: &[usize], low: T, high: T, rng: &mut R) -> Self {
    let data = (0..dims.iter().product::<usize>())
      .map(|_| rng.gen_range(low, high) )
      .collect();
    Self::new(dims, data)
  }

  /// Wrap in a trainable [Variable], which receives gradients.

  pub fn trained(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), true)
  }

  /// Wrap in a constant [Variable], for inputs of a computation.

  pub fn tracked(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), false)
  }
}

impl<T: Integer> Tensor<T> {
  /// Fraction of entries that equal the given labels.

  pub fn accuracy<O: Real>(&self, labels: &Self) -> O {
    assert_eq!(self.shape.dims, labels.shape.dims,
      "Predictions {} don't match labels {}", self.shape, labels.shape);
    let n = labels.size();
    if n == 0 { return O::zero() }
    let hits = self.equal(labels).param_iter().filter(|&hit| hit ).count();
    O::from(hits).unwrap() / O::from(n).unwrap()
  }
}

impl<T: Integer + Unsigned> Tensor<T> {
  pub fn one_hot<O: Numeric>(&self, size: usize) -> Tensor<O> {
    let mut dims = self.shape.dims.clone();
    dims.push(size);
    let mut data = vec![O::zero(); self.size() * size];
    for (n, a) in self.param_iter().enumerate() {
      let i: usize = NumCast::from(a).unwrap();
      assert!(i < size, "Class {} out of range for one-hot size {}", i, size);
      data[n * size + i] = O::one();
    }
    Tensor::new(&dims, data)
  }
}

impl Tensor<bool> {
  pub fn numeric<O: Numeric>(&self) -> Tensor<O> {
    self.vectorize(|a| if a { O::one() } else { O::zero() })
  }
}

impl<T: Inner> std::fmt::Display for Tensor<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Tensor{:?} ", self.shape.dims)?;
    print_chunks(0, &self.shape.dims, &self.to_vec(), f)
  }
}

fn print_chunks<T: std::fmt::Debug>(idx: usize, dims: &[usize], vec: &[T], f: &mut std::fmt::Formatter) -> std::fmt::Result {
  let indent = " ".repeat(idx * 2);
  if dims.is_empty() {
    write!(f, "{indent}{:?}", vec[0])?;
  } else if idx == dims.len() - 1 || vec.is_empty() {
    writeln!(f, "{indent}{:?}", vec)?;
  } else {
    writeln!(f, "{indent}[")?;
    for chunk in vec.chunks(vec.len() / dims[idx]) {
      print_chunks(idx + 1, dims, chunk, f)?;
    }
    writeln!(f, "{indent}]")?;
  }
  Ok(())
}


pub struct TensorIterator<'a, T: Inner> {
  data: Ref<'a, Vec<T>>,
  shape_iter: Box<dyn Iterator<Item=usize> + 'a>,
}

impl<'a, T: Inner> TensorIterator<'a, T> {
  fn new(tensor: &'a Tensor<T>) -> Self {
    Self {
      data: tensor.data.borrow(),
      shape_iter: tensor.shape.iter(),
    }
  }
}

impl<T: Inner> Iterator for TensorIterator<'_, T> {
  type Item = T;

  fn next(&mut self) -> Option<Self::Item> {
    self.shape_iter.next().map(|i| self.data[i] )
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use rand::{ SeedableRng, rngs::StdRng };

  #[test]
  fn index() {
    let x = Tensor::new(&[2,2,2], vec![1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(x.at(&[0,0]), Tensor::vec(&[1, 2]));
    assert_eq!(x.at(&[1,1]), Tensor::vec(&[7, 8]));
    assert_eq!(x.at(&[0,1,1]).item(), 4);
    assert_eq!(x.at(&[0]), Tensor::new(&[2,2], vec![1, 2, 3, 4]));
  }

  #[test]
  fn broadcast() {
    let x = Tensor::new(&[1,2,3], vec![1, 2, 3, 4, 5, 6]);

    let y = Tensor::new(&[    1], vec![1]);
    assert_eq!(x.zip(&y, |a, b| a + b ), Tensor::new(&[1,2,3], vec![2, 3, 4, 5, 6, 7]));

    let y = Tensor::new(&[    3], vec![1, 2, 3]);
    assert_eq!(x.zip(&y, |a, b| a + b ), Tensor::new(&[1,2,3], vec![2, 4, 6, 5, 7, 9]));

    let y = Tensor::new(&[  2,1], vec![10, 20]);
    assert_eq!(x.zip(&y, |a, b| a + b ), Tensor::new(&[1,2,3], vec![11, 12, 13, 24, 25, 26]));
  }

  #[test]
  fn sum_to() {
    let x = Tensor::arrange(&[2,3], 1, 1);
    assert_eq!(x.sum_to(&[3]), Tensor::vec(&[5, 7, 9]));
    assert_eq!(x.sum_to(&[2,1]), Tensor::new(&[2,1], vec![6, 15]));
    assert_eq!(x.sum_to(&[]), Tensor::new(&[], vec![21]));
  }

  #[test]
  fn assign_through_view() {
    let x = Tensor::zeros(&[2,2]);
    x.at(&[1]).assign(&Tensor::vec(&[3, 4]));
    assert_eq!(x, Tensor::new(&[2,2], vec![0, 0, 3, 4]));

    // Shared storage with itself
    x.op_assign(&x, |a, b| *a += b );
    assert_eq!(x, Tensor::new(&[2,2], vec![0, 0, 6, 8]));
  }

  #[test]
  fn transpose_contiguous() {
    let x = Tensor::new(&[2,3], vec![1, 2, 3, 4, 5, 6]).transpose(0, 1);
    assert_eq!(x.contiguous().into_raw(), vec![1, 4, 2, 5, 3, 6]);
  }

  #[test]
  fn gather_rows() {
    let x = Tensor::arrange(&[4,2], 0, 1);
    assert_eq!(x.gather_rows(&[3, 0]), Tensor::new(&[2,2], vec![6, 7, 0, 1]));
  }

  #[test]
  fn argmax() {
    let x = Tensor::new(&[2,3], vec![-3.0, -1.0, -2.0, 0.5, 0.5, 0.1]);
    assert_eq!(x.argmax::<u8>(-1), Tensor::vec(&[1, 0]));
  }

  #[test]
  fn one_hot() {
    let labels = Tensor::vec(&[2u8, 0]);
    assert_eq!(labels.one_hot::<f32>(3), Tensor::new(&[2,3], vec![0., 0., 1., 1., 0., 0.]));
  }

  #[test]
  fn accuracy() {
    let pred = Tensor::vec(&[1u8, 2, 3, 4]);
    let labels = Tensor::vec(&[1u8, 2, 0, 0]);
    assert_eq!(pred.accuracy::<f32>(&labels), 0.5);
  }

  #[test]
  fn randn_seeded() {
    let a = Tensor::<f32>::randn(&[3,5], &mut StdRng::seed_from_u64(1));
    let b = Tensor::<f32>::randn(&[3,5], &mut StdRng::seed_from_u64(1));
    assert_eq!(a.size(), 15);
    assert_eq!(a, b);
  }

  #[test]
  fn uniform_bounds() {
    let x = Tensor::uniform(&[4,50], -0.5f32, 0.25, &mut StdRng::seed_from_u64(2));
    assert_eq!(x.shape().dims, vec![4,50]);
    assert!(x.to_vec().iter().all(|&v| (-0.5..0.25).contains(&v) ));
    assert!(x.to_vec().iter().any(|&v| v < -0.25 ));
  }

  #[test]
  fn display() {
    let x = Tensor::new(&[2,2], vec![1, 2, 3, 4]);
    assert_eq!(format!("{x}"), "Tensor[2, 2] [\n  [1, 2]\n  [3, 4]\n]\n");
  }
}
