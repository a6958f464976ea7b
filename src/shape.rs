use crate::internal::*;


/// The shape of a [Tensor](crate::Tensor).
///
/// Describes how a logical, row-major index space maps onto
/// storage through per-dimension strides and a starting offset.
/// A stride of zero repeats the same storage along a dimension,
/// which is how broadcasting avoids copies.

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
  pub dims: Vec<usize>,
  pub(crate) strides: Vec<isize>,
  pub(crate) offset: usize,
}

impl Shape {
  pub fn new(dims: &[usize]) -> Self {
    Self {
      dims: dims.to_vec(),
      strides: Self::make_strides(dims),
      offset: 0,
    }
  }

  pub fn strided(dims: &[usize], strides: &[isize], offset: usize) -> Self {
    assert_eq!(dims.len(), strides.len());
    Self {
      dims: dims.to_vec(),
      strides: strides.to_vec(),
      offset,
    }
  }

  fn make_strides(dims: &[usize]) -> Vec<isize> {
    if dims.is_empty() { return vec![] }
    let mut strides = vec![0; dims.len()];
    strides[dims.len() - 1] = 1;
    for i in (1..dims.len()).rev() {
      strides[i - 1] = dims[i] as isize * strides[i];
    }
    strides
  }

  pub fn size(&self) -> usize {
    self.dims.iter().product()
  }

  pub fn rank(&self) -> usize {
    self.dims.len()
  }

  pub fn contiguous(&self) -> bool {
    self.strides == Self::make_strides(&self.dims)
  }

  pub(crate) fn index(&self, indices: &[usize]) -> usize {
    assert!(indices.len() <= self.rank(),
      "Too many indices ({}) for {}", indices.len(), self);
    (indices.iter()
      .zip(&self.strides)
      .map(|(&i, &s)| i as isize * s)
      .sum::<isize>() + self.offset as isize
    ) as usize
  }

  /// Storage indices of all elements, in logical row-major order.

  pub fn iter(&self) -> Box<dyn Iterator<Item=usize> + '_> {
    if self.contiguous() {
      Box::new(self.offset..self.offset + self.size())
    } else {
      Box::new(ShapeIterator::new(self))
    }
  }

  pub fn view(&self, dims: &[usize]) -> Self {
    assert!(self.contiguous(), "Cannot view non-contiguous {}", self);
    let size: usize = dims.iter().product();
    assert_eq!(size, self.size(),
      "Cannot view {} as {:?}", self, dims);
    Self {
      dims: dims.to_vec(),
      strides: Self::make_strides(dims),
      offset: self.offset,
    }
  }

  /// Insert a dimension of size one. Negative indices count from
  /// the back, such that -1 appends a trailing dimension.

  pub fn unsqueeze(&self, dim: isize) -> Self {
    let d = negative_index(dim, self.rank(), true);
    assert!(d <= self.rank(), "Cannot unsqueeze {} at {}", self, dim);
    let mut shape = self.clone();
    let stride = if d < shape.rank() {
      shape.strides[d].abs() * shape.dims[d] as isize
    } else { 1 };
    shape.strides.insert(d, stride);
    shape.dims.insert(d, 1);
    shape
  }

  pub fn transpose(&self, dim1: isize, dim2: isize) -> Self {
    let dim1 = negative_index(dim1, self.rank(), false);
    let dim2 = negative_index(dim2, self.rank(), false);
    let mut shape = self.clone();
    shape.dims.swap(dim1, dim2);
    shape.strides.swap(dim1, dim2);
    shape
  }

  /// Dimensions resulting from broadcasting two shapes against each other.

  pub fn broadcast_dims(lhs: &[usize], rhs: &[usize]) -> Vec<usize> {
    let rank = lhs.len().max(rhs.len());
    let mut dims: Vec<usize> = lhs.iter().rev()
      .chain(std::iter::repeat(&1))
      .zip(rhs.iter().rev().chain(std::iter::repeat(&1)))
      .take(rank)
      .map(|(&a, &b)| {
        assert!(a == b || a == 1 || b == 1,
          "Could not broadcast {:?} & {:?}", lhs, rhs);
        if a == 1 { b } else { a }
      })
      .collect();
    dims.reverse();
    dims
  }

  /// View this shape as having the given, larger dimensions.
  ///
  /// Missing leading dimensions and dimensions of size one
  /// get repeated using a zero stride.

  pub fn broadcast_to(&self, dims: &[usize]) -> Self {
    assert!(self.rank() <= dims.len(),
      "Could not broadcast {} to {:?}", self, dims);
    let lead = dims.len() - self.rank();
    let mut strides = vec![0; lead];
    for (d, (&n, &stride)) in self.dims.iter().zip(&self.strides).enumerate() {
      let target = dims[lead + d];
      if n == target {
        strides.push(stride);
      } else if n == 1 {
        strides.push(0);
      } else {
        panic!("Could not broadcast {} to {:?}", self, dims);
      }
    }
    Self { dims: dims.to_vec(), strides, offset: self.offset }
  }
}

impl std::ops::Index<isize> for Shape {
  type Output = usize;

  fn index(&self, i: isize) -> &usize {
    let idx = negative_index(i, self.rank(), false);
    &self.dims[idx]
  }
}

impl std::fmt::Display for Shape {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Shape{:?}", self.dims)
  }
}


/// Iterate through a [Shape]'s storage indices.

pub struct ShapeIterator<'a> {
  shape: &'a Shape,
  counter: Vec<usize>,
  idx: isize,
  remaining: usize,
}

impl<'a> ShapeIterator<'a> {
  fn new(shape: &'a Shape) -> Self {
    Self {
      counter: vec![0; shape.rank()],
      idx: shape.offset as isize,
      remaining: shape.size(),
      shape,
    }
  }
}

impl<'a> Iterator for ShapeIterator<'a> {
  type Item = usize;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 { return None }
    let out = self.idx as usize;
    self.remaining -= 1;
    if self.remaining > 0 {
      // Odometer walk from the innermost dimension
      for d in (0..self.counter.len()).rev() {
        self.counter[d] += 1;
        self.idx += self.shape.strides[d];
        if self.counter[d] < self.shape.dims[d] { break }
        self.idx -= self.shape.strides[d] * self.shape.dims[d] as isize;
        self.counter[d] = 0;
      }
    }
    Some(out)
  }
}
