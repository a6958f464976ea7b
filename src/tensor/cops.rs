use crate::{
  tensor::Tensor,
  scalar::{ Numeric, Gemm },
};


impl<T: Numeric> Tensor<T> {
  /// Multiply two rank-2 views directly from their strided storage.

  pub(crate) fn matmul(&self, rhs: &Self) -> Vec<T> {
    let rows_l = self.shape[0];
    let cols_l = self.shape[1];
    let cols_r = rhs.shape[1];

    // Storage may be shared when multiplying a matrix with its own transpose
    let data_l = self.raw();
    let data_r = rhs.raw();

    T::gemm(
      rows_l, cols_l, cols_r,
      &data_l[self.shape.offset..], self.shape.strides[0], self.shape.strides[1],
      &data_r[rhs.shape.offset..], rhs.shape.strides[0], rhs.shape.strides[1],
    )
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::ops::NumericOps;

  #[test]
  fn matmul() {
    let x = Tensor::new(&[2,3], vec![1, 2, 3, 4, 5, 6]);
    let y = Tensor::new(&[3,2], vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(x.mm(&y), Tensor::new(&[2,2], vec![22, 28, 49, 64]));
  }

  #[test]
  fn matmul_vector() {
    let x = Tensor::new(&[2,3], vec![1, 2, 3, 4, 5, 6]);
    let y = Tensor::new(&[3,1], vec![1, 2, 3]);
    assert_eq!(x.mm(&y), Tensor::new(&[2,1], vec![14, 32]));
  }

  #[test]
  fn matmul_transposed_float() {
    let x = Tensor::new(&[2,3], vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]);
    // x · xᵀ through a strided view of the same storage
    assert_eq!(x.mm(&x.transpose(0, 1)), Tensor::new(&[2,2], vec![14.0, 32.0, 32.0, 77.0]));
  }

  #[test]
  #[should_panic]
  fn matmul_mismatch() {
    let x = Tensor::new(&[2,3], vec![1, 2, 3, 4, 5, 6]);
    x.mm(&x);
  }
}
