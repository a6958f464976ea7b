use rand::distributions::uniform::SampleUniform;
use num_traits::{ PrimInt, NumAssignOps, Num, NumCast };

#[cfg(feature = "rayon")]
use rayon::prelude::*;


/// All types that may be used in a [Tensor](crate::Tensor).
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Inner: PartialEq + Clone + Copy + Send + Sync + std::fmt::Debug + 'static {}
impl<T: PartialEq + Clone + Copy + Send + Sync + std::fmt::Debug + 'static> Inner for T {}


/// All numeric types.
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Numeric: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum + Gemm {}
impl<T: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum + Gemm> Numeric for T {}


/// All signed numeric types.

pub trait Signed: Numeric + num_traits::Signed {}
impl<T: Numeric + num_traits::Signed> Signed for T {}


/// All unsigned numeric types.

pub trait Unsigned: Numeric + num_traits::Unsigned {}
impl<T: Numeric + num_traits::Unsigned> Unsigned for T {}


/// All integer types.

pub trait Integer: Numeric + PrimInt {}
impl<T: Numeric + PrimInt> Integer for T {}


/// All continuous numeric types.
///
/// Only these can be wrapped in a [Variable](crate::Variable)
/// and differentiated.

pub trait Real: Signed + num_traits::real::Real + SampleUniform {}
impl<T: Signed + num_traits::real::Real + SampleUniform> Real for T {}


/// Strided matrix multiplication kernel for a single element type.
///
/// Computes `C = A·B` for an `m×k` matrix A and a `k×n` matrix B, each
/// given as a storage slice starting at the first element plus row and
/// column strides. The result is returned contiguous in row-major order.

pub trait Gemm: Sized {
  #[allow(clippy::too_many_arguments)]
  fn gemm(
    m: usize, k: usize, n: usize,
    a: &[Self], rsa: isize, csa: isize,
    b: &[Self], rsb: isize, csb: isize,
  ) -> Vec<Self>;
}

fn naive_gemm<T>(
  m: usize, k: usize, n: usize,
  a: &[T], rsa: isize, csa: isize,
  b: &[T], rsb: isize, csb: isize,
) -> Vec<T>
where
  T: Copy + Send + Sync + num_traits::Zero + std::ops::Mul<Output = T>,
{
  let mut out = vec![T::zero(); m * n];
  if n == 0 { return out }
  let row = |i: usize, dest: &mut [T]| {
    for (j, cell) in dest.iter_mut().enumerate() {
      let mut acc = T::zero();
      for l in 0..k {
        let ai = i as isize * rsa + l as isize * csa;
        let bi = l as isize * rsb + j as isize * csb;
        acc = acc + a[ai as usize] * b[bi as usize];
      }
      *cell = acc;
    }
  };

  #[cfg(feature = "rayon")]
  out.par_chunks_mut(n).enumerate().for_each(|(i, dest)| row(i, dest) );

  #[cfg(not(feature = "rayon"))]
  out.chunks_mut(n).enumerate().for_each(|(i, dest)| row(i, dest) );

  out
}

macro_rules! naive_gemm {
  ($($t:ty),*) => {$(
    impl Gemm for $t {
      fn gemm(
        m: usize, k: usize, n: usize,
        a: &[Self], rsa: isize, csa: isize,
        b: &[Self], rsb: isize, csb: isize,
      ) -> Vec<Self> {
        naive_gemm(m, k, n, a, rsa, csa, b, rsb, csb)
      }
    }
  )*};
}

naive_gemm!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

#[cfg(not(feature = "unsafe"))]
naive_gemm!(f32, f64);

#[cfg(feature = "unsafe")]
macro_rules! blas_gemm {
  ($t:ty, $kernel:path) => {
    impl Gemm for $t {
      fn gemm(
        m: usize, k: usize, n: usize,
        a: &[Self], rsa: isize, csa: isize,
        b: &[Self], rsb: isize, csb: isize,
      ) -> Vec<Self> {
        let mut out = vec![0.0; m * n];
        if m == 0 || n == 0 { return out }
        // Both operands must cover every element the kernel will touch
        if k > 0 {
          let last_a = (m as isize - 1) * rsa + (k as isize - 1) * csa;
          let last_b = (k as isize - 1) * rsb + (n as isize - 1) * csb;
          assert!(last_a >= 0 && (last_a as usize) < a.len(), "Left operand out of bounds");
          assert!(last_b >= 0 && (last_b as usize) < b.len(), "Right operand out of bounds");
        }
        unsafe {
          $kernel(
            m, k, n,
            1.0,
            a.as_ptr(), rsa, csa,
            b.as_ptr(), rsb, csb,
            0.0,
            out.as_mut_ptr(), n as isize, 1,
          );
        }
        out
      }
    }
  };
}

#[cfg(feature = "unsafe")]
blas_gemm!(f32, matrixmultiply::sgemm);

#[cfg(feature = "unsafe")]
blas_gemm!(f64, matrixmultiply::dgemm);


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gemm_strided() {
    // [[1,2,3],[4,5,6]] · [[1,2],[3,4],[5,6]]
    let a = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
    let b = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
    assert_eq!(f32::gemm(2, 3, 2, &a, 3, 1, &b, 2, 1), vec![22.0, 28.0, 49.0, 64.0]);

    // Same B, read through a transposed view of its 2x3 transpose
    let bt = [1.0f32, 3.0, 5.0, 2.0, 4.0, 6.0];
    assert_eq!(f32::gemm(2, 3, 2, &a, 3, 1, &bt, 1, 3), vec![22.0, 28.0, 49.0, 64.0]);
  }

  #[test]
  fn gemm_integer() {
    let a = [1, 2, 3, 4];
    let b = [5, 6, 7, 8];
    assert_eq!(i32::gemm(2, 2, 2, &a, 2, 1, &b, 2, 1), vec![19, 22, 43, 50]);
  }
}
