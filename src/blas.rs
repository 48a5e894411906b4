//! BLAS-backed dot products and axpy over one-dimensional blocks.
//!
//! Pointers from [`Data`] address the first *logical* element, while BLAS
//! expects, for a negative increment, the element at the lowest address.
//! [`fortran_base_offset`] bridges the two.

use crate::block::{Block, BlockMut};
use crate::data::Data;
use crate::element::Element;
use crate::layout::{DimOrder, Layout, Packing};
use crate::mode::{In, InOut};
use crate::{DdaError, Result};
use num_complex::{Complex32, Complex64};

/// Offset, in elements, from the first logical element of a `len`-long
/// strided vector to its lowest-addressed element.
///
/// Zero for non-negative strides, `(len - 1) * stride` for negative ones.
pub fn fortran_base_offset(len: usize, stride: isize) -> isize {
    if stride < 0 && len > 0 {
        (len as isize - 1) * stride
    } else {
        0
    }
}

/// Number of elements a strided vector spans in memory.
fn span(len: usize, stride: isize) -> usize {
    if len == 0 {
        0
    } else {
        (len - 1) * stride.unsigned_abs() + 1
    }
}

/// # Safety
/// `ptr` must address the first logical element of `len` readable elements
/// `stride` apart.
unsafe fn strided_slice<'a, T>(ptr: *const T, len: usize, stride: isize) -> &'a [T] {
    std::slice::from_raw_parts(ptr.offset(fortran_base_offset(len, stride)), span(len, stride))
}

/// # Safety
/// As [`strided_slice`], and the elements must be writable and unaliased.
unsafe fn strided_slice_mut<'a, T>(ptr: *mut T, len: usize, stride: isize) -> &'a mut [T] {
    std::slice::from_raw_parts_mut(ptr.offset(fortran_base_offset(len, stride)), span(len, stride))
}

fn blas_int(n: isize) -> Result<i32> {
    i32::try_from(n).map_err(|_| DdaError::OffsetOverflow)
}

/// Element types with BLAS level-1 routines.
pub trait BlasScalar: Element {
    /// # Safety
    /// Slices must start at the lowest-addressed element and cover `n`
    /// elements at the given increments.
    unsafe fn dotu(n: i32, x: &[Self], incx: i32, y: &[Self], incy: i32) -> Self;

    /// # Safety
    /// As [`BlasScalar::dotu`].
    unsafe fn axpy(n: i32, alpha: Self, x: &[Self], incx: i32, y: &mut [Self], incy: i32);
}

macro_rules! impl_blas_real {
    ($t:ty, $dot:ident, $axpy:ident) => {
        impl BlasScalar for $t {
            unsafe fn dotu(n: i32, x: &[$t], incx: i32, y: &[$t], incy: i32) -> $t {
                cblas::$dot(n, x, incx, y, incy)
            }

            unsafe fn axpy(n: i32, alpha: $t, x: &[$t], incx: i32, y: &mut [$t], incy: i32) {
                cblas::$axpy(n, alpha, x, incx, y, incy)
            }
        }
    };
}

macro_rules! impl_blas_complex {
    ($t:ty, $dot:ident, $axpy:ident) => {
        impl BlasScalar for $t {
            unsafe fn dotu(n: i32, x: &[$t], incx: i32, y: &[$t], incy: i32) -> $t {
                let mut out = [<$t>::new(0.0, 0.0)];
                cblas::$dot(n, x, incx, y, incy, &mut out);
                out[0]
            }

            unsafe fn axpy(n: i32, alpha: $t, x: &[$t], incx: i32, y: &mut [$t], incy: i32) {
                cblas::$axpy(n, alpha, x, incx, y, incy)
            }
        }
    };
}

impl_blas_real!(f32, sdot, saxpy);
impl_blas_real!(f64, ddot, daxpy);
impl_blas_complex!(Complex32, cdotu_sub, caxpy);
impl_blas_complex!(Complex64, zdotu_sub, zaxpy);

fn vector_layout<T: Element>() -> Layout {
    Layout::of::<T>(DimOrder::row_major(1), Packing::Any)
}

fn check_vectors(a: &[usize], b: &[usize]) -> Result<()> {
    if a.len() != 1 {
        return Err(DdaError::DimensionMismatch {
            block: a.len(),
            requested: 1,
        });
    }
    if a != b {
        return Err(DdaError::ShapeMismatch(a.to_vec(), b.to_vec()));
    }
    Ok(())
}

/// `Σ a[i] * b[i]` through BLAS, for one-dimensional blocks of equal length.
pub fn dot<A, B>(a: &A, b: &B) -> Result<A::Element>
where
    A: Block,
    B: Block<Element = A::Element>,
    A::Element: BlasScalar,
{
    check_vectors(a.dims(), b.dims())?;
    let layout = vector_layout::<A::Element>();
    let da = Data::<_, In>::with_layout(a, layout)?;
    let db = Data::<_, In>::with_layout(b, layout)?;
    let len = da.size(0);
    let (sa, sb) = (da.stride(0), db.stride(0));
    let n = blas_int(len as isize)?;
    let (ia, ib) = (blas_int(sa)?, blas_int(sb)?);
    log::trace!("blas dot n={} inc=({}, {})", n, ia, ib);
    // SAFETY: both proxies expose `len` elements at their strides.
    Ok(unsafe {
        A::Element::dotu(
            n,
            strided_slice(da.ptr(), len, sa),
            ia,
            strided_slice(db.ptr(), len, sb),
            ib,
        )
    })
}

/// `y[i] = alpha * x[i] + y[i]` through BLAS, for one-dimensional blocks.
pub fn axpy<X, Y>(alpha: Y::Element, x: &X, y: &mut Y) -> Result<()>
where
    X: Block<Element = Y::Element>,
    Y: BlockMut,
    Y::Element: BlasScalar,
{
    check_vectors(y.dims(), x.dims())?;
    let layout = vector_layout::<Y::Element>();
    let dx = Data::<_, In>::with_layout(x, layout)?;
    let mut dy = Data::<_, InOut>::with_layout(y, layout)?;
    let len = dy.size(0);
    let (sx, sy) = (dx.stride(0), dy.stride(0));
    let n = blas_int(len as isize)?;
    let (ix, iy) = (blas_int(sx)?, blas_int(sy)?);
    // SAFETY: `dy` is the only path to its elements while the slice lives.
    unsafe {
        Y::Element::axpy(
            n,
            alpha,
            strided_slice(dx.ptr(), len, sx),
            ix,
            strided_slice_mut(dy.ptr_mut(), len, sy),
            iy,
        );
    }
    dy.release();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Dense, Domain, Subview};
    use approx::assert_relative_eq;

    #[test]
    fn test_fortran_base_offset() {
        assert_eq!(fortran_base_offset(6, 1), 0);
        assert_eq!(fortran_base_offset(6, -1), -5);
        assert_eq!(fortran_base_offset(4, -3), -9);
        assert_eq!(fortran_base_offset(0, -2), 0);
        assert_eq!(span(4, -3), 10);
    }

    #[test]
    fn test_dot_reversed() {
        let a = Dense::from_slice(&[1.0f64, 2.0, 3.0]);
        let b = Dense::from_slice(&[4.0f64, 5.0, 6.0]);
        let rev = Subview::new(&a, &[Domain::reversed(3)]).unwrap();
        assert_relative_eq!(dot(&rev, &b).unwrap(), 3.0 * 4.0 + 2.0 * 5.0 + 6.0);
    }

    #[test]
    fn test_axpy_reversed_target() {
        let x = Dense::from_slice(&[1.0f32, 2.0, 3.0]);
        let mut y = Dense::<f32>::vector(3, 1.0);
        {
            let mut rev = Subview::new(&mut y, &[Domain::reversed(3)]).unwrap();
            axpy(2.0, &x, &mut rev).unwrap();
        }
        assert_eq!(y.as_slice(), &[7.0, 5.0, 3.0]);
    }
}
