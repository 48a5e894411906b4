//! Numeric kernels written against base pointers and strides.
//!
//! The `*_raw` functions are the innermost loops: a length, a pointer to the
//! first element and a signed stride per operand. The block-level functions
//! obtain pointers through [`Data`] proxies and run the raw loop once per run
//! along the fastest dimension, so any block, whatever its storage, can feed
//! them.

use crate::block::{Block, BlockMut};
use crate::data::Data;
use crate::iter::{for_each_index, is_contiguous};
use crate::layout::{DimOrder, Layout, Packing};
use crate::mode::{In, InOut, Out};
use crate::view::SVec;
use crate::{DdaError, Result};
use num_complex::ComplexFloat;
use num_traits::Zero;
use std::ops::{Add, Mul};

// ============================================================================
// Raw kernels
// ============================================================================

/// Sum of `len` elements starting at `ptr`, `stride` apart.
///
/// # Safety
/// `ptr.offset(i * stride)` must be valid for reads for every `i < len`.
#[inline]
pub unsafe fn sum_raw<T: Copy + Zero + Add<Output = T>>(len: usize, ptr: *const T, stride: isize) -> T {
    let mut acc = T::zero();
    let mut p = ptr;
    for _ in 0..len {
        acc = acc + *p;
        p = p.wrapping_offset(stride);
    }
    acc
}

/// `Σ a[i] * b[i]`.
///
/// # Safety
/// Both operands must be valid for reads over `len` strided elements.
#[inline]
pub unsafe fn dot_raw<T: Copy + Zero + Add<Output = T> + Mul<Output = T>>(
    len: usize,
    a: *const T,
    sa: isize,
    b: *const T,
    sb: isize,
) -> T {
    let mut acc = T::zero();
    let (mut pa, mut pb) = (a, b);
    for _ in 0..len {
        acc = acc + *pa * *pb;
        pa = pa.wrapping_offset(sa);
        pb = pb.wrapping_offset(sb);
    }
    acc
}

/// `Σ conj(a[i]) * b[i]`.
///
/// # Safety
/// Both operands must be valid for reads over `len` strided elements.
#[inline]
pub unsafe fn dotc_raw<T: ComplexFloat>(len: usize, a: *const T, sa: isize, b: *const T, sb: isize) -> T {
    let mut acc = T::zero();
    let (mut pa, mut pb) = (a, b);
    for _ in 0..len {
        acc = acc + (*pa).conj() * *pb;
        pa = pa.wrapping_offset(sa);
        pb = pb.wrapping_offset(sb);
    }
    acc
}

/// `y[i] = op(a[i], b[i])`.
///
/// # Safety
/// `y` must be valid for writes and `a`, `b` for reads over `len` strided
/// elements.
#[inline]
pub unsafe fn zip_raw<T: Copy>(
    len: usize,
    y: *mut T,
    sy: isize,
    a: *const T,
    sa: isize,
    b: *const T,
    sb: isize,
    op: impl Fn(T, T) -> T,
) {
    let (mut py, mut pa, mut pb) = (y, a, b);
    for _ in 0..len {
        *py = op(*pa, *pb);
        py = py.wrapping_offset(sy);
        pa = pa.wrapping_offset(sa);
        pb = pb.wrapping_offset(sb);
    }
}

/// `y[i] = alpha * x[i] + y[i]`.
///
/// # Safety
/// `y` must be valid for reads and writes and `x` for reads over `len`
/// strided elements.
#[inline]
pub unsafe fn axpy_raw<T: Copy + Add<Output = T> + Mul<Output = T>>(
    len: usize,
    alpha: T,
    x: *const T,
    sx: isize,
    y: *mut T,
    sy: isize,
) {
    let (mut px, mut py) = (x, y);
    for _ in 0..len {
        *py = alpha * *px + *py;
        px = px.wrapping_offset(sx);
        py = py.wrapping_offset(sy);
    }
}

/// `x[i] = alpha * x[i]`.
///
/// # Safety
/// `x` must be valid for reads and writes over `len` strided elements.
#[inline]
pub unsafe fn scale_raw<T: Copy + Mul<Output = T>>(len: usize, alpha: T, x: *mut T, sx: isize) {
    let mut p = x;
    for _ in 0..len {
        *p = alpha * *p;
        p = p.wrapping_offset(sx);
    }
}

// ============================================================================
// Line iteration
// ============================================================================

/// One run along the fastest dimension: element offset of its start in each
/// operand, its length, and each operand's stride along it.
struct Line<const N: usize> {
    offsets: [isize; N],
    len: usize,
    strides: [isize; N],
}

/// Call `f` once per run along the fastest dimension of `order`, or once in
/// total when every operand is contiguous in that order.
fn for_each_line<const N: usize>(
    dims: &[usize],
    order: &[usize],
    strides: [&[isize]; N],
    mut f: impl FnMut(Line<N>),
) {
    let total: usize = dims.iter().product();
    if total == 0 {
        return;
    }
    if strides.iter().all(|s| is_contiguous(dims, s, order)) {
        f(Line {
            offsets: [0; N],
            len: total,
            strides: [1; N],
        });
        return;
    }
    let Some(&fast) = order.last() else {
        f(Line {
            offsets: [0; N],
            len: 1,
            strides: [1; N],
        });
        return;
    };
    let mut outer: SVec<usize> = SVec::from_slice(dims);
    outer[fast] = 1;
    let inner = strides.map(|s| s[fast]);
    for_each_index(&outer, order, |idx| {
        let offsets = strides.map(|s| idx.iter().zip(s).map(|(&i, &st)| i as isize * st).sum::<isize>());
        f(Line {
            offsets,
            len: dims[fast],
            strides: inner,
        });
    });
}

/// Layout every operand of a kernel is requested in: `block`'s own order
/// (row-major when it has none), any packing.
fn kernel_layout<B: Block + ?Sized>(block: &B) -> Layout {
    let order = block
        .native_layout()
        .map(|l| l.order)
        .filter(|o| o.dim() == block.dim())
        .unwrap_or_else(|| DimOrder::row_major(block.dim()));
    Layout::of::<B::Element>(order, Packing::Any)
}

fn ensure_same_dims(a: &[usize], b: &[usize]) -> Result<()> {
    if a != b {
        return Err(DdaError::ShapeMismatch(a.to_vec(), b.to_vec()));
    }
    Ok(())
}

// ============================================================================
// Block kernels
// ============================================================================

/// Sum of all elements of `block`.
pub fn sum<B>(block: &B) -> Result<B::Element>
where
    B: Block,
    B::Element: Zero + Add<Output = B::Element>,
{
    let layout = kernel_layout(block);
    let order = layout.order.as_vec();
    let data = Data::<_, In>::with_layout(block, layout)?;
    let ptr = data.ptr();
    let mut acc = B::Element::zero();
    for_each_line(data.sizes(), &order, [data.strides()], |line| {
        let [off] = line.offsets;
        let [s] = line.strides;
        acc = acc + unsafe { sum_raw(line.len, ptr.wrapping_offset(off), s) };
    });
    Ok(acc)
}

fn dot_with<A, B>(
    a: &A,
    b: &B,
    kernel: unsafe fn(usize, *const A::Element, isize, *const A::Element, isize) -> A::Element,
) -> Result<A::Element>
where
    A: Block,
    B: Block<Element = A::Element>,
    A::Element: Zero + Add<Output = A::Element>,
{
    ensure_same_dims(a.dims(), b.dims())?;
    let layout = kernel_layout(a);
    let order = layout.order.as_vec();
    let da = Data::<_, In>::with_layout(a, layout)?;
    let db = Data::<_, In>::with_layout(b, layout)?;
    let (pa, pb) = (da.ptr(), db.ptr());
    let mut acc = A::Element::zero();
    for_each_line(da.sizes(), &order, [da.strides(), db.strides()], |line| {
        let [oa, ob] = line.offsets;
        let [sa, sb] = line.strides;
        acc = acc + unsafe { kernel(line.len, pa.wrapping_offset(oa), sa, pb.wrapping_offset(ob), sb) };
    });
    Ok(acc)
}

/// `Σ a[i] * b[i]` over blocks of equal extents.
pub fn dot<A, B>(a: &A, b: &B) -> Result<A::Element>
where
    A: Block,
    B: Block<Element = A::Element>,
    A::Element: Zero + Add<Output = A::Element> + Mul<Output = A::Element>,
{
    dot_with(a, b, dot_raw::<A::Element>)
}

/// `Σ conj(a[i]) * b[i]` over blocks of equal extents.
pub fn dotc<A, B>(a: &A, b: &B) -> Result<A::Element>
where
    A: Block,
    B: Block<Element = A::Element>,
    A::Element: ComplexFloat,
{
    dot_with(a, b, dotc_raw::<A::Element>)
}

fn zip_into<R, A, B>(res: &mut R, a: &A, b: &B, op: impl Fn(R::Element, R::Element) -> R::Element) -> Result<()>
where
    R: BlockMut,
    A: Block<Element = R::Element>,
    B: Block<Element = R::Element>,
{
    ensure_same_dims(res.dims(), a.dims())?;
    ensure_same_dims(res.dims(), b.dims())?;
    let layout = kernel_layout(&*res);
    let order = layout.order.as_vec();
    let da = Data::<_, In>::with_layout(a, layout)?;
    let db = Data::<_, In>::with_layout(b, layout)?;
    let mut dr = Data::<_, Out>::with_layout(res, layout)?;
    let (pa, pb, pr) = (da.ptr(), db.ptr(), dr.ptr_mut());
    for_each_line(dr.sizes(), &order, [dr.strides(), da.strides(), db.strides()], |line| {
        let [or, oa, ob] = line.offsets;
        let [sr, sa, sb] = line.strides;
        unsafe {
            zip_raw(
                line.len,
                pr.wrapping_offset(or),
                sr,
                pa.wrapping_offset(oa),
                sa,
                pb.wrapping_offset(ob),
                sb,
                &op,
            )
        };
    });
    dr.release();
    Ok(())
}

/// `res[i] = a[i] + b[i]`.
pub fn add<R, A, B>(res: &mut R, a: &A, b: &B) -> Result<()>
where
    R: BlockMut,
    A: Block<Element = R::Element>,
    B: Block<Element = R::Element>,
    R::Element: Add<Output = R::Element>,
{
    zip_into(res, a, b, |x, y| x + y)
}

/// `res[i] = a[i] * b[i]`.
pub fn mul<R, A, B>(res: &mut R, a: &A, b: &B) -> Result<()>
where
    R: BlockMut,
    A: Block<Element = R::Element>,
    B: Block<Element = R::Element>,
    R::Element: Mul<Output = R::Element>,
{
    zip_into(res, a, b, |x, y| x * y)
}

/// `y[i] = alpha * x[i] + y[i]`.
pub fn axpy<X, Y>(alpha: Y::Element, x: &X, y: &mut Y) -> Result<()>
where
    X: Block<Element = Y::Element>,
    Y: BlockMut,
    Y::Element: Add<Output = Y::Element> + Mul<Output = Y::Element>,
{
    ensure_same_dims(y.dims(), x.dims())?;
    let layout = kernel_layout(&*y);
    let order = layout.order.as_vec();
    let dx = Data::<_, In>::with_layout(x, layout)?;
    let mut dy = Data::<_, InOut>::with_layout(y, layout)?;
    let (px, py) = (dx.ptr(), dy.ptr_mut());
    for_each_line(dy.sizes(), &order, [dx.strides(), dy.strides()], |line| {
        let [ox, oy] = line.offsets;
        let [sx, sy] = line.strides;
        unsafe { axpy_raw(line.len, alpha, px.wrapping_offset(ox), sx, py.wrapping_offset(oy), sy) };
    });
    dy.release();
    Ok(())
}

/// `x[i] = alpha * x[i]`.
pub fn scale<B>(block: &mut B, alpha: B::Element) -> Result<()>
where
    B: BlockMut,
    B::Element: Mul<Output = B::Element>,
{
    let layout = kernel_layout(&*block);
    let order = layout.order.as_vec();
    let mut data = Data::<_, InOut>::with_layout(block, layout)?;
    let ptr = data.ptr_mut();
    for_each_line(data.sizes(), &order, [data.strides()], |line| {
        let [off] = line.offsets;
        let [s] = line.strides;
        unsafe { scale_raw(line.len, alpha, ptr.wrapping_offset(off), s) };
    });
    data.release();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Dense, Domain, Strided, Subview, Zip};
    use approx::assert_relative_eq;
    use num_complex::Complex64;

    #[test]
    fn test_sum_raw_negative_stride() {
        let v = [1.0f64, 2.0, 3.0, 4.0];
        let s = unsafe { sum_raw(2, v.as_ptr().add(3), -2) };
        assert_relative_eq!(s, 6.0);
    }

    #[test]
    fn test_sum_dense_and_strided() {
        let dense = Dense::from_fn(&[3, 4], DimOrder::col_major(2), |i| (i[0] * 4 + i[1]) as f64).unwrap();
        let mut strided = Strided::<f64>::new(&[3, 4], 0.0);
        for i in 0..3 {
            for j in 0..4 {
                strided.put(&[i, j], (i * 4 + j) as f64);
            }
        }
        assert_relative_eq!(sum(&dense).unwrap(), 66.0);
        assert_relative_eq!(sum(&strided).unwrap(), 66.0);
    }

    #[test]
    fn test_dot_shape_mismatch() {
        let a = Dense::<f32>::vector(3, 1.0);
        let b = Dense::<f32>::vector(4, 1.0);
        assert!(matches!(dot(&a, &b), Err(DdaError::ShapeMismatch(_, _))));
    }

    #[test]
    fn test_dot_mixed_orders() {
        let a = Dense::from_fn(&[2, 3], DimOrder::row_major(2), |i| (i[0] + i[1]) as f64).unwrap();
        let b = Dense::from_fn(&[2, 3], DimOrder::col_major(2), |i| (i[0] * i[1] + 1) as f64).unwrap();
        let expected: f64 = (0..2)
            .flat_map(|i| (0..3).map(move |j| ((i + j) * (i * j + 1)) as f64))
            .sum();
        assert_relative_eq!(dot(&a, &b).unwrap(), expected);
    }

    #[test]
    fn test_dotc_conjugates_first() {
        let a = Dense::from_slice(&[Complex64::new(0.0, 1.0)]);
        let b = Dense::from_slice(&[Complex64::new(0.0, 1.0)]);
        assert_eq!(dotc(&a, &b).unwrap(), Complex64::new(1.0, 0.0));
        assert_eq!(dot(&a, &b).unwrap(), Complex64::new(-1.0, 0.0));
    }

    #[test]
    fn test_add_into_reversed_subview() {
        let a = Dense::from_slice(&[1, 2, 3]);
        let b = Dense::from_slice(&[10, 20, 30]);
        let mut out = Dense::<i32>::vector(3, 0);
        {
            let mut rev = Subview::new(&mut out, &[Domain::reversed(3)]).unwrap();
            add(&mut rev, &a, &b).unwrap();
        }
        assert_eq!(out.as_slice(), &[33, 22, 11]);
    }

    #[test]
    fn test_mul_from_expression() {
        let a = Dense::from_slice(&[1.0f32, 2.0, 3.0]);
        let b = Dense::from_slice(&[2.0f32, 2.0, 2.0]);
        let s = Zip::add(&a, &b).unwrap();
        let mut out = Strided::<f32>::vector(3, 0.0);
        mul(&mut out, &s, &a).unwrap();
        assert_eq!(out.get(&[2]), 15.0);
    }

    #[test]
    fn test_axpy_and_scale() {
        let x = Dense::from_slice(&[1.0f64, 2.0, 3.0]);
        let mut y = Strided::<f64>::vector(3, 1.0);
        axpy(2.0, &x, &mut y).unwrap();
        scale(&mut y, 0.5).unwrap();
        assert_relative_eq!(y.get(&[0]), 1.5);
        assert_relative_eq!(y.get(&[2]), 3.5);
    }
}
