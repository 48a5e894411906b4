//! Buffer layout descriptors and the direct-vs-copy compatibility check.
//!
//! A [`Layout`] names three properties of a buffer:
//!
//! - the dimension order ([`DimOrder`]): which logical dimension varies slowest
//!   and which fastest in memory,
//! - the packing ([`Packing`]): how tightly the elements are laid out,
//! - the storage format ([`StorageFormat`]): real array, interleaved complex or
//!   split complex.
//!
//! [`compatible`] is the single decision point between binding a block's
//! native storage and copying through a temporary buffer.

use crate::element::Element;
use crate::{DdaError, Result, MAX_DIM};
use std::fmt;

// ============================================================================
// Dimension order
// ============================================================================

/// Permutation of `0..dim` describing how logical dimensions map to memory.
///
/// `get(0)` is the slowest-varying dimension, `get(dim - 1)` the fastest.
/// Row-major 2-D is `[0, 1]`, column-major 2-D is `[1, 0]`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DimOrder {
    dim: u8,
    perm: [u8; MAX_DIM],
}

impl DimOrder {
    /// Row-major (C) order: last index varies fastest.
    pub const fn row_major(dim: usize) -> Self {
        assert!(dim <= MAX_DIM, "dimension exceeds MAX_DIM");
        let mut perm = [0u8; MAX_DIM];
        let mut i = 0;
        while i < dim {
            perm[i] = i as u8;
            i += 1;
        }
        Self {
            dim: dim as u8,
            perm,
        }
    }

    /// Column-major (FORTRAN) order: first index varies fastest.
    pub const fn col_major(dim: usize) -> Self {
        assert!(dim <= MAX_DIM, "dimension exceeds MAX_DIM");
        let mut perm = [0u8; MAX_DIM];
        let mut i = 0;
        while i < dim {
            perm[i] = (dim - 1 - i) as u8;
            i += 1;
        }
        Self {
            dim: dim as u8,
            perm,
        }
    }

    /// Build an order from an explicit permutation, slowest dimension first.
    pub fn from_perm(perm: &[usize]) -> Result<Self> {
        if perm.len() > MAX_DIM {
            return Err(DdaError::InvalidLayout("dimension exceeds MAX_DIM"));
        }
        let mut seen = [false; MAX_DIM];
        let mut out = [0u8; MAX_DIM];
        for (slot, &p) in perm.iter().enumerate() {
            if p >= perm.len() || seen[p] {
                return Err(DdaError::InvalidLayout("dimension order is not a permutation"));
            }
            seen[p] = true;
            out[slot] = p as u8;
        }
        Ok(Self {
            dim: perm.len() as u8,
            perm: out,
        })
    }

    /// Derive the order implied by a set of strides: larger magnitude first.
    ///
    /// Ties (including size-1 dimensions) keep logical order, which makes a
    /// degenerate 2-D buffer read as row-major.
    pub fn from_strides(strides: &[isize]) -> Result<Self> {
        let mut perm: Vec<usize> = (0..strides.len()).collect();
        perm.sort_by(|&a, &b| {
            strides[b]
                .unsigned_abs()
                .cmp(&strides[a].unsigned_abs())
                .then_with(|| a.cmp(&b))
        });
        Self::from_perm(&perm)
    }

    /// Number of dimensions.
    #[inline]
    pub const fn dim(&self) -> usize {
        self.dim as usize
    }

    /// Logical dimension stored at position `pos` (0 = slowest).
    #[inline]
    pub const fn get(&self, pos: usize) -> usize {
        self.perm[pos] as usize
    }

    /// Logical dimension that varies fastest in memory.
    #[inline]
    pub fn fastest(&self) -> Option<usize> {
        (self.dim > 0).then(|| self.get(self.dim() - 1))
    }

    /// The permutation, slowest dimension first.
    pub fn as_vec(&self) -> Vec<usize> {
        (0..self.dim()).map(|p| self.get(p)).collect()
    }

    /// Iterate logical dimensions from slowest to fastest.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.dim()).map(move |p| self.get(p))
    }
}

impl fmt::Debug for DimOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// ============================================================================
// Packing and storage format
// ============================================================================

/// How tightly elements are packed in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Packing {
    /// Arbitrary, possibly negative or padded strides.
    Any,
    /// Fastest dimension has stride 1, others arbitrary.
    UnitStride,
    /// Contiguous with no padding.
    Dense,
    /// Fastest dimension has stride 1 and every slower stride is a multiple
    /// of the given element count. Mandates padding.
    Aligned(usize),
}

impl Packing {
    /// Whether a buffer packed as `self` meets a `required` packing.
    pub const fn satisfies(self, required: Packing) -> bool {
        match (self, required) {
            (_, Packing::Any) => true,
            (Packing::Dense, Packing::Dense) => true,
            (Packing::Dense | Packing::UnitStride | Packing::Aligned(_), Packing::UnitStride) => {
                true
            }
            (Packing::Aligned(have), Packing::Aligned(want)) => want != 0 && have % want == 0,
            _ => false,
        }
    }

    /// Classify actual strides under a given dimension order.
    ///
    /// Size-1 dimensions never disqualify a buffer from being dense.
    pub fn from_strides(dims: &[usize], strides: &[isize], order: &DimOrder) -> Packing {
        debug_assert_eq!(dims.len(), strides.len());
        debug_assert_eq!(dims.len(), order.dim());
        let mut expected = 1isize;
        let mut dense = true;
        for pos in (0..order.dim()).rev() {
            let d = order.get(pos);
            if dims[d] <= 1 {
                continue;
            }
            if strides[d] != expected {
                dense = false;
                break;
            }
            expected *= dims[d] as isize;
        }
        if dense {
            return Packing::Dense;
        }
        match order.fastest() {
            Some(f) if strides[f] == 1 || dims[f] <= 1 => {
                if strides.iter().all(|&s| s >= 0) {
                    Packing::UnitStride
                } else {
                    Packing::Any
                }
            }
            _ => Packing::Any,
        }
    }
}

/// Element storage format of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageFormat {
    /// Plain array of (real) scalars.
    Array,
    /// Complex values with real and imaginary parts adjacent.
    InterleavedComplex,
    /// Complex values stored as separate real and imaginary planes.
    SplitComplex,
}

// ============================================================================
// Layout
// ============================================================================

/// Dimension order, packing and storage format of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layout {
    pub order: DimOrder,
    pub packing: Packing,
    pub format: StorageFormat,
}

impl Layout {
    pub const fn new(order: DimOrder, packing: Packing, format: StorageFormat) -> Self {
        Self {
            order,
            packing,
            format,
        }
    }

    /// Dense row-major real layout.
    pub const fn row_major(dim: usize) -> Self {
        Self::new(DimOrder::row_major(dim), Packing::Dense, StorageFormat::Array)
    }

    /// Dense column-major real layout.
    pub const fn col_major(dim: usize) -> Self {
        Self::new(DimOrder::col_major(dim), Packing::Dense, StorageFormat::Array)
    }

    /// Row-major layout that accepts any strides.
    pub const fn any(dim: usize) -> Self {
        Self::new(DimOrder::row_major(dim), Packing::Any, StorageFormat::Array)
    }

    /// Layout in the natural storage format of element type `T`.
    pub const fn of<T: Element>(order: DimOrder, packing: Packing) -> Self {
        Self::new(order, packing, T::FORMAT)
    }

    /// Same layout with a different packing.
    pub const fn with_packing(self, packing: Packing) -> Self {
        Self { packing, ..self }
    }

    /// Same layout with a different storage format.
    pub const fn with_format(self, format: StorageFormat) -> Self {
        Self { format, ..self }
    }

    /// Number of dimensions.
    #[inline]
    pub const fn dim(&self) -> usize {
        self.order.dim()
    }

    /// Strides of a freshly allocated buffer with this layout and the given
    /// extents, together with the number of elements the buffer needs.
    ///
    /// `Any`, `UnitStride` and `Dense` all allocate densely; `Aligned(n)`
    /// rounds every run of the fastest dimension up to a multiple of `n`.
    pub fn buffer_strides(&self, dims: &[usize]) -> Result<(Vec<isize>, usize)> {
        if dims.len() != self.dim() {
            return Err(DdaError::DimensionMismatch {
                block: dims.len(),
                requested: self.dim(),
            });
        }
        if dims.contains(&0) {
            return Ok((vec![1; dims.len()], 0));
        }
        let align = match self.packing {
            Packing::Aligned(0) => {
                return Err(DdaError::InvalidLayout("alignment must be non-zero"));
            }
            Packing::Aligned(n) => n,
            _ => 1,
        };
        let mut strides = vec![0isize; dims.len()];
        let mut step = 1usize;
        for pos in (0..self.dim()).rev() {
            let d = self.order.get(pos);
            strides[d] = isize::try_from(step).map_err(|_| DdaError::OffsetOverflow)?;
            let mut run = step.checked_mul(dims[d]).ok_or(DdaError::OffsetOverflow)?;
            if pos == self.dim() - 1 && self.dim() > 1 {
                run = run.div_ceil(align) * align;
            }
            step = run;
        }
        Ok((strides, step))
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-d {:?} {:?} {:?}",
            self.dim(),
            self.order,
            self.packing,
            self.format
        )
    }
}

/// Whether a buffer with the `native` layout can serve a `requested` layout
/// without copying.
///
/// Dimension orders must be identical, `native` packing must satisfy the
/// requested packing, and storage formats must match exactly. A 1-D request
/// is also served by any dense native layout, whose storage is then a single
/// contiguous run.
pub const fn compatible(requested: &Layout, native: &Layout) -> bool {
    if !same_format(requested.format, native.format) {
        return false;
    }
    if requested.dim() == 1 && native.dim() > 1 {
        return matches!(native.packing, Packing::Dense)
            && native.packing.satisfies(requested.packing);
    }
    same_order(&requested.order, &native.order) && native.packing.satisfies(requested.packing)
}

const fn same_format(a: StorageFormat, b: StorageFormat) -> bool {
    matches!(
        (a, b),
        (StorageFormat::Array, StorageFormat::Array)
            | (StorageFormat::InterleavedComplex, StorageFormat::InterleavedComplex)
            | (StorageFormat::SplitComplex, StorageFormat::SplitComplex)
    )
}

const fn same_order(a: &DimOrder, b: &DimOrder) -> bool {
    if a.dim() != b.dim() {
        return false;
    }
    let mut i = 0;
    while i < a.dim() {
        if a.get(i) != b.get(i) {
            return false;
        }
        i += 1;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    #[test]
    fn test_layout_of_element_format() {
        let real = Layout::of::<f32>(DimOrder::col_major(2), Packing::Dense);
        assert_eq!(real, Layout::col_major(2));
        let complex = Layout::of::<Complex64>(DimOrder::row_major(3), Packing::Any);
        assert_eq!(complex, Layout::any(3).with_format(StorageFormat::InterleavedComplex));
    }

    #[test]
    fn test_row_col_major_orders() {
        assert_eq!(DimOrder::row_major(3).as_vec(), vec![0, 1, 2]);
        assert_eq!(DimOrder::col_major(3).as_vec(), vec![2, 1, 0]);
        assert_eq!(DimOrder::col_major(2).fastest(), Some(0));
        assert_eq!(DimOrder::row_major(0).fastest(), None);
    }

    #[test]
    fn test_from_perm_rejects_non_permutation() {
        assert!(DimOrder::from_perm(&[0, 0]).is_err());
        assert!(DimOrder::from_perm(&[0, 2]).is_err());
        assert!(DimOrder::from_perm(&[0, 1, 2, 3]).is_err());
        assert_eq!(DimOrder::from_perm(&[1, 0]).unwrap(), DimOrder::col_major(2));
    }

    #[test]
    fn test_from_strides() {
        assert_eq!(DimOrder::from_strides(&[15, 1]).unwrap(), DimOrder::row_major(2));
        assert_eq!(DimOrder::from_strides(&[1, 10]).unwrap(), DimOrder::col_major(2));
        assert_eq!(DimOrder::from_strides(&[-1]).unwrap(), DimOrder::row_major(1));
    }

    #[test]
    fn test_packing_satisfies() {
        assert!(Packing::Dense.satisfies(Packing::Any));
        assert!(Packing::Dense.satisfies(Packing::UnitStride));
        assert!(Packing::Dense.satisfies(Packing::Dense));
        assert!(!Packing::Dense.satisfies(Packing::Aligned(16)));
        assert!(Packing::Aligned(16).satisfies(Packing::Aligned(8)));
        assert!(!Packing::Aligned(8).satisfies(Packing::Aligned(16)));
        assert!(Packing::Aligned(16).satisfies(Packing::UnitStride));
        assert!(!Packing::Aligned(16).satisfies(Packing::Dense));
        assert!(!Packing::Any.satisfies(Packing::UnitStride));
        assert!(Packing::Any.satisfies(Packing::Any));
    }

    #[test]
    fn test_packing_from_strides() {
        let row = DimOrder::row_major(2);
        assert_eq!(Packing::from_strides(&[4, 5], &[5, 1], &row), Packing::Dense);
        assert_eq!(Packing::from_strides(&[4, 5], &[16, 1], &row), Packing::UnitStride);
        assert_eq!(Packing::from_strides(&[4, 5], &[10, 2], &row), Packing::Any);
        let one = DimOrder::row_major(1);
        assert_eq!(Packing::from_strides(&[6], &[-1], &one), Packing::Any);
        assert_eq!(Packing::from_strides(&[1], &[7], &one), Packing::Dense);
    }

    #[test]
    fn test_compatible() {
        let row = Layout::row_major(2);
        let col = Layout::col_major(2);
        assert!(compatible(&row, &row));
        assert!(!compatible(&col, &row));
        assert!(compatible(&Layout::any(2), &row));
        assert!(!compatible(&row, &Layout::any(2)));
        assert!(!compatible(
            &row.with_format(StorageFormat::SplitComplex),
            &row.with_format(StorageFormat::InterleavedComplex)
        ));
        // 1-D flattening of a dense block.
        assert!(compatible(&Layout::row_major(1), &col));
        assert!(!compatible(&Layout::row_major(1), &Layout::any(2)));
    }

    #[test]
    fn test_compatible_is_const() {
        const OK: bool = compatible(&Layout::row_major(2), &Layout::row_major(2));
        assert!(OK);
    }

    #[test]
    fn test_buffer_strides_dense() {
        let (s, len) = Layout::row_major(2).buffer_strides(&[10, 15]).unwrap();
        assert_eq!(s, vec![15, 1]);
        assert_eq!(len, 150);
        let (s, len) = Layout::col_major(2).buffer_strides(&[10, 15]).unwrap();
        assert_eq!(s, vec![1, 10]);
        assert_eq!(len, 150);
    }

    #[test]
    fn test_buffer_strides_aligned() {
        let layout = Layout::row_major(2).with_packing(Packing::Aligned(8));
        let (s, len) = layout.buffer_strides(&[3, 5]).unwrap();
        assert_eq!(s, vec![8, 1]);
        assert_eq!(len, 24);
        assert!(Layout::row_major(2)
            .with_packing(Packing::Aligned(0))
            .buffer_strides(&[3, 5])
            .is_err());
    }

    #[test]
    fn test_buffer_strides_dim_mismatch() {
        assert!(matches!(
            Layout::row_major(2).buffer_strides(&[3]),
            Err(DdaError::DimensionMismatch { block: 1, requested: 2 })
        ));
    }
}
