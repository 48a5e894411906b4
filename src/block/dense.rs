use super::{check_indices, Block, BlockMut};
use crate::element::Element;
use crate::iter::for_each_index;
use crate::layout::{DimOrder, Layout, Packing};
use crate::view::{SVec, StridedView, StridedViewMut};
use crate::{DdaError, Result, MAX_DIM};

/// Owned contiguous block in any dimension order.
///
/// Always exports its storage, so a data proxy requesting the block's own
/// order binds in place.
#[derive(Clone)]
pub struct Dense<T> {
    data: Vec<T>,
    dims: SVec<usize>,
    strides: SVec<isize>,
    order: DimOrder,
}

impl<T: std::fmt::Debug> std::fmt::Debug for Dense<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dense")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("order", &self.order)
            .finish()
    }
}

impl<T: Element> Dense<T> {
    /// Block of the given extents and dimension order, filled with `fill`.
    pub fn new(dims: &[usize], order: DimOrder, fill: T) -> Result<Self> {
        check_order(dims, &order)?;
        Ok(Self::with_order(dims, order, fill))
    }

    /// Row-major (C) block filled with `fill`.
    ///
    /// # Panics
    /// Panics if `dims` has more than [`MAX_DIM`] entries.
    pub fn row_major(dims: &[usize], fill: T) -> Self {
        assert!(dims.len() <= MAX_DIM, "dimension exceeds MAX_DIM");
        Self::with_order(dims, DimOrder::row_major(dims.len()), fill)
    }

    /// Column-major (FORTRAN) block filled with `fill`.
    ///
    /// # Panics
    /// Panics if `dims` has more than [`MAX_DIM`] entries.
    pub fn col_major(dims: &[usize], fill: T) -> Self {
        assert!(dims.len() <= MAX_DIM, "dimension exceeds MAX_DIM");
        Self::with_order(dims, DimOrder::col_major(dims.len()), fill)
    }

    /// 1-D block.
    pub fn vector(len: usize, fill: T) -> Self {
        Self::row_major(&[len], fill)
    }

    /// 1-D block holding a copy of `values`.
    pub fn from_slice(values: &[T]) -> Self {
        Self {
            data: values.to_vec(),
            dims: SVec::from_slice(&[values.len()]),
            strides: SVec::from_slice(&[1]),
            order: DimOrder::row_major(1),
        }
    }

    /// Block with values produced by `f`, called once per logical index.
    pub fn from_fn(dims: &[usize], order: DimOrder, mut f: impl FnMut(&[usize]) -> T) -> Result<Self> {
        let mut block = Self::new(dims, order, T::default())?;
        let visit = order.as_vec();
        let strides = block.strides.clone();
        let data = &mut block.data;
        for_each_index(dims, &visit, |idx| {
            let off: isize = idx.iter().zip(strides.iter()).map(|(&i, &s)| i as isize * s).sum();
            data[off as usize] = f(idx);
        });
        Ok(block)
    }

    fn with_order(dims: &[usize], order: DimOrder, fill: T) -> Self {
        let strides = order_strides(dims, &order);
        let len = dims.iter().product();
        Self {
            data: vec![fill; len],
            dims: SVec::from_slice(dims),
            strides,
            order,
        }
    }
}

impl<T> Dense<T> {
    #[inline]
    pub fn order(&self) -> DimOrder {
        self.order
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// Underlying storage in memory order.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    #[inline]
    fn offset_of(&self, index: &[usize]) -> usize {
        check_indices(&self.dims, index);
        index
            .iter()
            .zip(self.strides.iter())
            .map(|(&i, &s)| i * s as usize)
            .sum()
    }
}

impl<T: Element> Block for Dense<T> {
    type Element = T;
    const DIRECT_ACCESS: bool = true;

    #[inline]
    fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    fn get(&self, index: &[usize]) -> T {
        self.data[self.offset_of(index)]
    }

    fn native_layout(&self) -> Option<Layout> {
        Some(Layout::of::<T>(self.order, Packing::Dense))
    }

    fn storage(&self) -> Option<StridedView<'_, T>> {
        StridedView::new(&self.data, &self.dims, &self.strides, 0).ok()
    }
}

impl<T: Element> BlockMut for Dense<T> {
    #[inline]
    fn put(&mut self, index: &[usize], value: T) {
        let off = self.offset_of(index);
        self.data[off] = value;
    }

    fn storage_mut(&mut self) -> Option<StridedViewMut<'_, T>> {
        StridedViewMut::new(&mut self.data, &self.dims, &self.strides, 0).ok()
    }
}

pub(crate) fn check_order(dims: &[usize], order: &DimOrder) -> Result<()> {
    if dims.len() != order.dim() {
        return Err(DdaError::DimensionMismatch {
            block: dims.len(),
            requested: order.dim(),
        });
    }
    Ok(())
}

/// Dense strides for `dims` stored in `order`.
pub(crate) fn order_strides(dims: &[usize], order: &DimOrder) -> SVec<isize> {
    let mut strides: SVec<isize> = SVec::from_elem(1, dims.len());
    let mut step = 1isize;
    for pos in (0..order.dim()).rev() {
        let d = order.get(pos);
        strides[d] = step;
        step *= dims[d].max(1) as isize;
    }
    strides
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_strides() {
        let block = Dense::<f32>::row_major(&[10, 15], 0.0);
        assert_eq!(block.strides(), &[15, 1]);
        assert_eq!(block.size(), 150);
    }

    #[test]
    fn test_col_major_strides() {
        let block = Dense::<f32>::col_major(&[10, 15], 0.0);
        assert_eq!(block.strides(), &[1, 10]);
        assert_eq!(block.native_layout(), Some(Layout::col_major(2)));
    }

    #[test]
    fn test_get_put() {
        let mut block = Dense::<i32>::col_major(&[3, 4], 0);
        block.put(&[2, 1], 7);
        assert_eq!(block.get(&[2, 1]), 7);
        assert_eq!(block.as_slice()[2 + 3], 7);
    }

    #[test]
    fn test_from_fn() {
        let block = Dense::from_fn(&[2, 3], DimOrder::col_major(2), |idx| {
            (idx[0] * 10 + idx[1]) as i64
        })
        .unwrap();
        assert_eq!(block.as_slice(), &[0, 10, 1, 11, 2, 12]);
    }

    #[test]
    fn test_new_rejects_order_mismatch() {
        assert!(Dense::new(&[2, 3], DimOrder::row_major(1), 0.0f64).is_err());
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_get_out_of_bounds() {
        let block = Dense::<f32>::vector(4, 0.0);
        block.get(&[4]);
    }

    #[test]
    fn test_storage_view() {
        let block = Dense::from_slice(&[1.0f64, 2.0, 3.0]);
        let view = block.storage().unwrap();
        assert_eq!(view.dims(), &[3]);
        assert_eq!(view.strides(), &[1]);
        assert_eq!(view.get(&[2]), 3.0);
    }
}
