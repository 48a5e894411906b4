use super::dense::check_order;
use super::{check_indices, Block, BlockMut};
use crate::element::Element;
use crate::layout::{DimOrder, Layout, Packing};
use crate::view::{validate_bounds, SVec, StridedView, StridedViewMut};
use crate::{DdaError, Result, DEFAULT_ALIGNMENT, MAX_DIM};

/// Owned block with padded or otherwise non-contiguous storage.
///
/// The block reports the packing it was declared with rather than the one
/// its strides happen to have. The default declaration is [`Packing::Any`],
/// so a proxy asking for dense data copies, while one that accepts any
/// strides binds in place.
#[derive(Clone)]
pub struct Strided<T> {
    data: Vec<T>,
    dims: SVec<usize>,
    strides: SVec<isize>,
    order: DimOrder,
    packing: Packing,
}

impl<T: std::fmt::Debug> std::fmt::Debug for Strided<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strided")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("order", &self.order)
            .field("packing", &self.packing)
            .finish()
    }
}

impl<T: Element> Strided<T> {
    /// Row-major block whose rows are padded to [`DEFAULT_ALIGNMENT`]
    /// elements, declared with [`Packing::Any`].
    ///
    /// # Panics
    /// Panics if `dims` has more than [`MAX_DIM`] entries.
    pub fn new(dims: &[usize], fill: T) -> Self {
        assert!(dims.len() <= MAX_DIM, "dimension exceeds MAX_DIM");
        let order = DimOrder::row_major(dims.len());
        let padded = Layout::of::<T>(order, Packing::Aligned(DEFAULT_ALIGNMENT));
        let (strides, len) = padded
            .buffer_strides(dims)
            .unwrap_or_else(|_| (vec![1; dims.len()], 0));
        Self {
            data: vec![fill; len],
            dims: SVec::from_slice(dims),
            strides: SVec::from_vec(strides),
            order,
            packing: Packing::Any,
        }
    }

    /// 1-D block declared with [`Packing::Any`].
    pub fn vector(len: usize, fill: T) -> Self {
        Self::new(&[len], fill)
    }

    /// Block allocated and declared with the order and packing of `layout`.
    pub fn with_layout(dims: &[usize], layout: Layout, fill: T) -> Result<Self> {
        check_order(dims, &layout.order)?;
        if layout.format != T::FORMAT {
            return Err(DdaError::StorageFormatMismatch {
                requested: layout.format,
                element: T::FORMAT,
            });
        }
        let (strides, len) = layout.buffer_strides(dims)?;
        Ok(Self {
            data: vec![fill; len],
            dims: SVec::from_slice(dims),
            strides: SVec::from_vec(strides),
            order: layout.order,
            packing: layout.packing,
        })
    }

    /// Block with explicit positive strides, declared with [`Packing::Any`].
    ///
    /// The dimension order is derived from the strides.
    pub fn from_strides(dims: &[usize], strides: &[isize], fill: T) -> Result<Self> {
        if dims.len() != strides.len() {
            return Err(DdaError::StrideLengthMismatch);
        }
        if strides.iter().any(|&s| s <= 0) {
            return Err(DdaError::InvalidLayout("block strides must be positive"));
        }
        let len = if dims.contains(&0) {
            0
        } else {
            1 + dims
                .iter()
                .zip(strides)
                .map(|(&d, &s)| (d as isize - 1) * s)
                .sum::<isize>() as usize
        };
        validate_bounds(len, dims, strides, 0)?;
        Ok(Self {
            data: vec![fill; len],
            dims: SVec::from_slice(dims),
            strides: SVec::from_slice(strides),
            order: DimOrder::from_strides(strides)?,
            packing: Packing::Any,
        })
    }
}

impl<T> Strided<T> {
    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// Number of elements allocated, padding included.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
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

impl<T: Element> Block for Strided<T> {
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
        Some(Layout::of::<T>(self.order, self.packing))
    }

    fn storage(&self) -> Option<StridedView<'_, T>> {
        StridedView::new(&self.data, &self.dims, &self.strides, 0).ok()
    }
}

impl<T: Element> BlockMut for Strided<T> {
    #[inline]
    fn put(&mut self, index: &[usize], value: T) {
        let off = self.offset_of(index);
        self.data[off] = value;
    }

    fn storage_mut(&mut self) -> Option<StridedViewMut<'_, T>> {
        StridedViewMut::new(&mut self.data, &self.dims, &self.strides, 0).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pads_rows() {
        let block = Strided::<f32>::new(&[3, 5], 0.0);
        assert_eq!(block.strides(), &[DEFAULT_ALIGNMENT as isize, 1]);
        assert_eq!(block.capacity(), 3 * DEFAULT_ALIGNMENT);
        assert_eq!(block.native_layout().unwrap().packing, Packing::Any);
    }

    #[test]
    fn test_vector_is_unit_stride_but_declared_any() {
        let block = Strided::<f64>::vector(10, 1.0);
        assert_eq!(block.strides(), &[1]);
        assert_eq!(block.native_layout().unwrap().packing, Packing::Any);
    }

    #[test]
    fn test_from_strides() {
        let mut block = Strided::from_strides(&[4], &[3], 0i32).unwrap();
        assert_eq!(block.capacity(), 10);
        block.put(&[3], 5);
        assert_eq!(block.get(&[3]), 5);
        assert!(Strided::from_strides(&[4], &[0], 0i32).is_err());
        assert!(Strided::from_strides(&[4], &[1, 1], 0i32).is_err());
    }

    #[test]
    fn test_from_strides_col_order() {
        let block = Strided::from_strides(&[3, 4], &[2, 8], 0.0f32).unwrap();
        assert_eq!(block.native_layout().unwrap().order, DimOrder::col_major(2));
    }

    #[test]
    fn test_with_layout_aligned() {
        let layout = Layout::row_major(2).with_packing(Packing::Aligned(4));
        let block = Strided::with_layout(&[2, 3], layout, 0.0f32).unwrap();
        assert_eq!(block.strides(), &[4, 1]);
        assert_eq!(block.native_layout(), Some(layout));
    }
}
