//! Dynamic-rank strided views over borrowed storage.
//!
//! - [`StridedView`]: immutable view
//! - [`StridedViewMut`]: mutable view
//!
//! A view is a slice plus a signed element offset of the first logical
//! element, a size per dimension and a signed stride per dimension. These are
//! what blocks hand out when they expose native storage, and what [`Data`]
//! hands to safe consumers.
//!
//! [`Data`]: crate::Data

use crate::iter::StridedOffsets;
use crate::{DdaError, Result};
use smallvec::SmallVec;

pub(crate) type SVec<T> = SmallVec<[T; 4]>;

/// Check that every element of a `dims`/`strides` region starting at
/// `offset` lies inside a slice of length `len`.
pub(crate) fn validate_bounds(
    len: usize,
    dims: &[usize],
    strides: &[isize],
    offset: isize,
) -> Result<()> {
    if dims.len() != strides.len() {
        return Err(DdaError::StrideLengthMismatch);
    }
    if dims.contains(&0) {
        return Ok(());
    }
    let (mut lo, mut hi) = (offset, offset);
    for (&n, &s) in dims.iter().zip(strides) {
        let reach = s
            .checked_mul(n as isize - 1)
            .ok_or(DdaError::OffsetOverflow)?;
        let end = if reach < 0 { &mut lo } else { &mut hi };
        *end = end.checked_add(reach).ok_or(DdaError::OffsetOverflow)?;
    }
    if lo < 0 || hi as usize >= len {
        return Err(DdaError::OffsetOverflow);
    }
    Ok(())
}

/// Element offset of `indices`, panicking when an index is out of range.
#[inline]
fn checked_offset(dims: &[usize], strides: &[isize], indices: &[usize]) -> isize {
    assert_eq!(indices.len(), dims.len(), "wrong number of indices");
    let mut idx = 0isize;
    for (i, &index) in indices.iter().enumerate() {
        assert!(
            index < dims[i],
            "index {} out of bounds for dim {}",
            index,
            dims[i]
        );
        idx += index as isize * strides[i];
    }
    idx
}

// ============================================================================
// StridedView
// ============================================================================

/// Dynamic-rank immutable strided view.
pub struct StridedView<'a, T> {
    data: &'a [T],
    dims: SVec<usize>,
    strides: SVec<isize>,
    offset: isize,
}

impl<T> Clone for StridedView<'_, T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
        }
    }
}

impl<T> std::fmt::Debug for StridedView<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StridedView")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<'a, T> StridedView<'a, T> {
    /// Create a new immutable strided view from a borrowed slice.
    ///
    /// `offset` is the position of the first logical element in `data`;
    /// strides may be negative as long as every element stays in bounds.
    pub fn new(data: &'a [T], dims: &[usize], strides: &[isize], offset: isize) -> Result<Self> {
        validate_bounds(data.len(), dims, strides, offset)?;
        Ok(Self {
            data,
            dims: SVec::from_slice(dims),
            strides: SVec::from_slice(strides),
            offset,
        })
    }

    /// Create a view without bounds checking.
    ///
    /// # Safety
    /// The caller must ensure all index combinations stay within bounds.
    pub unsafe fn new_unchecked(
        data: &'a [T],
        dims: &[usize],
        strides: &[isize],
        offset: isize,
    ) -> Self {
        Self {
            data,
            dims: SVec::from_slice(dims),
            strides: SVec::from_slice(strides),
            offset,
        }
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> isize {
        self.offset
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|&d| d == 0)
    }

    #[inline]
    pub fn data(&self) -> &'a [T] {
        self.data
    }

    /// Raw const pointer to the first logical element.
    #[inline]
    pub fn ptr(&self) -> *const T {
        self.data.as_ptr().wrapping_offset(self.offset)
    }

    /// Storage offsets of all elements, visiting dimensions in `order`
    /// (slowest first).
    pub fn offsets(&self, order: &[usize]) -> StridedOffsets {
        StridedOffsets::new(&self.dims, &self.strides, order, self.offset)
    }
}

impl<'a, T: Copy> StridedView<'a, T> {
    /// Get an element.
    ///
    /// # Panics
    /// Panics if the index is out of bounds.
    pub fn get(&self, indices: &[usize]) -> T {
        let idx = checked_offset(&self.dims, &self.strides, indices);
        self.data[(self.offset + idx) as usize]
    }

}

// ============================================================================
// StridedViewMut
// ============================================================================

/// Dynamic-rank mutable strided view.
pub struct StridedViewMut<'a, T> {
    data: &'a mut [T],
    dims: SVec<usize>,
    strides: SVec<isize>,
    offset: isize,
}

impl<T> std::fmt::Debug for StridedViewMut<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StridedViewMut")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<'a, T> StridedViewMut<'a, T> {
    /// Create a new mutable strided view.
    ///
    /// Strides that alias two logical indices onto one element are the
    /// caller's responsibility.
    pub fn new(
        data: &'a mut [T],
        dims: &[usize],
        strides: &[isize],
        offset: isize,
    ) -> Result<Self> {
        validate_bounds(data.len(), dims, strides, offset)?;
        Ok(Self {
            data,
            dims: SVec::from_slice(dims),
            strides: SVec::from_slice(strides),
            offset,
        })
    }

    /// Create without bounds checking.
    ///
    /// # Safety
    /// Caller must ensure all index combinations stay within bounds.
    pub unsafe fn new_unchecked(
        data: &'a mut [T],
        dims: &[usize],
        strides: &[isize],
        offset: isize,
    ) -> Self {
        Self {
            data,
            dims: SVec::from_slice(dims),
            strides: SVec::from_slice(strides),
            offset,
        }
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> isize {
        self.offset
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|&d| d == 0)
    }

    /// Raw const pointer to the first logical element.
    #[inline]
    pub fn ptr(&self) -> *const T {
        self.data.as_ptr().wrapping_offset(self.offset)
    }

    /// Raw mutable pointer to the first logical element.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.data.as_mut_ptr().wrapping_offset(self.offset)
    }

    /// Split into the borrowed slice, dims, strides and offset.
    pub(crate) fn into_parts(self) -> (&'a mut [T], SVec<usize>, SVec<isize>, isize) {
        (self.data, self.dims, self.strides, self.offset)
    }

    /// Reborrow as a shorter-lived mutable view.
    pub fn reborrow(&mut self) -> StridedViewMut<'_, T> {
        StridedViewMut {
            data: &mut *self.data,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
        }
    }

    /// Reborrow as an immutable view.
    pub fn as_view(&self) -> StridedView<'_, T> {
        StridedView {
            data: &*self.data,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
        }
    }
}

impl<'a, T: Copy> StridedViewMut<'a, T> {
    /// Get an element.
    pub fn get(&self, indices: &[usize]) -> T {
        let idx = checked_offset(&self.dims, &self.strides, indices);
        self.data[(self.offset + idx) as usize]
    }

    /// Set an element.
    pub fn set(&mut self, indices: &[usize], value: T) {
        let idx = checked_offset(&self.dims, &self.strides, indices);
        self.data[(self.offset + idx) as usize] = value;
    }

    /// Overwrite every element with `value`.
    pub fn fill(&mut self, value: T) {
        let order: Vec<usize> = (0..self.dims.len()).collect();
        for off in StridedOffsets::new(&self.dims, &self.strides, &order, self.offset) {
            self.data[off as usize] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_bounds_negative_stride() {
        let data = [0.0f32; 6];
        assert!(StridedView::new(&data, &[6], &[-1], 5).is_ok());
        assert!(StridedView::new(&data, &[6], &[-1], 4).is_err());
        assert!(StridedView::new(&data, &[7], &[1], 0).is_err());
    }

    #[test]
    fn test_validate_bounds_mixed_strides() {
        // Rows walked backwards, columns forwards: offsets 8..=11 down to 0..=3.
        assert!(validate_bounds(12, &[3, 4], &[-4, 1], 8).is_ok());
        assert!(validate_bounds(12, &[3, 4], &[-4, 1], 7).is_err());
        assert!(validate_bounds(11, &[3, 4], &[-4, 1], 8).is_err());
        assert!(validate_bounds(0, &[0, 4], &[4, 1], 0).is_ok());
        assert!(matches!(
            validate_bounds(4, &[3], &[isize::MAX], 0),
            Err(DdaError::OffsetOverflow)
        ));
    }

    #[test]
    fn test_stride_length_mismatch() {
        let data = [0i32; 4];
        assert!(matches!(
            StridedView::new(&data, &[2, 2], &[1], 0),
            Err(DdaError::StrideLengthMismatch)
        ));
    }

    #[test]
    fn test_reversed_view_get() {
        let data = [1, 2, 3, 4, 5, 6];
        let view = StridedView::new(&data, &[6], &[-1], 5).unwrap();
        let items: Vec<i32> = (0..6).map(|i| view.get(&[i])).collect();
        assert_eq!(items, vec![6, 5, 4, 3, 2, 1]);
        assert_eq!(unsafe { *view.ptr() }, 6);
    }

    #[test]
    fn test_mut_set_and_fill() {
        let mut data = vec![0.0f64; 8];
        {
            let mut view = StridedViewMut::new(&mut data, &[4], &[2], 1).unwrap();
            view.fill(1.0);
            view.set(&[3], 9.0);
            assert_eq!(view.get(&[3]), 9.0);
        }
        assert_eq!(data, vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 9.0]);
    }

    #[test]
    #[should_panic]
    fn test_get_out_of_bounds() {
        let data = [0u8; 4];
        let view = StridedView::new(&data, &[4], &[1], 0).unwrap();
        view.get(&[4]);
    }
}
