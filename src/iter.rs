//! Strided iteration without raw pointer walking.
//!
//! [`StridedOffsets`] yields the signed storage offset of every element of a
//! strided region and [`for_each_index`] visits its logical indices. Both
//! walk dimensions in a caller-given order (slowest first), so the same loop
//! can follow either the block's storage order or a buffer's.

use crate::view::SVec;

/// Iterator over the storage offsets of a strided region.
///
/// In debug builds each offset is checked against the optional bound set
/// with [`StridedOffsets::bounded`].
#[derive(Debug, Clone)]
pub struct StridedOffsets {
    dims: SVec<usize>,
    strides: SVec<isize>,
    order: SVec<usize>,
    counter: SVec<usize>,
    current: isize,
    remaining: usize,
    bound: Option<usize>,
}

impl StridedOffsets {
    /// Offsets of `dims`/`strides` starting at `base`, visiting dimensions in
    /// `order` (slowest first, fastest last).
    pub fn new(dims: &[usize], strides: &[isize], order: &[usize], base: isize) -> Self {
        debug_assert_eq!(dims.len(), strides.len());
        debug_assert_eq!(dims.len(), order.len());
        let remaining = if dims.is_empty() {
            1
        } else {
            dims.iter().product()
        };
        Self {
            dims: SVec::from_slice(dims),
            strides: SVec::from_slice(strides),
            order: SVec::from_slice(order),
            counter: SVec::from_elem(0, dims.len()),
            current: base,
            remaining,
            bound: None,
        }
    }

    /// Check every yielded offset against `[0, len)` in debug builds.
    pub fn bounded(mut self, len: usize) -> Self {
        self.bound = Some(len);
        self
    }
}

impl Iterator for StridedOffsets {
    type Item = isize;

    fn next(&mut self) -> Option<isize> {
        if self.remaining == 0 {
            return None;
        }
        let out = self.current;
        if let Some(len) = self.bound {
            debug_assert!(
                out >= 0 && (out as usize) < len,
                "strided offset {} outside buffer of length {}",
                out,
                len
            );
        }
        self.remaining -= 1;
        if self.remaining > 0 {
            for &d in self.order.iter().rev() {
                self.counter[d] += 1;
                self.current += self.strides[d];
                if self.counter[d] < self.dims[d] {
                    break;
                }
                self.current -= self.strides[d] * self.dims[d] as isize;
                self.counter[d] = 0;
            }
        }
        Some(out)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for StridedOffsets {}

/// Whether visiting `dims`/`strides` in `order` walks consecutive elements.
///
/// Size-1 dimensions are ignored. Empty regions count as contiguous.
pub fn is_contiguous(dims: &[usize], strides: &[isize], order: &[usize]) -> bool {
    let mut expected = 1isize;
    for &d in order.iter().rev() {
        if dims[d] == 0 {
            return true;
        }
        if dims[d] == 1 {
            continue;
        }
        if strides[d] != expected {
            return false;
        }
        expected *= dims[d] as isize;
    }
    true
}

/// Call `f` with every logical index of `dims`, fastest dimension last in
/// `order`.
pub fn for_each_index(dims: &[usize], order: &[usize], mut f: impl FnMut(&[usize])) {
    debug_assert_eq!(dims.len(), order.len());
    if dims.contains(&0) {
        return;
    }
    let total: usize = dims.iter().product();
    let mut idx: SVec<usize> = SVec::from_elem(0, dims.len());
    for _ in 0..total {
        f(&idx);
        for &d in order.iter().rev() {
            idx[d] += 1;
            if idx[d] < dims[d] {
                break;
            }
            idx[d] = 0;
        }
    }
}
