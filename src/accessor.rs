//! Low-level direct data access.
//!
//! An [`Accessor`] binds to a block's native storage and never copies.
//! Binding a block type that cannot export storage is rejected at compile
//! time:
//!
//! ```compile_fail
//! use strided_dda::{block::Zip, Accessor, Dense, In};
//!
//! let a = Dense::from_slice(&[1.0f32, 2.0]);
//! let b = Dense::from_slice(&[3.0f32, 4.0]);
//! let sum = Zip::add(&a, &b).unwrap();
//! let _ = Accessor::<_, In>::new(&sum);
//! ```
//!
//! A block type that can export storage but whose runtime layout does not
//! match the request fails with [`DdaError::UnsupportedDirectAccess`].

use crate::block::{Block, BlockMut};
use crate::cost::{resolve, AccessPath};
use crate::element::Element;
use crate::layout::Layout;
use crate::mode::{AccessMode, In, WriteMode};
use crate::view::{StridedView, StridedViewMut};
use crate::{DdaError, Result};
use std::marker::PhantomData;

enum Binding<'a, T> {
    Shared(StridedView<'a, T>),
    Unique(StridedViewMut<'a, T>),
}

/// Direct, zero-copy binding to a block's native storage.
///
/// [`ptr`](Accessor::ptr) points at the first logical element; strides may
/// be negative and are applied from there. The pointer stays valid while the
/// accessor lives.
pub struct Accessor<'a, T, M = In> {
    binding: Binding<'a, T>,
    layout: Layout,
    _mode: PhantomData<M>,
}

impl<'a, T: Element> Accessor<'a, T, In> {
    /// Bind read-only with the block's own layout.
    pub fn new<B: Block<Element = T>>(block: &'a B) -> Result<Self> {
        const { assert!(B::DIRECT_ACCESS, "block type has no direct access") };
        let layout = block
            .native_layout()
            .ok_or(DdaError::UnsupportedDirectAccess(Layout::any(block.dim())))?;
        Self::with_layout(block, layout)
    }

    /// Bind read-only, requiring `layout`.
    pub fn with_layout<B: Block<Element = T>>(block: &'a B, layout: Layout) -> Result<Self> {
        const { assert!(B::DIRECT_ACCESS, "block type has no direct access") };
        check_request(block, &layout)?;
        if !resolve(block, &layout).is_direct() {
            return Err(DdaError::UnsupportedDirectAccess(layout));
        }
        Self::bind_shared(block, layout)
    }
}

impl<'a, T: Element, M: WriteMode> Accessor<'a, T, M> {
    /// Bind for writing with the block's own layout.
    pub fn new<B: BlockMut<Element = T>>(block: &'a mut B) -> Result<Self> {
        const { assert!(B::DIRECT_ACCESS, "block type has no direct access") };
        let layout = block
            .native_layout()
            .ok_or(DdaError::UnsupportedDirectAccess(Layout::any(block.dim())))?;
        Self::with_layout(block, layout)
    }

    /// Bind for writing, requiring `layout`.
    pub fn with_layout<B: BlockMut<Element = T>>(block: &'a mut B, layout: Layout) -> Result<Self> {
        const { assert!(B::DIRECT_ACCESS, "block type has no direct access") };
        check_request(&*block, &layout)?;
        if !resolve(&*block, &layout).is_direct() {
            return Err(DdaError::UnsupportedDirectAccess(layout));
        }
        Self::bind_unique(block, layout)
    }
}

impl<'a, T: Element, M: AccessMode> Accessor<'a, T, M> {
    /// Bind to storage already known to serve `layout`.
    pub(crate) fn bind_shared<B: Block<Element = T>>(block: &'a B, layout: Layout) -> Result<Self> {
        let view = block
            .storage()
            .ok_or(DdaError::UnsupportedDirectAccess(layout))?;
        let view = if flattens(block.dim(), &layout) {
            let len = view.len();
            StridedView::new(view.data(), &[len], &[1], view.offset())?
        } else {
            view
        };
        log::trace!("direct read binding {} dims {:?}", layout, view.dims());
        Ok(Self {
            binding: Binding::Shared(view),
            layout,
            _mode: PhantomData,
        })
    }

    pub(crate) fn bind_unique<B: BlockMut<Element = T>>(
        block: &'a mut B,
        layout: Layout,
    ) -> Result<Self> {
        let flatten = flattens(block.dim(), &layout);
        let view = block
            .storage_mut()
            .ok_or(DdaError::UnsupportedDirectAccess(layout))?;
        let view = if flatten {
            let len = view.len();
            let (data, _, _, offset) = view.into_parts();
            StridedViewMut::new(data, &[len], &[1], offset)?
        } else {
            view
        };
        log::trace!("direct write binding {} dims {:?}", layout, view.dims());
        Ok(Self {
            binding: Binding::Unique(view),
            layout,
            _mode: PhantomData,
        })
    }

    /// Address of the first logical element.
    #[inline]
    pub fn ptr(&self) -> *const T {
        match &self.binding {
            Binding::Shared(v) => v.ptr(),
            Binding::Unique(v) => v.ptr(),
        }
    }

    /// Step, in elements, along logical dimension `dim`.
    #[inline]
    pub fn stride(&self, dim: usize) -> isize {
        self.strides()[dim]
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        match &self.binding {
            Binding::Shared(v) => v.strides(),
            Binding::Unique(v) => v.strides(),
        }
    }

    /// Extent of logical dimension `dim`.
    #[inline]
    pub fn size(&self, dim: usize) -> usize {
        self.sizes()[dim]
    }

    #[inline]
    pub fn sizes(&self) -> &[usize] {
        match &self.binding {
            Binding::Shared(v) => v.dims(),
            Binding::Unique(v) => v.dims(),
        }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.sizes().len()
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.sizes().iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The layout this accessor was bound with.
    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Always [`AccessPath::Direct`].
    #[inline]
    pub fn path(&self) -> AccessPath {
        AccessPath::Direct
    }

    /// Bounds-checked view of the bound storage.
    pub fn view(&self) -> StridedView<'_, T> {
        match &self.binding {
            Binding::Shared(v) => v.clone(),
            Binding::Unique(v) => v.as_view(),
        }
    }
}

impl<'a, T: Element, M: WriteMode> Accessor<'a, T, M> {
    /// Mutable address of the first logical element.
    #[inline]
    pub fn ptr_mut(&mut self) -> *mut T {
        match &mut self.binding {
            Binding::Unique(v) => v.as_mut_ptr(),
            Binding::Shared(_) => unreachable!("write accessor bound to shared storage"),
        }
    }

    /// Bounds-checked mutable view of the bound storage.
    pub fn view_mut(&mut self) -> StridedViewMut<'_, T> {
        match &mut self.binding {
            Binding::Unique(v) => v.reborrow(),
            Binding::Shared(_) => unreachable!("write accessor bound to shared storage"),
        }
    }
}

impl<T, M> std::fmt::Debug for Accessor<'_, T, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (dims, strides) = match &self.binding {
            Binding::Shared(v) => (v.dims(), v.strides()),
            Binding::Unique(v) => (v.dims(), v.strides()),
        };
        f.debug_struct("Accessor")
            .field("layout", &self.layout)
            .field("dims", &dims)
            .field("strides", &strides)
            .finish()
    }
}

/// Whether `layout` is a 1-D request over a multi-dimensional block.
#[inline]
pub(crate) fn flattens(block_dim: usize, layout: &Layout) -> bool {
    layout.dim() == 1 && block_dim > 1
}

/// Reject requests no path can serve.
pub(crate) fn check_request<B: Block + ?Sized>(block: &B, layout: &Layout) -> Result<()> {
    if layout.dim() != block.dim() && !flattens(block.dim(), layout) {
        return Err(DdaError::DimensionMismatch {
            block: block.dim(),
            requested: layout.dim(),
        });
    }
    let element = <B::Element as Element>::FORMAT;
    if layout.format != element {
        return Err(DdaError::StorageFormatMismatch {
            requested: layout.format,
            element,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Dense, Domain, Strided, Subview};
    use crate::mode::InOut;

    #[test]
    fn test_dense_vector_low_level() {
        let mut block = Dense::<f32>::vector(10, 0.0);
        block.put(&[0], 1.0);
        block.put(&[1], 2.78);
        {
            let mut raw = Accessor::<_, InOut>::new(&mut block).unwrap();
            assert_eq!(raw.stride(0), 1);
            assert_eq!(raw.size(0), 10);
            let ptr = raw.ptr_mut();
            unsafe {
                assert_eq!(*ptr, 1.0);
                assert_eq!(*ptr.add(1), 2.78);
                *ptr.add(1) = 3.14;
                *ptr.add(2) = -1.5;
            }
        }
        assert_eq!(block.get(&[1]), 3.14);
        assert_eq!(block.get(&[2]), -1.5);
    }

    #[test]
    fn test_strided_binds_with_its_own_layout() {
        let block = Strided::<f64>::vector(10, 2.0);
        let raw = Accessor::<_, In>::new(&block).unwrap();
        assert_eq!(raw.stride(0), 1);
        assert_eq!(raw.path(), AccessPath::Direct);
        assert!(matches!(
            Accessor::<_, In>::with_layout(&block, Layout::row_major(1)),
            Err(DdaError::UnsupportedDirectAccess(_))
        ));
    }

    #[test]
    fn test_reversed_pointer_at_first_element() {
        let block = Dense::from_slice(&[1, 2, 3, 4, 5, 6]);
        let rev = Subview::new(&block, &[Domain::reversed(6)]).unwrap();
        let raw = Accessor::<_, In>::new(&rev).unwrap();
        assert_eq!(raw.stride(0), -1);
        let mut seen = Vec::new();
        for i in 0..raw.size(0) {
            seen.push(unsafe { *raw.ptr().offset(i as isize * raw.stride(0)) });
        }
        assert_eq!(seen, vec![6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_flattened_binding() {
        let block = Dense::<i32>::col_major(&[3, 4], 7);
        let raw = Accessor::<_, In>::with_layout(&block, Layout::row_major(1)).unwrap();
        assert_eq!(raw.sizes(), &[12]);
        assert_eq!(raw.strides(), &[1]);
        assert_eq!(raw.view().get(&[11]), 7);
    }

    #[test]
    fn test_request_errors() {
        let block = Dense::<f32>::row_major(&[2, 2, 2], 0.0);
        assert!(matches!(
            Accessor::<_, In>::with_layout(&block, Layout::row_major(2)),
            Err(DdaError::DimensionMismatch { block: 3, requested: 2 })
        ));
        let layout = Layout::row_major(3).with_format(crate::StorageFormat::SplitComplex);
        assert!(matches!(
            Accessor::<_, In>::with_layout(&block, layout),
            Err(DdaError::StorageFormatMismatch { .. })
        ));
    }

    #[test]
    fn test_view_mut_through_accessor() {
        let mut block = Dense::<f64>::row_major(&[2, 3], 0.0);
        {
            let mut raw = Accessor::<_, InOut>::new(&mut block).unwrap();
            raw.view_mut().set(&[1, 2], 4.5);
        }
        assert_eq!(block.get(&[1, 2]), 4.5);
    }
}
