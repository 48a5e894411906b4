//! Block abstraction: logical arrays with element access and, optionally,
//! exportable native storage.
//!
//! # Block variants
//!
//! - [`Dense`]: owned, contiguous, any dimension order
//! - [`Strided`]: owned, padded or arbitrary positive strides
//! - [`Subview`]: non-owning view of another block (start, signed step, length
//!   per dimension)
//! - [`Distributed`]: the local portion of a block distributed by a [`Map`]
//! - [`Zip`]: lazily evaluated element-wise combination of two blocks; has no
//!   storage of its own
//!
//! [`Map`]: crate::Map

mod dense;
mod distributed;
mod expr;
mod strided;
mod subview;

pub use dense::Dense;
pub use distributed::Distributed;
pub use expr::Zip;
pub use strided::Strided;
pub use subview::{Domain, Subview};

use crate::element::Element;
use crate::layout::Layout;
use crate::view::{StridedView, StridedViewMut};

/// Read access to a block, plus its native-storage capability.
pub trait Block {
    type Element: Element;

    /// Whether blocks of this type can ever export native storage.
    ///
    /// When `false` every data proxy over this block type takes the copy path,
    /// and the decision folds away at compile time.
    const DIRECT_ACCESS: bool;

    /// Extent of each dimension.
    fn dims(&self) -> &[usize];

    /// Number of dimensions.
    #[inline]
    fn dim(&self) -> usize {
        self.dims().len()
    }

    /// Total number of elements.
    #[inline]
    fn size(&self) -> usize {
        self.dims().iter().product()
    }

    /// Read one element.
    ///
    /// # Panics
    /// Panics if `index` lies outside the block's extents.
    fn get(&self, index: &[usize]) -> Self::Element;

    /// Layout of the native storage, or `None` when the block has none.
    fn native_layout(&self) -> Option<Layout>;

    /// Native storage as a strided view whose offset points at the first
    /// logical element.
    fn storage(&self) -> Option<StridedView<'_, Self::Element>>;

    /// Global coordinate of a local index along `dim`.
    ///
    /// Identity for blocks that are not distributed.
    ///
    /// # Panics
    /// Panics if `local` is outside the extent of `dim`.
    #[inline]
    fn global_from_local(&self, dim: usize, local: usize) -> usize {
        check_index(self.dims(), dim, local);
        local
    }

    /// Local index of a global coordinate along `dim`, or `None` when this
    /// process does not hold it.
    #[inline]
    fn local_from_global(&self, dim: usize, global: usize) -> Option<usize> {
        (global < self.dims()[dim]).then_some(global)
    }
}

/// Write access to a block.
pub trait BlockMut: Block {
    /// Write one element.
    ///
    /// # Panics
    /// Panics if `index` lies outside the block's extents.
    fn put(&mut self, index: &[usize], value: Self::Element);

    /// Native storage as a mutable strided view.
    fn storage_mut(&mut self) -> Option<StridedViewMut<'_, Self::Element>>;
}

impl<B: Block> Block for &B {
    type Element = B::Element;
    const DIRECT_ACCESS: bool = B::DIRECT_ACCESS;

    #[inline]
    fn dims(&self) -> &[usize] {
        (**self).dims()
    }

    #[inline]
    fn get(&self, index: &[usize]) -> Self::Element {
        (**self).get(index)
    }

    fn native_layout(&self) -> Option<Layout> {
        (**self).native_layout()
    }

    fn storage(&self) -> Option<StridedView<'_, Self::Element>> {
        (**self).storage()
    }

    #[inline]
    fn global_from_local(&self, dim: usize, local: usize) -> usize {
        (**self).global_from_local(dim, local)
    }

    #[inline]
    fn local_from_global(&self, dim: usize, global: usize) -> Option<usize> {
        (**self).local_from_global(dim, global)
    }
}

/// Panic unless `index` is a valid position along `dim`.
#[inline]
pub(crate) fn check_index(dims: &[usize], dim: usize, index: usize) {
    assert!(
        dim < dims.len(),
        "dimension {} out of range for {}-d block",
        dim,
        dims.len()
    );
    assert!(
        index < dims[dim],
        "index {} out of bounds for dim {} of size {}",
        index,
        dim,
        dims[dim]
    );
}

/// Panic unless every component of `index` is within `dims`.
#[inline]
pub(crate) fn check_indices(dims: &[usize], index: &[usize]) {
    assert_eq!(index.len(), dims.len(), "wrong number of indices");
    for (d, &i) in index.iter().enumerate() {
        check_index(dims, d, i);
    }
}
