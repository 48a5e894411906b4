use super::{check_indices, Block, BlockMut};
use crate::layout::{Layout, Packing};
use crate::view::{SVec, StridedView, StridedViewMut};
use crate::{DdaError, Result};
use std::ops::{Deref, DerefMut};

/// Index range along one dimension: `len` positions starting at `start`,
/// `stride` apart. A negative stride walks the parent backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Domain {
    pub start: usize,
    pub stride: isize,
    pub len: usize,
}

impl Domain {
    pub const fn new(start: usize, stride: isize, len: usize) -> Self {
        Self { start, stride, len }
    }

    /// Every position of a dimension of extent `len`, in order.
    pub const fn full(len: usize) -> Self {
        Self::new(0, 1, len)
    }

    /// Every position of a dimension of extent `len`, last first.
    pub const fn reversed(len: usize) -> Self {
        Self::new(len.saturating_sub(1), -1, len)
    }

    /// Parent position of the `i`-th element.
    #[inline]
    pub fn at(&self, i: usize) -> usize {
        (self.start as isize + i as isize * self.stride) as usize
    }

    fn check(&self, dim: usize, extent: usize) -> Result<()> {
        if self.len == 0 {
            return Ok(());
        }
        let last = self.start as isize + (self.len as isize - 1) * self.stride;
        for pos in [self.start as isize, last] {
            if pos < 0 || pos as usize >= extent {
                return Err(DdaError::IndexOutOfBounds {
                    dim,
                    index: pos.max(0) as usize,
                    size: extent,
                });
            }
        }
        Ok(())
    }
}

/// Non-owning view of another block.
///
/// `R` is any pointer to the parent block (`&B`, `&mut B`, `Box<B>`, ...).
/// The view never outlives the parent and never frees it; element access and
/// native storage both go through the parent.
pub struct Subview<R> {
    parent: R,
    domains: SVec<Domain>,
    dims: SVec<usize>,
}

impl<R> Subview<R>
where
    R: Deref,
    R::Target: Block,
{
    /// View `parent` through one [`Domain`] per dimension.
    pub fn new(parent: R, domains: &[Domain]) -> Result<Self> {
        let pdims = parent.dims();
        if domains.len() != pdims.len() {
            return Err(DdaError::DimensionMismatch {
                block: pdims.len(),
                requested: domains.len(),
            });
        }
        for (d, dom) in domains.iter().enumerate() {
            dom.check(d, pdims[d])?;
        }
        Ok(Self {
            dims: domains.iter().map(|d| d.len).collect(),
            domains: SVec::from_slice(domains),
            parent,
        })
    }

    /// View of the whole parent.
    pub fn whole(parent: R) -> Self {
        let domains = parent.dims().iter().map(|&n| Domain::full(n)).collect();
        let dims = parent.dims().iter().copied().collect();
        Self {
            parent,
            domains,
            dims,
        }
    }

    /// View with every dimension reversed.
    pub fn reversed(parent: R) -> Self {
        let domains = parent.dims().iter().map(|&n| Domain::reversed(n)).collect();
        let dims = parent.dims().iter().copied().collect();
        Self {
            parent,
            domains,
            dims,
        }
    }

    fn parent_index(&self, index: &[usize]) -> SVec<usize> {
        check_indices(&self.dims, index);
        index
            .iter()
            .zip(self.domains.iter())
            .map(|(&i, dom)| dom.at(i))
            .collect()
    }

    /// Offset shift and strides of this view inside parent storage.
    fn remap(&self, pstrides: &[isize]) -> (isize, SVec<isize>) {
        let shift = self
            .domains
            .iter()
            .zip(pstrides)
            .map(|(dom, &s)| dom.start as isize * s)
            .sum();
        let strides = self
            .domains
            .iter()
            .zip(pstrides)
            .map(|(dom, &s)| dom.stride * s)
            .collect();
        (shift, strides)
    }
}

impl<R> Block for Subview<R>
where
    R: Deref,
    R::Target: Block,
{
    type Element = <R::Target as Block>::Element;
    const DIRECT_ACCESS: bool = <R::Target as Block>::DIRECT_ACCESS;

    #[inline]
    fn dims(&self) -> &[usize] {
        &self.dims
    }

    fn get(&self, index: &[usize]) -> Self::Element {
        self.parent.get(&self.parent_index(index))
    }

    fn native_layout(&self) -> Option<Layout> {
        let native = self.parent.native_layout()?;
        let pview = self.parent.storage()?;
        let (_, strides) = self.remap(pview.strides());
        let actual = Packing::from_strides(&self.dims, &strides, &native.order);
        // Never promise more than the parent declares.
        let packing = if native.packing.satisfies(actual) {
            actual
        } else {
            native.packing
        };
        Some(Layout::new(native.order, packing, native.format))
    }

    fn storage(&self) -> Option<StridedView<'_, Self::Element>> {
        let pview = self.parent.storage()?;
        let (shift, strides) = self.remap(pview.strides());
        StridedView::new(pview.data(), &self.dims, &strides, pview.offset() + shift).ok()
    }

    fn global_from_local(&self, dim: usize, local: usize) -> usize {
        super::check_index(&self.dims, dim, local);
        self.parent.global_from_local(dim, self.domains[dim].at(local))
    }

    fn local_from_global(&self, dim: usize, global: usize) -> Option<usize> {
        let p = self.parent.local_from_global(dim, global)? as isize;
        let dom = self.domains[dim];
        let rel = p - dom.start as isize;
        if dom.stride == 0 || rel % dom.stride != 0 {
            return None;
        }
        let i = rel / dom.stride;
        (i >= 0 && (i as usize) < dom.len).then_some(i as usize)
    }
}

impl<R> BlockMut for Subview<R>
where
    R: DerefMut,
    R::Target: BlockMut,
{
    fn put(&mut self, index: &[usize], value: Self::Element) {
        let pidx = self.parent_index(index);
        self.parent.put(&pidx, value);
    }

    fn storage_mut(&mut self) -> Option<StridedViewMut<'_, Self::Element>> {
        let pstrides: SVec<isize> = SVec::from_slice(self.parent.storage()?.strides());
        let (shift, strides) = self.remap(&pstrides);
        let (data, _, _, offset) = self.parent.storage_mut()?.into_parts();
        StridedViewMut::new(data, &self.dims, &strides, offset + shift).ok()
    }
}

impl<R> std::fmt::Debug for Subview<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subview")
            .field("dims", &self.dims)
            .field("domains", &self.domains)
            .finish()
    }
}
