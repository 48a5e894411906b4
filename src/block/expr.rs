use super::Block;
use crate::layout::Layout;
use crate::view::StridedView;
use crate::{DdaError, Result};
use std::ops::{Add, Mul};

/// Lazily evaluated element-wise combination of two blocks of equal extents.
///
/// Each `get` evaluates `op` on the operands' elements. There is no storage
/// behind a `Zip`, so every data proxy over one takes the copy path.
pub struct Zip<A, B, F> {
    lhs: A,
    rhs: B,
    op: F,
}

impl<A, B, F> Zip<A, B, F>
where
    A: Block,
    B: Block,
    F: Fn(A::Element, B::Element) -> A::Element,
{
    pub fn new(lhs: A, rhs: B, op: F) -> Result<Self> {
        if lhs.dims() != rhs.dims() {
            return Err(DdaError::ShapeMismatch(lhs.dims().to_vec(), rhs.dims().to_vec()));
        }
        Ok(Self { lhs, rhs, op })
    }
}

impl<A, B> Zip<A, B, fn(A::Element, B::Element) -> A::Element>
where
    A: Block,
    B: Block,
{
    /// `lhs + rhs`, element by element.
    pub fn add(lhs: A, rhs: B) -> Result<Self>
    where
        A::Element: Add<B::Element, Output = A::Element>,
    {
        Self::new(lhs, rhs, |a, b| a + b)
    }

    /// `lhs * rhs`, element by element.
    pub fn mul(lhs: A, rhs: B) -> Result<Self>
    where
        A::Element: Mul<B::Element, Output = A::Element>,
    {
        Self::new(lhs, rhs, |a, b| a * b)
    }
}

impl<A, B, F> Block for Zip<A, B, F>
where
    A: Block,
    B: Block,
    F: Fn(A::Element, B::Element) -> A::Element,
{
    type Element = A::Element;
    const DIRECT_ACCESS: bool = false;

    #[inline]
    fn dims(&self) -> &[usize] {
        self.lhs.dims()
    }

    #[inline]
    fn get(&self, index: &[usize]) -> A::Element {
        (self.op)(self.lhs.get(index), self.rhs.get(index))
    }

    fn native_layout(&self) -> Option<Layout> {
        None
    }

    fn storage(&self) -> Option<StridedView<'_, A::Element>> {
        None
    }

    fn global_from_local(&self, dim: usize, local: usize) -> usize {
        self.lhs.global_from_local(dim, local)
    }

    fn local_from_global(&self, dim: usize, global: usize) -> Option<usize> {
        self.lhs.local_from_global(dim, global)
    }
}

impl<A, B, F> std::fmt::Debug for Zip<A, B, F>
where
    A: Block,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zip").field("dims", &self.lhs.dims()).finish()
    }
}
