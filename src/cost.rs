//! Direct-vs-copy path selection and access cost.
//!
//! The cost of an access is the number of element transfers it performs
//! between a block and a temporary buffer: zero on the direct path, positive
//! on the copy path.

use crate::block::Block;
use crate::layout::{compatible, Layout};
use crate::mode::AccessKind;

/// How a data proxy reaches the block's elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessPath {
    /// Bound in place to the block's native storage.
    Direct,
    /// Through a temporary buffer with the requested layout.
    Copy,
}

impl AccessPath {
    #[inline]
    pub const fn is_direct(self) -> bool {
        matches!(self, AccessPath::Direct)
    }
}

/// Path for a block whose native layout is `native` (`None` when it has no
/// exportable storage) and a `requested` layout.
///
/// The access mode never changes the path, only what the copy path costs.
pub const fn select(native: Option<&Layout>, requested: &Layout) -> AccessPath {
    match native {
        Some(native) if compatible(requested, native) => AccessPath::Direct,
        _ => AccessPath::Copy,
    }
}

/// Path known from the block type alone.
///
/// `Some(Copy)` for block types that never export storage; `None` when the
/// decision depends on the block's runtime layout.
pub const fn static_path<B: Block>() -> Option<AccessPath> {
    if B::DIRECT_ACCESS {
        None
    } else {
        Some(AccessPath::Copy)
    }
}

/// Path for a particular block and request.
///
/// Block types without direct access resolve to `Copy` without consulting
/// the block.
pub fn resolve<B: Block + ?Sized>(block: &B, requested: &Layout) -> AccessPath {
    if !B::DIRECT_ACCESS || block.storage().is_none() {
        return AccessPath::Copy;
    }
    select(block.native_layout().as_ref(), requested)
}

/// Element transfers performed by a copy-path access to `len` elements.
///
/// Never zero, so an empty copy still reads as a copy.
pub const fn copy_cost(len: usize, kind: AccessKind) -> usize {
    let n = if len == 0 { 1 } else { len };
    match kind {
        AccessKind::InOut => n.saturating_mul(2),
        AccessKind::In | AccessKind::Out => n,
    }
}

/// Cost of an access along `path`.
pub const fn cost(path: AccessPath, len: usize, kind: AccessKind) -> usize {
    match path {
        AccessPath::Direct => 0,
        AccessPath::Copy => copy_cost(len, kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Dense, Strided, Zip};

    #[test]
    fn test_select() {
        let row = Layout::row_major(2);
        assert_eq!(select(Some(&row), &row), AccessPath::Direct);
        assert_eq!(select(Some(&row), &Layout::col_major(2)), AccessPath::Copy);
        assert_eq!(select(None, &row), AccessPath::Copy);
    }

    #[test]
    fn test_static_path() {
        assert_eq!(static_path::<Dense<f32>>(), None);
        assert_eq!(
            static_path::<Zip<&Dense<f32>, &Dense<f32>, fn(f32, f32) -> f32>>(),
            Some(AccessPath::Copy)
        );
    }

    #[test]
    fn test_resolve_strided() {
        let block = Strided::<f32>::vector(10, 0.0);
        assert_eq!(resolve(&block, &Layout::row_major(1)), AccessPath::Copy);
        assert_eq!(resolve(&block, &Layout::any(1)), AccessPath::Direct);
    }

    #[test]
    fn test_costs() {
        assert_eq!(cost(AccessPath::Direct, 100, AccessKind::InOut), 0);
        assert_eq!(cost(AccessPath::Copy, 100, AccessKind::In), 100);
        assert_eq!(cost(AccessPath::Copy, 100, AccessKind::Out), 100);
        assert_eq!(cost(AccessPath::Copy, 100, AccessKind::InOut), 200);
        assert_eq!(copy_cost(0, AccessKind::In), 1);
    }
}
