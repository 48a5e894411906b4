//! Direct data access (DDA) for dense, strided and distributed array blocks.
//!
//! This crate brokers raw buffer access between an abstract array [`Block`]
//! and numeric kernels that want a base pointer plus per-dimension strides.
//! When the block's native storage already has the requested layout the
//! buffer is bound in place (zero copy); otherwise a temporary buffer with
//! the requested layout is filled from the block and, for writable access,
//! copied back when the access ends.
//!
//! # Core Types
//!
//! - [`Layout`]: dimension order, packing and storage format of a buffer
//! - [`Block`] / [`BlockMut`]: element access plus native-storage capability
//! - [`Dense`], [`Strided`], [`Subview`], [`Distributed`]: block variants
//! - [`Accessor`]: low-level, direct-only binding to native storage
//! - [`Data`]: high-level proxy with copy fallback, bound to an access mode
//!   ([`In`], [`Out`], [`InOut`])
//! - [`SplitData`]: split-complex proxy for complex blocks
//!
//! # Example
//!
//! ```rust
//! use strided_dda::{Block, BlockMut, Data, Dense, InOut, Layout};
//!
//! let mut block = Dense::<f32>::row_major(&[10, 15], 0.0);
//! block.put(&[2, 3], 1.5);
//!
//! // Native layout requested: bound in place.
//! {
//!     let data = Data::<_, InOut>::new(&mut block).unwrap();
//!     assert_eq!(data.cost(), 0);
//!     assert_eq!(data.stride(0), 15);
//!     assert_eq!(data.stride(1), 1);
//! }
//!
//! // Column-major requested from a row-major block: copied, then written back.
//! {
//!     let mut data =
//!         Data::<_, InOut>::with_layout(&mut block, Layout::col_major(2)).unwrap();
//!     assert!(data.cost() > 0);
//!     assert_eq!(data.stride(0), 1);
//!     assert_eq!(data.stride(1), 10);
//!     data.view_mut().set(&[4, 5], 2.5);
//! }
//! assert_eq!(block.get(&[4, 5]), 2.5);
//! ```

mod accessor;
pub mod block;
mod context;
pub mod cost;
mod data;
mod element;
mod index;
pub mod iter;
pub mod kernels;
pub mod layout;
pub mod map;
mod mode;
mod split;
pub mod view;

#[cfg(feature = "blas")]
pub mod blas;

// ============================================================================
// Layout and blocks
// ============================================================================
pub use block::{Block, BlockMut, Dense, Distributed, Strided, Subview};
pub use element::{ComplexElement, Element};
pub use layout::{compatible, DimOrder, Layout, Packing, StorageFormat};

// ============================================================================
// Direct data access
// ============================================================================
pub use accessor::Accessor;
pub use cost::AccessPath;
pub use data::Data;
pub use mode::{AccessKind, AccessMode, In, InOut, Out, WriteMode};
pub use split::SplitData;
pub use view::{StridedView, StridedViewMut};

// ============================================================================
// Distribution
// ============================================================================
pub use context::Context;
pub use index::{global_from_local, is_local, local_from_global};
pub use map::{Distribution, Map};

// ============================================================================
// Kernels
// ============================================================================
pub use kernels::{add, dot, dotc, mul, scale, sum};

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of dimensions a block or layout can have.
pub const MAX_DIM: usize = 3;

/// Row padding, in elements, used by [`Strided::new`] for blocks of two or
/// more dimensions.
pub const DEFAULT_ALIGNMENT: usize = 16;

// ============================================================================
// Error types
// ============================================================================

/// Errors that can occur while brokering access to block storage.
#[derive(Debug, thiserror::Error)]
pub enum DdaError {
    /// A direct-only binding was requested but the block cannot export
    /// native storage with the requested layout.
    #[error("block cannot provide direct access with layout {0}")]
    UnsupportedDirectAccess(Layout),

    /// The requested layout has a dimension count the block cannot satisfy.
    #[error("dimension mismatch: block has {block} dims, layout requests {requested}")]
    DimensionMismatch { block: usize, requested: usize },

    /// The requested storage format does not match the element type.
    #[error("storage format {requested:?} is not usable for {element:?} elements")]
    StorageFormatMismatch {
        requested: StorageFormat,
        element: StorageFormat,
    },

    /// The layout descriptor itself is malformed.
    #[error("invalid layout: {0}")]
    InvalidLayout(&'static str),

    /// Operand shapes are incompatible for the operation.
    #[error("shape mismatch: {0:?} vs {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),

    /// Stride array length doesn't match dimensions.
    #[error("stride and dims length mismatch")]
    StrideLengthMismatch,

    /// Integer overflow, or an offset outside the underlying storage.
    #[error("offset overflow while computing pointer")]
    OffsetOverflow,

    /// An index lies outside the declared extents.
    #[error("index {index} out of bounds for dimension {dim} of size {size}")]
    IndexOutOfBounds { dim: usize, index: usize, size: usize },

    /// Rank/size pair does not describe a process in a process group.
    #[error("invalid context: rank {rank} of {size}")]
    InvalidContext { rank: usize, size: usize },

    /// A distribution map is inconsistent with its processor set or extents.
    #[error("invalid map: {0}")]
    InvalidMap(String),
}

/// Result type for direct data access operations.
pub type Result<T> = std::result::Result<T, DdaError>;
