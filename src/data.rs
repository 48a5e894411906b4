//! High-level direct data access: bind in place when possible, copy when not.
//!
//! A [`Data`] proxy always presents the *requested* layout. When the block's
//! native storage already has that layout the proxy wraps an [`Accessor`];
//! otherwise it owns a temporary buffer in the requested layout, filled from
//! the block for [`In`] and [`InOut`] access and written back for [`Out`] and
//! [`InOut`] access when the proxy is released.
//!
//! Write-back is all or nothing: it runs once, on [`Data::release`] or drop,
//! and is skipped entirely when the proxy is dropped during a panic.
//!
//! [`InOut`]: crate::InOut
//! [`Out`]: crate::Out

use crate::accessor::{check_request, flattens, Accessor};
use crate::block::{Block, BlockMut};
use crate::cost::{self, resolve, AccessPath};
use crate::element::Element;
use crate::iter::{for_each_index, is_contiguous, StridedOffsets};
use crate::layout::{DimOrder, Layout, Packing};
use crate::mode::{AccessMode, In, WriteMode};
use crate::view::{SVec, StridedView, StridedViewMut};
use crate::Result;

// ============================================================================
// Copy plan
// ============================================================================

/// Element mapping between a block and a temporary buffer.
pub(crate) struct CopyPlan {
    /// Block extents.
    dims: SVec<usize>,
    /// Block dimensions in visiting order, slowest first.
    visit: SVec<usize>,
    /// Buffer offset step per block dimension.
    steps: SVec<isize>,
    /// Buffer extents and strides as presented to the caller.
    sizes: SVec<usize>,
    strides: SVec<isize>,
    buf_len: usize,
}

impl CopyPlan {
    pub(crate) fn new<B: Block + ?Sized>(block: &B, layout: &Layout) -> Result<Self> {
        let dims = block.dims();
        let flat = flattens(block.dim(), layout);
        let plan_layout = if flat {
            // One contiguous run, in the block's own order.
            let order = block
                .native_layout()
                .map(|l| l.order)
                .filter(|o| o.dim() == dims.len())
                .unwrap_or_else(|| DimOrder::row_major(dims.len()));
            Layout::new(order, Packing::Dense, layout.format)
        } else {
            *layout
        };
        let (steps, buf_len) = plan_layout.buffer_strides(dims)?;
        let (sizes, strides) = if flat {
            (SVec::from_slice(&[block.size()]), SVec::from_slice(&[1]))
        } else {
            (SVec::from_slice(dims), SVec::from_slice(&steps))
        };
        Ok(Self {
            dims: SVec::from_slice(dims),
            visit: plan_layout.order.iter().collect(),
            steps: SVec::from_vec(steps),
            sizes,
            strides,
            buf_len,
        })
    }

    /// Number of block elements transferred.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub(crate) fn buf_len(&self) -> usize {
        self.buf_len
    }

    #[inline]
    pub(crate) fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    #[inline]
    pub(crate) fn strides(&self) -> &[isize] {
        &self.strides
    }

    fn buffer_offsets(&self) -> StridedOffsets {
        StridedOffsets::new(&self.dims, &self.steps, &self.visit, 0).bounded(self.buf_len)
    }

    fn buffer_sequential(&self) -> bool {
        is_contiguous(&self.dims, &self.steps, &self.visit)
    }

    /// Read every block element and hand it to `put` with its buffer offset.
    pub(crate) fn gather<B: Block + ?Sized>(&self, block: &B, mut put: impl FnMut(usize, B::Element)) {
        let len = self.len();
        if len == 0 {
            return;
        }
        if let Some(view) = block.storage() {
            let data = view.data();
            if self.buffer_sequential() && is_contiguous(view.dims(), view.strides(), &self.visit) {
                let base = view.offset() as usize;
                for (i, &v) in data[base..base + len].iter().enumerate() {
                    put(i, v);
                }
                return;
            }
            let src = view.offsets(&self.visit).bounded(data.len());
            for (s, d) in src.zip(self.buffer_offsets()) {
                put(d as usize, data[s as usize]);
            }
            return;
        }
        let mut dst = self.buffer_offsets();
        for_each_index(&self.dims, &self.visit, |idx| {
            if let Some(d) = dst.next() {
                put(d as usize, block.get(idx));
            }
        });
    }

    /// Write every block element, taking values from `take` by buffer offset.
    pub(crate) fn scatter<B: Block>(
        &self,
        block: &mut B,
        writer: &Writer<B>,
        mut take: impl FnMut(usize) -> B::Element,
    ) {
        let len = self.len();
        if len == 0 {
            return;
        }
        if let Some(view) = (writer.storage)(block) {
            let (data, dims, strides, offset) = view.into_parts();
            if self.buffer_sequential() && is_contiguous(&dims, &strides, &self.visit) {
                let base = offset as usize;
                for (i, slot) in data[base..base + len].iter_mut().enumerate() {
                    *slot = take(i);
                }
                return;
            }
            let dst = StridedOffsets::new(&dims, &strides, &self.visit, offset).bounded(data.len());
            for (d, s) in dst.zip(self.buffer_offsets()) {
                data[d as usize] = take(s as usize);
            }
            return;
        }
        let mut src = self.buffer_offsets();
        for_each_index(&self.dims, &self.visit, |idx| {
            if let Some(s) = src.next() {
                (writer.put)(block, idx, take(s as usize));
            }
        });
    }
}

/// Write entry points of a [`BlockMut`], captured where the bound is known so
/// that release code bounded only by [`Block`] can still write back.
pub(crate) struct Writer<B: Block> {
    put: fn(&mut B, &[usize], B::Element),
    storage: for<'b> fn(&'b mut B) -> Option<StridedViewMut<'b, B::Element>>,
}

impl<B: BlockMut> Writer<B> {
    pub(crate) fn new() -> Self {
        Self {
            put: <B as BlockMut>::put,
            storage: <B as BlockMut>::storage_mut,
        }
    }
}

/// The block a copy-path proxy was created over.
pub(crate) enum Target<'a, B: Block> {
    Shared(&'a B),
    Unique(&'a mut B, Writer<B>),
}

impl<B: Block> Target<'_, B> {
    pub(crate) fn block(&self) -> &B {
        match self {
            Target::Shared(b) => b,
            Target::Unique(b, _) => b,
        }
    }
}

/// Dense layout in the block's own order (row-major when it has none).
pub(crate) fn default_layout<B: Block + ?Sized>(block: &B, format: crate::StorageFormat) -> Layout {
    let order = block
        .native_layout()
        .map(|l| l.order)
        .filter(|o| o.dim() == block.dim())
        .unwrap_or_else(|| DimOrder::row_major(block.dim()));
    Layout::new(order, Packing::Dense, format)
}

// ============================================================================
// Data proxy
// ============================================================================

struct CopyBuffer<'a, B: Block> {
    target: Target<'a, B>,
    plan: CopyPlan,
    buf: Vec<B::Element>,
}

impl<B: Block> CopyBuffer<'_, B> {
    fn write_back(&mut self) {
        if let Target::Unique(block, writer) = &mut self.target {
            let buf = &self.buf;
            self.plan.scatter(&mut **block, writer, |i| buf[i]);
            log::trace!(
                "wrote back {} elements to {}",
                self.plan.len(),
                std::any::type_name::<B>()
            );
        }
    }
}

enum State<'a, B: Block, M> {
    Direct(Accessor<'a, B::Element, M>),
    Copy(CopyBuffer<'a, B>),
}

/// Scoped access to a block's elements through a pointer and strides in a
/// requested layout.
///
/// `M` is the access mode: [`In`] borrows the block shared, [`Out`] and
/// [`InOut`] borrow it exclusively. Whatever path is taken, [`ptr`],
/// [`strides`] and [`sizes`] describe the requested layout.
///
/// [`Out`]: crate::Out
/// [`InOut`]: crate::InOut
/// [`ptr`]: Data::ptr
/// [`strides`]: Data::strides
/// [`sizes`]: Data::sizes
pub struct Data<'a, B: Block, M: AccessMode = In> {
    state: State<'a, B, M>,
    layout: Layout,
    cost: usize,
    released: bool,
}

impl<'a, B: Block> Data<'a, B, In> {
    /// Read access in a dense layout with the block's own dimension order.
    pub fn new(block: &'a B) -> Result<Self> {
        let layout = default_layout(block, <B::Element as Element>::FORMAT);
        Self::with_layout(block, layout)
    }

    /// Read access in `layout`.
    pub fn with_layout(block: &'a B, layout: Layout) -> Result<Self> {
        check_request(block, &layout)?;
        if resolve(block, &layout).is_direct() {
            return Ok(Self::direct(Accessor::bind_shared(block, layout)?, layout));
        }
        let plan = CopyPlan::new(block, &layout)?;
        let mut buf = vec![B::Element::default(); plan.buf_len()];
        plan.gather(block, |i, v| buf[i] = v);
        let copy = CopyBuffer {
            target: Target::Shared(block),
            plan,
            buf,
        };
        Ok(Self::copied(copy, layout))
    }
}

impl<'a, B: BlockMut, M: WriteMode> Data<'a, B, M> {
    /// Write access in a dense layout with the block's own dimension order.
    pub fn new(block: &'a mut B) -> Result<Self> {
        let layout = default_layout(&*block, <B::Element as Element>::FORMAT);
        Self::with_layout(block, layout)
    }

    /// Write access in `layout`.
    ///
    /// On the copy path an [`Out`](crate::Out) buffer starts zeroed
    /// (`T::default()`) instead of holding the block's values.
    pub fn with_layout(block: &'a mut B, layout: Layout) -> Result<Self> {
        check_request(&*block, &layout)?;
        if resolve(&*block, &layout).is_direct() {
            return Ok(Self::direct(Accessor::bind_unique(block, layout)?, layout));
        }
        let plan = CopyPlan::new(&*block, &layout)?;
        let mut buf = vec![B::Element::default(); plan.buf_len()];
        if M::READS {
            plan.gather(&*block, |i, v| buf[i] = v);
        }
        let copy = CopyBuffer {
            target: Target::Unique(block, Writer::new()),
            plan,
            buf,
        };
        Ok(Self::copied(copy, layout))
    }

    /// Mutable address of the first element in the requested layout.
    #[inline]
    pub fn ptr_mut(&mut self) -> *mut B::Element {
        match &mut self.state {
            State::Direct(acc) => acc.ptr_mut(),
            State::Copy(c) => c.buf.as_mut_ptr(),
        }
    }

    /// Bounds-checked mutable view in the requested layout.
    pub fn view_mut(&mut self) -> StridedViewMut<'_, B::Element> {
        match &mut self.state {
            State::Direct(acc) => acc.view_mut(),
            // SAFETY: the buffer was allocated by `buffer_strides` for exactly
            // these sizes and strides.
            State::Copy(c) => unsafe {
                StridedViewMut::new_unchecked(&mut c.buf, &c.plan.sizes, &c.plan.strides, 0)
            },
        }
    }
}

impl<'a, B: Block, M: AccessMode> Data<'a, B, M> {
    fn direct(acc: Accessor<'a, B::Element, M>, layout: Layout) -> Self {
        Self {
            state: State::Direct(acc),
            layout,
            cost: 0,
            released: false,
        }
    }

    fn copied(copy: CopyBuffer<'a, B>, layout: Layout) -> Self {
        let cost = cost::copy_cost(copy.plan.len(), M::KIND);
        log::debug!(
            "copy path for {} as {} ({:?}): {} elements",
            std::any::type_name::<B>(),
            layout,
            M::KIND,
            copy.plan.len()
        );
        Self {
            state: State::Copy(copy),
            layout,
            cost,
            released: false,
        }
    }

    /// Path known from `B` alone; `None` when it is decided at binding.
    pub const fn static_path() -> Option<AccessPath> {
        cost::static_path::<B>()
    }

    /// Address of the first element in the requested layout.
    #[inline]
    pub fn ptr(&self) -> *const B::Element {
        match &self.state {
            State::Direct(acc) => acc.ptr(),
            State::Copy(c) => c.buf.as_ptr(),
        }
    }

    /// Step, in elements, along dimension `dim` of the requested layout.
    #[inline]
    pub fn stride(&self, dim: usize) -> isize {
        self.strides()[dim]
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        match &self.state {
            State::Direct(acc) => acc.strides(),
            State::Copy(c) => c.plan.strides(),
        }
    }

    /// Extent of dimension `dim` of the requested layout.
    #[inline]
    pub fn size(&self, dim: usize) -> usize {
        self.sizes()[dim]
    }

    #[inline]
    pub fn sizes(&self) -> &[usize] {
        match &self.state {
            State::Direct(acc) => acc.sizes(),
            State::Copy(c) => c.plan.sizes(),
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

    /// The requested layout.
    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    #[inline]
    pub fn path(&self) -> AccessPath {
        match self.state {
            State::Direct(_) => AccessPath::Direct,
            State::Copy(_) => AccessPath::Copy,
        }
    }

    /// Element transfers this access costs; zero on the direct path.
    #[inline]
    pub fn cost(&self) -> usize {
        self.cost
    }

    /// Bounds-checked view in the requested layout.
    pub fn view(&self) -> StridedView<'_, B::Element> {
        match &self.state {
            State::Direct(acc) => acc.view(),
            // SAFETY: see `view_mut`.
            State::Copy(c) => unsafe {
                StridedView::new_unchecked(&c.buf, &c.plan.sizes, &c.plan.strides, 0)
            },
        }
    }

    /// End the access, writing a copy-path buffer back if the mode requires.
    ///
    /// The proxy is consumed, so a second release does not compile:
    ///
    /// ```compile_fail
    /// use strided_dda::{Data, Dense, InOut};
    ///
    /// let mut block = Dense::from_slice(&[1.0f64, 2.0, 3.0]);
    /// let data = Data::<_, InOut>::new(&mut block).unwrap();
    /// data.release();
    /// data.release();
    /// ```
    pub fn release(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if std::mem::replace(&mut self.released, true) || !M::WRITES {
            return;
        }
        let State::Copy(copy) = &mut self.state else {
            return;
        };
        if std::thread::panicking() {
            log::debug!(
                "skipping write-back of {} elements during unwind",
                copy.plan.len()
            );
            return;
        }
        copy.write_back();
    }
}

/// Dropping an unreleased proxy releases it. While the thread is unwinding
/// the write-back is skipped, whatever panic started the unwind: a proxy
/// dropped by some other value's destructor during an unrelated panic leaves
/// the block untouched too.
impl<B: Block, M: AccessMode> Drop for Data<'_, B, M> {
    fn drop(&mut self) {
        self.finish();
    }
}

impl<B: Block, M: AccessMode> std::fmt::Debug for Data<'_, B, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("layout", &self.layout)
            .field("path", &self.path())
            .field("sizes", &self.sizes())
            .field("strides", &self.strides())
            .field("cost", &self.cost)
            .finish()
    }
}
