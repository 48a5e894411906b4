//! Split-complex access to complex blocks.
//!
//! Complex blocks store their elements interleaved. A [`SplitData`] proxy
//! presents them as two separate planes, one of real parts and one of
//! imaginary parts, sharing the same strides. Since no block stores complex
//! values split, this always goes through a temporary buffer.

use crate::accessor::check_request;
use crate::block::{Block, BlockMut};
use crate::cost::{self, AccessPath};
use crate::data::{default_layout, CopyPlan, Target, Writer};
use crate::element::{ComplexElement, Element};
use crate::layout::{Layout, StorageFormat};
use crate::mode::{AccessMode, In, WriteMode};
use crate::{DdaError, Result};
use std::marker::PhantomData;

type Real<B> = <<B as Block>::Element as ComplexElement>::Real;

/// Scoped split-complex access to a complex block.
///
/// Release semantics match [`Data`](crate::Data): buffers are filled from the
/// block for reading modes and written back once for writing modes, unless
/// the proxy is dropped during a panic.
pub struct SplitData<'a, B: Block, M: AccessMode = In>
where
    B::Element: ComplexElement,
{
    target: Target<'a, B>,
    plan: CopyPlan,
    re: Vec<Real<B>>,
    im: Vec<Real<B>>,
    layout: Layout,
    cost: usize,
    released: bool,
    _mode: PhantomData<M>,
}

impl<'a, B: Block> SplitData<'a, B, In>
where
    B::Element: ComplexElement,
{
    /// Read access in a dense split layout with the block's own order.
    pub fn new(block: &'a B) -> Result<Self> {
        let layout = default_layout(block, StorageFormat::SplitComplex);
        Self::with_layout(block, layout)
    }

    /// Read access in `layout`, whose format must be split complex.
    pub fn with_layout(block: &'a B, layout: Layout) -> Result<Self> {
        check_split(block, &layout)?;
        Self::build(Target::Shared(block), layout)
    }
}

impl<'a, B: BlockMut, M: WriteMode> SplitData<'a, B, M>
where
    B::Element: ComplexElement,
{
    /// Write access in a dense split layout with the block's own order.
    pub fn new(block: &'a mut B) -> Result<Self> {
        let layout = default_layout(&*block, StorageFormat::SplitComplex);
        Self::with_layout(block, layout)
    }

    /// Write access in `layout`, whose format must be split complex.
    pub fn with_layout(block: &'a mut B, layout: Layout) -> Result<Self> {
        check_split(&*block, &layout)?;
        Self::build(Target::Unique(block, Writer::new()), layout)
    }

    /// Mutable addresses of the first real and imaginary parts.
    pub fn ptr_mut(&mut self) -> (*mut Real<B>, *mut Real<B>) {
        (self.re.as_mut_ptr(), self.im.as_mut_ptr())
    }

    pub fn real_mut(&mut self) -> &mut [Real<B>] {
        &mut self.re
    }

    pub fn imag_mut(&mut self) -> &mut [Real<B>] {
        &mut self.im
    }

    /// Both planes at once.
    pub fn parts_mut(&mut self) -> (&mut [Real<B>], &mut [Real<B>]) {
        (&mut self.re, &mut self.im)
    }
}

impl<'a, B: Block, M: AccessMode> SplitData<'a, B, M>
where
    B::Element: ComplexElement,
{
    fn build(target: Target<'a, B>, layout: Layout) -> Result<Self> {
        let plan = CopyPlan::new(target.block(), &layout)?;
        let zero = Real::<B>::default();
        let mut re = vec![zero; plan.buf_len()];
        let mut im = vec![zero; plan.buf_len()];
        if M::READS {
            plan.gather(target.block(), |i, v: B::Element| {
                re[i] = v.re();
                im[i] = v.im();
            });
        }
        let cost = cost::copy_cost(plan.len(), M::KIND);
        log::debug!(
            "split copy for {} as {}: {} elements",
            std::any::type_name::<B>(),
            layout,
            plan.len()
        );
        Ok(Self {
            target,
            plan,
            re,
            im,
            layout,
            cost,
            released: false,
            _mode: PhantomData,
        })
    }

    /// Addresses of the first real and imaginary parts.
    pub fn ptr(&self) -> (*const Real<B>, *const Real<B>) {
        (self.re.as_ptr(), self.im.as_ptr())
    }

    /// Real parts, laid out with [`strides`](Self::strides).
    pub fn real(&self) -> &[Real<B>] {
        &self.re
    }

    /// Imaginary parts, laid out with [`strides`](Self::strides).
    pub fn imag(&self) -> &[Real<B>] {
        &self.im
    }

    #[inline]
    pub fn stride(&self, dim: usize) -> isize {
        self.plan.strides()[dim]
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        self.plan.strides()
    }

    #[inline]
    pub fn size(&self, dim: usize) -> usize {
        self.plan.sizes()[dim]
    }

    #[inline]
    pub fn sizes(&self) -> &[usize] {
        self.plan.sizes()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.plan.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Always [`AccessPath::Copy`].
    #[inline]
    pub fn path(&self) -> AccessPath {
        AccessPath::Copy
    }

    #[inline]
    pub fn cost(&self) -> usize {
        self.cost
    }

    /// End the access, writing the planes back if the mode requires.
    pub fn release(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if std::mem::replace(&mut self.released, true) || !M::WRITES {
            return;
        }
        if std::thread::panicking() {
            log::debug!("skipping split write-back during unwind");
            return;
        }
        if let Target::Unique(block, writer) = &mut self.target {
            let (re, im) = (&self.re, &self.im);
            self.plan.scatter(&mut **block, writer, |i| {
                B::Element::from_parts(re[i], im[i])
            });
        }
    }
}

impl<B: Block, M: AccessMode> Drop for SplitData<'_, B, M>
where
    B::Element: ComplexElement,
{
    fn drop(&mut self) {
        self.finish();
    }
}

impl<B: Block, M: AccessMode> std::fmt::Debug for SplitData<'_, B, M>
where
    B::Element: ComplexElement,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitData")
            .field("layout", &self.layout)
            .field("sizes", &self.sizes())
            .field("strides", &self.strides())
            .field("cost", &self.cost)
            .finish()
    }
}

fn check_split<B: Block + ?Sized>(block: &B, layout: &Layout) -> Result<()> {
    if layout.format != StorageFormat::SplitComplex {
        return Err(DdaError::StorageFormatMismatch {
            requested: layout.format,
            element: StorageFormat::SplitComplex,
        });
    }
    check_request(block, &layout.with_format(<B::Element as Element>::FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Dense;
    use crate::mode::{InOut, Out};
    use num_complex::Complex64;

    fn sample() -> Dense<Complex64> {
        Dense::from_fn(&[2, 3], crate::DimOrder::row_major(2), |i| {
            Complex64::new(i[0] as f64, i[1] as f64 + 10.0)
        })
        .unwrap()
    }

    #[test]
    fn test_split_planes() {
        let block = sample();
        let split = SplitData::<_, In>::new(&block).unwrap();
        assert_eq!(split.path(), AccessPath::Copy);
        assert_eq!(split.strides(), &[3, 1]);
        assert_eq!(split.real(), &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        assert_eq!(split.imag(), &[10.0, 11.0, 12.0, 10.0, 11.0, 12.0]);
        assert_eq!(split.cost(), 6);
    }

    #[test]
    fn test_split_col_major() {
        let block = sample();
        let layout = Layout::col_major(2).with_format(StorageFormat::SplitComplex);
        let split = SplitData::<_, In>::with_layout(&block, layout).unwrap();
        assert_eq!(split.strides(), &[1, 2]);
        assert_eq!(split.real(), &[0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_split_write_back() {
        let mut block = sample();
        {
            let mut split = SplitData::<_, InOut>::new(&mut block).unwrap();
            assert_eq!(split.cost(), 12);
            let (re, im) = split.parts_mut();
            re[4] = -1.0;
            im[4] = -2.0;
        }
        assert_eq!(block.get(&[1, 1]), Complex64::new(-1.0, -2.0));
        assert_eq!(block.get(&[0, 0]), Complex64::new(0.0, 10.0));
    }

    #[test]
    fn test_split_out_starts_zeroed() {
        let mut block = sample();
        let split = SplitData::<_, Out>::new(&mut block).unwrap();
        assert!(split.real().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_split_requires_split_format() {
        let block = sample();
        assert!(matches!(
            SplitData::<_, In>::with_layout(&block, Layout::row_major(2)),
            Err(DdaError::StorageFormatMismatch { .. })
        ));
    }
}
