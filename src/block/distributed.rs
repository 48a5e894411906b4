use super::{check_index, Block, BlockMut, Dense};
use crate::context::Context;
use crate::element::Element;
use crate::iter::for_each_index;
use crate::layout::{DimOrder, Layout};
use crate::map::Map;
use crate::view::{SVec, StridedView, StridedViewMut};
use crate::{DdaError, Result, MAX_DIM};

/// The part of a distributed block held by one process.
///
/// Element access, native layout and storage all refer to the local
/// portion, which is a row-major [`Dense`] block. Index translation maps
/// local positions to global coordinates through the block's [`Map`].
#[derive(Clone)]
pub struct Distributed<T> {
    global_dims: SVec<usize>,
    map: Map,
    subblock: Option<usize>,
    local: Dense<T>,
}

impl<T: std::fmt::Debug> std::fmt::Debug for Distributed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Distributed")
            .field("global_dims", &self.global_dims)
            .field("map", &self.map)
            .field("subblock", &self.subblock)
            .field("local", &self.local)
            .finish()
    }
}

impl<T: Element> Distributed<T> {
    /// Local portion, on the process described by `ctx`, of a block of
    /// `global_dims` distributed by `map`.
    pub fn new(global_dims: &[usize], map: Map, ctx: &Context, fill: T) -> Result<Self> {
        if global_dims.len() > MAX_DIM {
            return Err(DdaError::InvalidLayout("dimension exceeds MAX_DIM"));
        }
        if let Some(pset) = map.processors() {
            if let Some(&p) = pset.iter().find(|&&p| p >= ctx.size()) {
                return Err(DdaError::InvalidMap(format!(
                    "processor {} outside a group of {}",
                    p,
                    ctx.size()
                )));
            }
            if (global_dims.len()..MAX_DIM).any(|d| map.distribution(d).1 != 1) {
                return Err(DdaError::InvalidMap(format!(
                    "map splits dimensions a {}-d block does not have",
                    global_dims.len()
                )));
            }
        }
        let subblock = map.subblock_of(ctx.rank());
        let local_dims = map.local_dims(global_dims, ctx);
        log::trace!(
            "rank {} holds subblock {:?} of {:?}: {:?}",
            ctx.rank(),
            subblock,
            global_dims,
            local_dims
        );
        Ok(Self {
            global_dims: SVec::from_slice(global_dims),
            local: Dense::new(&local_dims, DimOrder::row_major(global_dims.len()), fill)?,
            map,
            subblock,
        })
    }

    /// Like [`Distributed::new`], with each local element set to `f` of its
    /// global index.
    pub fn from_global_fn(
        global_dims: &[usize],
        map: Map,
        ctx: &Context,
        mut f: impl FnMut(&[usize]) -> T,
    ) -> Result<Self> {
        let mut block = Self::new(global_dims, map, ctx, T::default())?;
        let dims: SVec<usize> = SVec::from_slice(block.dims());
        let order: Vec<usize> = (0..dims.len()).collect();
        let mut global: SVec<usize> = SVec::from_elem(0, dims.len());
        let sb = block.subblock.unwrap_or_default();
        let (map, global_dims, dense) = (&block.map, &block.global_dims, &mut block.local);
        for_each_index(&dims, &order, |local| {
            for (d, &l) in local.iter().enumerate() {
                global[d] = map.global_from_local(global_dims, sb, d, l);
            }
            dense.put(local, f(&global));
        });
        Ok(block)
    }
}

impl<T> Distributed<T> {
    pub fn global_dims(&self) -> &[usize] {
        &self.global_dims
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    /// Subblock held by this process, `None` outside the map's processors.
    pub fn subblock(&self) -> Option<usize> {
        self.subblock
    }

    pub fn local(&self) -> &Dense<T> {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut Dense<T> {
        &mut self.local
    }
}

impl<T: Element> Block for Distributed<T> {
    type Element = T;
    const DIRECT_ACCESS: bool = true;

    #[inline]
    fn dims(&self) -> &[usize] {
        self.local.dims()
    }

    #[inline]
    fn get(&self, index: &[usize]) -> T {
        self.local.get(index)
    }

    fn native_layout(&self) -> Option<Layout> {
        self.local.native_layout()
    }

    fn storage(&self) -> Option<StridedView<'_, T>> {
        self.local.storage()
    }

    fn global_from_local(&self, dim: usize, local: usize) -> usize {
        check_index(self.local.dims(), dim, local);
        // A non-empty local portion implies membership.
        let sb = self.subblock.unwrap_or_default();
        self.map.global_from_local(&self.global_dims, sb, dim, local)
    }

    fn local_from_global(&self, dim: usize, global: usize) -> Option<usize> {
        let sb = self.subblock?;
        self.map.local_from_global(&self.global_dims, sb, dim, global)
    }
}

impl<T: Element> BlockMut for Distributed<T> {
    #[inline]
    fn put(&mut self, index: &[usize], value: T) {
        self.local.put(index, value);
    }

    fn storage_mut(&mut self) -> Option<StridedViewMut<'_, T>> {
        self.local.storage_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_map_local_sizes() {
        let sizes: Vec<usize> = (0..4)
            .map(|rank| {
                let ctx = Context::new(rank, 4).unwrap();
                Distributed::new(&[10], Map::block(4), &ctx, 0.0f32)
                    .unwrap()
                    .size()
            })
            .collect();
        assert_eq!(sizes, vec![3, 3, 2, 2]);
    }

    #[test]
    fn test_global_from_local() {
        let ctx = Context::new(2, 4).unwrap();
        let block = Distributed::new(&[10], Map::block(4), &ctx, 0i32).unwrap();
        assert_eq!(block.global_from_local(0, 0), 6);
        assert_eq!(block.global_from_local(0, 1), 7);
        assert_eq!(block.local_from_global(0, 7), Some(1));
        assert_eq!(block.local_from_global(0, 8), None);
    }

    #[test]
    fn test_from_global_fn() {
        let ctx = Context::new(1, 2).unwrap();
        let block = Distributed::from_global_fn(&[5], Map::block(2), &ctx, |g| g[0] as f64).unwrap();
        assert_eq!(block.local().as_slice(), &[3.0, 4.0]);
    }

    #[test]
    fn test_outside_processor_set_is_empty() {
        let ctx = Context::new(0, 3).unwrap();
        let map = Map::with_processors(&[1, 2]).unwrap();
        let block = Distributed::new(&[8, 2], map, &ctx, 0u8).unwrap();
        assert_eq!(block.size(), 0);
        assert_eq!(block.subblock(), None);
        assert_eq!(block.local_from_global(0, 0), None);
    }

    #[test]
    fn test_rejects_processor_outside_group() {
        let ctx = Context::new(0, 2).unwrap();
        assert!(matches!(
            Distributed::new(&[4], Map::block(3), &ctx, 0.0f32),
            Err(DdaError::InvalidMap(_))
        ));
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_global_from_local_out_of_bounds() {
        let ctx = Context::new(3, 4).unwrap();
        let block = Distributed::new(&[10], Map::block(4), &ctx, 0i32).unwrap();
        block.global_from_local(0, 2);
    }
}
