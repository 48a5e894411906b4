//! Distribution maps: which process owns which part of a block.
//!
//! A [`Map`] splits each dimension of a global block into subblocks
//! according to a [`Distribution`], arranges the subblocks in a grid, and
//! assigns grid positions to processors in row-major order. The direct data
//! access layer only consumes the index rules here; it never moves data
//! between processes.

use crate::context::Context;
use crate::view::SVec;
use crate::{DdaError, Result};

/// How one dimension is split into subblocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Distribution {
    /// Not split: one subblock holds the whole extent.
    Whole,
    /// Contiguous runs of nearly equal length, longer runs first.
    Block,
    /// Element `g` lives on subblock `g % P`.
    Cyclic,
    /// Chunks of the given length dealt round-robin to subblocks.
    BlockCyclic(usize),
}

impl Distribution {
    fn chunk(self) -> usize {
        match self {
            Distribution::BlockCyclic(c) => c,
            _ => 1,
        }
    }

    /// Number of elements of a length-`len` dimension held by subblock `s`
    /// of `p`.
    pub fn local_len(self, len: usize, p: usize, s: usize) -> usize {
        debug_assert!(s < p);
        match self {
            Distribution::Whole => len,
            Distribution::Block => len / p + usize::from(s < len % p),
            Distribution::Cyclic | Distribution::BlockCyclic(_) => {
                let c = self.chunk();
                let chunks = len / c;
                let rem = len % c;
                let mut n = (chunks / p + usize::from(s < chunks % p)) * c;
                if chunks % p == s {
                    n += rem;
                }
                n
            }
        }
    }

    /// Global position of local element `l` on subblock `s` of `p`.
    pub fn global_from_local(self, len: usize, p: usize, s: usize, l: usize) -> usize {
        match self {
            Distribution::Whole => l,
            Distribution::Block => s * (len / p) + s.min(len % p) + l,
            Distribution::Cyclic | Distribution::BlockCyclic(_) => {
                let c = self.chunk();
                ((l / c) * p + s) * c + l % c
            }
        }
    }

    /// Owning subblock and local position of global element `g`.
    pub fn local_from_global(self, len: usize, p: usize, g: usize) -> (usize, usize) {
        match self {
            Distribution::Whole => (0, g),
            Distribution::Block => {
                let q = len / p;
                let r = len % p;
                let split = r * (q + 1);
                if g < split {
                    (g / (q + 1), g % (q + 1))
                } else {
                    (r + (g - split) / q, (g - split) % q)
                }
            }
            Distribution::Cyclic | Distribution::BlockCyclic(_) => {
                let c = self.chunk();
                let chunk = g / c;
                (chunk % p, (chunk / p) * c + g % c)
            }
        }
    }
}

/// Per-dimension distribution plus the processors holding the subblocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Map {
    /// `None`: every process holds the whole block.
    processors: Option<Vec<usize>>,
    dists: SVec<(Distribution, usize)>,
}

impl Map {
    /// Map under which every process holds the entire block.
    pub fn local() -> Self {
        Self {
            processors: None,
            dists: SVec::new(),
        }
    }

    /// `n` block-distributed subblocks along dimension 0 on processors
    /// `0..n`.
    ///
    /// # Panics
    /// Panics if `n` is zero.
    pub fn block(n: usize) -> Self {
        assert!(n > 0, "a map needs at least one subblock");
        Self {
            processors: Some((0..n).collect()),
            dists: SVec::from_slice(&[(Distribution::Block, n)]),
        }
    }

    /// `processors.len()` block-distributed subblocks along dimension 0,
    /// subblock `i` on `processors[i]`.
    pub fn with_processors(processors: &[usize]) -> Result<Self> {
        Self::new(processors, &[(Distribution::Block, processors.len())])
    }

    /// General map: one `(distribution, subblock count)` per leading
    /// dimension; dimensions past the list are [`Distribution::Whole`].
    ///
    /// The subblock grid must have exactly one cell per processor.
    pub fn new(processors: &[usize], dists: &[(Distribution, usize)]) -> Result<Self> {
        if processors.is_empty() {
            return Err(DdaError::InvalidMap("empty processor set".into()));
        }
        let mut sorted = processors.to_vec();
        sorted.sort_unstable();
        if sorted.windows(2).any(|w| w[0] == w[1]) {
            return Err(DdaError::InvalidMap("duplicate processor".into()));
        }
        for (d, &(dist, n)) in dists.iter().enumerate() {
            match dist {
                _ if n == 0 => {
                    return Err(DdaError::InvalidMap(format!("dimension {} has no subblocks", d)));
                }
                Distribution::Whole if n != 1 => {
                    return Err(DdaError::InvalidMap(format!(
                        "dimension {} is whole but split into {} subblocks",
                        d, n
                    )));
                }
                Distribution::BlockCyclic(0) => {
                    return Err(DdaError::InvalidMap(format!(
                        "dimension {} has a zero block-cyclic chunk",
                        d
                    )));
                }
                _ => {}
            }
        }
        let map = Self {
            processors: Some(processors.to_vec()),
            dists: SVec::from_slice(dists),
        };
        if map.num_subblocks() != processors.len() {
            return Err(DdaError::InvalidMap(format!(
                "{} subblocks for {} processors",
                map.num_subblocks(),
                processors.len()
            )));
        }
        Ok(map)
    }

    /// Whether every process holds the whole block.
    #[inline]
    pub fn is_local(&self) -> bool {
        self.processors.is_none()
    }

    pub fn processors(&self) -> Option<&[usize]> {
        self.processors.as_deref()
    }

    /// Distribution and subblock count of dimension `dim`.
    pub fn distribution(&self, dim: usize) -> (Distribution, usize) {
        self.dists
            .get(dim)
            .copied()
            .unwrap_or((Distribution::Whole, 1))
    }

    /// Total number of subblocks.
    pub fn num_subblocks(&self) -> usize {
        self.dists.iter().map(|&(_, n)| n).product()
    }

    /// Subblock held by processor `rank`, or `None` for processors outside
    /// the set.
    pub fn subblock_of(&self, rank: usize) -> Option<usize> {
        match &self.processors {
            None => Some(0),
            Some(pset) => pset.iter().position(|&p| p == rank),
        }
    }

    /// Processor holding subblock `sb`.
    pub fn processor_of(&self, sb: usize) -> Option<usize> {
        self.processors.as_ref()?.get(sb).copied()
    }

    /// Grid coordinates of subblock `sb` for an `ndim`-dimensional block,
    /// last dimension fastest.
    pub fn subblock_position(&self, sb: usize, ndim: usize) -> SVec<usize> {
        let mut pos: SVec<usize> = SVec::from_elem(0, ndim);
        let mut rest = sb;
        for d in (0..ndim).rev() {
            let (_, n) = self.distribution(d);
            pos[d] = rest % n;
            rest /= n;
        }
        pos
    }

    /// Extents of the part of a `global_dims` block held by `ctx`.
    ///
    /// All zero for processors outside the set.
    pub fn local_dims(&self, global_dims: &[usize], ctx: &Context) -> SVec<usize> {
        match self.subblock_of(ctx.rank()) {
            None => SVec::from_elem(0, global_dims.len()),
            Some(sb) => self.subblock_dims(global_dims, sb),
        }
    }

    /// Extents of subblock `sb` of a `global_dims` block.
    pub fn subblock_dims(&self, global_dims: &[usize], sb: usize) -> SVec<usize> {
        let pos = self.subblock_position(sb, global_dims.len());
        global_dims
            .iter()
            .enumerate()
            .map(|(d, &len)| {
                let (dist, n) = self.distribution(d);
                dist.local_len(len, n, pos[d])
            })
            .collect()
    }

    /// Global coordinate along `dim` of local index `local` on subblock `sb`.
    pub fn global_from_local(&self, global_dims: &[usize], sb: usize, dim: usize, local: usize) -> usize {
        let pos = self.subblock_position(sb, global_dims.len());
        let (dist, n) = self.distribution(dim);
        dist.global_from_local(global_dims[dim], n, pos[dim], local)
    }

    /// Local index along `dim` of global coordinate `global`, if subblock
    /// `sb` holds it.
    pub fn local_from_global(
        &self,
        global_dims: &[usize],
        sb: usize,
        dim: usize,
        global: usize,
    ) -> Option<usize> {
        if global >= global_dims[dim] {
            return None;
        }
        let pos = self.subblock_position(sb, global_dims.len());
        let (dist, n) = self.distribution(dim);
        let (owner, local) = dist.local_from_global(global_dims[dim], n, global);
        (owner == pos[dim]).then_some(local)
    }
}

impl Default for Map {
    fn default() -> Self {
        Self::local()
    }
}
