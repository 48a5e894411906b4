//! Local/global index translation for possibly distributed blocks.
//!
//! Free-function forms of [`Block::global_from_local`] and
//! [`Block::local_from_global`]. For blocks that are not distributed both
//! are the identity.

use crate::block::Block;

/// Global coordinate along `dim` of the local index `local`.
///
/// # Panics
/// Panics if `local` is outside the block's local extent along `dim`.
#[inline]
pub fn global_from_local<B: Block + ?Sized>(block: &B, dim: usize, local: usize) -> usize {
    block.global_from_local(dim, local)
}

/// Local index along `dim` of the global coordinate `global`, or `None` when
/// this process does not hold it.
#[inline]
pub fn local_from_global<B: Block + ?Sized>(block: &B, dim: usize, global: usize) -> Option<usize> {
    block.local_from_global(dim, global)
}

/// Whether this process holds the element at global index `global`.
pub fn is_local<B: Block + ?Sized>(block: &B, global: &[usize]) -> bool {
    global.len() == block.dim()
        && global
            .iter()
            .enumerate()
            .all(|(d, &g)| block.local_from_global(d, g).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Dense;

    #[test]
    fn test_identity_for_local_blocks() {
        let block = Dense::<f32>::col_major(&[4, 3], 0.0);
        for d in 0..2 {
            for i in 0..block.dims()[d] {
                assert_eq!(global_from_local(&block, d, i), i);
                assert_eq!(local_from_global(&block, d, i), Some(i));
            }
        }
        assert!(is_local(&block, &[3, 2]));
        assert!(!is_local(&block, &[4, 0]));
        assert!(!is_local(&block, &[0]));
    }
}
