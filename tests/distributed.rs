use approx::assert_relative_eq;
use std::collections::HashSet;
use strided_dda::{
    global_from_local, is_local, local_from_global, mul, Block, Context, Data, Distributed,
    Distribution, In, Map,
};

const NP: usize = 4;

fn contexts() -> impl Iterator<Item = Context> {
    (0..NP).map(|rank| Context::new(rank, NP).unwrap())
}

/// The map shapes exercised against a group of `NP` processes.
fn maps() -> Vec<Map> {
    vec![
        Map::block(NP),
        Map::block(1),
        Map::local(),
        Map::with_processors(&[NP - 1]).unwrap(),
        Map::with_processors(&(1..NP).collect::<Vec<_>>()).unwrap(),
        Map::new(&[0, 1, 2, 3], &[(Distribution::Cyclic, NP)]).unwrap(),
        Map::new(&[0, 1, 2, 3], &[(Distribution::BlockCyclic(3), NP)]).unwrap(),
    ]
}

fn wave(g: usize) -> f64 {
    (3.1415 * 0.15 * g as f64).cos()
}

#[test]
fn test_vmul_local_parts_match_global_values() {
    let n = 37;
    for map in maps() {
        for ctx in contexts() {
            let a = Distributed::from_global_fn(&[n], map.clone(), &ctx, |g| wave(g[0])).unwrap();
            let b = Distributed::from_global_fn(&[n], map.clone(), &ctx, |g| 2.0 + g[0] as f64)
                .unwrap();
            let mut r = Distributed::new(&[n], map.clone(), &ctx, 0.0f64).unwrap();
            mul(&mut r, &a, &b).unwrap();

            let data = Data::<_, In>::new(&r).unwrap();
            assert_eq!(data.cost(), 0);
            for l in 0..r.size() {
                let g = global_from_local(&r, 0, l);
                assert_relative_eq!(data.view().get(&[l]), wave(g) * (2.0 + g as f64));
            }
        }
    }
}

#[test]
fn test_local_parts_cover_global_extent_once() {
    let dims = [7, 5];
    let map = Map::new(
        &[0, 1, 2, 3],
        &[(Distribution::Block, 2), (Distribution::Cyclic, 2)],
    )
    .unwrap();
    assert_eq!(map.num_subblocks(), NP);
    let mut seen = HashSet::new();
    for sb in 0..map.num_subblocks() {
        let rank = map.processor_of(sb).unwrap();
        assert_eq!(map.subblock_of(rank), Some(sb));
        let ctx = Context::new(rank, NP).unwrap();
        let block = Distributed::new(&dims, map.clone(), &ctx, 0u8).unwrap();
        let local = block.dims().to_vec();
        for i in 0..local[0] {
            for j in 0..local[1] {
                let g = [global_from_local(&block, 0, i), global_from_local(&block, 1, j)];
                assert!(is_local(&block, &g));
                assert_eq!(local_from_global(&block, 0, g[0]), Some(i));
                assert_eq!(local_from_global(&block, 1, g[1]), Some(j));
                assert!(seen.insert(g), "element {:?} held twice", g);
            }
        }
    }
    assert_eq!(seen.len(), 35);
}

#[test]
fn test_processors_outside_map_hold_nothing() {
    let map = Map::with_processors(&[NP - 1]).unwrap();
    assert_eq!(map.processor_of(0), Some(NP - 1));
    assert_eq!(map.processor_of(1), None);
    assert_eq!(Map::local().processor_of(0), None);
    for ctx in contexts() {
        let block = Distributed::new(&[10], map.clone(), &ctx, 1.0f32).unwrap();
        if ctx.rank() == NP - 1 {
            assert_eq!(block.size(), 10);
            assert!(is_local(&block, &[9]));
        } else {
            assert_eq!(block.size(), 0);
            assert!(!is_local(&block, &[0]));
            let data = Data::<_, In>::new(&block).unwrap();
            assert!(data.is_empty());
        }
    }
}

#[test]
fn test_block_cyclic_index_rules() {
    let map = Map::new(&[0, 1], &[(Distribution::BlockCyclic(2), 2)]).unwrap();
    let ctx = Context::new(1, 2).unwrap();
    let block = Distributed::new(&[9], map, &ctx, 0i32).unwrap();
    let globals: Vec<usize> = (0..block.size()).map(|l| global_from_local(&block, 0, l)).collect();
    assert_eq!(globals, vec![2, 3, 6, 7]);
}
