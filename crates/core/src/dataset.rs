//! Dataset (DAG) rows
//!
//! Row `i` depends only on the cache: it starts from cache node `i % n`,
//! folds in `dataset_parents` pseudo-randomly chosen cache nodes and is
//! hashed once more. Because rows are independent, the full dataset is just
//! every row computed in order, and a verifier can compute the handful of
//! rows a hash touches straight from the cache.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use tracing::{debug, info};

use crate::cache::Cache;
use crate::error::{KrashError, Result};
use crate::params::{HASH_BYTES, MIX_BYTES, NODE_WORDS, Params};
use crate::primitives::{Node, fnv};

/// Byte-row accessor the mix loop reads from
///
/// Implemented by the in-memory [`Dataset`], by [`LightSource`] (rows
/// recomputed from the cache) and by the file-backed `DagFile`.
pub trait DatasetSource {
    /// Dataset size in bytes
    fn full_size(&self) -> u64;

    /// Parameters the rows were derived with
    fn params(&self) -> &Params;

    /// Row `index`
    fn row(&self, index: u32) -> Result<Node>;

    /// Row `index` as bytes
    fn row_bytes(&self, index: u32) -> Result<[u8; HASH_BYTES]> {
        self.row(index).map(|node| node.to_bytes())
    }

    /// Number of rows
    fn rows(&self) -> u64 {
        self.full_size() / HASH_BYTES as u64
    }
}

/// Compute dataset row `index` from the cache
pub fn calc_dataset_item(cache: &Cache, index: u32) -> Node {
    let nodes = cache.nodes();
    let n = nodes.len() as u32;
    let parents = cache.params().dataset_parents;

    let mut mix = nodes[(index % n) as usize];
    mix.words[0] ^= index;
    let mut mix = mix.hash();

    for parent in 0..parents {
        let parent_index = fnv(index ^ parent, mix.words[parent as usize % NODE_WORDS]) % n;
        mix.fnv_mix(&nodes[parent_index as usize]);
    }

    mix.hash()
}

/// Alias of [`calc_dataset_item`] named after the row it produces
#[inline]
pub fn generate_dataset_row(cache: &Cache, index: u32) -> Node {
    calc_dataset_item(cache, index)
}

/// Reject dataset sizes the row accessors cannot address
pub(crate) fn check_full_size(size: u64) -> Result<()> {
    if size == 0 || size % MIX_BYTES as u64 != 0 || size / HASH_BYTES as u64 > u32::MAX as u64 {
        return Err(KrashError::InvalidDatasetSize {
            size,
            mix_bytes: MIX_BYTES,
        });
    }
    Ok(())
}

#[cfg(all(test, feature = "std"))]
std::thread_local! {
    static RESERVE_LIMIT: core::cell::Cell<Option<u64>> = const { core::cell::Cell::new(None) };
}

/// Run `f` with node reservations larger than `bytes` failing on this thread
#[cfg(all(test, feature = "std"))]
pub(crate) fn with_reserve_limit<R>(bytes: u64, f: impl FnOnce() -> R) -> R {
    let previous = RESERVE_LIMIT.with(|limit| limit.replace(Some(bytes)));
    let out = f();
    RESERVE_LIMIT.with(|limit| limit.set(previous));
    out
}

/// Empty buffer with room for `rows` nodes
///
/// Fails with [`KrashError::ResourceExhaustion`] instead of aborting when
/// the allocator refuses.
pub(crate) fn reserve_nodes(rows: usize) -> Result<Vec<Node>> {
    let bytes = rows as u64 * HASH_BYTES as u64;
    #[cfg(all(test, feature = "std"))]
    if RESERVE_LIMIT.with(|limit| limit.get()).is_some_and(|limit| bytes > limit) {
        return Err(KrashError::ResourceExhaustion { bytes });
    }
    let mut nodes = Vec::new();
    nodes
        .try_reserve_exact(rows)
        .map_err(|_| KrashError::ResourceExhaustion { bytes })?;
    Ok(nodes)
}

/// Fully materialized dataset
#[derive(Clone, PartialEq, Eq)]
pub struct Dataset {
    nodes: Vec<Node>,
    params: Params,
}

impl Dataset {
    /// Rows in order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Wrap rows loaded from storage
    pub fn from_nodes(nodes: Vec<Node>, params: Params) -> Result<Self> {
        check_full_size((nodes.len() * HASH_BYTES) as u64)?;
        Ok(Self { nodes, params })
    }
}

impl core::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dataset")
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

impl DatasetSource for Dataset {
    fn full_size(&self) -> u64 {
        (self.nodes.len() * HASH_BYTES) as u64
    }

    fn params(&self) -> &Params {
        &self.params
    }

    #[inline]
    fn row(&self, index: u32) -> Result<Node> {
        self.nodes
            .get(index as usize)
            .copied()
            .ok_or(KrashError::RowOutOfRange {
                index: index as u64,
                rows: self.nodes.len() as u64,
            })
    }
}

/// Rows recomputed on demand from a cache, never materialized
#[derive(Debug, Clone, Copy)]
pub struct LightSource<'a> {
    cache: &'a Cache,
    full_size: u64,
}

impl<'a> LightSource<'a> {
    pub fn new(cache: &'a Cache, full_size: u64) -> Result<Self> {
        check_full_size(full_size)?;
        Ok(Self { cache, full_size })
    }
}

impl DatasetSource for LightSource<'_> {
    fn full_size(&self) -> u64 {
        self.full_size
    }

    fn params(&self) -> &Params {
        self.cache.params()
    }

    #[inline]
    fn row(&self, index: u32) -> Result<Node> {
        let rows = self.full_size / HASH_BYTES as u64;
        if index as u64 >= rows {
            return Err(KrashError::RowOutOfRange {
                index: index as u64,
                rows,
            });
        }
        Ok(calc_dataset_item(self.cache, index))
    }
}

/// Generate the whole dataset of `size` bytes
pub fn generate_dataset(cache: &Cache, size: u64) -> Result<Dataset> {
    generate_dataset_with_progress(cache, size, |_| true)
}

/// Generate the whole dataset, reporting progress in percent
///
/// `progress` is called after each 1% slice with the percentage done and
/// returns `false` to abort, which yields [`KrashError::Cancelled`].
pub fn generate_dataset_with_progress<F>(cache: &Cache, size: u64, mut progress: F) -> Result<Dataset>
where
    F: FnMut(u32) -> bool,
{
    check_full_size(size)?;
    let rows = (size / HASH_BYTES as u64) as usize;

    let mut nodes = reserve_nodes(rows)?;
    nodes.resize(rows, Node::ZERO);

    info!(size, rows, "generating dataset");

    let step = (rows / 100).max(1);
    for (slice, chunk) in nodes.chunks_mut(step).enumerate() {
        let first = slice * step;
        fill_rows(cache, first as u32, chunk);

        let percent = ((first + chunk.len()) * 100 / rows) as u32;
        if !progress(percent) {
            debug!(percent, "dataset generation cancelled");
            return Err(KrashError::Cancelled);
        }
    }

    Ok(Dataset {
        nodes,
        params: *cache.params(),
    })
}

/// Fill `out` with rows `first..first + out.len()`
#[cfg(feature = "parallel")]
pub fn fill_rows(cache: &Cache, first: u32, out: &mut [Node]) {
    out.par_iter_mut()
        .enumerate()
        .for_each(|(i, node)| *node = calc_dataset_item(cache, first + i as u32));
}

/// Fill `out` with rows `first..first + out.len()`
#[cfg(not(feature = "parallel"))]
pub fn fill_rows(cache: &Cache, first: u32, out: &mut [Node]) {
    for (i, node) in out.iter_mut().enumerate() {
        *node = calc_dataset_item(cache, first + i as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::build_cache;

    fn test_cache() -> Cache {
        Cache::generate(&[0u8; 32], 832, Params::testing()).unwrap()
    }

    #[test]
    fn test_known_rows() {
        let cache = test_cache();
        assert_eq!(
            hex::encode(calc_dataset_item(&cache, 0).to_bytes()),
            "4a75494d8d57c6347e129cf701c725d80fd3e3e5f8bdc1e1f8c31cb56470035a\
             3d378349f0d85ed626f6bedcfade116ed8427b0de4bf06eb316bd3c8e0bccd7a"
        );
        assert_eq!(
            hex::encode(calc_dataset_item(&cache, 7).to_bytes()),
            "f0ef933775faa71345c4723c519a9bf1e5d1c7bdddaba1535950c7043c9730d0\
             c6da97e2a386b7f2fe3aedf46ff8d0ac6ea1f4f21d75feee70b501d42027f7e3"
        );
    }

    #[test]
    fn test_rows_are_independent_of_generation_order() {
        let cache = test_cache();
        let forward: Vec<Node> = (0..16).map(|i| calc_dataset_item(&cache, i)).collect();
        let backward: Vec<Node> = (0..16).rev().map(|i| calc_dataset_item(&cache, i)).collect();
        assert!(forward.iter().eq(backward.iter().rev()));
    }

    #[test]
    fn test_rejects_bad_dataset_sizes() {
        let cache = test_cache();
        for size in [0u64, 64, 130, 1000] {
            assert!(matches!(
                generate_dataset(&cache, size),
                Err(KrashError::InvalidDatasetSize { .. })
            ));
        }
        assert!(LightSource::new(&cache, 64).is_err());
    }

    #[test]
    fn test_progress_reaches_100_and_cancels() {
        let cache = test_cache();
        let mut seen = Vec::new();
        let dataset = generate_dataset_with_progress(&cache, 32_128, |p| {
            seen.push(p);
            true
        })
        .unwrap();
        assert_eq!(dataset.len(), 502);
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));

        let mut calls = 0;
        let result = generate_dataset_with_progress(&cache, 32_128, |_| {
            calls += 1;
            calls < 3
        });
        assert!(matches!(result, Err(KrashError::Cancelled)));
        assert_eq!(calls, 3);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_unreservable_dataset_is_resource_exhaustion() {
        let cache = test_cache();
        let mut called = false;
        let result = with_reserve_limit(32_127, || {
            generate_dataset_with_progress(&cache, 32_128, |_| {
                called = true;
                true
            })
        });
        assert!(matches!(
            result,
            Err(KrashError::ResourceExhaustion { bytes: 32_128 })
        ));
        assert!(!called);

        // Limit lifted once the closure returns
        assert_eq!(generate_dataset(&cache, 32_128).unwrap().len(), 502);
        assert!(with_reserve_limit(32_128, || generate_dataset(&cache, 32_128)).is_ok());
    }

    #[test]
    fn test_check_full_size_bounds() {
        let max_rows = u32::MAX as u64;
        assert!(check_full_size(128).is_ok());
        assert!(check_full_size((max_rows - 1) * HASH_BYTES as u64).is_ok());
        for size in [0, 192, (max_rows + 1) * HASH_BYTES as u64, u64::MAX - 127] {
            assert!(matches!(
                check_full_size(size),
                Err(KrashError::InvalidDatasetSize { .. })
            ));
        }
    }

    #[test]
    fn test_row_out_of_range() {
        let cache = build_cache(&[0u8; 32], 832).unwrap();
        let light = LightSource::new(&cache, 256).unwrap();
        assert_eq!(light.rows(), 4);
        assert!(light.row(3).is_ok());
        assert!(matches!(
            light.row(4),
            Err(KrashError::RowOutOfRange { index: 4, rows: 4 })
        ));

        let dataset = generate_dataset(&cache, 256).unwrap();
        assert!(matches!(
            dataset.row(4),
            Err(KrashError::RowOutOfRange { .. })
        ));
        assert_eq!(dataset.row_bytes(2).unwrap(), light.row_bytes(2).unwrap());
    }
}
