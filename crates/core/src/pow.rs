//! Hash and verify entry points
//!
//! [`compute_pow`] is the fast path over any materialized dataset,
//! [`verify_pow`] the slow path that only ever touches the cache.

#[cfg(feature = "std")]
use std::path::Path;

use tracing::warn;

use crate::dataset::DatasetSource;
use crate::error::{KrashError, Result};
use crate::full::Full;
use crate::hashimoto::{PowResult, hashimoto};
use crate::light::Light;
use crate::params::Params;
use crate::primitives::{H256, Node};

/// Evaluate the proof-of-work for `(header_hash, nonce)` over `dataset`
#[inline]
pub fn compute_pow<S>(header_hash: &[u8], nonce: u64, dataset: &S) -> Result<PowResult>
where
    S: DatasetSource + ?Sized,
{
    hashimoto(dataset, header_hash, nonce)
}

/// Recompute from `light`'s cache and compare both claimed values byte for byte
///
/// Never allocates the dataset. Malformed input verifies as `false`.
pub fn verify_pow(
    header_hash: &[u8],
    nonce: u64,
    light: &Light,
    claimed_digest: &H256,
    claimed_result: &H256,
) -> bool {
    light.verify(header_hash, nonce, claimed_digest, claimed_result)
}

/// Whichever handle could be built for an epoch
#[derive(Debug)]
pub enum Hasher {
    Full(Full),
    Light(Light),
}

impl Hasher {
    /// Build the full dataset, falling back to the light cache when it does
    /// not fit in memory
    pub fn prefer_full<F>(light: Light, progress: F) -> Result<Self>
    where
        F: FnMut(u32) -> bool,
    {
        match Full::new(&light, progress) {
            Ok(full) => Ok(Hasher::Full(full)),
            Err(KrashError::ResourceExhaustion { bytes }) => {
                warn!(bytes, "full dataset does not fit, hashing from the cache");
                Ok(Hasher::Light(light))
            }
            Err(e) => Err(e),
        }
    }

    /// Like [`Hasher::prefer_full`], reusing or persisting the DAG in `dir`
    #[cfg(feature = "std")]
    pub fn prefer_full_in<F>(dir: &Path, light: Light, progress: F) -> Result<Self>
    where
        F: FnMut(u32) -> bool,
    {
        match Full::open_or_generate(dir, &light, progress) {
            Ok(full) => Ok(Hasher::Full(full)),
            Err(KrashError::ResourceExhaustion { bytes }) => {
                warn!(bytes, "full dataset does not fit, hashing from the cache");
                Ok(Hasher::Light(light))
            }
            Err(e) => Err(e),
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Hasher::Full(_))
    }

    pub fn block_number(&self) -> Option<u64> {
        match self {
            Hasher::Full(full) => full.block_number(),
            Hasher::Light(light) => light.block_number(),
        }
    }

    pub fn compute(&self, header_hash: &[u8], nonce: u64) -> Result<PowResult> {
        match self {
            Hasher::Full(full) => full.compute(header_hash, nonce),
            Hasher::Light(light) => light.compute(header_hash, nonce),
        }
    }
}

impl From<Light> for Hasher {
    fn from(light: Light) -> Self {
        Hasher::Light(light)
    }
}

impl From<Full> for Hasher {
    fn from(full: Full) -> Self {
        Hasher::Full(full)
    }
}

impl DatasetSource for Hasher {
    fn full_size(&self) -> u64 {
        match self {
            Hasher::Full(full) => full.full_size(),
            Hasher::Light(light) => light.full_size(),
        }
    }

    fn params(&self) -> &Params {
        match self {
            Hasher::Full(full) => full.params(),
            Hasher::Light(light) => light.params(),
        }
    }

    fn row(&self, index: u32) -> Result<Node> {
        match self {
            Hasher::Full(full) => full.row(index),
            Hasher::Light(light) => light.source()?.row(index),
        }
    }
}
