//! Memory-hard mix loop
//!
//! Seeds a 128-byte accumulator from `Keccak-512(header || nonce)`, folds in
//! `accesses` pseudo-randomly addressed pairs of dataset rows, compresses the
//! accumulator to a 32-byte mix digest and hashes it with the seed into the
//! result. The only thing that differs between the full and the light path is
//! where [`DatasetSource::row`] gets its rows from.

use crate::dataset::{DatasetSource, check_full_size};
use crate::error::{KrashError, Result};
use crate::params::{H256_BYTES, HASH_BYTES, MIX_BYTES, MIX_NODES, MIX_WORDS, NODE_WORDS};
use crate::primitives::{H256, Node, fnv, keccak256_seed_mix, keccak512_header_nonce};

/// Output of one proof-of-work evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PowResult {
    /// Compressed mix, embedded in the block header for re-verification
    pub mix_digest: H256,
    /// Value compared against the difficulty boundary
    pub result: H256,
}

/// Interpret a header hash slice as a fixed 32-byte value
pub fn header_hash_from_slice(header_hash: &[u8]) -> Result<H256> {
    KrashError::check_len("header hash", H256_BYTES, header_hash.len())?;
    let mut out = [0u8; H256_BYTES];
    out.copy_from_slice(header_hash);
    Ok(out)
}

/// Run the mix loop over `source`
pub fn hashimoto<S>(source: &S, header_hash: &[u8], nonce: u64) -> Result<PowResult>
where
    S: DatasetSource + ?Sized,
{
    let header = header_hash_from_slice(header_hash)?;
    let full_size = source.full_size();
    check_full_size(full_size)?;
    let pages = (full_size / MIX_BYTES as u64) as u32;
    let accesses = source.params().accesses;

    let seed_bytes = keccak512_header_nonce(&header, nonce);
    let seed = Node::from_bytes(&seed_bytes);

    let mut mix = [0u32; MIX_WORDS];
    for lane in mix.chunks_exact_mut(NODE_WORDS) {
        lane.copy_from_slice(&seed.words);
    }

    for round in 0..accesses {
        let page = fnv(round ^ seed.words[0], mix[round as usize % MIX_WORDS]) % pages;
        let first = page * MIX_NODES as u32;
        for (n, lane) in mix.chunks_exact_mut(NODE_WORDS).enumerate() {
            let row = source.row(first + n as u32)?;
            for (m, w) in lane.iter_mut().zip(row.words.iter()) {
                *m = fnv(*m, *w);
            }
        }
    }

    let mix_digest = compress_mix(&mix);
    let result = keccak256_seed_mix(&seed_bytes, &mix_digest);

    Ok(PowResult { mix_digest, result })
}

/// Fold each group of four words into one, giving the 32-byte digest
#[inline(always)]
fn compress_mix(mix: &[u32; MIX_WORDS]) -> H256 {
    let mut digest = [0u8; H256_BYTES];
    for (out, words) in digest.chunks_exact_mut(4).zip(mix.chunks_exact(4)) {
        let folded = fnv(fnv(fnv(words[0], words[1]), words[2]), words[3]);
        out.copy_from_slice(&folded.to_le_bytes());
    }
    digest
}

/// Result hash from a claimed mix digest without touching the dataset
///
/// Cheap enough to reject most bogus proofs before running the light path.
pub fn quick_hash(header_hash: &H256, nonce: u64, mix_digest: &H256) -> H256 {
    let seed = keccak512_header_nonce(header_hash, nonce);
    keccak256_seed_mix(&seed, mix_digest)
}

const _: () = assert!(MIX_NODES * HASH_BYTES == MIX_BYTES);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;
    use crate::dataset::{LightSource, generate_dataset};
    use crate::params::Params;

    #[test]
    fn test_rejects_short_header() {
        let cache = Cache::generate(&[0u8; 32], 832, Params::testing()).unwrap();
        let source = LightSource::new(&cache, 32_128).unwrap();
        let err = hashimoto(&source, &[0u8; 20], 0).unwrap_err();
        assert!(matches!(
            err,
            KrashError::InputLength {
                what: "header hash",
                expected: 32,
                actual: 20
            }
        ));
        assert!(hashimoto(&source, &[0u8; 33], 0).is_err());
    }

    /// Source claiming an arbitrary size, serving zero rows
    struct Claimed {
        full_size: u64,
        params: Params,
    }

    impl DatasetSource for Claimed {
        fn full_size(&self) -> u64 {
            self.full_size
        }

        fn params(&self) -> &Params {
            &self.params
        }

        fn row(&self, _index: u32) -> Result<Node> {
            Ok(Node::ZERO)
        }
    }

    #[test]
    fn test_rejects_unaddressable_sources() {
        let rows = u32::MAX as u64 + 1;
        for full_size in [0, 64, 200, rows * HASH_BYTES as u64, u64::MAX - 127] {
            let source = Claimed {
                full_size,
                params: Params::testing(),
            };
            assert!(matches!(
                hashimoto(&source, &[0u8; 32], 0),
                Err(KrashError::InvalidDatasetSize { size, .. }) if size == full_size
            ));
        }

        let largest = Claimed {
            full_size: (rows - 2) * HASH_BYTES as u64,
            params: Params::testing(),
        };
        assert!(hashimoto(&largest, &[0u8; 32], 0).is_ok());
    }

    #[test]
    fn test_quick_hash_matches_result() {
        let cache = Cache::generate(&[0u8; 32], 832, Params::testing()).unwrap();
        let dataset = generate_dataset(&cache, 32_128).unwrap();
        let header = [0x42u8; 32];
        for nonce in [0u64, 1, 0xdead_beef, u64::MAX] {
            let pow = hashimoto(&dataset, &header, nonce).unwrap();
            assert_eq!(quick_hash(&header, nonce, &pow.mix_digest), pow.result);
        }
    }

    #[test]
    fn test_compress_mix_layout() {
        let mut mix = [0u32; MIX_WORDS];
        mix[0] = 1;
        let digest = compress_mix(&mix);
        // fnv(fnv(fnv(1, 0), 0), 0) = FNV_PRIME^3
        let expected = crate::primitives::FNV_PRIME
            .wrapping_mul(crate::primitives::FNV_PRIME)
            .wrapping_mul(crate::primitives::FNV_PRIME);
        assert_eq!(&digest[0..4], &expected.to_le_bytes());
        assert!(digest[4..].iter().all(|&b| b == 0));
    }
}
