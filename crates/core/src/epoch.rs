//! Epoch seeds and the per-epoch light cache table
//!
//! The seed of epoch 0 is 32 zero bytes and every following seed is the
//! Keccak-256 of the previous one.

#[cfg(feature = "std")]
use std::sync::Arc;

#[cfg(feature = "std")]
use parking_lot::RwLock;
#[cfg(feature = "std")]
use tracing::info;

#[cfg(feature = "std")]
use crate::error::Result;
#[cfg(feature = "std")]
use crate::light::Light;
use crate::params::{H256_BYTES, Params};
use crate::primitives::{H256, keccak256};

/// Seed for `epoch`
pub fn epoch_seed(epoch: u64) -> H256 {
    let mut seed = [0u8; H256_BYTES];
    for _ in 0..epoch {
        seed = keccak256(&seed);
    }
    seed
}

/// Seed for the epoch `block_number` belongs to
pub fn seed_hash(block_number: u64, params: &Params) -> H256 {
    epoch_seed(params.epoch(block_number))
}

/// Caller-owned, double-buffered table of light caches keyed by epoch
///
/// Two slots, indexed by epoch parity, so the current epoch keeps serving
/// readers while the next one is being built. Lights are built outside the
/// lock and handed out as `Arc`s; a replaced generation stays alive for as
/// long as someone still holds it.
#[cfg(feature = "std")]
pub struct EpochTable {
    params: Params,
    slots: RwLock<[Option<Arc<Light>>; 2]>,
}

#[cfg(feature = "std")]
impl EpochTable {
    /// Empty table; rejects parameters the size schedule cannot work with
    pub fn new(params: Params) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            slots: RwLock::new([None, None]),
        })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Light cache for `epoch`, if it is currently held
    pub fn cached(&self, epoch: u64) -> Option<Arc<Light>> {
        let slots = self.slots.read();
        slots[(epoch % 2) as usize]
            .as_ref()
            .filter(|light| light.epoch() == Some(epoch))
            .cloned()
    }

    /// Light cache for the epoch `block_number` belongs to, building it if needed
    pub fn get(&self, block_number: u64) -> Result<Arc<Light>> {
        let epoch = self.params.epoch(block_number);
        if let Some(light) = self.cached(epoch) {
            return Ok(light);
        }

        info!(epoch, "building light cache");
        let built = Arc::new(Light::with_params(
            epoch * self.params.epoch_length,
            self.params,
        )?);

        let mut slots = self.slots.write();
        let slot = &mut slots[(epoch % 2) as usize];
        if let Some(existing) = slot.as_ref().filter(|l| l.epoch() == Some(epoch)) {
            // Lost a race with another builder of the same epoch
            return Ok(Arc::clone(existing));
        }
        *slot = Some(Arc::clone(&built));
        Ok(built)
    }

    /// Build the epoch after the one `block_number` belongs to
    pub fn prefetch_next(&self, block_number: u64) -> Result<Arc<Light>> {
        self.get(block_number.saturating_add(self.params.epoch_length))
    }

    /// Epochs currently held, ascending
    pub fn epochs(&self) -> Vec<u64> {
        let slots = self.slots.read();
        let mut epochs: Vec<u64> = slots.iter().flatten().filter_map(|l| l.epoch()).collect();
        epochs.sort_unstable();
        epochs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_seeds() {
        assert_eq!(epoch_seed(0), [0u8; 32]);
        assert_eq!(
            hex::encode(epoch_seed(1)),
            "290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563"
        );
        assert_eq!(epoch_seed(2), keccak256(&epoch_seed(1)));
    }

    #[test]
    fn test_seed_hash_uses_epoch() {
        let params = Params::production();
        assert_eq!(seed_hash(0, &params), seed_hash(29_999, &params));
        assert_ne!(seed_hash(29_999, &params), seed_hash(30_000, &params));
        assert_eq!(seed_hash(30_000, &params), epoch_seed(1));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_table_double_buffers() {
        let table = EpochTable::new(Params::testing()).unwrap();

        let first = table.get(10).unwrap();
        assert_eq!(first.epoch(), Some(0));
        assert!(Arc::ptr_eq(&first, &table.get(99).unwrap()));

        let next = table.prefetch_next(10).unwrap();
        assert_eq!(next.epoch(), Some(1));
        assert_eq!(table.epochs(), vec![0, 1]);
        // Current epoch still served from the same allocation
        assert!(Arc::ptr_eq(&first, &table.cached(0).unwrap()));

        // Epoch 2 replaces epoch 0's slot; the old handle stays usable
        let third = table.get(250).unwrap();
        assert_eq!(third.epoch(), Some(2));
        assert_eq!(table.epochs(), vec![1, 2]);
        assert!(table.cached(0).is_none());
        assert!(first.compute(&[0u8; 32], 1).is_ok());
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_table_rejects_invalid_params() {
        let params = Params {
            epoch_length: 0,
            ..Params::testing()
        };
        assert!(matches!(
            EpochTable::new(params),
            Err(crate::error::KrashError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_seed_hash_of_last_block() {
        let params = Params {
            epoch_length: u64::MAX,
            ..Params::testing()
        };
        assert_eq!(seed_hash(u64::MAX - 1, &params), epoch_seed(0));
        assert_eq!(seed_hash(u64::MAX, &params), epoch_seed(1));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_table_concurrent_readers_share_one_light() {
        let table = EpochTable::new(Params::testing()).unwrap();
        let seen: Vec<Arc<Light>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4).map(|_| s.spawn(|| table.get(42).unwrap())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let held = table.cached(0).unwrap();
        assert!(seen.iter().all(|l| l.cache() == held.cache()));
    }
}
