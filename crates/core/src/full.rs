//! Full handle: a materialized (or file-backed) dataset for fast hashing

#[cfg(feature = "std")]
use std::path::Path;

#[cfg(feature = "std")]
use tracing::warn;
use tracing::info;

use crate::dataset::{Dataset, DatasetSource, generate_dataset_with_progress};
use crate::error::{KrashError, Result};
use crate::hashimoto::{PowResult, hashimoto};
#[cfg(feature = "std")]
use crate::io::{DagFile, Prepared, dag_path, prepare, write_dataset};
use crate::light::Light;
use crate::params::Params;
use crate::primitives::{H256, Node};

enum Storage {
    Memory(Dataset),
    #[cfg(feature = "std")]
    File(DagFile),
}

/// Dataset-resident hasher for mining
pub struct Full {
    storage: Storage,
    seed: H256,
    block_number: Option<u64>,
}

impl Full {
    /// Expand `light`'s cache into the full dataset in memory
    ///
    /// `progress` gets the percentage done and returns `false` to cancel.
    /// Fails with [`KrashError::ResourceExhaustion`] if the dataset cannot be
    /// allocated; the light handle is still usable then.
    pub fn new<F>(light: &Light, progress: F) -> Result<Self>
    where
        F: FnMut(u32) -> bool,
    {
        let dataset = generate_dataset_with_progress(light.cache(), light.full_size(), progress)?;
        info!(
            block_number = ?light.block_number(),
            full_size = light.full_size(),
            "full dataset ready"
        );
        Ok(Self::from_storage(Storage::Memory(dataset), light))
    }

    /// Wrap a dataset computed elsewhere for `light`'s epoch
    pub fn from_dataset(light: &Light, dataset: Dataset) -> Result<Self> {
        if dataset.full_size() != light.full_size() {
            return Err(KrashError::InvalidDatasetSize {
                size: dataset.full_size(),
                mix_bytes: crate::params::MIX_BYTES,
            });
        }
        Ok(Self::from_storage(Storage::Memory(dataset), light))
    }

    /// Reuse the DAG file for `light`'s seed in `dir`, or generate and persist it
    ///
    /// A complete file is read in place with positioned reads; a fresh one is
    /// generated in memory, written out and kept in memory.
    #[cfg(feature = "std")]
    pub fn open_or_generate<F>(dir: &Path, light: &Light, progress: F) -> Result<Self>
    where
        F: FnMut(u32) -> bool,
    {
        let full_size = light.full_size();
        let path = dag_path(dir, light.seed());

        let prepared = match prepare(dir, light.seed(), full_size, false)? {
            Prepared::SizeMismatch => {
                warn!(path = %path.display(), "DAG file incomplete or stale, recreating");
                prepare(dir, light.seed(), full_size, true)?
            }
            prepared => prepared,
        };

        match prepared {
            Prepared::Match(file) => {
                info!(path = %path.display(), "reusing DAG file");
                let dag = DagFile::from_file(file, path, full_size, *light.params());
                Ok(Self::from_storage(Storage::File(dag), light))
            }
            Prepared::Created(mut file) => {
                let dataset = generate_dataset_with_progress(light.cache(), full_size, progress)?;
                write_dataset(&mut file, &path, &dataset)?;
                info!(path = %path.display(), full_size, "DAG file written");
                Ok(Self::from_storage(Storage::Memory(dataset), light))
            }
            Prepared::SizeMismatch => Err(KrashError::MissingDag { path }),
        }
    }

    fn from_storage(storage: Storage, light: &Light) -> Self {
        Self {
            storage,
            seed: *light.seed(),
            block_number: light.block_number(),
        }
    }

    pub fn seed(&self) -> &H256 {
        &self.seed
    }

    /// `None` when built from a [`Light::from_parts`] handle
    pub fn block_number(&self) -> Option<u64> {
        self.block_number
    }

    /// In-memory dataset, `None` when reading from a DAG file
    pub fn dataset(&self) -> Option<&Dataset> {
        match &self.storage {
            Storage::Memory(dataset) => Some(dataset),
            #[cfg(feature = "std")]
            Storage::File(_) => None,
        }
    }

    pub fn is_file_backed(&self) -> bool {
        self.dataset().is_none()
    }

    /// Evaluate the proof-of-work against the full dataset
    pub fn compute(&self, header_hash: &[u8], nonce: u64) -> Result<PowResult> {
        hashimoto(self, header_hash, nonce)
    }
}

impl DatasetSource for Full {
    fn full_size(&self) -> u64 {
        match &self.storage {
            Storage::Memory(dataset) => dataset.full_size(),
            #[cfg(feature = "std")]
            Storage::File(dag) => dag.full_size(),
        }
    }

    fn params(&self) -> &Params {
        match &self.storage {
            Storage::Memory(dataset) => dataset.params(),
            #[cfg(feature = "std")]
            Storage::File(dag) => dag.params(),
        }
    }

    #[inline]
    fn row(&self, index: u32) -> Result<Node> {
        match &self.storage {
            Storage::Memory(dataset) => dataset.row(index),
            #[cfg(feature = "std")]
            Storage::File(dag) => dag.row(index),
        }
    }
}

impl core::fmt::Debug for Full {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Full")
            .field("block_number", &self.block_number)
            .field("full_size", &self.full_size())
            .field("file_backed", &self.is_file_backed())
            .finish()
    }
}
