//! Error kinds reported by the krash engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KrashError {
    #[error("invalid cache size {size}: must be a non-zero multiple of {node_bytes} bytes")]
    InvalidCacheSize { size: u64, node_bytes: usize },

    #[error("invalid dataset size {size}: must be a non-zero multiple of {mix_bytes} bytes")]
    InvalidDatasetSize { size: u64, mix_bytes: usize },

    #[error("invalid parameters: {0}")]
    InvalidParams(&'static str),

    #[error("{what} must be {expected} bytes, got {actual}")]
    InputLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("row {index} is outside a dataset of {rows} rows")]
    RowOutOfRange { index: u64, rows: u64 },

    /// The full dataset could not be allocated; the light path still works
    #[error("unable to allocate {bytes} bytes")]
    ResourceExhaustion { bytes: u64 },

    #[error("dataset generation cancelled")]
    Cancelled,

    #[error("proof-of-work does not match the claimed mix digest and result")]
    VerificationFailure,

    #[cfg(feature = "std")]
    #[error("DAG file {}: {source}", path.display())]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[cfg(feature = "std")]
    #[error("no complete DAG at {}", path.display())]
    MissingDag { path: std::path::PathBuf },
}

pub type Result<T> = core::result::Result<T, KrashError>;

impl KrashError {
    /// Fixed-width input check shared by every byte-slice entry point
    pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(KrashError::InputLength {
                what,
                expected,
                actual,
            })
        }
    }

    #[cfg(feature = "std")]
    pub(crate) fn io(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        KrashError::Io {
            path: path.into(),
            source,
        }
    }
}
