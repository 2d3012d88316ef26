//! # Krash Core Algorithm
//!
//! Memory-hard proof-of-work engine of the ethash family (revision 23).
//!
//! ## Pipeline
//!
//! ```text
//! epoch seed ──> cache (16 MB) ──> dataset (1 GB+, optional)
//!                    │                    │
//!                    └──── hashimoto <────┘
//!                              │
//!              (header hash, nonce) -> (mix digest, result)
//! ```
//!
//! - **Light path**: hold only the cache, recompute the dataset rows a hash
//!   touches. Enough to verify any proof of the epoch.
//! - **Full path**: materialize the dataset (in memory or in a DAG file) for
//!   mining throughput.
//!
//! Both paths yield byte-identical results.
//!
//! ## Example
//!
//! ```rust
//! use krash_core::{Full, Light, Params, boundary_from_difficulty, check_difficulty, verify_pow};
//!
//! let light = Light::with_params(0, Params::testing()).unwrap();
//! let full = Full::new(&light, |_| true).unwrap();
//!
//! let header = [0x11u8; 32];
//! let pow = full.compute(&header, 42).unwrap();
//! assert!(verify_pow(&header, 42, &light, &pow.mix_digest, &pow.result));
//!
//! let boundary = boundary_from_difficulty(1);
//! assert!(check_difficulty(&pow.result, &boundary));
//! ```
//!
//! ## no_std Support
//!
//! The algorithm itself only needs `alloc`; DAG files, the epoch table and
//! the C bindings come with the default `std` feature:
//!
//! ```toml
//! [dependencies]
//! krash-core = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

mod cache;
mod dataset;
mod difficulty;
mod epoch;
mod error;
mod full;
mod hashimoto;
mod light;
mod params;
mod pow;
mod primitives;

#[cfg(feature = "std")]
pub mod io;

#[cfg(feature = "std")]
mod ffi;

pub use cache::{Cache, build_cache};
pub use dataset::{
    Dataset, DatasetSource, LightSource, calc_dataset_item, fill_rows, generate_dataset,
    generate_dataset_row, generate_dataset_with_progress,
};
pub use difficulty::{
    boundary_from_difficulty, check_difficulty, meets_difficulty, quick_check_difficulty,
};
#[cfg(feature = "std")]
pub use epoch::EpochTable;
pub use epoch::{epoch_seed, seed_hash};
pub use error::{KrashError, Result};
pub use full::Full;
pub use hashimoto::{PowResult, hashimoto, header_hash_from_slice, quick_hash};
pub use light::Light;
pub use params::*;
pub use pow::{Hasher, compute_pow, verify_pow};
pub use primitives::{FNV_PRIME, H256, Node, fnv, keccak256, keccak512};
