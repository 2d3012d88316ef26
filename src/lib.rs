//! Krash Miner Library
//!
//! Mining and DAG management on top of the krash proof-of-work engine.
//!
//! # Overview
//!
//! - [`config`]: miner configuration (JSON file plus defaults)
//! - [`miner`]: multi-threaded nonce search over a shared hasher
//! - [`autodag`]: background pregeneration of the next epoch's DAG
//!
//! # Example
//!
//! ```rust
//! use krash::algorithm::{Hasher, Light, Params};
//! use krash::miner::{mine, MineOptions, Target};
//!
//! let light = Light::with_params(0, Params::testing()).unwrap();
//! let hasher: Hasher = light.into();
//! let options = MineOptions { threads: 2, ..MineOptions::default() };
//! let report = mine(&hasher, &[0u8; 32], Target::LeadingZeros(2), &options).unwrap();
//! assert!(report.solution.is_some());
//! ```

// Re-export the core algorithm
pub use krash_core as algorithm;

pub mod autodag;
pub mod config;
pub mod miner;

// Convenience re-exports
pub use algorithm::{verify_pow, Full, Hasher, KrashError, Light, Params, PowResult};
