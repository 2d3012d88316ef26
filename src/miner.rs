//! Multi-threaded nonce search
//!
//! Every worker reads the same [`Hasher`]; worker `i` of `n` tries nonces
//! `start + i`, `start + i + n`, ... wrapping at `u64::MAX`. The first
//! solution stops all workers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::algorithm::{
    boundary_from_difficulty, check_difficulty, meets_difficulty, Hasher, KrashError, H256,
};

/// How often worker 0 logs the hash rate
const REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Hashes a worker batches before publishing them to the shared counter
const FLUSH_EVERY: u64 = 64;

/// Per-worker tally, published to the shared counter in batches
struct HashCounter<'a> {
    shared: &'a AtomicU64,
    pending: u64,
    computed: u64,
}

impl<'a> HashCounter<'a> {
    fn new(shared: &'a AtomicU64) -> Self {
        Self {
            shared,
            pending: 0,
            computed: 0,
        }
    }

    #[inline]
    fn record(&mut self) {
        self.pending += 1;
        self.computed += 1;
        if self.pending >= FLUSH_EVERY {
            self.flush();
        }
    }

    fn flush(&mut self) {
        self.shared.fetch_add(self.pending, Ordering::Relaxed);
        self.pending = 0;
    }
}

/// Acceptance rule for a result hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// `result <= boundary`, big-endian
    Boundary(H256),
    /// At least this many leading zero bits
    LeadingZeros(u32),
}

impl Target {
    /// Boundary target `2^256 / difficulty`
    pub fn from_difficulty(difficulty: u64) -> Self {
        Target::Boundary(boundary_from_difficulty(difficulty))
    }

    #[inline]
    pub fn is_met(&self, result: &H256) -> bool {
        match self {
            Target::Boundary(boundary) => check_difficulty(result, boundary),
            Target::LeadingZeros(bits) => meets_difficulty(result, *bits),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MineOptions {
    /// Worker threads, 0 for one per CPU
    pub threads: usize,
    pub start_nonce: u64,
    /// Give up after this many hashes across all workers
    pub max_attempts: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Solution {
    pub nonce: u64,
    pub mix_digest: H256,
    pub result: H256,
}

#[derive(Debug, Clone)]
pub struct MiningReport {
    /// `None` when the attempt budget ran out first
    pub solution: Option<Solution>,
    /// Hashes computed by all workers
    pub hashes: u64,
    pub elapsed: Duration,
}

impl MiningReport {
    pub fn hash_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.hashes as f64 / secs
        } else {
            0.0
        }
    }
}

/// Search for a nonce whose result meets `target`
pub fn mine(
    hasher: &Hasher,
    header_hash: &H256,
    target: Target,
    options: &MineOptions,
) -> Result<MiningReport, KrashError> {
    let threads = if options.threads == 0 {
        num_cpus::get()
    } else {
        options.threads
    };
    let stride = threads as u64;

    info!(
        threads,
        full = hasher.is_full(),
        block_number = ?hasher.block_number(),
        "starting mining"
    );

    let found = AtomicBool::new(false);
    let claimed = AtomicU64::new(0);
    let hashes = AtomicU64::new(0);
    let solution: Mutex<Option<Solution>> = Mutex::new(None);
    let failure: Mutex<Option<KrashError>> = Mutex::new(None);
    let start = Instant::now();

    std::thread::scope(|s| {
        for worker in 0..threads {
            let (found, claimed, hashes, solution, failure) =
                (&found, &claimed, &hashes, &solution, &failure);
            s.spawn(move || {
                let mut nonce = options.start_nonce.wrapping_add(worker as u64);
                let mut counter = HashCounter::new(hashes);
                let mut last_report = Instant::now();

                while !found.load(Ordering::Relaxed) {
                    if let Some(max) = options.max_attempts {
                        if claimed.fetch_add(1, Ordering::Relaxed) >= max {
                            break;
                        }
                    }

                    let pow = match hasher.compute(header_hash, nonce) {
                        Ok(pow) => pow,
                        Err(e) => {
                            failure.lock().get_or_insert(e);
                            found.store(true, Ordering::Relaxed);
                            break;
                        }
                    };
                    counter.record();

                    if target.is_met(&pow.result) {
                        let mut slot = solution.lock();
                        if slot.is_none() {
                            *slot = Some(Solution {
                                nonce,
                                mix_digest: pow.mix_digest,
                                result: pow.result,
                            });
                        }
                        found.store(true, Ordering::Relaxed);
                        break;
                    }

                    nonce = nonce.wrapping_add(stride);

                    if worker == 0 && last_report.elapsed() >= REPORT_INTERVAL {
                        let elapsed = start.elapsed().as_secs_f64();
                        let total = hashes.load(Ordering::Relaxed);
                        info!(hash_rate = total as f64 / elapsed, hashes = total, "mining");
                        last_report = Instant::now();
                    }
                }

                counter.flush();
                debug!(worker, computed = counter.computed, "worker stopped");
            });
        }
    });

    if let Some(e) = failure.into_inner() {
        return Err(e);
    }

    let report = MiningReport {
        solution: solution.into_inner(),
        hashes: hashes.into_inner(),
        elapsed: start.elapsed(),
    };
    match &report.solution {
        Some(found) => info!(
            nonce = found.nonce,
            hashes = report.hashes,
            result = %hex::encode(found.result),
            "solution found"
        ),
        None => info!(hashes = report.hashes, "attempt budget exhausted"),
    }
    Ok(report)
}
