//! Automatic DAG pregeneration
//!
//! On every check, once the chain head of epoch `n` is past the middle of the
//! epoch, the DAG of epoch `n - 1` is removed and the DAG of epoch `n + 1` is
//! generated unless already present. Each epoch is handled once.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::algorithm::io::{make_dag, remove_dag};
use crate::algorithm::{epoch_seed, KrashError, Params};

/// Source of the current chain head
pub trait ChainHead: Send + Sync + 'static {
    fn current_block(&self) -> u64;
}

impl ChainHead for AtomicU64 {
    fn current_block(&self) -> u64 {
        self.load(Ordering::Relaxed)
    }
}

/// What a single check did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Too early in the epoch, or the next epoch is already handled
    Idle,
    /// The next epoch's DAG is on disk
    Ready {
        epoch: u64,
        path: PathBuf,
        /// Whether a previous-epoch DAG was deleted
        removed_previous: bool,
    },
}

/// Synchronous check logic, driven by [`AutoDag`] or by hand
#[derive(Debug)]
pub struct Pregenerator {
    dir: PathBuf,
    params: Params,
    next_epoch: u64,
}

impl Pregenerator {
    pub fn new(dir: impl Into<PathBuf>, params: Params) -> Self {
        Self {
            dir: dir.into(),
            params,
            next_epoch: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Inspect `current_block` and pregenerate if it is time
    pub fn check(&mut self, current_block: u64) -> Result<CheckOutcome, KrashError> {
        let epoch_length = self.params.epoch_length;
        let this_epoch = self.params.epoch(current_block);
        if self.next_epoch > this_epoch || current_block % epoch_length <= epoch_length / 2 {
            return Ok(CheckOutcome::Idle);
        }

        let mut removed_previous = false;
        if this_epoch > 0 {
            removed_previous = remove_dag(&self.dir, &epoch_seed(this_epoch - 1))?;
            if removed_previous {
                info!(epoch = this_epoch - 1, "removed previous DAG");
            }
        }

        let epoch = this_epoch + 1;
        self.next_epoch = epoch;
        info!(epoch, dir = %self.dir.display(), "pregenerating DAG");
        let path = make_dag(epoch * epoch_length, &self.dir, self.params)?;
        Ok(CheckOutcome::Ready {
            epoch,
            path,
            removed_previous,
        })
    }
}

struct Running {
    quit: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Background task running [`Pregenerator::check`] on an interval
///
/// Can be started and stopped any number of times.
pub struct AutoDag {
    dir: PathBuf,
    params: Params,
    interval: Duration,
    head: Arc<dyn ChainHead>,
    running: Mutex<Option<Running>>,
}

impl AutoDag {
    pub fn new(
        dir: impl Into<PathBuf>,
        params: Params,
        interval: Duration,
        head: Arc<dyn ChainHead>,
    ) -> Self {
        Self {
            dir: dir.into(),
            params,
            interval,
            head,
            running: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Spawn the check loop on the current tokio runtime; `false` if it is
    /// already running
    pub fn start(&self) -> bool {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return false;
        }

        let (quit, quit_rx) = oneshot::channel();
        let pregenerator = Pregenerator::new(self.dir.clone(), self.params);
        let handle = tokio::spawn(run(
            pregenerator,
            Arc::clone(&self.head),
            self.interval,
            quit_rx,
        ));
        *running = Some(Running { quit, handle });
        info!(dir = %self.dir.display(), "automatic DAG pregeneration on");
        true
    }

    /// Stop the loop, waiting for an in-flight generation to finish; `false`
    /// if it was not running
    pub async fn stop(&self) -> bool {
        let Some(Running { quit, handle }) = self.running.lock().take() else {
            return false;
        };
        let _ = quit.send(());
        let _ = handle.await;
        info!(dir = %self.dir.display(), "automatic DAG pregeneration off");
        true
    }
}

async fn run(
    mut pregenerator: Pregenerator,
    head: Arc<dyn ChainHead>,
    period: Duration,
    mut quit: oneshot::Receiver<()>,
) {
    // First tick fires immediately
    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let block = head.current_block();
                info!(block, dir = %pregenerator.dir().display(), "checking DAG");
                let checked = tokio::task::spawn_blocking(move || {
                    let outcome = pregenerator.check(block);
                    (pregenerator, outcome)
                })
                .await;
                match checked {
                    Ok((back, Ok(_))) => pregenerator = back,
                    Ok((_, Err(e))) => {
                        error!(error = %e, "DAG pregeneration failed");
                        return;
                    }
                    Err(e) => {
                        error!(error = %e, "DAG pregeneration task panicked");
                        return;
                    }
                }
            }
            _ = &mut quit => return,
        }
    }
}
