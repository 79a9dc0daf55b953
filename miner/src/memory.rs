//! Memory-only implementations. Useful for testing.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::engine::{HashrateMeter, SealEngine, SealError};

/// A chain handle with no contents, for engines that ignore chain state.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryChain;

/// Failure reported by [`MemoryEngine`] in [`MemorySeal::Fail`] mode.
#[derive(Clone, Debug, Error)]
#[error("{0}")]
pub struct MemoryEngineError(String);

/// What a [`MemoryEngine`] does with each seal attempt.
#[derive(Clone, Debug)]
pub enum MemorySeal {
    /// Produce a sealed output immediately.
    Complete,
    /// Run until the cancellation token fires, then report cancellation.
    Hold,
    /// Fail with the given message.
    Fail(String),
}

/// A seal engine that resides entirely in memory.
///
/// The sealed output is the attempt ordinal, starting from one. Clones share
/// the attempt counter, so a clone kept outside an agent observes the
/// attempts the agent dispatches.
#[derive(Clone, Debug)]
pub struct MemoryEngine<B> {
    mode: MemorySeal,
    hashrate: Option<f64>,
    attempts: Arc<AtomicU64>,
    _block: PhantomData<fn(B) -> B>,
}

impl<B> MemoryEngine<B> {
    /// Create an engine with the given seal behavior.
    pub fn new(mode: MemorySeal) -> Self {
        Self {
            mode,
            hashrate: None,
            attempts: Arc::new(AtomicU64::new(0)),
            _block: PhantomData,
        }
    }

    /// Expose the hash-rate capability, reporting `rate`.
    pub fn with_hashrate(mut self, rate: f64) -> Self {
        self.hashrate = Some(rate);
        self
    }

    /// Number of seal attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl<B> HashrateMeter for MemoryEngine<B> {
    fn hashrate(&self) -> f64 {
        self.hashrate.unwrap_or_default()
    }
}

#[async_trait]
impl<B> SealEngine for MemoryEngine<B>
where
    B: Clone + Send + 'static,
{
    type Chain = MemoryChain;
    type Block = B;
    type Sealed = u64;
    type Error = MemoryEngineError;

    async fn seal(
        &self,
        _chain: &MemoryChain,
        _block: B,
        cancel: CancellationToken,
    ) -> Result<Option<u64>, SealError<MemoryEngineError>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        match &self.mode {
            MemorySeal::Complete => Ok(Some(attempt)),
            MemorySeal::Hold => {
                cancel.cancelled().await;
                Err(SealError::Cancelled)
            }
            MemorySeal::Fail(message) => {
                Err(SealError::Engine(MemoryEngineError(message.clone())))
            }
        }
    }

    fn hashrate_meter(&self) -> Option<&dyn HashrateMeter> {
        if self.hashrate.is_some() {
            Some(self)
        } else {
            None
        }
    }
}
