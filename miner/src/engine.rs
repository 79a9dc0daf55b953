use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Error of a seal attempt that produced no sealed output.
#[derive(Debug, Error)]
pub enum SealError<E>
where
    E: std::error::Error + 'static,
{
    /// The attempt observed its cancellation token and stopped early.
    ///
    /// Expected whenever in-flight work is superseded or the agent stops.
    /// Never reported as a failure.
    #[error("sealing was cancelled")]
    Cancelled,
    /// The engine failed for a reason other than cancellation.
    #[error("seal engine failure")]
    Engine(#[source] E),
}

/// Extended capability for engines that measure their own throughput.
///
/// Not every engine measures anything. Callers obtain an implementation
/// through [`SealEngine::hashrate_meter`] at query time.
pub trait HashrateMeter: Send + Sync {
    /// The currently measured hash rate, in hashes per second.
    fn hashrate(&self) -> f64;
}

/// The sealing capability bound to an agent.
///
/// Sealing is the long-running external computation that completes a block,
/// for example by solving a proof-of-work puzzle over it. The chain handle is
/// passed through to every attempt untouched; what it contains is entirely
/// between the engine and whoever constructed it.
#[async_trait]
pub trait SealEngine: Send + Sync + 'static {
    /// Read-only chain handle passed through to every attempt.
    type Chain: Send + Sync + 'static;
    /// Block type an attempt completes.
    type Block: Clone + Send + 'static;
    /// Sealed output produced by a successful attempt.
    type Sealed: Send + 'static;
    /// Engine failure type.
    type Error: std::error::Error + Send + 'static;

    /// Attempt to seal `block`.
    ///
    /// `Ok(None)` means the attempt ran to completion without producing
    /// anything, and without failing. Implementations must observe `cancel`
    /// and return promptly once it fires, reporting
    /// [`SealError::Cancelled`]. Cancellation is cooperative: nothing else
    /// interrupts a running attempt.
    async fn seal(
        &self,
        chain: &Self::Chain,
        block: Self::Block,
        cancel: CancellationToken,
    ) -> Result<Option<Self::Sealed>, SealError<Self::Error>>;

    /// Runtime probe for the hash-rate capability.
    ///
    /// Engines that do not measure throughput keep the default.
    fn hashrate_meter(&self) -> Option<&dyn HashrateMeter> {
        None
    }
}
