//! The generation request protocol.
//!
//! [`SlotDispatcher`] is the single path every caller uses to run a
//! generation: it serializes requests per slot (at most one in flight),
//! enforces a deadline, and reports backend-side cancellation. The
//! deadline covers the wait for the slot as well as the backend call
//! itself, so a caller always hears back within its deadline even when
//! the slot is wedged by an earlier request. A
//! request that outlives its deadline is abandoned, not torn down: the
//! backend task keeps running on its own, its result is discarded when
//! it arrives, and the slot's lock is released only at that point.
//! Slot reuse is therefore gated on actual completion rather than on a
//! timing guess.

use crate::{Backend, Error, GenerateRequest, SlotId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Behavior configuration for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Deadline applied to every request unless overridden per call.
    pub default_deadline: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_deadline: Duration::from_secs(30),
        }
    }
}

/// How a dispatched request ended, from the caller's perspective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The backend completed and returned the full text.
    Completed(String),

    /// The deadline elapsed. The backend call may still be running;
    /// its eventual result is discarded (fire-and-forget, no backend
    /// cancellation is propagated).
    TimedOut,

    /// The backend reported the request as cancelled on its side.
    Cancelled,
}

/// Serializes and deadlines generation requests per slot.
pub struct SlotDispatcher {
    backend: Arc<dyn Backend>,
    config: DispatchConfig,
    // One async mutex per slot enforces the single-flight rule; the
    // outer std mutex only guards the map itself.
    locks: std::sync::Mutex<HashMap<SlotId, Arc<Mutex<()>>>>,
}

impl SlotDispatcher {
    pub fn new(backend: Arc<dyn Backend>, config: DispatchConfig) -> Self {
        Self {
            backend,
            config,
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// The backend this dispatcher routes to.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Run a request against a slot with the default deadline.
    pub async fn request(
        &self,
        slot: SlotId,
        request: GenerateRequest,
    ) -> Result<RequestOutcome, Error> {
        self.request_with_deadline(slot, request, self.config.default_deadline)
            .await
    }

    /// Run a request against a slot, waiting at most `deadline`.
    ///
    /// Concurrent requests to the same slot are serialized, not
    /// rejected: a second caller waits for the first to finish. The
    /// deadline covers that wait too, so a slot wedged by an earlier
    /// request cannot stall later callers past their own deadline.
    /// Completions are correlated strictly by slot; a late result from
    /// an abandoned request is never delivered to a new caller.
    pub async fn request_with_deadline(
        &self,
        slot: SlotId,
        request: GenerateRequest,
        deadline: Duration,
    ) -> Result<RequestOutcome, Error> {
        let started = tokio::time::Instant::now();
        let guard = match tokio::time::timeout(deadline, self.slot_lock(slot).lock_owned()).await {
            Ok(guard) => guard,
            Err(_elapsed) => {
                tracing::warn!(%slot, ?deadline, "deadline elapsed waiting for the slot");
                return Ok(RequestOutcome::TimedOut);
            }
        };
        // Whatever the lock wait consumed comes out of the backend's
        // share of the deadline.
        let remaining = deadline.saturating_sub(started.elapsed());

        let backend = Arc::clone(&self.backend);
        let mut task = tokio::spawn(async move {
            let result = backend.generate(slot, request).await;
            // The lock is held until the backend actually returns, so
            // an abandoned request still blocks slot reuse until the
            // slot is genuinely free.
            drop(guard);
            result
        });

        match tokio::time::timeout(remaining, &mut task).await {
            Ok(Ok(Ok(completion))) => {
                if completion.cancelled {
                    tracing::debug!(%slot, "backend reported cancellation");
                    Ok(RequestOutcome::Cancelled)
                } else {
                    Ok(RequestOutcome::Completed(completion.text))
                }
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(join_error)) => Err(Error::Internal(format!(
                "generation task failed: {join_error}"
            ))),
            Err(_elapsed) => {
                tracing::warn!(%slot, ?deadline, "generation timed out; discarding late result");
                // `task` keeps running detached; its JoinHandle drop
                // does not abort it.
                Ok(RequestOutcome::TimedOut)
            }
        }
    }

    fn slot_lock(&self, slot: SlotId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("slot lock map poisoned");
        Arc::clone(locks.entry(slot).or_default())
    }
}
