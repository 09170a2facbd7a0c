//! Coherence scoring.
//!
//! The oracle asks the backend one question at a time and constrains
//! the answer to an enumerated 0-10 choice, mapped into [0,1]. Any
//! failure (timeout, cancellation, unparseable answer) degrades to a
//! neutral score so callers can keep averaging.

use slotcast::{FieldSpec, GenerateRequest, SlotDispatcher, SlotId};
use slotcast::dispatch::RequestOutcome;
use slotcast::grammar;
use std::sync::Arc;

/// Returned when the backend gives no usable answer.
pub const NEUTRAL_SCORE: f32 = 0.5;

/// Asks single coherence questions and maps answers to [0,1].
pub struct CoherenceOracle {
    dispatcher: Arc<SlotDispatcher>,
}

impl CoherenceOracle {
    pub fn new(dispatcher: Arc<SlotDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Ask one question on the given slot. Never errors; degraded
    /// answers come back as [`NEUTRAL_SCORE`].
    pub async fn score(&self, slot: SlotId, question: &str) -> f32 {
        let choices: Vec<String> = (0..=10u32).map(|n| n.to_string()).collect();
        let prompt = format!(
            "{question}\nRate from 0 (not at all) to 10 (absolutely). Answer with a single number."
        );
        let request = GenerateRequest::new(prompt)
            .with_grammar(grammar::compile(&FieldSpec::Choice(choices)))
            .with_max_tokens(4)
            .with_temperature(0.0);

        match self.dispatcher.request(slot, request).await {
            Ok(RequestOutcome::Completed(text)) => match text.trim().parse::<u32>() {
                Ok(n) => (n.min(10) as f32) / 10.0,
                Err(_) => {
                    tracing::debug!(answer = %text, "unparseable coherence answer");
                    NEUTRAL_SCORE
                }
            },
            Ok(other) => {
                tracing::debug!(?other, "coherence question did not complete");
                NEUTRAL_SCORE
            }
            Err(e) => {
                tracing::debug!(error = %e, "coherence question failed");
                NEUTRAL_SCORE
            }
        }
    }
}
