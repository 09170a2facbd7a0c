//! Narration of resolved action results.
//!
//! Narration runs on the thinking persona's slot so the voice stays
//! consistent with the reasoning that proposed the action. Any failure
//! degrades to a minimal templated sentence.

use crate::avatar::Avatar;
use crate::gen::thinking::NarrativeAction;
use crate::narrative::Outcome;
use crate::persona::Persona;
use crate::slots::SlotRegistry;
use slotcast::dispatch::RequestOutcome;
use slotcast::{grammar, FieldSpec, GenerateRequest, SlotDispatcher};
use std::sync::Arc;

pub struct OutcomeNarrator {
    dispatcher: Arc<SlotDispatcher>,
    registry: Arc<SlotRegistry>,
    max_tokens: usize,
    temperature: f32,
}

impl OutcomeNarrator {
    pub fn new(
        dispatcher: Arc<SlotDispatcher>,
        registry: Arc<SlotRegistry>,
        max_tokens: usize,
        temperature: f32,
    ) -> Self {
        Self {
            dispatcher,
            registry,
            max_tokens,
            temperature,
        }
    }

    /// Narrate a resolved action from the thinking persona's voice.
    /// Always returns a usable sentence.
    pub async fn narrate(
        &self,
        action: &NarrativeAction,
        acting: &Persona,
        thinking: &Persona,
        outcome: &Outcome,
        succeeded: bool,
        difficulty: f32,
        _avatar: &Avatar,
    ) -> String {
        let fallback = || {
            if succeeded {
                format!("The action succeeded: {}", outcome.phrase())
            } else {
                "The attempt failed.".to_string()
            }
        };

        let slot = match self.registry.get_or_create(thinking).await {
            Ok(slot) => slot,
            Err(e) => {
                tracing::warn!(persona = %thinking.id, error = %e, "no slot for narration");
                return fallback();
            }
        };

        let request = GenerateRequest::new(self.prompt(action, acting, outcome, succeeded, difficulty))
            .with_grammar(grammar::compile(&FieldSpec::text(20, 300)))
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);

        match self.dispatcher.request(slot, request).await {
            Ok(RequestOutcome::Completed(text)) if !text.trim().is_empty() => {
                text.trim().to_string()
            }
            Ok(outcome) => {
                tracing::debug!(?outcome, "narration did not complete");
                fallback()
            }
            Err(e) => {
                tracing::debug!(error = %e, "narration failed");
                fallback()
            }
        }
    }

    fn prompt(
        &self,
        action: &NarrativeAction,
        acting: &Persona,
        outcome: &Outcome,
        succeeded: bool,
        difficulty: f32,
    ) -> String {
        let effort = if difficulty >= 0.7 {
            "a demanding attempt"
        } else if difficulty >= 0.4 {
            "a fair attempt"
        } else {
            "an easy attempt"
        };

        let mut prompt = String::new();
        prompt.push_str(&format!(
            "The avatar attempted, with {}: \"{}\" — {effort}.\n",
            acting.name, action.text
        ));
        if succeeded {
            prompt.push_str(&format!("It worked. The result: {}\n", outcome.phrase()));
            prompt.push_str("Narrate the success in one or two sentences, in your own voice.");
        } else {
            prompt.push_str("It failed.\n");
            prompt.push_str("Narrate the failure in one or two sentences, in your own voice.");
        }
        prompt
    }
}
