//! Environment-perception text, anchored to target keywords.
//!
//! Two tiers: a natural attempt first, accepted if at least one target
//! keyword appears in the output; then a forced attempt whose grammar
//! makes the text open by naming the first target keyword. If even
//! that fails the caller gets a fixed generic sentence.

use crate::avatar::Avatar;
use crate::keywords;
use crate::narrative::NarrationNode;
use crate::persona::Persona;
use crate::slots::SlotRegistry;
use slotcast::dispatch::RequestOutcome;
use slotcast::{grammar, FieldSpec, GenerateRequest, SlotDispatcher};
use std::sync::Arc;

const GENERIC_OBSERVATION: &str =
    "You observe your surroundings carefully, but nothing new stands out.";

pub struct ObservationGenerator {
    dispatcher: Arc<SlotDispatcher>,
    registry: Arc<SlotRegistry>,
    max_tokens: usize,
    temperature: f32,
}

impl ObservationGenerator {
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

    /// Generate observation text for the persona at the node. Always
    /// returns a usable narration string.
    pub async fn generate(
        &self,
        persona: &Persona,
        node: &NarrationNode,
        avatar: &Avatar,
        targets: &[String],
    ) -> String {
        let slot = match self.registry.get_or_create(persona).await {
            Ok(slot) => slot,
            Err(e) => {
                tracing::warn!(persona = %persona.id, error = %e, "no slot for observation");
                return GENERIC_OBSERVATION.to_string();
            }
        };

        // Natural attempt: suggestions only, no grammar.
        let request = GenerateRequest::new(self.natural_prompt(node, avatar, targets))
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);
        match self.dispatcher.request(slot, request).await {
            Ok(RequestOutcome::Completed(text)) => {
                let text = text.trim();
                if !text.is_empty() {
                    // With no targets there is nothing to anchor on;
                    // any non-empty text is acceptable.
                    if targets.is_empty() || !keywords::matched_keywords(text, targets).is_empty() {
                        return text.to_string();
                    }
                    tracing::debug!(node = ?node.id, "natural observation missed every target keyword");
                }
            }
            Ok(outcome) => {
                tracing::debug!(node = ?node.id, ?outcome, "natural observation did not complete")
            }
            Err(e) => tracing::debug!(node = ?node.id, error = %e, "natural observation failed"),
        }

        // Forced attempt: the grammar opens the text with the first
        // target keyword, so at least one match is structural.
        if let Some(first) = targets.first() {
            let prefix = format!("You notice the {first}. ");
            let spec = FieldSpec::template(prefix, FieldSpec::text(20, 240), "");
            let request = GenerateRequest::new(self.forced_prompt(node, first))
                .with_grammar(grammar::compile(&spec))
                .with_max_tokens(self.max_tokens)
                .with_temperature(self.temperature);
            match self.dispatcher.request(slot, request).await {
                Ok(RequestOutcome::Completed(text)) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        return text.to_string();
                    }
                }
                Ok(outcome) => {
                    tracing::debug!(node = ?node.id, ?outcome, "forced observation did not complete")
                }
                Err(e) => tracing::debug!(node = ?node.id, error = %e, "forced observation failed"),
            }
        }

        GENERIC_OBSERVATION.to_string()
    }

    fn natural_prompt(&self, node: &NarrationNode, avatar: &Avatar, targets: &[String]) -> String {
        let mut prompt = String::new();
        prompt.push_str("Describe what you perceive, in your own voice, in two or three sentences.\n\n");
        prompt.push_str("The scene: ");
        prompt.push_str(&node.neutral_description());
        prompt.push('\n');
        if !targets.is_empty() {
            prompt.push_str("Details worth mentioning, if they fit naturally: ");
            prompt.push_str(&targets.join(", "));
            prompt.push_str(".\n");
        }
        if !avatar.inventory.is_empty() {
            prompt.push_str(&format!(
                "You are carrying: {}.\n",
                avatar
                    .inventory
                    .iter()
                    .map(|i| i.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        prompt
    }

    fn forced_prompt(&self, node: &NarrationNode, keyword: &str) -> String {
        format!(
            "Describe the {keyword} you perceive here, in your own voice.\nThe scene: {}\nBegin with: You notice the {keyword}.",
            node.neutral_description()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_catalog, sample_nodes, MockBackend};
    use crate::persona::PersonaId;
    use slotcast::{Backend, DispatchConfig};

    fn generator(backend: Arc<MockBackend>) -> ObservationGenerator {
        let backend = backend as Arc<dyn Backend>;
        let dispatcher = Arc::new(SlotDispatcher::new(
            Arc::clone(&backend),
            DispatchConfig::default(),
        ));
        let registry = Arc::new(SlotRegistry::new(backend));
        ObservationGenerator::new(dispatcher, registry, 220, 0.8)
    }

    fn fixtures() -> (Persona, NarrationNode, Avatar) {
        let catalog = sample_catalog();
        let nodes = sample_nodes();
        let persona = catalog.get(&PersonaId::new("gaze")).unwrap().clone();
        let node = nodes.get(crate::narrative::NodeId(1)).unwrap().clone();
        let avatar = Avatar::new(node.id);
        (persona, node, avatar)
    }

    #[tokio::test]
    async fn test_natural_tier_accepted_when_keyword_present() {
        let backend = Arc::new(MockBackend::new());
        backend.queue_text("The berries glisten along the fence line.");
        let gen = generator(Arc::clone(&backend));
        let (persona, node, avatar) = fixtures();

        let text = gen
            .generate(&persona, &node, &avatar, &node.keywords)
            .await;
        assert_eq!(text, "The berries glisten along the fence line.");
        assert_eq!(backend.generate_calls(), 1);
    }

    #[tokio::test]
    async fn test_forced_tier_on_keyword_miss() {
        let backend = Arc::new(MockBackend::new());
        backend.queue_text("A pleasant enough morning, all told.");
        backend.queue_text("You notice the berry. Ripe, nearly falling.");
        let gen = generator(Arc::clone(&backend));
        let (persona, node, avatar) = fixtures();

        let text = gen
            .generate(&persona, &node, &avatar, &node.keywords)
            .await;
        assert_eq!(text, "You notice the berry. Ripe, nearly falling.");
        assert_eq!(backend.generate_calls(), 2);
    }

    #[tokio::test]
    async fn test_generic_sentence_when_everything_fails() {
        let backend = Arc::new(MockBackend::new());
        // Nothing scripted: every generate errors.
        let gen = generator(backend);
        let (persona, node, avatar) = fixtures();

        let text = gen
            .generate(&persona, &node, &avatar, &node.keywords)
            .await;
        assert_eq!(text, GENERIC_OBSERVATION);
    }

    #[tokio::test]
    async fn test_empty_targets_accepts_any_text() {
        let backend = Arc::new(MockBackend::new());
        backend.queue_text("Still air, nothing speaking.");
        let gen = generator(backend);
        let (persona, node, avatar) = fixtures();

        let text = gen.generate(&persona, &node, &avatar, &[]).await;
        assert_eq!(text, "Still air, nothing speaking.");
    }
}
