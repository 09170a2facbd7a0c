//! NarrativeEngine - the public API of the core.
//!
//! Wires the slot registry, request dispatcher, generators and the
//! action resolver around an explicitly constructed persona catalog
//! and node registry. The three public operations never return an
//! error: every internal failure degrades to usable, if templated,
//! content.

use crate::avatar::Avatar;
use crate::gen::{
    CoherenceOracle, ObservationGenerator, OutcomeNarrator, ThinkingGenerator, ThinkingOutput,
};
use crate::gen::thinking::NarrativeAction;
use crate::narrative::{NodeId, NodeRegistry};
use crate::persona::{PersonaCatalog, PersonaId, Role};
use crate::resolver::{ActionExecutionResult, ActionResolver};
use crate::slots::SlotRegistry;
use slotcast::{Backend, DispatchConfig, SlotDispatcher};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline for every backend request.
    pub request_deadline: Duration,

    /// Token budget for observation text.
    pub observation_max_tokens: usize,

    /// Token budget for the reasoning/action plan.
    pub thinking_max_tokens: usize,

    /// Token budget for outcome narration.
    pub narration_max_tokens: usize,

    /// Sampling temperature for prose generation.
    pub temperature: f32,

    /// Fixes the skill-check roll; for deterministic tests only.
    pub forced_roll: Option<f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_deadline: Duration::from_secs(30),
            observation_max_tokens: 220,
            thinking_max_tokens: 400,
            narration_max_tokens: 160,
            temperature: 0.8,
            forced_roll: None,
        }
    }
}

impl EngineConfig {
    pub fn with_request_deadline(mut self, deadline: Duration) -> Self {
        self.request_deadline = deadline;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_forced_roll(mut self, roll: f64) -> Self {
        self.forced_roll = Some(roll);
        self
    }
}

/// The narrative turn engine.
pub struct NarrativeEngine {
    catalog: PersonaCatalog,
    nodes: NodeRegistry,
    registry: Arc<SlotRegistry>,
    observation: ObservationGenerator,
    thinking: ThinkingGenerator,
    resolver: ActionResolver,
}

impl NarrativeEngine {
    pub fn new(
        backend: Arc<dyn Backend>,
        catalog: PersonaCatalog,
        nodes: NodeRegistry,
        config: EngineConfig,
    ) -> Self {
        let dispatcher = Arc::new(SlotDispatcher::new(
            Arc::clone(&backend),
            DispatchConfig {
                default_deadline: config.request_deadline,
            },
        ));
        let registry = Arc::new(SlotRegistry::new(backend));

        let observation = ObservationGenerator::new(
            Arc::clone(&dispatcher),
            Arc::clone(&registry),
            config.observation_max_tokens,
            config.temperature,
        );
        let thinking = ThinkingGenerator::new(
            Arc::clone(&dispatcher),
            Arc::clone(&registry),
            config.thinking_max_tokens,
            config.temperature,
        );
        let narrator = OutcomeNarrator::new(
            Arc::clone(&dispatcher),
            Arc::clone(&registry),
            config.narration_max_tokens,
            config.temperature,
        );
        let oracle = CoherenceOracle::new(Arc::clone(&dispatcher));
        let resolver = ActionResolver::new(
            Arc::clone(&registry),
            oracle,
            narrator,
            config.forced_roll,
        );

        Self {
            catalog,
            nodes,
            registry,
            observation,
            thinking,
            resolver,
        }
    }

    pub fn catalog(&self) -> &PersonaCatalog {
        &self.catalog
    }

    pub fn nodes(&self) -> &NodeRegistry {
        &self.nodes
    }

    pub fn slot_registry(&self) -> &Arc<SlotRegistry> {
        &self.registry
    }

    /// Generate observation text for the persona at the node,
    /// anchored to the node's keywords.
    pub async fn generate_observation(
        &self,
        persona_id: &PersonaId,
        node_id: NodeId,
        avatar: &Avatar,
    ) -> String {
        let (Some(persona), Some(node)) = (self.catalog.get(persona_id), self.nodes.get(node_id))
        else {
            tracing::warn!(%persona_id, ?node_id, "unknown persona or node for observation");
            return "You observe your surroundings carefully, but nothing new stands out."
                .to_string();
        };
        self.observation
            .generate(persona, node, avatar, &node.keywords)
            .await
    }

    /// Generate reasoning and candidate actions for a keyword at the
    /// node. Candidate skills are the avatar's known Action personas;
    /// candidate outcomes are everything reachable from the node.
    pub async fn generate_thinking(
        &self,
        persona_id: &PersonaId,
        keyword: &str,
        node_id: NodeId,
        avatar: &Avatar,
    ) -> ThinkingOutput {
        let (Some(persona), Some(node)) = (self.catalog.get(persona_id), self.nodes.get(node_id))
        else {
            tracing::warn!(%persona_id, ?node_id, "unknown persona or node for thinking");
            return ThinkingOutput {
                reasoning: format!("Your thoughts circle the {keyword}, but nothing comes."),
                actions: Vec::new(),
            };
        };

        let candidate_skills: Vec<_> = self
            .catalog
            .with_role(Role::Action)
            .into_iter()
            .filter(|p| avatar.knows_skill(&p.id))
            .collect();

        self.thinking
            .generate(
                persona,
                keyword,
                node,
                node.reachable_outcomes(),
                &candidate_skills,
                avatar,
            )
            .await
    }

    /// Execute one chosen action: validate, gate, score, roll, apply
    /// the outcome to the avatar, and narrate. Never fails; the worst
    /// case is a templated resolution.
    pub async fn execute_action(
        &self,
        action: &NarrativeAction,
        node_id: NodeId,
        thinking_persona: &PersonaId,
        avatar: &mut Avatar,
    ) -> ActionExecutionResult {
        let (Some(thinking), Some(node)) = (
            self.catalog.get(thinking_persona),
            self.nodes.get(node_id),
        ) else {
            tracing::warn!(%thinking_persona, ?node_id, "unknown persona or node for execution");
            return ActionExecutionResult {
                action: action.clone(),
                skill: action.skill.clone(),
                difficulty: None,
                succeeded: false,
                outcome: None,
                narration: "Nothing comes of it.".to_string(),
                rejection: None,
            };
        };

        if !node.contains_outcome(&action.outcome.id) {
            tracing::debug!(outcome = %action.outcome.id, ?node_id, "action targets an outcome not owned by the current node");
        }

        self.resolver
            .execute(action, node, thinking, &self.catalog, avatar)
            .await
    }
}
