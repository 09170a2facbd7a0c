//! Persona reasoning and candidate actions for a keyword.
//!
//! The backend is asked for a JSON plan under a grammar that closes
//! the skill and outcome vocabularies to the candidate sets. Parsed
//! actions are validated individually: one bad action is dropped (and
//! logged), not the whole batch. If the request fails outright or no
//! action survives validation, a deterministic local generator
//! synthesizes actions from the candidates so the turn loop always has
//! something to offer.

use crate::avatar::Avatar;
use crate::narrative::{NarrationNode, Outcome, OutcomeKind};
use crate::persona::{Persona, PersonaId};
use crate::slots::SlotRegistry;
use rand::seq::SliceRandom;
use serde::Deserialize;
use slotcast::dispatch::RequestOutcome;
use slotcast::{grammar, GenerateRequest, SlotDispatcher};
use std::collections::HashMap;
use std::sync::Arc;

/// A candidate action surfaced to the player.
#[derive(Debug, Clone)]
pub struct NarrativeAction {
    /// The skill to attempt the action with.
    pub skill: PersonaId,
    /// The outcome this action targets, already resolved to its typed
    /// value.
    pub outcome: Outcome,
    /// Free text describing the attempt.
    pub text: String,
    /// The thinking persona that proposed this action.
    pub persona: PersonaId,
    /// The keyword the reasoning was anchored to.
    pub keyword: String,
}

/// Reasoning text plus the actions it proposed.
#[derive(Debug, Clone)]
pub struct ThinkingOutput {
    pub reasoning: String,
    pub actions: Vec<NarrativeAction>,
}

pub struct ThinkingGenerator {
    dispatcher: Arc<SlotDispatcher>,
    registry: Arc<SlotRegistry>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    reasoning: String,
    actions: Vec<RawAction>,
}

#[derive(Debug, Deserialize)]
struct RawAction {
    skill: String,
    outcome: String,
    attempt: String,
}

impl ThinkingGenerator {
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

    /// Generate reasoning and 2-5 candidate actions for the keyword.
    /// Falls back to locally synthesized actions when the backend
    /// yields nothing usable, so the result is non-empty whenever the
    /// candidate sets are.
    pub async fn generate(
        &self,
        persona: &Persona,
        keyword: &str,
        node: &NarrationNode,
        candidate_outcomes: &[Outcome],
        candidate_skills: &[&Persona],
        _avatar: &Avatar,
    ) -> ThinkingOutput {
        if candidate_outcomes.is_empty() || candidate_skills.is_empty() {
            tracing::warn!(keyword, "no candidates to reason over");
            return ThinkingOutput {
                reasoning: fallback_reasoning(keyword),
                actions: Vec::new(),
            };
        }

        // Phrase -> outcome and name -> skill lookups, computed once
        // per candidate set.
        let outcome_by_phrase: HashMap<&str, &Outcome> = candidate_outcomes
            .iter()
            .map(|o| (o.phrase(), o))
            .collect();
        let skill_by_name: HashMap<&str, &Persona> = candidate_skills
            .iter()
            .map(|p| (p.name.as_str(), *p))
            .collect();

        if let Some(output) = self
            .try_backend_plan(
                persona,
                keyword,
                node,
                candidate_outcomes,
                candidate_skills,
                &outcome_by_phrase,
                &skill_by_name,
            )
            .await
        {
            return output;
        }

        self.local_fallback(persona, keyword, candidate_outcomes, candidate_skills)
    }

    #[allow(clippy::too_many_arguments)]
    async fn try_backend_plan(
        &self,
        persona: &Persona,
        keyword: &str,
        node: &NarrationNode,
        candidate_outcomes: &[Outcome],
        candidate_skills: &[&Persona],
        outcome_by_phrase: &HashMap<&str, &Outcome>,
        skill_by_name: &HashMap<&str, &Persona>,
    ) -> Option<ThinkingOutput> {
        let slot = match self.registry.get_or_create(persona).await {
            Ok(slot) => slot,
            Err(e) => {
                tracing::warn!(persona = %persona.id, error = %e, "no slot for thinking");
                return None;
            }
        };

        let skill_names: Vec<&str> = candidate_skills.iter().map(|p| p.name.as_str()).collect();
        let phrases: Vec<&str> = candidate_outcomes.iter().map(|o| o.phrase()).collect();
        let plan_grammar = grammar::action_plan(&skill_names, &phrases, 2, 5);

        let request = GenerateRequest::new(self.prompt(keyword, node, &skill_names, &phrases))
            .with_grammar(plan_grammar)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);

        let text = match self.dispatcher.request(slot, request).await {
            Ok(RequestOutcome::Completed(text)) => text,
            Ok(outcome) => {
                tracing::debug!(keyword, ?outcome, "thinking request did not complete");
                return None;
            }
            Err(e) => {
                tracing::debug!(keyword, error = %e, "thinking request failed");
                return None;
            }
        };

        let plan: RawPlan = match serde_json::from_str(&text) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::debug!(keyword, error = %e, "thinking plan failed to parse");
                return None;
            }
        };

        let mut actions = Vec::new();
        for raw in plan.actions {
            let Some(skill) = skill_by_name.get(raw.skill.as_str()) else {
                tracing::debug!(skill = %raw.skill, "dropping action with unknown skill");
                continue;
            };
            let Some(outcome) = outcome_by_phrase.get(raw.outcome.as_str()) else {
                tracing::debug!(outcome = %raw.outcome, "dropping action with unknown outcome");
                continue;
            };
            actions.push(NarrativeAction {
                skill: skill.id.clone(),
                outcome: (*outcome).clone(),
                text: raw.attempt,
                persona: persona.id.clone(),
                keyword: keyword.to_string(),
            });
        }

        if actions.is_empty() {
            tracing::debug!(keyword, "no valid actions in backend plan");
            return None;
        }

        Some(ThinkingOutput {
            reasoning: plan.reasoning,
            actions,
        })
    }

    /// Deterministic local generation: shuffle the candidate outcomes,
    /// pair each with a random candidate skill, and template the
    /// attempt text from the outcome's kind.
    fn local_fallback(
        &self,
        persona: &Persona,
        keyword: &str,
        candidate_outcomes: &[Outcome],
        candidate_skills: &[&Persona],
    ) -> ThinkingOutput {
        let mut rng = rand::thread_rng();
        let mut outcomes: Vec<&Outcome> = candidate_outcomes.iter().collect();
        outcomes.shuffle(&mut rng);

        let mut actions = Vec::new();
        for outcome in outcomes.into_iter().take(5) {
            let skill = candidate_skills
                .choose(&mut rng)
                .expect("candidate skills checked non-empty");
            let text = match &outcome.kind {
                OutcomeKind::Item(item) => format!("Reach out and take the {}.", item.name),
                OutcomeKind::Transition { label, .. } => {
                    format!("Leave this place and head for {label}.")
                }
                OutcomeKind::FeelGood => format!("Linger on the {keyword} and take it in."),
                OutcomeKind::Humor { .. } => {
                    format!("Dwell on the {keyword} and let the feeling settle.")
                }
            };
            actions.push(NarrativeAction {
                skill: skill.id.clone(),
                outcome: outcome.clone(),
                text,
                persona: persona.id.clone(),
                keyword: keyword.to_string(),
            });
        }

        ThinkingOutput {
            reasoning: fallback_reasoning(keyword),
            actions,
        }
    }

    fn prompt(
        &self,
        keyword: &str,
        node: &NarrationNode,
        skill_names: &[&str],
        phrases: &[&str],
    ) -> String {
        let mut prompt = String::new();
        prompt.push_str(&format!(
            "Your attention has caught on the {keyword}. Reason about it in your own voice, then propose between two and five concrete actions.\n\n"
        ));
        prompt.push_str("The scene: ");
        prompt.push_str(&node.neutral_description());
        prompt.push_str("\n\nSkills at your disposal: ");
        prompt.push_str(&skill_names.join(", "));
        prompt.push_str(".\nEach action must aim at exactly one of these results:\n");
        for phrase in phrases {
            prompt.push_str(&format!("- {phrase}\n"));
        }
        prompt.push_str(
            "\nAnswer as JSON: {\"reasoning\": ..., \"actions\": [{\"skill\": ..., \"outcome\": ..., \"attempt\": ...}]}\n",
        );
        prompt
    }
}

fn fallback_reasoning(keyword: &str) -> String {
    format!("Your thoughts circle the {keyword}, weighing what might be done.")
}
