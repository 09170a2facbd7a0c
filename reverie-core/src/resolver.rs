//! The skill-check state machine.
//!
//! An executed action moves through Validating, PlausibilityGate,
//! DifficultyScoring, Rolling, OutcomeDetermination, Applying and
//! Narrating, with an early Rejected exit from the first two states.
//! Every internal failure degrades to a fixed fallback narration; no
//! error leaves this component and the turn always completes.

use crate::avatar::{Avatar, Humor};
use crate::gen::narrator::OutcomeNarrator;
use crate::gen::oracle::{CoherenceOracle, NEUTRAL_SCORE};
use crate::gen::thinking::NarrativeAction;
use crate::narrative::{failure_catalog, NarrationNode, Outcome, OutcomeKind};
use crate::persona::{Persona, PersonaCatalog, PersonaId};
use crate::slots::SlotRegistry;
use rand::Rng;
use slotcast::SlotId;
use std::sync::Arc;

/// Actions averaging below this across the three plausibility
/// questions are rejected before any roll.
pub const PLAUSIBILITY_FLOOR: f32 = 0.3;

const UNAVAILABLE_NARRATION: &str = "You don't know how to do that.";
const IMPLAUSIBLE_NARRATION: &str = "That doesn't make sense here.";

/// Why an action was rejected before the roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// The declared skill is not among the avatar's known skills.
    UnavailableSkill,
    /// The action failed the coherence gate.
    Implausible,
}

/// The resolution record for one executed action.
#[derive(Debug, Clone)]
pub struct ActionExecutionResult {
    pub action: NarrativeAction,
    /// The skill the check was made with.
    pub skill: PersonaId,
    /// Difficulty score in [0,1]; None when rejected before scoring.
    pub difficulty: Option<f32>,
    pub succeeded: bool,
    /// The concrete outcome applied to the avatar, if any.
    pub outcome: Option<Outcome>,
    pub narration: String,
    pub rejection: Option<RejectionReason>,
}

/// Success probability for a difficulty score and the acting skill's
/// primary body-part level: `clamp(0.95 - 0.55x + 0.02(b-5), 0.10, 0.95)`.
pub fn success_probability(difficulty: f32, body_level: u8) -> f64 {
    let base = 0.95 - 0.55 * difficulty as f64;
    let adjusted = base + 0.02 * (body_level as f64 - 5.0);
    adjusted.clamp(0.10, 0.95)
}

/// Inclusive on the proceed side: an average of exactly the floor
/// proceeds to difficulty scoring.
pub fn passes_plausibility(average: f32) -> bool {
    average + 1e-6 >= PLAUSIBILITY_FLOOR
}

/// Map a feel-good confidence to the humor amount it awards.
pub fn feel_good_amount(confidence: f32) -> i32 {
    if confidence >= 0.8 {
        5
    } else if confidence >= 0.6 {
        3
    } else if confidence >= 0.4 {
        2
    } else {
        1
    }
}

fn unavailable_outcome() -> Outcome {
    Outcome::humor(
        "rejected.unavailable",
        Humor::Serenity,
        -2,
        "A flicker of unease at your own limits.",
    )
}

pub struct ActionResolver {
    registry: Arc<SlotRegistry>,
    oracle: CoherenceOracle,
    narrator: OutcomeNarrator,
    /// Fixes the uniform roll for deterministic tests.
    forced_roll: Option<f64>,
}

impl ActionResolver {
    pub fn new(
        registry: Arc<SlotRegistry>,
        oracle: CoherenceOracle,
        narrator: OutcomeNarrator,
        forced_roll: Option<f64>,
    ) -> Self {
        Self {
            registry,
            oracle,
            narrator,
            forced_roll,
        }
    }

    /// Run the full state machine for one action. Mutates avatar state
    /// in the Applying phase only; narration happens after application,
    /// sequentially, within this one resolution.
    pub async fn execute(
        &self,
        action: &NarrativeAction,
        node: &NarrationNode,
        thinking: &Persona,
        catalog: &PersonaCatalog,
        avatar: &mut Avatar,
    ) -> ActionExecutionResult {
        // Validating: the skill must be in the avatar's known set. No
        // coherence question or roll happens on this path.
        let acting = match catalog.get(&action.skill) {
            Some(persona) if avatar.knows_skill(&action.skill) => persona,
            _ => {
                let outcome = unavailable_outcome();
                apply_outcome(&outcome, avatar);
                return ActionExecutionResult {
                    action: action.clone(),
                    skill: action.skill.clone(),
                    difficulty: None,
                    succeeded: false,
                    outcome: Some(outcome),
                    narration: UNAVAILABLE_NARRATION.to_string(),
                    rejection: Some(RejectionReason::UnavailableSkill),
                };
            }
        };

        let slot = match self.registry.get_or_create(thinking).await {
            Ok(slot) => Some(slot),
            Err(e) => {
                tracing::warn!(persona = %thinking.id, error = %e, "no slot for resolution; using neutral scores");
                None
            }
        };

        // PlausibilityGate: three independently phrased questions,
        // averaged.
        let questions = [
            format!(
                "In {}, the avatar wants to: \"{}\". Does this action make sense here?",
                node.name, action.text
            ),
            format!(
                "Could someone plausibly attempt \"{}\" in this situation?",
                action.text
            ),
            format!(
                "Is \"{}\" a coherent thing to try right now?",
                action.text
            ),
        ];
        let mut total = 0.0f32;
        for question in &questions {
            total += self.score(slot, question).await;
        }
        let average = total / questions.len() as f32;
        if !passes_plausibility(average) {
            tracing::debug!(average, action = %action.text, "action rejected as implausible");
            return ActionExecutionResult {
                action: action.clone(),
                skill: action.skill.clone(),
                difficulty: None,
                succeeded: false,
                outcome: None,
                narration: IMPLAUSIBLE_NARRATION.to_string(),
                rejection: Some(RejectionReason::Implausible),
            };
        }

        // DifficultyScoring and Rolling.
        let difficulty = self
            .score(
                slot,
                &format!("Is it difficult to {}", as_question(&action.text)),
            )
            .await;
        let body_level = avatar.body_level(acting.primary_body_part());
        let probability = success_probability(difficulty, body_level);
        let roll = self
            .forced_roll
            .unwrap_or_else(|| rand::thread_rng().gen::<f64>());
        let succeeded = roll < probability;
        tracing::debug!(difficulty, probability, roll, succeeded, "skill check rolled");

        // OutcomeDetermination: the preselected outcome on success, the
        // best-matching generic failure otherwise.
        let outcome = if succeeded {
            action.outcome.clone()
        } else {
            self.pick_failure_outcome(slot, &action.text).await
        };

        // Applying. Feel-good outcomes resolve their humor at
        // narration time instead.
        let applied = match &outcome.kind {
            OutcomeKind::FeelGood => {
                let (humor, amount) = self.resolve_feel_good(slot, &action.text).await;
                avatar.apply_humor_delta(humor, amount);
                Outcome::humor(
                    format!("{}.resolved", outcome.id),
                    humor,
                    amount,
                    outcome.phrase(),
                )
            }
            _ => {
                apply_outcome(&outcome, avatar);
                outcome
            }
        };

        // Narrating.
        let narration = self
            .narrator
            .narrate(action, acting, thinking, &applied, succeeded, difficulty, avatar)
            .await;

        ActionExecutionResult {
            action: action.clone(),
            skill: action.skill.clone(),
            difficulty: Some(difficulty),
            succeeded,
            outcome: Some(applied),
            narration,
            rejection: None,
        }
    }

    async fn score(&self, slot: Option<SlotId>, question: &str) -> f32 {
        match slot {
            Some(slot) => self.oracle.score(slot, question).await,
            None => NEUTRAL_SCORE,
        }
    }

    /// Score the fixed failure catalog for contextual fit; the first
    /// highest scorer wins ties.
    async fn pick_failure_outcome(&self, slot: Option<SlotId>, action_text: &str) -> Outcome {
        let catalog = failure_catalog();
        let mut best = &catalog[0];
        let mut best_score = f32::MIN;
        for entry in catalog {
            let question = format!(
                "Would failing to {} leave someone feeling {}?",
                as_question(action_text),
                entry.feeling
            );
            let score = self.score(slot, &question).await;
            if score > best_score {
                best_score = score;
                best = entry;
            }
        }
        best.outcome.clone()
    }

    /// Resolve a feel-good outcome to a concrete {humor, amount} pair
    /// by scoring every known humor against the action text.
    async fn resolve_feel_good(&self, slot: Option<SlotId>, action_text: &str) -> (Humor, i32) {
        let mut best = Humor::ALL[0];
        let mut best_score = f32::MIN;
        for humor in Humor::ALL {
            let question = format!(
                "Would succeeding at \"{action_text}\" fill someone with {}?",
                humor.name()
            );
            let score = self.score(slot, &question).await;
            if score > best_score {
                best_score = score;
                best = humor;
            }
        }
        (best, feel_good_amount(best_score))
    }
}

/// Mutate avatar state per the outcome's kind. Transitions are
/// reported, not performed; navigation belongs to the caller.
fn apply_outcome(outcome: &Outcome, avatar: &mut Avatar) {
    match &outcome.kind {
        OutcomeKind::Item(item) => avatar.inventory.push(item.clone()),
        OutcomeKind::Humor { humor, delta } => avatar.apply_humor_delta(*humor, *delta),
        OutcomeKind::Transition { .. } => {}
        OutcomeKind::FeelGood => {
            // Resolved by the caller at narration time.
        }
    }
}

/// Lowercase the leading letter and strip a trailing period so action
/// text reads as part of a question.
fn as_question(action_text: &str) -> String {
    let trimmed = action_text.trim().trim_end_matches('.');
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => format!("{}{}", first.to_ascii_lowercase(), chars.as_str()),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probability_midpoint() {
        let p = success_probability(0.5, 5);
        assert!((p - 0.675).abs() < 1e-9);
    }

    #[test]
    fn test_probability_hard_strong() {
        // x=1.0, b=10: 0.40 + 0.10 = 0.50.
        let p = success_probability(1.0, 10);
        assert!((p - 0.50).abs() < 1e-9);
    }

    #[test]
    fn test_probability_clamped_high() {
        // x=0.0, b=10: 0.95 + 0.10 clamps to 0.95.
        assert_eq!(success_probability(0.0, 10), 0.95);
    }

    #[test]
    fn test_probability_body_level_adjustment() {
        let weak = success_probability(0.5, 1);
        let strong = success_probability(0.5, 9);
        assert!((strong - weak - 0.16).abs() < 1e-9);
    }

    #[test]
    fn test_plausibility_boundary() {
        assert!(!passes_plausibility(0.29));
        assert!(passes_plausibility(0.30));
        // Averages computed in f32 may land a hair under the floor.
        assert!(passes_plausibility((0.3 + 0.3 + 0.3) / 3.0));
    }

    #[test]
    fn test_feel_good_bands() {
        assert_eq!(feel_good_amount(0.9), 5);
        assert_eq!(feel_good_amount(0.8), 5);
        assert_eq!(feel_good_amount(0.7), 3);
        assert_eq!(feel_good_amount(0.5), 2);
        assert_eq!(feel_good_amount(0.1), 1);
    }

    #[test]
    fn test_as_question() {
        assert_eq!(as_question("Pick a handful."), "pick a handful");
        assert_eq!(as_question(""), "");
    }
}
