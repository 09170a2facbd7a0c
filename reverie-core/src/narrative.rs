//! Narration nodes and their outcomes.
//!
//! A node is a location/scene: it owns a closed set of keywords and
//! the outcomes reachable from it. Outcomes are registered explicitly
//! on their owning node; [`NodeRegistry::new`] validates at load time
//! that every outcome belongs to exactly one node. Each outcome
//! carries a stable id and renders its natural-language phrase once at
//! construction — prompting and parse-back both go through that
//! rendered phrase, matched by id lookup rather than free-text
//! equality.

use crate::avatar::Humor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Numeric location id; doubles as the seed for description variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Stable identifier for an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutcomeId(pub String);

impl OutcomeId {
    pub fn new(id: impl Into<String>) -> Self {
        OutcomeId(id.into())
    }
}

impl std::fmt::Display for OutcomeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An acquirable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub description: String,
    pub keywords: Vec<String>,
}

/// What kind of consequence an outcome is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutcomeKind {
    /// Acquire an item.
    Item(Item),

    /// Move to another node on success. The resolver reports the
    /// transition; the caller owns navigation.
    Transition { to: NodeId, label: String },

    /// A success whose emotional consequence is resolved at narration
    /// time by scoring the known humors against the action text.
    FeelGood,

    /// A direct signed delta to one humor; chiefly a failure
    /// consequence.
    Humor { humor: Humor, delta: i32 },
}

/// A typed consequence reachable from a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub id: OutcomeId,
    pub kind: OutcomeKind,
    phrase: String,
}

impl Outcome {
    pub fn item(id: impl Into<String>, item: Item) -> Self {
        let phrase = format!("You acquire the {}.", item.name);
        Outcome {
            id: OutcomeId::new(id),
            kind: OutcomeKind::Item(item),
            phrase,
        }
    }

    pub fn transition(id: impl Into<String>, to: NodeId, label: impl Into<String>) -> Self {
        let label = label.into();
        let phrase = format!("You make your way to {label}.");
        Outcome {
            id: OutcomeId::new(id),
            kind: OutcomeKind::Transition { to, label },
            phrase,
        }
    }

    pub fn feel_good(id: impl Into<String>) -> Self {
        Outcome {
            id: OutcomeId::new(id),
            kind: OutcomeKind::FeelGood,
            phrase: "You come away feeling a little better about yourself.".to_string(),
        }
    }

    pub fn humor(
        id: impl Into<String>,
        humor: Humor,
        delta: i32,
        phrase: impl Into<String>,
    ) -> Self {
        Outcome {
            id: OutcomeId::new(id),
            kind: OutcomeKind::Humor { humor, delta },
            phrase: phrase.into(),
        }
    }

    /// The canonical natural-language rendering of this outcome, used
    /// both to prompt the generator and to parse its choice back.
    pub fn phrase(&self) -> &str {
        &self.phrase
    }
}

/// A location/scene with its keywords and reachable outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationNode {
    pub id: NodeId,
    pub name: String,
    /// Base authored description of the scene.
    pub description: String,
    /// The node's locally defined closed keyword vocabulary.
    pub keywords: Vec<String>,
    /// Every outcome reachable here, the always-available feel-good
    /// outcome included.
    pub outcomes: Vec<Outcome>,
}

impl NarrationNode {
    /// A neutral description of the scene, with phrasing variance
    /// seeded by the location id so identical avatars read identical
    /// prose.
    pub fn neutral_description(&self) -> String {
        let mut rng = StdRng::seed_from_u64(self.id.0);
        match rng.gen_range(0..3u8) {
            0 => format!("{} {}", self.name, self.description),
            1 => format!("This is {}. {}", self.name, self.description),
            _ => format!("{} You are at {}.", self.description, self.name),
        }
    }

    /// All outcomes reachable from this node.
    pub fn reachable_outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn contains_outcome(&self, id: &OutcomeId) -> bool {
        self.outcomes.iter().any(|o| &o.id == id)
    }
}

/// Errors from registry construction.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("duplicate node id: {0:?}")]
    DuplicateNode(NodeId),

    #[error("outcome {outcome} is owned by both node {first:?} and node {second:?}")]
    SharedOutcome {
        outcome: OutcomeId,
        first: NodeId,
        second: NodeId,
    },

    #[error("transition outcome {outcome} targets unknown node {target:?}")]
    DanglingTransition { outcome: OutcomeId, target: NodeId },
}

/// The explicit set of narration nodes.
///
/// Construction validates that every outcome has exactly one owning
/// node and that transitions target registered nodes.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    nodes: HashMap<NodeId, NarrationNode>,
}

impl NodeRegistry {
    pub fn new(nodes: Vec<NarrationNode>) -> Result<Self, WorldError> {
        let mut map: HashMap<NodeId, NarrationNode> = HashMap::new();
        let mut owners: HashMap<OutcomeId, NodeId> = HashMap::new();

        for node in &nodes {
            if map.contains_key(&node.id) {
                return Err(WorldError::DuplicateNode(node.id));
            }
            for outcome in &node.outcomes {
                if let Some(first) = owners.get(&outcome.id) {
                    return Err(WorldError::SharedOutcome {
                        outcome: outcome.id.clone(),
                        first: *first,
                        second: node.id,
                    });
                }
                owners.insert(outcome.id.clone(), node.id);
            }
            map.insert(node.id, node.clone());
        }

        for node in map.values() {
            for outcome in &node.outcomes {
                if let OutcomeKind::Transition { to, .. } = &outcome.kind {
                    if !map.contains_key(to) {
                        return Err(WorldError::DanglingTransition {
                            outcome: outcome.id.clone(),
                            target: *to,
                        });
                    }
                }
            }
        }

        Ok(Self { nodes: map })
    }

    pub fn get(&self, id: NodeId) -> Option<&NarrationNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A generic emotional consequence used when a skill check fails.
#[derive(Debug, Clone)]
pub struct FailureEntry {
    /// The feeling word used to phrase its coherence question.
    pub feeling: &'static str,
    pub outcome: Outcome,
}

lazy_static::lazy_static! {
    /// The fixed catalog of generic failure consequences. Order is the
    /// tie-break order: the first highest-scoring entry wins.
    static ref FAILURE_CATALOG: Vec<FailureEntry> = vec![
        FailureEntry {
            feeling: "frustrated",
            outcome: Outcome::humor(
                "failure.frustration",
                Humor::Serenity,
                -4,
                "Frustration wells up in you.",
            ),
        },
        FailureEntry {
            feeling: "irritated",
            outcome: Outcome::humor(
                "failure.irritation",
                Humor::Anger,
                3,
                "A flash of irritation passes through you.",
            ),
        },
        FailureEntry {
            feeling: "resigned",
            outcome: Outcome::humor(
                "failure.resignation",
                Humor::Sorrow,
                3,
                "You shrug it off with weary resignation.",
            ),
        },
        FailureEntry {
            feeling: "disappointed",
            outcome: Outcome::humor(
                "failure.disappointment",
                Humor::Joy,
                -4,
                "Disappointment settles over you.",
            ),
        },
        FailureEntry {
            feeling: "confused",
            outcome: Outcome::humor(
                "failure.confusion",
                Humor::Curiosity,
                2,
                "You are left puzzling over what went wrong.",
            ),
        },
    ];
}

/// The fixed catalog of generic failure consequences, in tie-break
/// order.
pub fn failure_catalog() -> &'static [FailureEntry] {
    &FAILURE_CATALOG
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str) -> Item {
        Item {
            id: name.to_string(),
            name: name.to_string(),
            description: format!("A {name}."),
            keywords: vec![name.to_string()],
        }
    }

    fn node(id: u64, outcomes: Vec<Outcome>) -> NarrationNode {
        NarrationNode {
            id: NodeId(id),
            name: format!("node {id}"),
            description: "A quiet place.".to_string(),
            keywords: vec![],
            outcomes,
        }
    }

    #[test]
    fn test_registry_accepts_distinct_owners() {
        let registry = NodeRegistry::new(vec![
            node(1, vec![Outcome::item("rope", item("rope"))]),
            node(2, vec![Outcome::feel_good("calm")]),
        ])
        .unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registry_rejects_shared_outcome() {
        let result = NodeRegistry::new(vec![
            node(1, vec![Outcome::feel_good("calm")]),
            node(2, vec![Outcome::feel_good("calm")]),
        ]);
        assert!(matches!(result, Err(WorldError::SharedOutcome { .. })));
    }

    #[test]
    fn test_registry_rejects_dangling_transition() {
        let result = NodeRegistry::new(vec![node(
            1,
            vec![Outcome::transition("go", NodeId(99), "the mill")],
        )]);
        assert!(matches!(result, Err(WorldError::DanglingTransition { .. })));
    }

    #[test]
    fn test_neutral_description_reproducible() {
        let n = node(42, vec![]);
        assert_eq!(n.neutral_description(), n.neutral_description());
    }

    #[test]
    fn test_outcome_phrases() {
        let o = Outcome::item("rope", item("rope"));
        assert_eq!(o.phrase(), "You acquire the rope.");
        let t = Outcome::transition("go", NodeId(2), "the mill");
        assert_eq!(t.phrase(), "You make your way to the mill.");
    }

    #[test]
    fn test_failure_catalog_order() {
        let catalog = failure_catalog();
        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog[0].feeling, "frustrated");
        assert_eq!(catalog[4].feeling, "confused");
    }
}
