//! Testing utilities for the narrative core.
//!
//! This module provides tools for deterministic tests without a live
//! generation server:
//! - `MockBackend` with scripted replies, usable anywhere a `Backend`
//!   is expected
//! - `sample_catalog` / `sample_nodes` fixtures shared across suites
//! - `TestHarness` wiring a full engine around a mock backend

use crate::avatar::Avatar;
use crate::engine::{EngineConfig, NarrativeEngine};
use crate::narrative::{Item, NarrationNode, NodeId, NodeRegistry, Outcome};
use crate::persona::{BodyPart, Persona, PersonaCatalog, PersonaId, Role};
use async_trait::async_trait;
use slotcast::{Backend, Completion, Error, GenerateRequest, SlotId};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted reply from the mock backend.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A normal completion with the given text.
    Text(String),
    /// A completion the backend reports as cancelled.
    Cancelled(String),
    /// A backend error.
    Error(String),
    /// Never complete; used to exercise deadline handling.
    Stall,
}

/// A mock backend that returns scripted replies in order.
///
/// Replies are consumed one per `generate` call regardless of slot.
/// An empty queue yields an error, which callers treat like a backend
/// outage and degrade from.
pub struct MockBackend {
    replies: Mutex<VecDeque<MockReply>>,
    /// System prompts seen by `create_slot`, in order.
    prompts: Mutex<Vec<String>>,
    next_slot: AtomicU32,
    calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            next_slot: AtomicU32::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue a normal text completion.
    pub fn queue_text(&self, text: &str) {
        self.queue(MockReply::Text(text.to_string()));
    }

    /// Queue an arbitrary reply.
    pub fn queue(&self, reply: MockReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// How many `generate` calls the backend has seen.
    pub fn generate_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// How many slots have been created.
    pub fn slot_count(&self) -> usize {
        self.next_slot.load(Ordering::SeqCst) as usize
    }

    /// The system prompts passed to `create_slot`, in order.
    pub fn slot_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn create_slot(&self, system_prompt: &str) -> Result<SlotId, Error> {
        self.prompts.lock().unwrap().push(system_prompt.to_string());
        Ok(SlotId(self.next_slot.fetch_add(1, Ordering::SeqCst)))
    }

    async fn generate(&self, _slot: SlotId, _request: GenerateRequest) -> Result<Completion, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(MockReply::Text(text)) => Ok(Completion::text(text)),
            Some(MockReply::Cancelled(text)) => Ok(Completion {
                text,
                cancelled: true,
            }),
            Some(MockReply::Error(message)) => Err(Error::Internal(message)),
            Some(MockReply::Stall) => {
                futures::future::pending::<()>().await;
                unreachable!()
            }
            None => Err(Error::Internal("no scripted reply".to_string())),
        }
    }
}

/// A small catalog with one persona per role, plus a second action
/// persona so skill choice is exercised.
pub fn sample_catalog() -> PersonaCatalog {
    PersonaCatalog::new(vec![
        Persona {
            id: PersonaId::new("gaze"),
            name: "Gaze".to_string(),
            roles: vec![Role::Observation],
            body_parts: vec![BodyPart::Eyes],
            level: 5,
            prompt: Some("You notice small things and say them plainly.".to_string()),
        },
        Persona {
            id: PersonaId::new("wit"),
            name: "Wit".to_string(),
            roles: vec![Role::Thinking],
            body_parts: vec![BodyPart::Brain],
            level: 5,
            prompt: Some("You weigh options dryly, a little skeptical.".to_string()),
        },
        Persona {
            id: PersonaId::new("grip"),
            name: "Grip".to_string(),
            roles: vec![Role::Action],
            body_parts: vec![BodyPart::Hands],
            level: 5,
            prompt: None,
        },
        Persona {
            id: PersonaId::new("stride"),
            name: "Stride".to_string(),
            roles: vec![Role::Action],
            body_parts: vec![BodyPart::Legs],
            level: 5,
            prompt: None,
        },
    ])
    .expect("sample catalog is valid")
}

/// Two connected nodes: an orchard with an item, a transition, and the
/// always-available feel-good outcome, and the mill yard it leads to.
pub fn sample_nodes() -> NodeRegistry {
    let orchard = NarrationNode {
        id: NodeId(1),
        name: "the orchard".to_string(),
        description: "Rows of old apple trees, a stone well, a gate in the far fence.".to_string(),
        keywords: vec!["berry".to_string(), "well".to_string(), "gate".to_string()],
        outcomes: vec![
            Outcome::item(
                "orchard.berries",
                Item {
                    id: "berries".to_string(),
                    name: "handful of berries".to_string(),
                    description: "Dark, clustered, a little past ripe.".to_string(),
                    keywords: vec!["berry".to_string()],
                },
            ),
            Outcome::transition("orchard.gate", NodeId(2), "the mill yard"),
            Outcome::feel_good("orchard.calm"),
        ],
    };
    let mill = NarrationNode {
        id: NodeId(2),
        name: "the mill yard".to_string(),
        description: "A water wheel turns slowly against the race.".to_string(),
        keywords: vec!["wheel".to_string()],
        outcomes: vec![Outcome::feel_good("mill.calm")],
    };
    NodeRegistry::new(vec![orchard, mill]).expect("sample nodes are valid")
}

/// Test harness wiring a full engine around a mock backend.
pub struct TestHarness {
    pub backend: Arc<MockBackend>,
    pub engine: NarrativeEngine,
    pub avatar: Avatar,
}

impl TestHarness {
    /// An engine over the sample fixtures, with a short deadline and a
    /// forced roll so resolution is deterministic.
    pub fn new(forced_roll: f64) -> Self {
        Self::with_config(
            EngineConfig::default()
                .with_request_deadline(Duration::from_millis(200))
                .with_forced_roll(forced_roll),
        )
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let backend = Arc::new(MockBackend::new());
        let engine = NarrativeEngine::new(
            Arc::clone(&backend) as Arc<dyn Backend>,
            sample_catalog(),
            sample_nodes(),
            config,
        );
        let avatar = Avatar::new(NodeId(1))
            .with_skills(vec![PersonaId::new("grip"), PersonaId::new("stride")]);
        Self {
            backend,
            engine,
            avatar,
        }
    }

    /// Queue a scripted completion on the backend.
    pub fn expect_text(&self, text: &str) -> &Self {
        self.backend.queue_text(text);
        self
    }
}
