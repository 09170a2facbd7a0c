//! Core engine for a persona-driven narrative game.
//!
//! The engine runs a turn loop over a world of narration nodes: an
//! Observation persona describes the scene anchored to the node's
//! keyword vocabulary, a Thinking persona proposes candidate actions
//! for a keyword the player touched, and a stochastic resolver scores,
//! rolls, and applies the chosen action's outcome to the avatar.
//!
//! Generation runs through the `slotcast` crate: each prompted persona
//! owns one slot on a slot-multiplexed backend, and every request goes
//! through the dispatcher's per-slot serialization and deadlines. All
//! backend output is shaped by grammars, and every generation path has
//! a deterministic local fallback, so the engine's public operations
//! never fail outright.

pub mod avatar;
pub mod engine;
pub mod gen;
pub mod keywords;
pub mod narrative;
pub mod persona;
pub mod resolver;
pub mod slots;
pub mod testing;

pub use avatar::{Avatar, Humor};
pub use engine::{EngineConfig, NarrativeEngine};
pub use gen::{NarrativeAction, ThinkingOutput};
pub use narrative::{Item, NarrationNode, NodeId, NodeRegistry, Outcome, OutcomeId, OutcomeKind};
pub use persona::{BodyPart, Persona, PersonaCatalog, PersonaId, Role};
pub use resolver::{ActionExecutionResult, RejectionReason};
