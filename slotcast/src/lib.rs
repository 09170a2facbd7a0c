//! Minimal client for slot-multiplexed generation servers.
//!
//! This crate provides a focused interface to a generation backend that
//! multiplexes many persistent conversational contexts ("slots") over a
//! single process:
//! - The [`Backend`] trait: create a slot seeded with a system prompt,
//!   run a generation request against it
//! - [`http::SlotServer`]: a concrete HTTP client for llama.cpp-style
//!   slot servers with SSE token streaming
//! - [`dispatch::SlotDispatcher`]: the request protocol — per-slot
//!   serialization, deadlines, and cancellation reporting
//! - [`grammar`]: field specs compiled to GBNF generation grammars

use async_trait::async_trait;
use thiserror::Error;

pub mod dispatch;
pub mod grammar;
pub mod http;

pub use dispatch::{DispatchConfig, RequestOutcome, SlotDispatcher};
pub use grammar::{FieldSpec, Grammar};
pub use http::SlotServer;

/// Errors that can occur when talking to a generation backend.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Identifies one persistent conversational context on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u32);

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// A generation request to run against a slot.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub grammar: Option<Grammar>,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    /// Create a request with the given prompt and default limits.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            grammar: None,
            max_tokens: 512,
            temperature: None,
        }
    }

    pub fn with_grammar(mut self, grammar: Grammar) -> Self {
        self.grammar = Some(grammar);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// The final payload of a generation request.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Full accumulated text of the generation.
    pub text: String,

    /// True if the backend reported the request as cancelled rather
    /// than run to completion.
    pub cancelled: bool,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cancelled: false,
        }
    }
}

/// A slot-multiplexed generation backend.
///
/// Implementations must correlate responses strictly by slot id; a
/// completion for one slot is never delivered to a request on another.
/// Callers are expected to route requests through a
/// [`dispatch::SlotDispatcher`], which enforces the one-in-flight-per
/// -slot rule this trait assumes.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Create a fresh slot seeded with the given system prompt.
    async fn create_slot(&self, system_prompt: &str) -> Result<SlotId, Error>;

    /// Run one generation against a slot and await its completion.
    async fn generate(&self, slot: SlotId, request: GenerateRequest) -> Result<Completion, Error>;
}
