//! The player's mutable state.
//!
//! Humors sit in [0,100], body-part levels in [1,10]; both are clamped
//! on every write. Avatar state is mutated only by outcome application
//! in the action resolver.

use crate::narrative::{Item, NodeId};
use crate::persona::{BodyPart, PersonaId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The avatar's emotional registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Humor {
    Joy,
    Sorrow,
    Anger,
    Fear,
    Curiosity,
    Pride,
    Shame,
    Serenity,
    Disgust,
    Affection,
}

impl Humor {
    /// All humors, in a fixed order. Scoring loops iterate this so
    /// results do not depend on map iteration order.
    pub const ALL: [Humor; 10] = [
        Humor::Joy,
        Humor::Sorrow,
        Humor::Anger,
        Humor::Fear,
        Humor::Curiosity,
        Humor::Pride,
        Humor::Shame,
        Humor::Serenity,
        Humor::Disgust,
        Humor::Affection,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Humor::Joy => "joy",
            Humor::Sorrow => "sorrow",
            Humor::Anger => "anger",
            Humor::Fear => "fear",
            Humor::Curiosity => "curiosity",
            Humor::Pride => "pride",
            Humor::Shame => "shame",
            Humor::Serenity => "serenity",
            Humor::Disgust => "disgust",
            Humor::Affection => "affection",
        }
    }
}

const HUMOR_DEFAULT: u8 = 50;
const BODY_LEVEL_DEFAULT: u8 = 5;

/// The player's mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Avatar {
    humors: HashMap<Humor, u8>,
    body_levels: HashMap<BodyPart, u8>,
    pub known_skills: Vec<PersonaId>,
    pub inventory: Vec<Item>,
    pub companions: Vec<String>,
    /// Current location; also the deterministic seed for description
    /// variance at that location.
    pub location: NodeId,
}

impl Avatar {
    /// A fresh avatar at the given location: all humors neutral, all
    /// body parts at the default level, nothing known or carried.
    pub fn new(location: NodeId) -> Self {
        let humors = Humor::ALL.iter().map(|h| (*h, HUMOR_DEFAULT)).collect();
        let body_levels = BodyPart::ALL
            .iter()
            .map(|p| (*p, BODY_LEVEL_DEFAULT))
            .collect();
        Self {
            humors,
            body_levels,
            known_skills: Vec::new(),
            inventory: Vec::new(),
            companions: Vec::new(),
            location,
        }
    }

    pub fn with_skills(mut self, skills: Vec<PersonaId>) -> Self {
        self.known_skills = skills;
        self
    }

    pub fn knows_skill(&self, id: &PersonaId) -> bool {
        self.known_skills.contains(id)
    }

    pub fn humor(&self, humor: Humor) -> u8 {
        self.humors.get(&humor).copied().unwrap_or(HUMOR_DEFAULT)
    }

    /// Add a signed delta to a humor, clamped into [0,100].
    pub fn apply_humor_delta(&mut self, humor: Humor, delta: i32) {
        let current = self.humor(humor) as i32;
        let next = (current + delta).clamp(0, 100) as u8;
        self.humors.insert(humor, next);
    }

    pub fn body_level(&self, part: BodyPart) -> u8 {
        self.body_levels
            .get(&part)
            .copied()
            .unwrap_or(BODY_LEVEL_DEFAULT)
    }

    /// Set a body-part level, clamped into [1,10].
    pub fn set_body_level(&mut self, part: BodyPart, level: u8) {
        self.body_levels.insert(part, level.clamp(1, 10));
    }
}
