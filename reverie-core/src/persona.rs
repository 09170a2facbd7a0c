//! Personas: the narrative voices/skills of the avatar.
//!
//! A persona is a skill with a voice — it observes, reasons, or acts
//! on the player's behalf. Observation and Thinking personas carry a
//! prompt that seeds their backend slot; pure Action personas have no
//! voice of their own and never get a slot.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// What a persona can do in a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Perceives the environment and narrates it.
    Observation,
    /// Reasons about a keyword and proposes candidate actions.
    Thinking,
    /// Can be named as the skill an action is attempted with.
    Action,
}

/// The avatar's body parts; each persona is rooted in one or two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BodyPart {
    Eyes,
    Ears,
    Nose,
    Tongue,
    Skin,
    Hands,
    Fingers,
    Arms,
    Shoulders,
    Back,
    Chest,
    Heart,
    Gut,
    Legs,
    Knees,
    Feet,
    Brain,
}

impl BodyPart {
    /// All body parts, in a fixed order.
    pub const ALL: [BodyPart; 17] = [
        BodyPart::Eyes,
        BodyPart::Ears,
        BodyPart::Nose,
        BodyPart::Tongue,
        BodyPart::Skin,
        BodyPart::Hands,
        BodyPart::Fingers,
        BodyPart::Arms,
        BodyPart::Shoulders,
        BodyPart::Back,
        BodyPart::Chest,
        BodyPart::Heart,
        BodyPart::Gut,
        BodyPart::Legs,
        BodyPart::Knees,
        BodyPart::Feet,
        BodyPart::Brain,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BodyPart::Eyes => "eyes",
            BodyPart::Ears => "ears",
            BodyPart::Nose => "nose",
            BodyPart::Tongue => "tongue",
            BodyPart::Skin => "skin",
            BodyPart::Hands => "hands",
            BodyPart::Fingers => "fingers",
            BodyPart::Arms => "arms",
            BodyPart::Shoulders => "shoulders",
            BodyPart::Back => "back",
            BodyPart::Chest => "chest",
            BodyPart::Heart => "heart",
            BodyPart::Gut => "gut",
            BodyPart::Legs => "legs",
            BodyPart::Knees => "knees",
            BodyPart::Feet => "feet",
            BodyPart::Brain => "brain",
        }
    }
}

/// Stable identifier for a persona. Identity is immutable; only the
/// level changes over a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PersonaId(pub String);

impl PersonaId {
    pub fn new(id: impl Into<String>) -> Self {
        PersonaId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PersonaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A narrative voice/skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: PersonaId,
    pub name: String,
    pub roles: Vec<Role>,
    /// One or two body parts; the first is primary and feeds the
    /// skill-check adjustment.
    pub body_parts: Vec<BodyPart>,
    /// Proficiency, 1..=10.
    pub level: u8,
    /// Voice prompt; required for Observation/Thinking roles, absent
    /// for pure Action personas.
    pub prompt: Option<String>,
}

impl Persona {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// The body part whose level adjusts this persona's skill checks.
    pub fn primary_body_part(&self) -> BodyPart {
        self.body_parts.first().copied().unwrap_or(BodyPart::Brain)
    }
}

/// Errors from catalog construction.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("duplicate persona id: {0}")]
    DuplicateId(PersonaId),

    #[error("persona {0} has no roles")]
    NoRoles(PersonaId),

    #[error("persona {0} must have one or two body parts, got {1}")]
    BadBodyParts(PersonaId, usize),

    #[error("persona {0} has level {1}, outside 1..=10")]
    BadLevel(PersonaId, u8),

    #[error("persona {0} has an Observation or Thinking role but no prompt")]
    MissingPrompt(PersonaId),
}

/// An explicitly constructed set of personas.
///
/// There is intentionally no ambient global catalog; callers build one
/// and pass it where needed.
#[derive(Debug, Clone)]
pub struct PersonaCatalog {
    personas: HashMap<PersonaId, Persona>,
    ordered: Vec<PersonaId>,
}

impl PersonaCatalog {
    /// Build a catalog, validating every persona.
    pub fn new(personas: Vec<Persona>) -> Result<Self, CatalogError> {
        let mut map = HashMap::new();
        let mut ordered = Vec::new();
        for persona in personas {
            if persona.roles.is_empty() {
                return Err(CatalogError::NoRoles(persona.id.clone()));
            }
            if persona.body_parts.is_empty() || persona.body_parts.len() > 2 {
                return Err(CatalogError::BadBodyParts(
                    persona.id.clone(),
                    persona.body_parts.len(),
                ));
            }
            if persona.level < 1 || persona.level > 10 {
                return Err(CatalogError::BadLevel(persona.id.clone(), persona.level));
            }
            let needs_prompt =
                persona.has_role(Role::Observation) || persona.has_role(Role::Thinking);
            if needs_prompt && persona.prompt.is_none() {
                return Err(CatalogError::MissingPrompt(persona.id.clone()));
            }
            if map.contains_key(&persona.id) {
                return Err(CatalogError::DuplicateId(persona.id.clone()));
            }
            ordered.push(persona.id.clone());
            map.insert(persona.id.clone(), persona);
        }
        Ok(Self {
            personas: map,
            ordered,
        })
    }

    pub fn get(&self, id: &PersonaId) -> Option<&Persona> {
        self.personas.get(id)
    }

    /// Personas in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Persona> {
        self.ordered.iter().filter_map(|id| self.personas.get(id))
    }

    /// Personas carrying the given role, in declaration order.
    pub fn with_role(&self, role: Role) -> Vec<&Persona> {
        self.iter().filter(|p| p.has_role(role)).collect()
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persona(id: &str, roles: Vec<Role>, prompt: Option<&str>) -> Persona {
        Persona {
            id: PersonaId::new(id),
            name: id.to_string(),
            roles,
            body_parts: vec![BodyPart::Hands],
            level: 5,
            prompt: prompt.map(String::from),
        }
    }

    #[test]
    fn test_catalog_accepts_valid_personas() {
        let catalog = PersonaCatalog::new(vec![
            persona("grip", vec![Role::Action], None),
            persona("wit", vec![Role::Thinking], Some("dry, skeptical")),
        ])
        .unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.with_role(Role::Action).len(), 1);
    }

    #[test]
    fn test_catalog_rejects_missing_prompt() {
        let result = PersonaCatalog::new(vec![persona("wit", vec![Role::Thinking], None)]);
        assert!(matches!(result, Err(CatalogError::MissingPrompt(_))));
    }

    #[test]
    fn test_catalog_rejects_bad_level() {
        let mut p = persona("grip", vec![Role::Action], None);
        p.level = 11;
        assert!(matches!(
            PersonaCatalog::new(vec![p]),
            Err(CatalogError::BadLevel(_, 11))
        ));
    }

    #[test]
    fn test_catalog_rejects_duplicate_ids() {
        let result = PersonaCatalog::new(vec![
            persona("grip", vec![Role::Action], None),
            persona("grip", vec![Role::Action], None),
        ]);
        assert!(matches!(result, Err(CatalogError::DuplicateId(_))));
    }

    #[test]
    fn test_primary_body_part() {
        let mut p = persona("grip", vec![Role::Action], None);
        p.body_parts = vec![BodyPart::Fingers, BodyPart::Hands];
        assert_eq!(p.primary_body_part(), BodyPart::Fingers);
    }

    #[test]
    fn test_body_part_count() {
        assert_eq!(BodyPart::ALL.len(), 17);
    }
}
