//! Persona-to-slot bindings.
//!
//! Each Observation/Thinking persona owns one long-lived backend slot
//! seeded with its prompt. Bindings are created lazily, exactly once
//! per persona, and never evicted: the persona set is small and
//! bounded, so the pool cannot grow past it.

use crate::persona::{Persona, PersonaId};
use slotcast::{Backend, Error, SlotId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Maps personas to their backend slots.
pub struct SlotRegistry {
    backend: Arc<dyn Backend>,
    // The lock is held across slot creation so concurrent calls for
    // the same persona cannot both create; losers of the race wait and
    // read the winner's binding. Creation is rare and the persona set
    // is tiny, so one coarse lock is enough.
    bindings: Mutex<HashMap<PersonaId, SlotId>>,
}

impl SlotRegistry {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            bindings: Mutex::new(HashMap::new()),
        }
    }

    /// Return the persona's slot, creating and seeding it on first
    /// use. At most one backend `create_slot` call ever happens per
    /// persona.
    pub async fn get_or_create(&self, persona: &Persona) -> Result<SlotId, Error> {
        let mut bindings = self.bindings.lock().await;
        if let Some(slot) = bindings.get(&persona.id) {
            return Ok(*slot);
        }

        let prompt = persona.prompt.as_deref().unwrap_or("");
        let slot = self.backend.create_slot(prompt).await?;
        tracing::debug!(persona = %persona.id, %slot, "bound persona to new slot");
        bindings.insert(persona.id.clone(), slot);
        Ok(slot)
    }

    /// Number of live bindings.
    pub async fn binding_count(&self) -> usize {
        self.bindings.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::{BodyPart, Role};
    use async_trait::async_trait;
    use slotcast::{Completion, GenerateRequest};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingBackend {
        creations: AtomicU32,
    }

    #[async_trait]
    impl Backend for CountingBackend {
        async fn create_slot(&self, _system_prompt: &str) -> Result<SlotId, Error> {
            let id = self.creations.fetch_add(1, Ordering::SeqCst);
            // Simulate backend latency so racing callers overlap.
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            Ok(SlotId(id))
        }

        async fn generate(
            &self,
            _slot: SlotId,
            _request: GenerateRequest,
        ) -> Result<Completion, Error> {
            Ok(Completion::text(""))
        }
    }

    fn persona(id: &str) -> Persona {
        Persona {
            id: PersonaId::new(id),
            name: id.to_string(),
            roles: vec![Role::Thinking],
            body_parts: vec![BodyPart::Brain],
            level: 5,
            prompt: Some("a voice".to_string()),
        }
    }

    #[tokio::test]
    async fn test_binding_reused() {
        let backend = Arc::new(CountingBackend {
            creations: AtomicU32::new(0),
        });
        let registry = SlotRegistry::new(Arc::clone(&backend) as Arc<dyn Backend>);
        let p = persona("wit");

        let first = registry.get_or_create(&p).await.unwrap();
        let second = registry.get_or_create(&p).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.creations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_calls_create_once() {
        let backend = Arc::new(CountingBackend {
            creations: AtomicU32::new(0),
        });
        let registry = Arc::new(SlotRegistry::new(Arc::clone(&backend) as Arc<dyn Backend>));
        let p = persona("wit");

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let p = p.clone();
                tokio::spawn(async move { registry.get_or_create(&p).await.unwrap() })
            })
            .collect();

        let mut slots = Vec::new();
        for task in tasks {
            slots.push(task.await.unwrap());
        }
        assert!(slots.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(backend.creations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_personas_distinct_slots() {
        let backend = Arc::new(CountingBackend {
            creations: AtomicU32::new(0),
        });
        let registry = SlotRegistry::new(backend as Arc<dyn Backend>);

        let a = registry.get_or_create(&persona("wit")).await.unwrap();
        let b = registry.get_or_create(&persona("gaze")).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.binding_count().await, 2);
    }
}
