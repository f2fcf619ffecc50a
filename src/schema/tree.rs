use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use thiserror::Error;

use super::entity::{Action, Dialogue, Entity, EntityKind, Scene};
use super::ids::{ActionId, DialogueId, SceneId};

/// Inserting an entity whose identifier is already taken in its table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} '{id}' already exists")]
pub struct DuplicateId {
    pub kind: EntityKind,
    pub id: String,
}

/// The aggregate dialogue graph.
///
/// Three identifier-keyed tables. Entities refer to one another only by
/// identifier, so cycles in the conversation never become ownership cycles,
/// and a dangling reference is just a failed lookup.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tree {
    pub scenes: BTreeMap<SceneId, Scene>,
    pub dialogues: BTreeMap<DialogueId, Dialogue>,
    pub actions: BTreeMap<ActionId, Action>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entity into the table matching its variant.
    pub fn insert(&mut self, entity: impl Into<Entity>) -> Result<(), DuplicateId> {
        let entity = entity.into();
        if self.contains(entity.kind(), entity.id()) {
            return Err(DuplicateId {
                kind: entity.kind(),
                id: entity.id().to_string(),
            });
        }
        self.put(entity);
        Ok(())
    }

    /// Replace an existing entity wholesale, returning the old value.
    /// Returns `None` (and stores nothing) if no entity has that identifier.
    pub fn replace(&mut self, entity: impl Into<Entity>) -> Option<Entity> {
        let entity = entity.into();
        let old = self.get(entity.kind(), entity.id())?;
        self.put(entity);
        Some(old)
    }

    /// Remove an entity by kind and identifier.
    pub fn remove(&mut self, kind: EntityKind, id: &str) -> Option<Entity> {
        match kind {
            EntityKind::Scene => self.scenes.remove(id).map(Entity::Scene),
            EntityKind::Dialogue => self.dialogues.remove(id).map(Entity::Dialogue),
            EntityKind::Action => self.actions.remove(id).map(Entity::Action),
        }
    }

    /// A copy of the entity with the given kind and identifier.
    pub fn get(&self, kind: EntityKind, id: &str) -> Option<Entity> {
        match kind {
            EntityKind::Scene => self.scenes.get(id).cloned().map(Entity::Scene),
            EntityKind::Dialogue => self.dialogues.get(id).cloned().map(Entity::Dialogue),
            EntityKind::Action => self.actions.get(id).cloned().map(Entity::Action),
        }
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::Scene => self.scenes.contains_key(id),
            EntityKind::Dialogue => self.dialogues.contains_key(id),
            EntityKind::Action => self.actions.contains_key(id),
        }
    }

    pub fn scene(&self, id: &str) -> Option<&Scene> {
        self.scenes.get(id)
    }

    pub fn dialogue(&self, id: &str) -> Option<&Dialogue> {
        self.dialogues.get(id)
    }

    pub fn action(&self, id: &str) -> Option<&Action> {
        self.actions.get(id)
    }

    /// Identifiers of the given kind that some entity currently points at.
    pub fn referenced_ids(&self, kind: EntityKind) -> FxHashSet<&str> {
        let mut ids = FxHashSet::default();
        match kind {
            EntityKind::Scene => {}
            EntityKind::Dialogue => {
                for scene in self.scenes.values() {
                    ids.insert(scene.start.as_str());
                }
                for action in self.actions.values() {
                    ids.insert(action.owner.as_str());
                    if let Some(next) = action.next.dialogue() {
                        ids.insert(next.as_str());
                    }
                }
            }
            EntityKind::Action => {
                for dialogue in self.dialogues.values() {
                    for action in &dialogue.actions {
                        ids.insert(action.as_str());
                    }
                }
            }
        }
        ids
    }

    /// Identifiers currently stored in the given table.
    pub fn ids(&self, kind: EntityKind) -> Vec<&str> {
        match kind {
            EntityKind::Scene => self.scenes.keys().map(|k| k.as_str()).collect(),
            EntityKind::Dialogue => self.dialogues.keys().map(|k| k.as_str()).collect(),
            EntityKind::Action => self.actions.keys().map(|k| k.as_str()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty() && self.dialogues.is_empty() && self.actions.is_empty()
    }

    /// Total number of entities across all three tables.
    pub fn len(&self) -> usize {
        self.scenes.len() + self.dialogues.len() + self.actions.len()
    }

    fn put(&mut self, entity: Entity) {
        match entity {
            Entity::Scene(s) => {
                self.scenes.insert(s.id.clone(), s);
            }
            Entity::Dialogue(d) => {
                self.dialogues.insert(d.id.clone(), d);
            }
            Entity::Action(a) => {
                self.actions.insert(a.id.clone(), a);
            }
        }
    }
}
