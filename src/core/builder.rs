/// Graph builder: applies parsed script commands to an in-progress tree.
///
/// The builder only rejects structural impossibilities (duplicate explicit
/// identifiers, update or delete of something that is not there). Whether
/// references resolve is the validator's business.

use log::{debug, trace};
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::core::parser::{Command, Fields, ScriptNode};
use crate::schema::entity::{Action, Context, Dialogue, Entity, EntityKind, Scene};
use crate::schema::ids::{format_auto_id, numeric_value, ActionId, DialogueId};
use crate::schema::tree::{DuplicateId, Tree};

/// Default zero-padded width of auto-assigned identifiers.
pub const DEFAULT_ID_WIDTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("command {index}: {kind} '{id}' already exists")]
    DuplicateId {
        index: usize,
        kind: EntityKind,
        id: String,
    },
    #[error("command {index}: cannot {command} {kind} '{id}': no such {kind}")]
    NotFound {
        index: usize,
        command: Command,
        kind: EntityKind,
        id: String,
    },
    #[error("command {index}: {command} {kind} is missing {what}")]
    Incomplete {
        index: usize,
        command: Command,
        kind: EntityKind,
        what: &'static str,
    },
}

/// Builds a raw (unvalidated) [`Tree`] from script nodes.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    tree: Tree,
    id_width: usize,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::from_tree(Tree::new())
    }

    /// Continue authoring on top of an existing tree (e.g. a decoded document).
    pub fn from_tree(tree: Tree) -> Self {
        Self {
            tree,
            id_width: DEFAULT_ID_WIDTH,
        }
    }

    pub fn id_width(mut self, width: usize) -> Self {
        self.id_width = width.max(1);
        self
    }

    /// Build a tree from a complete script in one go.
    pub fn build(nodes: &[ScriptNode]) -> Result<Tree, BuildError> {
        let mut builder = Self::new();
        builder.apply_all(nodes)?;
        Ok(builder.finish())
    }

    pub fn apply_all(&mut self, nodes: &[ScriptNode]) -> Result<(), BuildError> {
        for node in nodes {
            self.apply(node)?;
        }
        Ok(())
    }

    /// Apply a single script command to the in-progress tree.
    pub fn apply(&mut self, node: &ScriptNode) -> Result<(), BuildError> {
        trace!(
            "command {}: {} {} {:?}",
            node.index,
            node.command,
            node.kind,
            node.id
        );
        match node.command {
            Command::Create => self.create(node),
            Command::Update => self.update(node),
            Command::Delete => self.delete(node),
        }
    }

    /// Insert an entity directly, bypassing the script front end.
    pub fn insert(&mut self, entity: impl Into<Entity>) -> Result<(), DuplicateId> {
        self.tree.insert(entity)
    }

    /// The lowest free identifier in the given table.
    ///
    /// An identifier counts as taken if an entity in that table has it or if
    /// any entity currently refers to it, in any zero-padded spelling.
    pub fn next_id(&self, kind: EntityKind) -> String {
        let referenced = self.tree.referenced_ids(kind);
        let taken: FxHashSet<u64> = self
            .tree
            .ids(kind)
            .into_iter()
            .chain(referenced)
            .filter_map(numeric_value)
            .collect();
        let n = (0u64..)
            .find(|n| !taken.contains(n))
            .unwrap_or_default();
        format_auto_id(n, self.id_width)
    }

    /// Finish building: link every action into its owner's action list and
    /// hand back the raw tree.
    ///
    /// A dialogue keeps its explicitly listed actions in written order; owned
    /// actions it does not list are appended in table order.
    pub fn finish(mut self) -> Tree {
        let mut owned: Vec<(DialogueId, ActionId)> = self
            .tree
            .actions
            .values()
            .map(|a| (a.owner.clone(), a.id.clone()))
            .collect();
        owned.retain(|(owner, action)| {
            self.tree
                .dialogues
                .get(owner)
                .is_some_and(|d| !d.offers(action))
        });

        for (owner, action) in owned {
            if let Some(dialogue) = self.tree.dialogues.get(&owner).cloned() {
                self.tree.replace(dialogue.with_action(action));
            }
        }
        self.tree
    }

    /// The tree as built so far, before linking.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    fn create(&mut self, node: &ScriptNode) -> Result<(), BuildError> {
        let id = match &node.id {
            Some(id) => id.clone(),
            None => {
                let id = self.next_id(node.kind);
                debug!("command {}: assigned {} id '{}'", node.index, node.kind, id);
                id
            }
        };
        let entity = self.entity_from(node, id)?;
        self.tree
            .insert(entity)
            .map_err(|DuplicateId { kind, id }| BuildError::DuplicateId {
                index: node.index,
                kind,
                id,
            })
    }

    fn update(&mut self, node: &ScriptNode) -> Result<(), BuildError> {
        let id = self.required_id(node)?;
        let mut entity = self.entity_from(node, id.clone())?;
        // Updates replace what the script can express and keep the context.
        if let Some(old) = self.tree.get(node.kind, &id) {
            set_ctx(&mut entity, old.ctx().clone());
        }
        match self.tree.replace(entity) {
            Some(_) => Ok(()),
            None => Err(self.not_found(node, id)),
        }
    }

    fn delete(&mut self, node: &ScriptNode) -> Result<(), BuildError> {
        let id = self.required_id(node)?;
        match self.tree.remove(node.kind, &id) {
            Some(_) => {
                debug!("command {}: deleted {} '{}'", node.index, node.kind, id);
                Ok(())
            }
            None => Err(self.not_found(node, id)),
        }
    }

    fn required_id(&self, node: &ScriptNode) -> Result<String, BuildError> {
        node.id.clone().ok_or(BuildError::Incomplete {
            index: node.index,
            command: node.command,
            kind: node.kind,
            what: "an identifier",
        })
    }

    fn not_found(&self, node: &ScriptNode, id: String) -> BuildError {
        BuildError::NotFound {
            index: node.index,
            command: node.command,
            kind: node.kind,
            id,
        }
    }

    fn entity_from(&self, node: &ScriptNode, id: String) -> Result<Entity, BuildError> {
        let fields = node.fields.clone().ok_or(BuildError::Incomplete {
            index: node.index,
            command: node.command,
            kind: node.kind,
            what: "its fields",
        })?;
        let entity = match fields {
            Fields::Scene { start } => Entity::Scene(Scene {
                id: id.into(),
                start,
                ctx: Context::new(),
            }),
            Fields::Dialogue { text, actions } => Entity::Dialogue(Dialogue {
                id: id.into(),
                text,
                actions,
                ctx: Context::new(),
            }),
            Fields::Action { owner, next, text } => Entity::Action(Action {
                id: id.into(),
                owner,
                next,
                text,
                ctx: Context::new(),
            }),
        };
        if entity.kind() != node.kind {
            return Err(BuildError::Incomplete {
                index: node.index,
                command: node.command,
                kind: node.kind,
                what: "fields matching its type",
            });
        }
        Ok(entity)
    }
}

fn set_ctx(entity: &mut Entity, ctx: Context) {
    match entity {
        Entity::Scene(s) => s.ctx = ctx,
        Entity::Dialogue(d) => d.ctx = ctx,
        Entity::Action(a) => a.ctx = ctx,
    }
}
