use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::{ActionId, DialogueId, NextDialogue, SceneId};

/// A dynamic value stored in an entity's developer context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

/// Developer context attached to every entity.
///
/// The engine never interprets it. It is stored, serialized and handed back
/// exactly as it came in.
pub type Context = BTreeMap<String, Value>;

/// A cyclic block of dialogue with one designated starting dialogue.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub id: SceneId,
    pub start: DialogueId,
    pub ctx: Context,
}

/// A node of spoken text and the actions the player may take from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Dialogue {
    pub id: DialogueId,
    pub text: String,
    pub actions: Vec<ActionId>,
    pub ctx: Context,
}

/// A player-facing response or continuation.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub id: ActionId,
    /// The dialogue this action is offered from.
    pub owner: DialogueId,
    pub next: NextDialogue,
    /// Reply label shown to the player. Continuation actions usually have none.
    pub text: Option<String>,
    pub ctx: Context,
}

impl Scene {
    pub fn new(id: impl Into<SceneId>, start: impl Into<DialogueId>) -> Self {
        Self {
            id: id.into(),
            start: start.into(),
            ctx: Context::new(),
        }
    }
}

impl Dialogue {
    pub fn new(id: impl Into<DialogueId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            actions: Vec::new(),
            ctx: Context::new(),
        }
    }

    /// Returns a copy of this dialogue with `action` appended to its list.
    pub fn with_action(mut self, action: impl Into<ActionId>) -> Self {
        self.actions.push(action.into());
        self
    }

    /// Returns true if this dialogue already lists the given action.
    pub fn offers(&self, action: &ActionId) -> bool {
        self.actions.contains(action)
    }
}

impl Action {
    pub fn new(
        id: impl Into<ActionId>,
        owner: impl Into<DialogueId>,
        next: NextDialogue,
    ) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            next,
            text: None,
            ctx: Context::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Which table an entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Scene,
    Dialogue,
    Action,
}

impl EntityKind {
    /// The script keyword for this kind (e.g. "dialogue").
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Scene => "scene",
            Self::Dialogue => "dialogue",
            Self::Action => "action",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "scene" => Some(Self::Scene),
            "dialogue" => Some(Self::Dialogue),
            "action" => Some(Self::Action),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Any one entity, tagged with its kind. [`Tree::insert`](super::tree::Tree::insert)
/// routes on the tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Scene(Scene),
    Dialogue(Dialogue),
    Action(Action),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Scene(_) => EntityKind::Scene,
            Self::Dialogue(_) => EntityKind::Dialogue,
            Self::Action(_) => EntityKind::Action,
        }
    }

    /// The entity's identifier as a plain string.
    pub fn id(&self) -> &str {
        match self {
            Self::Scene(s) => s.id.as_str(),
            Self::Dialogue(d) => d.id.as_str(),
            Self::Action(a) => a.id.as_str(),
        }
    }

    pub fn ctx(&self) -> &Context {
        match self {
            Self::Scene(s) => &s.ctx,
            Self::Dialogue(d) => &d.ctx,
            Self::Action(a) => &a.ctx,
        }
    }
}

impl From<Scene> for Entity {
    fn from(s: Scene) -> Self {
        Self::Scene(s)
    }
}

impl From<Dialogue> for Entity {
    fn from(d: Dialogue) -> Self {
        Self::Dialogue(d)
    }
}

impl From<Action> for Entity {
    fn from(a: Action) -> Self {
        Self::Action(a)
    }
}
