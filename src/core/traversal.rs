/// Traversal: runs one conversation through a validated tree.
///
/// The only state is the active dialogue (or the terminal marker) and the
/// scene it belongs to. History is the caller's business; every transition
/// is returned as a [`Step`] so it can be recorded.

use log::trace;
use thiserror::Error;

use crate::core::validator::ValidatedTree;
use crate::schema::entity::{Action, Dialogue};
use crate::schema::ids::{ActionId, DialogueId, NextDialogue, SceneId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraversalError {
    #[error("scene '{0}' not found")]
    UnknownScene(String),
    #[error("action '{action}' is not offered by dialogue '{dialogue}'")]
    NotOffered { action: String, dialogue: String },
    #[error("choice {index} out of range: dialogue '{dialogue}' offers {offered}")]
    NoSuchChoice {
        index: usize,
        dialogue: String,
        offered: usize,
    },
    #[error("scene has finished; no further choices are accepted")]
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Position {
    Active(DialogueId),
    Terminal,
}

/// What the presentation layer shows right now. Text only; the identifiers
/// behind it stay on [`Conversation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View<'t> {
    Speaking {
        text: &'t str,
        /// Reply labels in offer order. `None` for a plain continuation.
        choices: Vec<Option<&'t str>>,
    },
    Finished,
}

impl<'t> View<'t> {
    pub fn text(&self) -> Option<&'t str> {
        match self {
            View::Speaking { text, .. } => Some(text),
            View::Finished => None,
        }
    }

    pub fn labels(&self) -> Vec<Option<&'t str>> {
        match self {
            View::Speaking { choices, .. } => choices.clone(),
            View::Finished => Vec::new(),
        }
    }
}

/// Result of a successful choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Moved(DialogueId),
    Finished,
}

/// A single running conversation. Cheap to create; many may share a tree.
#[derive(Debug, Clone)]
pub struct Conversation<'t> {
    tree: &'t ValidatedTree,
    scene: SceneId,
    position: Position,
}

impl<'t> Conversation<'t> {
    /// Enter a scene at its starting dialogue.
    pub fn start(tree: &'t ValidatedTree, scene: &str) -> Result<Self, TraversalError> {
        let entry = tree
            .scene(scene)
            .ok_or_else(|| TraversalError::UnknownScene(scene.to_string()))?;
        trace!("scene '{}' starts at dialogue '{}'", entry.id, entry.start);
        Ok(Self {
            tree,
            scene: entry.id.clone(),
            position: Position::Active(entry.start.clone()),
        })
    }

    pub fn scene(&self) -> &SceneId {
        &self.scene
    }

    pub fn is_finished(&self) -> bool {
        self.position == Position::Terminal
    }

    /// The active dialogue's identifier, if the scene is still running.
    pub fn dialogue_id(&self) -> Option<&DialogueId> {
        match &self.position {
            Position::Active(id) => Some(id),
            Position::Terminal => None,
        }
    }

    /// Identifiers of the actions on offer, in the same order as the view's
    /// choices. Empty once the scene has finished.
    pub fn offered_actions(&self) -> Vec<&'t ActionId> {
        match self.active() {
            Some(dialogue) => self.offers(dialogue).map(|action| &action.id).collect(),
            None => Vec::new(),
        }
    }

    pub fn current(&self) -> View<'t> {
        let Some(dialogue) = self.active() else {
            return View::Finished;
        };
        View::Speaking {
            text: &dialogue.text,
            choices: self
                .offers(dialogue)
                .map(|action| action.text.as_deref())
                .collect(),
        }
    }

    /// Take an action offered by the active dialogue.
    ///
    /// On error nothing changes, so the caller may simply retry.
    pub fn choose(&mut self, action: &ActionId) -> Result<Step, TraversalError> {
        let dialogue = self.active().ok_or(TraversalError::Finished)?;
        let chosen = self
            .offers(dialogue)
            .find(|a| &a.id == action)
            .ok_or_else(|| TraversalError::NotOffered {
                action: action.to_string(),
                dialogue: dialogue.id.to_string(),
            })?;
        Ok(self.follow(chosen))
    }

    /// Take the `index`th offered action (0-based, offer order).
    pub fn choose_nth(&mut self, index: usize) -> Result<Step, TraversalError> {
        let dialogue = self.active().ok_or(TraversalError::Finished)?;
        let offered: Vec<&Action> = self.offers(dialogue).collect();
        let chosen = offered
            .get(index)
            .copied()
            .ok_or_else(|| TraversalError::NoSuchChoice {
                index,
                dialogue: dialogue.id.to_string(),
                offered: offered.len(),
            })?;
        Ok(self.follow(chosen))
    }

    /// Back to the scene's starting dialogue.
    pub fn restart(&mut self) {
        // The scene was resolved at start and the tree is immutable.
        if let Some(scene) = self.tree.scene(self.scene.as_str()) {
            trace!("scene '{}' restarts", scene.id);
            self.position = Position::Active(scene.start.clone());
        }
    }

    fn active(&self) -> Option<&'t Dialogue> {
        let tree: &'t ValidatedTree = self.tree;
        match &self.position {
            Position::Active(id) => tree.dialogue(id.as_str()),
            Position::Terminal => None,
        }
    }

    fn offers(&self, dialogue: &'t Dialogue) -> impl Iterator<Item = &'t Action> + 't {
        let tree = self.tree;
        dialogue
            .actions
            .iter()
            .filter_map(move |id| tree.action(id.as_str()))
    }

    fn follow(&mut self, action: &Action) -> Step {
        match &action.next {
            NextDialogue::Dialogue(next) => {
                trace!("'{}' -> '{}' via action '{}'", action.owner, next, action.id);
                self.position = Position::Active(next.clone());
                Step::Moved(next.clone())
            }
            NextDialogue::End => {
                trace!("'{}' -> end via action '{}'", action.owner, action.id);
                self.position = Position::Terminal;
                Step::Finished
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::validator::Validator;
    use crate::schema::entity::Scene;
    use crate::schema::tree::Tree;

    fn hello() -> ValidatedTree {
        let mut tree = Tree::new();
        tree.insert(Scene::new("1", "1")).unwrap();
        tree.insert(Dialogue::new("1", "Hello").with_action("1")).unwrap();
        tree.insert(Action::new("1", "1", NextDialogue::End)).unwrap();
        Validator::default().validate(tree).unwrap()
    }

    fn loop_tree() -> ValidatedTree {
        let mut tree = Tree::new();
        tree.insert(Scene::new("guard", "greet")).unwrap();
        tree.insert(
            Dialogue::new("greet", "Halt! Who goes there?")
                .with_action("friend")
                .with_action("leave"),
        )
        .unwrap();
        tree.insert(Dialogue::new("ask", "Prove it.").with_action("again"))
            .unwrap();
        tree.insert(
            Action::new("friend", "greet", NextDialogue::Dialogue("ask".into()))
                .with_text("A friend."),
        )
        .unwrap();
        tree.insert(Action::new("leave", "greet", NextDialogue::End).with_text("Nobody."))
            .unwrap();
        tree.insert(Action::new("again", "ask", NextDialogue::Dialogue("greet".into())))
            .unwrap();
        Validator::default().validate(tree).unwrap()
    }

    #[test]
    fn start_shows_starting_dialogue() {
        let tree = hello();
        let conversation = Conversation::start(&tree, "1").unwrap();
        let view = conversation.current();
        assert_eq!(view.text(), Some("Hello"));
        assert_eq!(view.labels(), vec![None]);
        assert!(!conversation.is_finished());
    }

    #[test]
    fn choosing_end_finishes_scene() {
        let tree = hello();
        let mut conversation = Conversation::start(&tree, "1").unwrap();
        assert_eq!(conversation.choose(&ActionId::new("1")), Ok(Step::Finished));
        assert!(conversation.is_finished());
        assert_eq!(conversation.current(), View::Finished);
        assert_eq!(
            conversation.choose(&ActionId::new("1")),
            Err(TraversalError::Finished)
        );
        assert_eq!(conversation.choose_nth(0), Err(TraversalError::Finished));
    }

    #[test]
    fn unknown_scene() {
        let tree = hello();
        assert_eq!(
            Conversation::start(&tree, "2").unwrap_err(),
            TraversalError::UnknownScene("2".to_string())
        );
    }

    #[test]
    fn rejected_choice_leaves_state_alone() {
        let tree = loop_tree();
        let mut conversation = Conversation::start(&tree, "guard").unwrap();
        let before = conversation.current();
        let err = conversation.choose(&ActionId::new("again")).unwrap_err();
        assert_eq!(
            err,
            TraversalError::NotOffered {
                action: "again".to_string(),
                dialogue: "greet".to_string()
            }
        );
        assert_eq!(conversation.current(), before);
        assert!(matches!(
            conversation.choose_nth(5),
            Err(TraversalError::NoSuchChoice { offered: 2, .. })
        ));
        assert_eq!(conversation.current(), before);
    }

    #[test]
    fn labels_follow_offer_order() {
        let tree = loop_tree();
        let conversation = Conversation::start(&tree, "guard").unwrap();
        assert_eq!(
            conversation.current(),
            View::Speaking {
                text: "Halt! Who goes there?",
                choices: vec![Some("A friend."), Some("Nobody.")],
            }
        );
        assert_eq!(
            conversation.offered_actions(),
            vec![&ActionId::new("friend"), &ActionId::new("leave")]
        );
    }

    #[test]
    fn cycles_can_be_walked_and_restarted() {
        let tree = loop_tree();
        let mut conversation = Conversation::start(&tree, "guard").unwrap();
        assert_eq!(conversation.choose_nth(0), Ok(Step::Moved("ask".into())));
        assert_eq!(conversation.choose_nth(0), Ok(Step::Moved("greet".into())));
        assert_eq!(conversation.choose_nth(0), Ok(Step::Moved("ask".into())));
        conversation.restart();
        assert_eq!(conversation.dialogue_id(), Some(&DialogueId::new("greet")));
        assert_eq!(conversation.choose_nth(1), Ok(Step::Finished));
        conversation.restart();
        assert!(!conversation.is_finished());
    }
}
