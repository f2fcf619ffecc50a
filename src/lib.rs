//! Dialogue Graph: compiler and runtime for branching NPC conversations.
//!
//! Scripts are compiled through a lexer, parser and graph builder into a
//! [`Tree`](schema::tree::Tree) of scenes, dialogues and actions, checked by
//! the validator, persisted as JSON or RON documents, and played back one
//! choice at a time by a [`Conversation`](core::traversal::Conversation).

pub mod core;
pub mod schema;

pub use crate::core::compiler::{CompileError, CompilerConfig, DialogueCompiler};
pub use crate::core::traversal::{Conversation, Step, TraversalError, View};
pub use crate::core::validator::ValidatedTree;
pub use crate::schema::tree::Tree;
