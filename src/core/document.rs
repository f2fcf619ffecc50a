/// Persisted document format: lossless encode/decode of a [`Tree`].
///
/// A document has three top-level groups, `scenes`, `dialogues` and
/// `actions`, each an ordered list of entries:
///
/// ```text
/// scene:    scene_id, dialogue_id (start), ctx
/// dialogue: dialogue_id, text, actions, ctx
/// action:   action_id, dialogue_id (owner), next_id, ctx, [text]
/// ```
///
/// `next_id` is either a dialogue identifier or the sentinel `"end"`.
/// Decoding never validates the graph; callers do that explicitly, so broken
/// documents can still be loaded and inspected.

use ron::extensions::Extensions;
use ron::ser::PrettyConfig;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::schema::entity::{Action, Context, Dialogue, Scene};
use crate::schema::ids::{is_valid_identifier, ActionId, NextDialogue};
use crate::schema::tree::Tree;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("document has no '{group}' group")]
    MissingGroup { group: &'static str },
    #[error("{group} entry {entry}: missing field '{field}'")]
    MissingField {
        group: &'static str,
        entry: String,
        field: &'static str,
    },
    #[error("{group} entry {entry}: field '{field}' has invalid value '{value}': {reason}")]
    InvalidField {
        group: &'static str,
        entry: String,
        field: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("{group}: identifier '{id}' appears more than once")]
    DuplicateEntry { group: &'static str, id: String },
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),
}

/// On-disk encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Ron,
}

impl Format {
    /// Pick a format from a file extension (`.json` or `.ron`).
    pub fn from_path(path: &Path) -> Option<Format> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => Some(Format::Json),
            Some("ron") => Some(Format::Ron),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneEntry {
    pub scene_id: String,
    pub dialogue_id: String,
    pub ctx: Context,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DialogueEntry {
    pub dialogue_id: String,
    pub text: String,
    pub actions: Vec<String>,
    pub ctx: Context,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionEntry {
    pub action_id: String,
    pub dialogue_id: String,
    pub next_id: NextDialogue,
    pub ctx: Context,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// The flattened, order-stable form of a tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Document {
    pub scenes: Vec<SceneEntry>,
    pub dialogues: Vec<DialogueEntry>,
    pub actions: Vec<ActionEntry>,
}

impl Document {
    /// Flatten a tree. Entries come out in identifier order.
    pub fn encode(tree: &Tree) -> Document {
        Document {
            scenes: tree
                .scenes
                .values()
                .map(|s| SceneEntry {
                    scene_id: s.id.to_string(),
                    dialogue_id: s.start.to_string(),
                    ctx: s.ctx.clone(),
                })
                .collect(),
            dialogues: tree
                .dialogues
                .values()
                .map(|d| DialogueEntry {
                    dialogue_id: d.id.to_string(),
                    text: d.text.clone(),
                    actions: d.actions.iter().map(|a| a.to_string()).collect(),
                    ctx: d.ctx.clone(),
                })
                .collect(),
            actions: tree
                .actions
                .values()
                .map(|a| ActionEntry {
                    action_id: a.id.to_string(),
                    dialogue_id: a.owner.to_string(),
                    next_id: a.next.clone(),
                    ctx: a.ctx.clone(),
                    text: a.text.clone(),
                })
                .collect(),
        }
    }

    /// Rebuild the raw tree. Checks identifier syntax and uniqueness only.
    pub fn decode(self) -> Result<Tree, DecodeError> {
        let mut tree = Tree::new();

        let mut seen = FxHashSet::default();
        for entry in self.scenes {
            let id = identifier("scenes", &entry.scene_id, "scene_id", entry.scene_id.clone())?;
            let start = identifier("scenes", &id, "dialogue_id", entry.dialogue_id)?;
            unique("scenes", &mut seen, &id)?;
            tree.scenes.insert(
                id.clone().into(),
                Scene {
                    id: id.into(),
                    start: start.into(),
                    ctx: entry.ctx,
                },
            );
        }

        let mut seen = FxHashSet::default();
        for entry in self.dialogues {
            let id = identifier(
                "dialogues",
                &entry.dialogue_id,
                "dialogue_id",
                entry.dialogue_id.clone(),
            )?;
            let actions = entry
                .actions
                .into_iter()
                .map(|a| identifier("dialogues", &id, "actions", a).map(ActionId::from))
                .collect::<Result<Vec<_>, _>>()?;
            unique("dialogues", &mut seen, &id)?;
            tree.dialogues.insert(
                id.clone().into(),
                Dialogue {
                    id: id.into(),
                    text: entry.text,
                    actions,
                    ctx: entry.ctx,
                },
            );
        }

        let mut seen = FxHashSet::default();
        for entry in self.actions {
            let id = identifier(
                "actions",
                &entry.action_id,
                "action_id",
                entry.action_id.clone(),
            )?;
            let owner = identifier("actions", &id, "dialogue_id", entry.dialogue_id)?;
            unique("actions", &mut seen, &id)?;
            tree.actions.insert(
                id.clone().into(),
                Action {
                    id: id.into(),
                    owner: owner.into(),
                    next: entry.next_id,
                    text: entry.text,
                    ctx: entry.ctx,
                },
            );
        }

        Ok(tree)
    }

    pub fn to_string(&self, format: Format) -> Result<String, EncodeError> {
        Ok(match format {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Ron => ron::ser::to_string_pretty(self, PrettyConfig::default())?,
        })
    }

    /// Parse document text into a document, reporting missing and mistyped
    /// fields per entry.
    pub fn parse(input: &str, format: Format) -> Result<Document, DecodeError> {
        let raw: RawDocument = match format {
            Format::Json => serde_json::from_str(input)?,
            // Optional fields accept bare values as well as `Some(..)`.
            Format::Ron => ron::Options::default()
                .with_default_extension(Extensions::IMPLICIT_SOME)
                .from_str(input)?,
        };
        raw.into_document()
    }
}

/// Encode a tree straight to document text.
pub fn encode(tree: &Tree, format: Format) -> Result<String, EncodeError> {
    Document::encode(tree).to_string(format)
}

/// Decode document text straight to a raw (unvalidated) tree.
pub fn decode(input: &str, format: Format) -> Result<Tree, DecodeError> {
    Document::parse(input, format)?.decode()
}

fn identifier(
    group: &'static str,
    entry: &str,
    field: &'static str,
    value: String,
) -> Result<String, DecodeError> {
    if is_valid_identifier(&value) {
        Ok(value)
    } else {
        Err(DecodeError::InvalidField {
            group,
            entry: entry_label(entry),
            field,
            value,
            reason: "not a legal identifier",
        })
    }
}

fn unique<'a>(
    group: &'static str,
    seen: &mut FxHashSet<String>,
    id: &'a str,
) -> Result<&'a str, DecodeError> {
    if seen.insert(id.to_string()) {
        Ok(id)
    } else {
        Err(DecodeError::DuplicateEntry {
            group,
            id: id.to_string(),
        })
    }
}

fn entry_label(id: &str) -> String {
    if id.starts_with('#') {
        id.to_string()
    } else {
        format!("'{}'", id)
    }
}

// Decoding goes through permissive raw shapes so that a missing field is
// reported with the entry it belongs to instead of as a bare serde error.

/// Identifiers may be written as strings or, as older tools did, as integers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawScene {
    #[serde(default)]
    scene_id: Option<RawId>,
    #[serde(default)]
    dialogue_id: Option<RawId>,
    #[serde(default)]
    ctx: Option<Context>,
}

#[derive(Debug, Deserialize)]
struct RawDialogue {
    #[serde(default)]
    dialogue_id: Option<RawId>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    actions: Option<Vec<RawId>>,
    #[serde(default)]
    ctx: Option<Context>,
}

#[derive(Debug, Deserialize)]
struct RawAction {
    #[serde(default)]
    action_id: Option<RawId>,
    #[serde(default)]
    dialogue_id: Option<RawId>,
    #[serde(default)]
    next_id: Option<RawId>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    ctx: Option<Context>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    scenes: Option<Vec<RawScene>>,
    #[serde(default)]
    dialogues: Option<Vec<RawDialogue>>,
    #[serde(default)]
    actions: Option<Vec<RawAction>>,
}

fn required_group<T>(
    entries: Option<Vec<T>>,
    group: &'static str,
) -> Result<Vec<T>, DecodeError> {
    entries.ok_or(DecodeError::MissingGroup { group })
}

fn required<T>(
    value: Option<T>,
    group: &'static str,
    entry: &str,
    field: &'static str,
) -> Result<T, DecodeError> {
    value.ok_or_else(|| DecodeError::MissingField {
        group,
        entry: entry_label(entry),
        field,
    })
}

impl RawDocument {
    fn into_document(self) -> Result<Document, DecodeError> {
        let mut document = Document::default();
        let scenes = required_group(self.scenes, "scenes")?;
        let dialogues = required_group(self.dialogues, "dialogues")?;
        let actions = required_group(self.actions, "actions")?;

        for (i, raw) in scenes.into_iter().enumerate() {
            let entry = format!("#{}", i);
            let scene_id = required(raw.scene_id, "scenes", &entry, "scene_id")?.into_string();
            let dialogue_id =
                required(raw.dialogue_id, "scenes", &scene_id, "dialogue_id")?.into_string();
            document.scenes.push(SceneEntry {
                scene_id,
                dialogue_id,
                ctx: raw.ctx.unwrap_or_default(),
            });
        }

        for (i, raw) in dialogues.into_iter().enumerate() {
            let entry = format!("#{}", i);
            let dialogue_id =
                required(raw.dialogue_id, "dialogues", &entry, "dialogue_id")?.into_string();
            let text = required(raw.text, "dialogues", &dialogue_id, "text")?;
            let actions = required(raw.actions, "dialogues", &dialogue_id, "actions")?
                .into_iter()
                .map(RawId::into_string)
                .collect();
            document.dialogues.push(DialogueEntry {
                dialogue_id,
                text,
                actions,
                ctx: raw.ctx.unwrap_or_default(),
            });
        }

        for (i, raw) in actions.into_iter().enumerate() {
            let entry = format!("#{}", i);
            let action_id = required(raw.action_id, "actions", &entry, "action_id")?.into_string();
            let dialogue_id =
                required(raw.dialogue_id, "actions", &action_id, "dialogue_id")?.into_string();
            let next_raw = required(raw.next_id, "actions", &action_id, "next_id")?.into_string();
            let next_id =
                NextDialogue::parse(&next_raw).ok_or_else(|| DecodeError::InvalidField {
                    group: "actions",
                    entry: entry_label(&action_id),
                    field: "next_id",
                    value: next_raw.clone(),
                    reason: if next_raw.is_empty() {
                        "empty"
                    } else {
                        "neither a dialogue identifier nor the terminal sentinel"
                    },
                })?;
            document.actions.push(ActionEntry {
                action_id,
                dialogue_id,
                next_id,
                ctx: raw.ctx.unwrap_or_default(),
                text: raw.text,
            });
        }

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::entity::Value;
    use crate::schema::ids::DialogueId;

    fn sample_tree() -> Tree {
        let mut tree = Tree::new();
        let mut scene = Scene::new("1", "1");
        scene
            .ctx
            .insert("trigger".to_string(), Value::String("quest_begin".to_string()));
        tree.insert(scene).unwrap();
        tree.insert(Dialogue::new("1", "Hello, traveler.").with_action("1").with_action("2"))
            .unwrap();
        tree.insert(Dialogue::new("2", "Safe travels.").with_action("3"))
            .unwrap();
        tree.insert(
            Action::new("1", "1", NextDialogue::Dialogue(DialogueId::new("2")))
                .with_text("Goodbye"),
        )
        .unwrap();
        let mut rude = Action::new("2", "1", NextDialogue::End);
        rude.ctx.insert("morality".to_string(), Value::Int(-1));
        tree.insert(rude).unwrap();
        tree.insert(Action::new("3", "2", NextDialogue::End)).unwrap();
        tree
    }

    #[test]
    fn json_round_trip() {
        let tree = sample_tree();
        let text = encode(&tree, Format::Json).unwrap();
        assert_eq!(decode(&text, Format::Json).unwrap(), tree);
    }

    #[test]
    fn ron_round_trip() {
        let tree = sample_tree();
        let text = encode(&tree, Format::Ron).unwrap();
        assert_eq!(decode(&text, Format::Ron).unwrap(), tree);
    }

    #[test]
    fn encode_uses_documented_field_names() {
        let text = encode(&sample_tree(), Format::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let scene = &value["scenes"][0];
        assert_eq!(scene["scene_id"], "1");
        assert_eq!(scene["dialogue_id"], "1");
        assert!(scene["ctx"].is_object());

        let dialogue = &value["dialogues"][0];
        assert_eq!(dialogue["actions"], serde_json::json!(["1", "2"]));

        let action = &value["actions"][1];
        assert_eq!(action["action_id"], "2");
        assert_eq!(action["next_id"], "end");
        assert!(action.get("text").is_none());
    }

    #[test]
    fn encode_is_deterministic() {
        let a = encode(&sample_tree(), Format::Json).unwrap();
        let b = encode(&sample_tree(), Format::Json).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_next_id_names_field_and_action() {
        let input = r#"{
            "scenes": [],
            "dialogues": [],
            "actions": [{"action_id": "7", "dialogue_id": "1", "ctx": {}}]
        }"#;
        let err = decode(input, Format::Json).unwrap_err();
        match err {
            DecodeError::MissingField {
                group,
                entry,
                field,
            } => {
                assert_eq!(group, "actions");
                assert_eq!(entry, "'7'");
                assert_eq!(field, "next_id");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_identifier_names_entry_index() {
        let input = r#"{"scenes": [{"dialogue_id": "1"}], "dialogues": [], "actions": []}"#;
        let err = decode(input, Format::Json).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MissingField { entry, field: "scene_id", .. } if entry == "#0"
        ));
    }

    #[test]
    fn bad_next_id_is_invalid_field() {
        let input = r#"{
            "scenes": [],
            "dialogues": [],
            "actions": [{"action_id": "1", "dialogue_id": "1", "next_id": "to the castle"}]
        }"#;
        let err = decode(input, Format::Json).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidField { field: "next_id", .. }));
    }

    #[test]
    fn integer_ids_are_accepted() {
        let input = r#"{
            "scenes": [{"scene_id": 1, "dialogue_id": 1, "ctx": {}}],
            "dialogues": [{"dialogue_id": 1, "text": "Hi", "actions": [1], "ctx": {}}],
            "actions": [{"action_id": 1, "dialogue_id": 1, "next_id": "end", "ctx": {}}]
        }"#;
        let tree = decode(input, Format::Json).unwrap();
        assert_eq!(tree.dialogue("1").unwrap().actions, vec![ActionId::new("1")]);
    }

    #[test]
    fn duplicate_entries_rejected() {
        let input = r#"{"scenes": [], "actions": [], "dialogues": [
            {"dialogue_id": "1", "text": "a", "actions": []},
            {"dialogue_id": "1", "text": "b", "actions": []}
        ]}"#;
        let err = decode(input, Format::Json).unwrap_err();
        assert!(matches!(err, DecodeError::DuplicateEntry { group: "dialogues", ref id } if id == "1"));
    }

    #[test]
    fn decode_does_not_validate() {
        // Scene pointing nowhere still loads.
        let input = r#"{
            "scenes": [{"scene_id": "1", "dialogue_id": "404", "ctx": {}}],
            "dialogues": [],
            "actions": []
        }"#;
        let tree = decode(input, Format::Json).unwrap();
        assert_eq!(tree.scene("1").unwrap().start.as_str(), "404");
    }

    #[test]
    fn every_group_is_required() {
        let err = decode("{}", Format::Json).unwrap_err();
        assert!(matches!(err, DecodeError::MissingGroup { group: "scenes" }));

        let err = decode("(scenes: [], dialogues: [])", Format::Ron).unwrap_err();
        assert!(matches!(err, DecodeError::MissingGroup { group: "actions" }));
        assert_eq!(err.to_string(), "document has no 'actions' group");

        let empty = r#"{"scenes": [], "dialogues": [], "actions": []}"#;
        assert!(decode(empty, Format::Json).unwrap().is_empty());
    }

    #[test]
    fn every_context_value_kind_round_trips() {
        let mut tree = sample_tree();
        let mut nested = Context::new();
        nested.insert("depth".to_string(), Value::Int(2));
        let ctx = &mut tree.dialogues.get_mut("1").unwrap().ctx;
        ctx.insert("mood".to_string(), Value::Float(0.25));
        ctx.insert("met".to_string(), Value::Bool(true));
        ctx.insert("note".to_string(), Value::Null);
        ctx.insert(
            "tags".to_string(),
            Value::List(vec![Value::String("a".to_string()), Value::Int(-3)]),
        );
        ctx.insert("inner".to_string(), Value::Map(nested));

        for format in [Format::Json, Format::Ron] {
            let text = encode(&tree, format).unwrap();
            assert_eq!(decode(&text, format).unwrap(), tree, "{:?}", format);
        }
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(Format::from_path(Path::new("npc.json")), Some(Format::Json));
        assert_eq!(Format::from_path(Path::new("npc.ron")), Some(Format::Ron));
        assert_eq!(Format::from_path(Path::new("npc.txt")), None);
    }
}
