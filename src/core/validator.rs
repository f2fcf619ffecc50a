/// Validator: referential integrity, orphan detection and reachability
/// classification for a built tree.
///
/// All checks run to completion and every violation is reported, so an
/// author can fix the whole script in one pass.

use log::{debug, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::ops::Deref;
use thiserror::Error;

use crate::schema::entity::EntityKind;
use crate::schema::ids::{is_valid_identifier, DialogueId};
use crate::schema::tree::Tree;

/// Whether an unreachable dialogue fails validation or only warns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrphanPolicy {
    #[default]
    Error,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidatorConfig {
    #[serde(default)]
    pub orphan_policy: OrphanPolicy,
    /// Library dialogues entered directly by game code. They, and everything
    /// reachable from them, are never reported as orphans.
    #[serde(default)]
    pub shared_dialogues: BTreeSet<DialogueId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ViolationKind {
    /// An identifier or reference that is not legal in a script or document,
    /// or a table key that disagrees with the entity stored under it.
    InvalidIdentifier,
    /// An identifier that does not resolve in its target table.
    DanglingReference,
    /// A dialogue no scene can reach.
    OrphanDialogue,
    /// A dialogue lists an action that belongs to another dialogue.
    OwnershipMismatch,
    /// An action its owning dialogue does not list. It can never be offered.
    UnlistedAction,
    /// A reachable dialogue with no actions. The conversation stalls there.
    DeadEnd,
    /// A dialogue inside a cycle. Legal; reported for information only.
    CyclicPath,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidIdentifier => "invalid identifier",
            Self::DanglingReference => "dangling reference",
            Self::OrphanDialogue => "orphan dialogue",
            Self::OwnershipMismatch => "ownership mismatch",
            Self::UnlistedAction => "unlisted action",
            Self::DeadEnd => "dead end",
            Self::CyclicPath => "cyclic path",
        })
    }
}

/// One finding about one entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Violation {
    pub kind: ViolationKind,
    pub severity: Severity,
    /// The entity the finding is about.
    pub entity: EntityKind,
    pub id: String,
    pub detail: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} '{}': {}", self.kind, self.entity, self.id, self.detail)
    }
}

/// A tree failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} integrity violation(s): {}", .violations.len(), summary(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

fn summary(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// How a dialogue relates to the scenes that can reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reachability {
    Acyclic,
    Cyclic,
    Unreachable,
}

/// Everything the validator found.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Diagnostics {
    pub errors: Vec<Violation>,
    pub warnings: Vec<Violation>,
    pub notes: Vec<Violation>,
    /// Exactly one entry per dialogue in the tree.
    pub reachability: BTreeMap<DialogueId, Reachability>,
}

impl Diagnostics {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, violation: Violation) {
        match violation.severity {
            Severity::Error => self.errors.push(violation),
            Severity::Warning => self.warnings.push(violation),
            Severity::Info => self.notes.push(violation),
        }
    }
}

/// A tree that passed validation. Read-only from here on.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedTree {
    tree: Tree,
    diagnostics: Diagnostics,
}

impl ValidatedTree {
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn reachability(&self, dialogue: &str) -> Option<Reachability> {
        self.diagnostics.reachability.get(dialogue).copied()
    }

    /// Give up the certification and get the raw tree back, e.g. to edit it.
    pub fn into_inner(self) -> Tree {
        self.tree
    }
}

impl Deref for ValidatedTree {
    type Target = Tree;

    fn deref(&self) -> &Tree {
        &self.tree
    }
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate and certify a tree.
    pub fn validate(&self, tree: Tree) -> Result<ValidatedTree, ValidationError> {
        let diagnostics = self.check(&tree);
        if diagnostics.is_ok() {
            Ok(ValidatedTree { tree, diagnostics })
        } else {
            Err(ValidationError {
                violations: diagnostics.errors,
            })
        }
    }

    /// Run every check and collect the findings without deciding anything.
    pub fn check(&self, tree: &Tree) -> Diagnostics {
        let mut diagnostics = Diagnostics::default();

        check_identifiers(tree, &mut diagnostics);
        self.check_references(tree, &mut diagnostics);
        let reachable = reachable_dialogues(tree, self.roots(tree));
        self.check_orphans(tree, &reachable, &mut diagnostics);
        classify(tree, &reachable, &mut diagnostics);

        debug!(
            "validated {} scenes, {} dialogues, {} actions: {} errors, {} warnings, {} notes",
            tree.scenes.len(),
            tree.dialogues.len(),
            tree.actions.len(),
            diagnostics.errors.len(),
            diagnostics.warnings.len(),
            diagnostics.notes.len()
        );
        diagnostics
    }

    fn roots<'t>(&self, tree: &'t Tree) -> Vec<&'t str> {
        let scenes = tree.scenes.values().map(|s| s.start.as_str());
        let shared = self
            .config
            .shared_dialogues
            .iter()
            .filter_map(|id| tree.dialogues.get_key_value(id.as_str()))
            .map(|(id, _)| id.as_str());
        scenes.chain(shared).collect()
    }

    fn check_references(&self, tree: &Tree, diagnostics: &mut Diagnostics) {
        for action in tree.actions.values() {
            match tree.dialogues.get(&action.owner) {
                None => diagnostics.push(dangling(
                    EntityKind::Action,
                    action.id.as_str(),
                    format!("dialogue_id '{}' does not exist", action.owner),
                )),
                Some(owner) if !owner.offers(&action.id) => diagnostics.push(Violation {
                    kind: ViolationKind::UnlistedAction,
                    severity: Severity::Error,
                    entity: EntityKind::Action,
                    id: action.id.to_string(),
                    detail: format!("dialogue '{}' does not list it", action.owner),
                }),
                Some(_) => {}
            }
            if let Some(next) = action.next.dialogue() {
                if !tree.dialogues.contains_key(next) {
                    diagnostics.push(dangling(
                        EntityKind::Action,
                        action.id.as_str(),
                        format!("next_id '{}' does not exist", next),
                    ));
                }
            }
        }

        for scene in tree.scenes.values() {
            if !tree.dialogues.contains_key(&scene.start) {
                diagnostics.push(dangling(
                    EntityKind::Scene,
                    scene.id.as_str(),
                    format!("starting dialogue_id '{}' does not exist", scene.start),
                ));
            }
        }

        for dialogue in tree.dialogues.values() {
            for action_id in &dialogue.actions {
                match tree.actions.get(action_id) {
                    None => diagnostics.push(dangling(
                        EntityKind::Dialogue,
                        dialogue.id.as_str(),
                        format!("action '{}' does not exist", action_id),
                    )),
                    Some(action) if action.owner != dialogue.id => diagnostics.push(Violation {
                        kind: ViolationKind::OwnershipMismatch,
                        severity: Severity::Error,
                        entity: EntityKind::Dialogue,
                        id: dialogue.id.to_string(),
                        detail: format!(
                            "lists action '{}' which belongs to dialogue '{}'",
                            action_id, action.owner
                        ),
                    }),
                    Some(_) => {}
                }
            }
        }
    }

    fn check_orphans(
        &self,
        tree: &Tree,
        reachable: &FxHashSet<&str>,
        diagnostics: &mut Diagnostics,
    ) {
        let severity = match self.config.orphan_policy {
            OrphanPolicy::Error => Severity::Error,
            OrphanPolicy::Warn => Severity::Warning,
        };
        for id in tree.dialogues.keys() {
            if reachable.contains(id.as_str()) {
                continue;
            }
            if severity == Severity::Warning {
                warn!("dialogue '{}' is not reachable from any scene", id);
            }
            diagnostics.push(Violation {
                kind: ViolationKind::OrphanDialogue,
                severity,
                entity: EntityKind::Dialogue,
                id: id.to_string(),
                detail: "not reachable from any scene's starting dialogue".to_string(),
            });
        }
    }
}

/// Every key, identifier and reference must be spellable in a script, and
/// each table key must match the identifier of the entity stored under it.
fn check_identifiers(tree: &Tree, diagnostics: &mut Diagnostics) {
    let mut report = |entity: EntityKind, id: &str, detail: String| {
        diagnostics.push(Violation {
            kind: ViolationKind::InvalidIdentifier,
            severity: Severity::Error,
            entity,
            id: id.to_string(),
            detail,
        })
    };
    let mut check = |entity: EntityKind, id: &str, field: &str, value: &str| {
        if !is_valid_identifier(value) {
            report(entity, id, format!("{} '{}' is not a legal identifier", field, value));
        }
    };

    for (key, scene) in &tree.scenes {
        let id = key.as_str();
        check(EntityKind::Scene, id, "id", id);
        check(EntityKind::Scene, id, "dialogue_id", scene.start.as_str());
    }
    for (key, dialogue) in &tree.dialogues {
        let id = key.as_str();
        check(EntityKind::Dialogue, id, "id", id);
        for action in &dialogue.actions {
            check(EntityKind::Dialogue, id, "action", action.as_str());
        }
    }
    for (key, action) in &tree.actions {
        let id = key.as_str();
        check(EntityKind::Action, id, "id", id);
        check(EntityKind::Action, id, "dialogue_id", action.owner.as_str());
        if let Some(next) = action.next.dialogue() {
            check(EntityKind::Action, id, "next_id", next.as_str());
        }
    }

    let drifted = tree
        .scenes
        .iter()
        .filter(|(key, scene)| **key != scene.id)
        .map(|(key, scene)| (EntityKind::Scene, key.as_str(), scene.id.as_str()))
        .chain(
            tree.dialogues
                .iter()
                .filter(|(key, dialogue)| **key != dialogue.id)
                .map(|(key, d)| (EntityKind::Dialogue, key.as_str(), d.id.as_str())),
        )
        .chain(
            tree.actions
                .iter()
                .filter(|(key, action)| **key != action.id)
                .map(|(key, a)| (EntityKind::Action, key.as_str(), a.id.as_str())),
        );
    for (entity, key, id) in drifted {
        report(entity, key, format!("stored entity has id '{}'", id));
    }
}

fn dangling(entity: EntityKind, id: &str, detail: String) -> Violation {
    Violation {
        kind: ViolationKind::DanglingReference,
        severity: Severity::Error,
        entity,
        id: id.to_string(),
        detail,
    }
}

/// Dialogues an action listed on `dialogue` can lead to. Unresolvable
/// actions and targets are skipped; the reference check reports them.
fn successors<'t>(tree: &'t Tree, dialogue: &str) -> Vec<&'t str> {
    let Some(d) = tree.dialogues.get(dialogue) else {
        return Vec::new();
    };
    d.actions
        .iter()
        .filter_map(|a| tree.actions.get(a))
        .filter_map(|a| a.next.dialogue())
        .filter_map(|next| tree.dialogues.get_key_value(next.as_str()))
        .map(|(id, _)| id.as_str())
        .collect()
}

/// Breadth-first search from every root. Each dialogue is expanded at most
/// once, so cycles cannot loop.
fn reachable_dialogues<'t>(tree: &'t Tree, roots: Vec<&'t str>) -> FxHashSet<&'t str> {
    let mut visited = FxHashSet::default();
    let mut queue = VecDeque::new();

    for root in roots {
        if let Some((id, _)) = tree.dialogues.get_key_value(root) {
            if visited.insert(id.as_str()) {
                queue.push_back(id.as_str());
            }
        }
    }

    while let Some(current) = queue.pop_front() {
        for next in successors(tree, current) {
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }
    visited
}

/// Classify every dialogue exactly once and note dead ends and cycles.
fn classify(tree: &Tree, reachable: &FxHashSet<&str>, diagnostics: &mut Diagnostics) {
    let nodes: Vec<&str> = tree
        .dialogues
        .keys()
        .map(|k| k.as_str())
        .filter(|k| reachable.contains(k))
        .collect();
    let slot: FxHashMap<&str, usize> = nodes.iter().enumerate().map(|(i, n)| (*n, i)).collect();
    let adjacency: Vec<Vec<usize>> = nodes
        .iter()
        .map(|n| {
            successors(tree, n)
                .into_iter()
                .filter_map(|s| slot.get(s).copied())
                .collect()
        })
        .collect();
    let cyclic = cyclic_nodes(&adjacency);

    for (id, dialogue) in &tree.dialogues {
        let class = match slot.get(id.as_str()) {
            None => Reachability::Unreachable,
            Some(&i) if cyclic[i] => Reachability::Cyclic,
            Some(_) => Reachability::Acyclic,
        };

        if class != Reachability::Unreachable && dialogue.actions.is_empty() {
            diagnostics.push(Violation {
                kind: ViolationKind::DeadEnd,
                severity: Severity::Warning,
                entity: EntityKind::Dialogue,
                id: id.to_string(),
                detail: "reachable but offers no actions".to_string(),
            });
        }
        if class == Reachability::Cyclic {
            diagnostics.push(Violation {
                kind: ViolationKind::CyclicPath,
                severity: Severity::Info,
                entity: EntityKind::Dialogue,
                id: id.to_string(),
                detail: "part of a conversation loop".to_string(),
            });
        }
        diagnostics.reachability.insert(id.clone(), class);
    }
}

/// Tarjan's strongly connected components, iteratively. A node is cyclic if
/// its component has more than one member or it has an edge to itself.
fn cyclic_nodes(adjacency: &[Vec<usize>]) -> Vec<bool> {
    const UNVISITED: usize = usize::MAX;

    let n = adjacency.len();
    let mut index = vec![UNVISITED; n];
    let mut low = vec![0; n];
    let mut on_stack = vec![false; n];
    let mut stack = Vec::new();
    let mut cyclic = vec![false; n];
    let mut next_index = 0;

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }
        index[root] = next_index;
        low[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;
        let mut calls = vec![(root, 0usize)];

        while let Some(&(v, edge)) = calls.last() {
            if let Some(&w) = adjacency[v].get(edge) {
                if let Some(top) = calls.last_mut() {
                    top.1 += 1;
                }
                if index[w] == UNVISITED {
                    index[w] = next_index;
                    low[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    calls.push((w, 0));
                } else if on_stack[w] {
                    low[v] = low[v].min(index[w]);
                }
                continue;
            }

            calls.pop();
            if let Some(&(parent, _)) = calls.last() {
                low[parent] = low[parent].min(low[v]);
            }
            if low[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                if component.len() > 1 || adjacency[v].contains(&v) {
                    for w in component {
                        cyclic[w] = true;
                    }
                }
            }
        }
    }
    cyclic
}
