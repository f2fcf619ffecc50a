/// Property tests over generated dialogue trees.

use dialogue_graph::core::compiler::DialogueCompiler;
use dialogue_graph::core::document::{self, Format};
use dialogue_graph::core::traversal::Conversation;
use dialogue_graph::core::validator::{
    OrphanPolicy, Reachability, Validator, ValidatorConfig, ViolationKind,
};
use dialogue_graph::schema::entity::{Action, Context, Dialogue, EntityKind, Scene, Value};
use dialogue_graph::schema::ids::{is_valid_identifier, DialogueId, NextDialogue};
use dialogue_graph::schema::tree::Tree;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1_000_000_000i64..1_000_000_000).prop_map(Value::Int),
        // Quarters are exact in both text encodings.
        (-4000i32..4000).prop_map(|n| Value::Float(f64::from(n) / 4.0)),
        "[a-z ]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
            prop::collection::btree_map("[a-z]{1,5}", inner, 0..4).prop_map(Value::Map),
        ]
    })
}

fn arb_ctx() -> impl Strategy<Value = Context> {
    prop::collection::btree_map("[a-z_]{1,6}", arb_value(), 0..3)
}

/// Legal identifiers that are not reserved words.
fn arb_ident() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_]{1,6}".prop_filter("reserved word", |s| is_valid_identifier(s))
}

/// Distinct identifiers for `n` dialogues, drawn from the full legal alphabet.
fn arb_names(n: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(arb_ident(), n).prop_map(|names| names.into_iter().collect())
}

/// Where an action leads in a generated graph.
#[derive(Debug, Clone)]
enum Edge {
    To(usize),
    End,
    /// A dialogue that does not exist.
    Missing,
}

fn arb_edge(n: usize, dangling: bool) -> BoxedStrategy<Edge> {
    if dangling {
        prop_oneof![
            6 => (0..n).prop_map(Edge::To),
            2 => Just(Edge::End),
            1 => Just(Edge::Missing),
        ]
        .boxed()
    } else {
        prop_oneof![3 => (0..n).prop_map(Edge::To), 1 => Just(Edge::End)].boxed()
    }
}

#[derive(Debug, Clone)]
struct Shape {
    names: Vec<String>,
    edges: Vec<Vec<(Edge, Context)>>,
    starts: Vec<usize>,
    scene_ctx: Context,
    /// Drop each dialogue's `i`th listed action, if it has one.
    unlist: Option<usize>,
}

/// `edges[i]` lists dialogue `i`'s actions and where each one leads.
fn build_tree(shape: &Shape) -> Tree {
    let name = |i: usize| shape.names[i].clone();
    let mut tree = Tree::new();
    for (i, targets) in shape.edges.iter().enumerate() {
        let mut dialogue = Dialogue::new(name(i), format!("Line {}.", i));
        for (j, (edge, ctx)) in targets.iter().enumerate() {
            let id = format!("{}_{}", name(i), j);
            let next = match edge {
                Edge::To(k) => NextDialogue::Dialogue(DialogueId::new(name(*k))),
                Edge::End => NextDialogue::End,
                // Generated names are at most six characters.
                Edge::Missing => NextDialogue::Dialogue(DialogueId::new("missing_target")),
            };
            let mut action = Action::new(id.clone(), name(i), next);
            if j % 2 == 0 {
                action = action.with_text(format!("Reply {}", j));
            }
            action.ctx = ctx.clone();
            tree.insert(action).unwrap();
            if shape.unlist != Some(j) {
                dialogue = dialogue.with_action(id);
            }
        }
        tree.insert(dialogue).unwrap();
    }
    for (k, start) in shape.starts.iter().enumerate() {
        let mut scene = Scene::new(format!("s{}", k), name(*start));
        scene.ctx = shape.scene_ctx.clone();
        tree.insert(scene).unwrap();
    }
    tree
}

fn arb_shape(dangling: bool) -> impl Strategy<Value = Shape> {
    (1usize..8).prop_flat_map(move |n| {
        let edges = prop::collection::vec(
            prop::collection::vec((arb_edge(n, dangling), arb_ctx()), 0..4),
            n,
        );
        let starts = prop::collection::vec(0..n, 1..3);
        let unlist = if dangling {
            prop::option::weighted(0.2, 0usize..3).boxed()
        } else {
            Just(None).boxed()
        };
        (arb_names(n), edges, starts, arb_ctx(), unlist).prop_map(
            |(names, edges, starts, scene_ctx, unlist)| Shape {
                names,
                edges,
                starts,
                scene_ctx,
                unlist,
            },
        )
    })
}

/// Well-formed graphs: every reference resolves and every action is listed.
fn arb_tree() -> impl Strategy<Value = Tree> {
    arb_shape(false).prop_map(|shape| build_tree(&shape))
}

/// Graphs that may also hold dangling targets and unlisted actions.
fn arb_any_tree() -> impl Strategy<Value = Tree> {
    arb_shape(true).prop_map(|shape| build_tree(&shape))
}

fn lenient() -> Validator {
    Validator::new(ValidatorConfig {
        orphan_policy: OrphanPolicy::Warn,
        shared_dialogues: BTreeSet::new(),
    })
}

fn successors(tree: &Tree, dialogue: &str) -> Vec<String> {
    tree.dialogue(dialogue)
        .map(|d| {
            d.actions
                .iter()
                .filter_map(|a| tree.action(a.as_str()))
                .filter_map(|a| a.next.dialogue())
                .map(|id| id.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Plain search: can `from` get back to itself in one or more steps?
fn on_cycle(tree: &Tree, from: &str) -> bool {
    let mut seen = BTreeSet::new();
    let mut stack = successors(tree, from);
    while let Some(next) = stack.pop() {
        if next == from {
            return true;
        }
        if seen.insert(next.clone()) {
            stack.extend(successors(tree, &next));
        }
    }
    false
}

proptest! {
    #[test]
    fn documents_round_trip(tree in arb_tree()) {
        for format in [Format::Json, Format::Ron] {
            let text = document::encode(&tree, format).unwrap();
            prop_assert_eq!(&document::decode(&text, format).unwrap(), &tree);
        }
    }

    #[test]
    fn accepted_trees_round_trip(tree in arb_any_tree()) {
        if let Ok(validated) = lenient().validate(tree) {
            for format in [Format::Json, Format::Ron] {
                let text = document::encode(&validated, format).unwrap();
                let back = document::decode(&text, format).unwrap();
                prop_assert_eq!(&back, validated.tree());
                prop_assert!(lenient().validate(back).is_ok());
            }
        }
    }

    #[test]
    fn broken_references_are_always_reported(tree in arb_any_tree()) {
        let diagnostics = lenient().check(&tree);
        let broken = tree.actions.values().any(|a| {
            a.next.dialogue().is_some_and(|next| !tree.dialogues.contains_key(next))
                || tree.dialogue(a.owner.as_str()).is_some_and(|d| !d.offers(&a.id))
        });
        prop_assert_eq!(broken, !diagnostics.errors.is_empty());
    }

    #[test]
    fn validation_is_idempotent(tree in arb_tree()) {
        let validator = lenient();
        let first = validator.validate(tree).unwrap();
        let diagnostics = first.diagnostics().clone();
        prop_assert!(diagnostics.errors.is_empty());

        let second = validator.validate(first.into_inner()).unwrap();
        prop_assert_eq!(second.diagnostics(), &diagnostics);
    }

    #[test]
    fn every_dialogue_classified_once(tree in arb_tree()) {
        let diagnostics = lenient().check(&tree);
        prop_assert_eq!(diagnostics.reachability.len(), tree.dialogues.len());

        let orphans: BTreeSet<&str> = diagnostics
            .warnings
            .iter()
            .filter(|w| w.kind == ViolationKind::OrphanDialogue)
            .map(|w| w.id.as_str())
            .collect();
        let cyclic_notes = diagnostics.notes.len();
        let mut cyclic = 0;

        for (id, class) in &diagnostics.reachability {
            let unreachable = orphans.contains(id.as_str());
            match class {
                Reachability::Unreachable => prop_assert!(unreachable),
                Reachability::Cyclic => {
                    prop_assert!(!unreachable);
                    prop_assert!(on_cycle(&tree, id.as_str()));
                    cyclic += 1;
                }
                Reachability::Acyclic => {
                    prop_assert!(!unreachable);
                    prop_assert!(!on_cycle(&tree, id.as_str()));
                }
            }
        }
        prop_assert_eq!(cyclic, cyclic_notes);
    }

    #[test]
    fn one_dangling_next_is_one_violation(tree in arb_tree()) {
        let mut tree = tree;
        let owner = tree.dialogues.keys().next().unwrap().clone();
        let next = NextDialogue::Dialogue(DialogueId::new("missing_x"));
        tree.insert(Action::new("zz_x", owner.as_str(), next)).unwrap();
        let listed = tree.dialogues[&owner].clone().with_action("zz_x");
        tree.replace(listed);
        let diagnostics = lenient().check(&tree);
        prop_assert_eq!(diagnostics.errors.len(), 1);
        let violation = &diagnostics.errors[0];
        prop_assert_eq!(violation.kind, ViolationKind::DanglingReference);
        prop_assert_eq!(violation.entity, EntityKind::Action);
        prop_assert_eq!(violation.id.as_str(), "zz_x");
    }

    #[test]
    fn auto_ids_never_collide(count in 1usize..40, width in 1usize..6) {
        let script: String = (0..count)
            .map(|i| format!("create dialogue \"line {}\"\n", i))
            .collect();
        let compiler = DialogueCompiler::builder().id_width(width).build().unwrap();
        let tree = compiler.build_script(&script).unwrap();
        let ids = tree.ids(EntityKind::Dialogue);
        prop_assert_eq!(ids.len(), count);

        // Table order is lexical, so compare numerically.
        let mut values: Vec<u64> = ids.iter().map(|id| id.parse().unwrap()).collect();
        values.sort_unstable();
        prop_assert_eq!(values, (0..count as u64).collect::<Vec<_>>());
    }

    #[test]
    fn traversal_is_deterministic(
        tree in arb_tree(),
        picks in prop::collection::vec(0usize..4, 0..20),
    ) {
        let tree = lenient().validate(tree).unwrap();
        let run = || {
            let mut conversation = Conversation::start(&tree, "s0").unwrap();
            let mut states = vec![conversation.dialogue_id().cloned()];
            for &pick in &picks {
                let offered = conversation.current().labels().len();
                if offered == 0 {
                    break;
                }
                conversation.choose_nth(pick % offered).unwrap();
                states.push(conversation.dialogue_id().cloned());
            }
            states
        };
        prop_assert_eq!(run(), run());
    }
}
