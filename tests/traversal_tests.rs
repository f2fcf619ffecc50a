/// Traversal integration tests: playing compiled scenes.

use dialogue_graph::core::compiler::DialogueCompiler;
use dialogue_graph::core::traversal::{Conversation, Step, TraversalError, View};
use dialogue_graph::schema::ids::{ActionId, DialogueId};

fn guard() -> dialogue_graph::ValidatedTree {
    let script = std::fs::read_to_string("tests/fixtures/guard.dlg").unwrap();
    DialogueCompiler::default().compile_script(&script).unwrap()
}

#[test]
fn hello_scene_plays_to_the_end() {
    let tree = DialogueCompiler::default()
        .compile_script("create scene 1 1\ncreate dialogue 1 \"Hello\"\ncreate action 1 1 end")
        .unwrap();
    let mut conversation = Conversation::start(&tree, "1").unwrap();

    match conversation.current() {
        View::Speaking { text, choices } => {
            assert_eq!(text, "Hello");
            assert_eq!(choices, vec![None]);
        }
        View::Finished => panic!("scene finished before it began"),
    }
    assert_eq!(conversation.dialogue_id(), Some(&DialogueId::new("1")));
    assert_eq!(conversation.offered_actions(), vec![&ActionId::new("1")]);

    assert_eq!(conversation.choose(&ActionId::new("1")), Ok(Step::Finished));
    assert!(conversation.is_finished());
    assert_eq!(
        conversation.choose(&ActionId::new("1")),
        Err(TraversalError::Finished)
    );
}

#[test]
fn guard_walkthrough() {
    let tree = guard();
    let mut conversation = Conversation::start(&tree, "gate").unwrap();
    assert_eq!(conversation.current().text(), Some("Halt! Who goes there?"));
    assert_eq!(
        conversation.current().labels(),
        vec![Some("A friend."), Some("Nobody.")]
    );

    let mut visited = Vec::new();
    for choice in ["friend", "insist", "friend", "bribe", "leave"] {
        visited.push(conversation.choose(&ActionId::new(choice)).unwrap());
    }
    assert_eq!(
        visited,
        vec![
            Step::Moved(DialogueId::new("prove")),
            Step::Moved(DialogueId::new("greet")),
            Step::Moved(DialogueId::new("prove")),
            Step::Moved(DialogueId::new("pass")),
            Step::Finished,
        ]
    );
    assert_eq!(conversation.current(), View::Finished);
    assert!(conversation.offered_actions().is_empty());

    conversation.restart();
    assert_eq!(conversation.dialogue_id(), Some(&DialogueId::new("greet")));
}

#[test]
fn choice_from_another_dialogue_is_rejected() {
    let tree = guard();
    let mut conversation = Conversation::start(&tree, "gate").unwrap();
    let err = conversation.choose(&ActionId::new("bribe")).unwrap_err();
    assert!(matches!(err, TraversalError::NotOffered { .. }));
    assert_eq!(conversation.dialogue_id(), Some(&DialogueId::new("greet")));
    assert!(conversation.choose(&ActionId::new("friend")).is_ok());
}

#[test]
fn runs_are_deterministic_and_independent() {
    let tree = guard();
    let choices = [0, 1, 0, 0, 0];

    let run = || {
        let mut conversation = Conversation::start(&tree, "gate").unwrap();
        let mut states = vec![conversation.dialogue_id().cloned()];
        for &n in &choices {
            conversation.choose_nth(n).unwrap();
            states.push(conversation.dialogue_id().cloned());
        }
        states
    };

    let first = run();
    let second = run();
    assert_eq!(first, second);
    assert_eq!(first.last(), Some(&None));

    // Two conversations over one tree do not see each other.
    let mut a = Conversation::start(&tree, "gate").unwrap();
    let b = Conversation::start(&tree, "gate").unwrap();
    a.choose_nth(1).unwrap();
    assert_eq!(a.dialogue_id(), Some(&DialogueId::new("farewell")));
    assert_eq!(b.dialogue_id(), Some(&DialogueId::new("greet")));
}

#[test]
fn dead_end_offers_nothing() {
    let tree = DialogueCompiler::default()
        .compile_script("create scene 1 1\ncreate dialogue 1 \"...\"")
        .unwrap();
    assert_eq!(tree.diagnostics().warnings.len(), 1);

    let mut conversation = Conversation::start(&tree, "1").unwrap();
    assert!(conversation.current().labels().is_empty());
    assert!(matches!(
        conversation.choose_nth(0),
        Err(TraversalError::NoSuchChoice { offered: 0, .. })
    ));
    assert!(!conversation.is_finished());
}
