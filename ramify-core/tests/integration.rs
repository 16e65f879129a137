//! Integration tests exercising the repository through its public API.

use std::collections::BTreeSet;

use ramify_core::{
    ExportedRepository, Message, MessageRepository, MessageStatus, Replacement, RepositoryConfig,
    RepositoryError, is_optimistic_id, message,
};

/// A chat turn, as an embedding application might model it.
#[message]
struct Turn {
    id: String,
    text: String,
    status: MessageStatus,
}

fn turn(id: &str) -> Turn {
    Turn {
        id: id.to_string(),
        text: format!("text of {id}"),
        status: MessageStatus::Complete,
    }
}

fn ids(messages: &[Turn]) -> Vec<&str> {
    messages.iter().map(|m| m.id.as_str()).collect()
}

fn chain(ids: &[&str]) -> MessageRepository<Turn> {
    let mut repo = MessageRepository::new();
    let mut parent: Option<&str> = None;
    for id in ids {
        repo.add_or_update_message(parent, turn(id)).unwrap();
        parent = Some(id);
    }
    repo
}

#[test]
fn linear_chain() {
    let repo = chain(&["A", "B", "C"]);

    assert_eq!(ids(repo.get_messages()), vec!["A", "B", "C"]);
    assert_eq!(repo.head_id(), Some("C"));
    assert_eq!(repo.get_message("C").unwrap().depth, 2);
    assert_eq!(repo.get_message("C").unwrap().parent_id, Some("B"));
}

#[test]
fn branching_keeps_creation_order() {
    let mut repo = chain(&["A", "B", "C"]);
    repo.add_or_update_message(Some("A"), turn("D")).unwrap();

    assert_eq!(repo.get_branches("B").unwrap(), ["B", "D"]);
    assert_eq!(repo.get_branches("D").unwrap(), ["B", "D"]);
    // D's parent was not the head, so the visible conversation is unchanged
    assert_eq!(repo.head_id(), Some("C"));

    repo.switch_to_branch("D").unwrap();
    assert_eq!(repo.head_id(), Some("D"));
    assert_eq!(ids(repo.get_messages()), vec!["A", "D"]);
}

#[test]
fn switch_back_restores_previous_leaf() {
    let mut repo = chain(&["A", "B", "C"]);
    repo.add_or_update_message(Some("A"), turn("D")).unwrap();
    repo.switch_to_branch("D").unwrap();
    repo.add_or_update_message(Some("D"), turn("E")).unwrap();
    assert_eq!(ids(repo.get_messages()), vec!["A", "D", "E"]);

    repo.switch_to_branch("B").unwrap();
    assert_eq!(repo.head_id(), Some("C"));
    assert_eq!(ids(repo.get_messages()), vec!["A", "B", "C"]);
    assert_eq!(repo.get_branches("B").unwrap(), ["B", "D"]);

    // D's own selection survived the round trip
    repo.switch_to_branch("D").unwrap();
    assert_eq!(repo.head_id(), Some("E"));
}

#[test]
fn switch_never_changes_branch_lists() {
    let mut repo = chain(&["A", "B", "C"]);
    repo.add_or_update_message(Some("A"), turn("D")).unwrap();
    repo.add_or_update_message(Some("B"), turn("C2")).unwrap();
    repo.add_or_update_message(None, turn("R")).unwrap();

    let every_id: Vec<String> = repo.export().messages.iter().map(|e| e.message.id.clone()).collect();
    let snapshot = |repo: &MessageRepository<Turn>| {
        every_id
            .iter()
            .map(|id| repo.get_branches(id).unwrap().to_vec())
            .collect::<Vec<_>>()
    };

    let before = snapshot(&repo);
    for id in ["D", "C2", "R", "B", "A", "C"] {
        repo.switch_to_branch(id).unwrap();
        assert_eq!(snapshot(&repo), before);
    }
    assert_eq!(repo.len(), 6);
}

#[test]
fn switch_selects_only_one_level() {
    let mut repo = chain(&["A", "B", "C"]);
    repo.add_or_update_message(Some("B"), turn("C2")).unwrap();
    repo.add_or_update_message(Some("A"), turn("D")).unwrap();

    repo.switch_to_branch("C2").unwrap();
    repo.switch_to_branch("D").unwrap();
    assert_eq!(ids(repo.get_messages()), vec!["A", "D"]);

    // B kept C2 selected while D was shown
    repo.switch_to_branch("B").unwrap();
    assert_eq!(ids(repo.get_messages()), vec!["A", "B", "C2"]);
}

#[test]
fn optimistic_ids_never_collide() {
    // An adversarial generator that keeps repeating itself.
    let script = ["same", "same", "same", "other", "same", "other", "third"];
    let mut calls = 0usize;
    let generator = move |_len: usize| {
        let suffix = script[calls.min(script.len() - 1)];
        calls += 1;
        suffix.to_string()
    };

    let mut repo = chain(&["A"]).with_id_generator(generator);
    let build = |id: String, status: MessageStatus| Turn {
        id,
        text: String::new(),
        status,
    };

    let first = repo.append_optimistic_message(Some("A"), build).unwrap();
    let second = repo.append_optimistic_message(Some(&first), build).unwrap();
    let third = repo.append_optimistic_message(Some(&second), build).unwrap();

    assert_ne!(first, second);
    assert_ne!(second, third);
    assert_ne!(first, third);
    for id in [&first, &second, &third] {
        assert!(is_optimistic_id(id));
        assert_eq!(repo.get_message(id).unwrap().message.status, MessageStatus::Running);
    }
    assert_eq!(repo.head_id(), Some(third.as_str()));
}

#[test]
fn optimistic_allocation_gives_up() {
    let config = RepositoryConfig {
        max_optimistic_attempts: 4,
        ..RepositoryConfig::default()
    };
    let mut repo: MessageRepository<Turn> = MessageRepository::with_config(config)
        .unwrap()
        .with_id_generator(|_: usize| "fixed".to_string());
    let build = |id: String, status: MessageStatus| Turn {
        id,
        text: String::new(),
        status,
    };

    repo.append_optimistic_message(None, build).unwrap();
    let err = repo.append_optimistic_message(None, build).unwrap_err();
    assert_eq!(err, RepositoryError::OptimisticIdExhausted(4));
    assert_eq!(repo.len(), 1);
}

#[test]
fn confirming_an_optimistic_message() {
    let mut repo = chain(&["A"]);
    let pending = repo
        .append_optimistic_message(Some("A"), |id, status| Turn {
            id,
            text: "thinking".to_string(),
            status,
        })
        .unwrap();

    // the server answers with a real id: replace the placeholder
    repo.add_or_update_message(Some("A"), turn("B")).unwrap();
    repo.delete_message(&pending, Replacement::Parent).unwrap();

    assert_eq!(repo.get_branches("B").unwrap(), ["B"]);
    assert!(!repo.contains(&pending));
    assert_eq!(ids(repo.get_messages()), vec!["A", "B"]);
}

#[test]
fn reset_head_prunes_descendants() {
    let mut repo = chain(&["A", "B", "C", "D"]);
    repo.reset_head(Some("B")).unwrap();

    assert_eq!(ids(repo.get_messages()), vec!["A", "B"]);
    assert_eq!(repo.head_id(), Some("B"));
    assert!(matches!(
        repo.get_message("C"),
        Err(RepositoryError::MessageNotFound(_))
    ));
    assert!(matches!(
        repo.get_message("D"),
        Err(RepositoryError::MessageNotFound(_))
    ));
    assert_eq!(repo.len(), 2);
}

#[test]
fn reset_head_keeps_sibling_branches() {
    let mut repo = chain(&["A", "B", "C"]);
    repo.add_or_update_message(Some("A"), turn("D")).unwrap();
    repo.add_or_update_message(Some("D"), turn("E")).unwrap();

    repo.reset_head(Some("D")).unwrap();
    assert_eq!(ids(repo.get_messages()), vec!["A", "D"]);
    assert!(!repo.contains("E"));
    assert!(repo.contains("C"));
    assert_eq!(repo.get_branches("D").unwrap(), ["B", "D"]);
}

#[test]
fn delete_reparents_children() {
    let mut repo = chain(&["A", "B", "C"]);
    repo.delete_message("B", Replacement::default()).unwrap();

    let c = repo.get_message("C").unwrap();
    assert_eq!(c.parent_id, Some("A"));
    assert_eq!(c.depth, 1);
    assert_eq!(ids(repo.get_messages()), vec!["A", "C"]);
    assert!(!repo.contains("B"));
}

#[test]
fn delete_moves_whole_subtree_depths() {
    let mut repo = chain(&["A", "B", "C", "D", "E"]);
    repo.delete_message("B", Replacement::Root).unwrap();

    assert_eq!(repo.get_message("C").unwrap().depth, 0);
    assert_eq!(repo.get_message("D").unwrap().depth, 1);
    assert_eq!(repo.get_message("E").unwrap().depth, 2);
    assert_eq!(ids(repo.get_messages()), vec!["C", "D", "E"]);
}

#[test]
fn export_import_round_trip() {
    let mut repo = chain(&["A", "B", "C"]);
    repo.add_or_update_message(Some("A"), turn("D")).unwrap();
    repo.add_or_update_message(Some("B"), turn("C2")).unwrap();
    repo.switch_to_branch("C2").unwrap();

    let snapshot = repo.export();
    assert_eq!(snapshot.head_id.as_deref(), Some("C2"));

    let mut restored = MessageRepository::new();
    restored.import(snapshot.clone()).unwrap();

    assert_eq!(restored.get_messages(), repo.get_messages());
    for entry in &snapshot.messages {
        let id = entry.message.id();
        let expected: BTreeSet<_> = repo.get_branches(id).unwrap().iter().collect();
        let actual: BTreeSet<_> = restored.get_branches(id).unwrap().iter().collect();
        assert_eq!(actual, expected, "branches of {id}");
    }
}

#[test]
fn import_with_earlier_head_drops_later_messages() {
    let mut snapshot = ExportedRepository::from_linear(["A", "B", "C", "D"].map(turn));
    snapshot.head_id = Some("B".to_string());

    let mut repo = MessageRepository::new();
    repo.import(snapshot).unwrap();

    assert_eq!(ids(repo.get_messages()), vec!["A", "B"]);
    assert!(!repo.contains("C"));
    assert!(!repo.contains("D"));
}

#[test]
fn import_out_of_order_fails() {
    let mut snapshot = ExportedRepository::from_linear(["A", "B"].map(turn));
    snapshot.messages.reverse();

    let mut repo = MessageRepository::new();
    let err = repo.import(snapshot).unwrap_err();
    assert_eq!(err, RepositoryError::ParentNotFound("A".to_string()));
    assert!(repo.is_empty());
}

#[test]
fn import_empty_snapshot_clears() {
    let mut repo = chain(&["A", "B"]);
    repo.import(ExportedRepository::default()).unwrap();
    assert!(repo.is_empty());
    assert_eq!(repo.head_id(), None);
}

#[test]
fn export_orders_parents_first_after_moves() {
    let mut repo = chain(&["A"]);
    repo.add_or_update_message(None, turn("B")).unwrap();
    // A was inserted before B but now lives below it
    repo.add_or_update_message(Some("B"), turn("A")).unwrap();

    let snapshot = repo.export();
    let order: Vec<_> = snapshot.messages.iter().map(|e| e.message.id()).collect();
    assert_eq!(order, vec!["B", "A"]);

    let mut restored = MessageRepository::new();
    restored.import(snapshot).unwrap();
    assert_eq!(restored.get_message("A").unwrap().parent_id, Some("B"));
}

#[test]
fn snapshot_survives_cbor() {
    let mut repo = chain(&["A", "B"]);
    repo.add_or_update_message(Some("A"), turn("C")).unwrap();

    let bytes = repo.export().to_bytes().unwrap();
    let decoded: ExportedRepository<Turn> = ExportedRepository::from_bytes(&bytes).unwrap();
    assert_eq!(decoded, repo.export());
}

/// Ids may live in any field, and enums may carry one per variant.
mod derive {
    use ramify_core::Message;

    #[derive(Message)]
    struct Renamed {
        #[message(id)]
        key: String,
        #[allow(dead_code)]
        body: String,
    }

    #[derive(Message)]
    struct Wrapped(#[allow(dead_code)] u32, #[message(id)] &'static str);

    #[derive(Message)]
    enum Entry {
        User {
            id: String,
        },
        Tool(#[message(id)] String, #[allow(dead_code)] Vec<u8>),
    }

    #[derive(Message)]
    struct Generic<T> {
        id: String,
        #[allow(dead_code)]
        payload: T,
    }

    #[test]
    fn marked_field() {
        let value = Renamed {
            key: "k1".to_string(),
            body: String::new(),
        };
        assert_eq!(value.id(), "k1");
    }

    #[test]
    fn tuple_field() {
        assert_eq!(Wrapped(7, "w1").id(), "w1");
    }

    #[test]
    fn enum_variants() {
        assert_eq!(Entry::User { id: "u1".to_string() }.id(), "u1");
        assert_eq!(Entry::Tool("t1".to_string(), vec![]).id(), "t1");
    }

    #[test]
    fn generic_struct() {
        let value = Generic {
            id: "g1".to_string(),
            payload: 3u8,
        };
        assert_eq!(value.id(), "g1");
    }
}
