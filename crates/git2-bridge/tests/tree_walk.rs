mod common;

use std::panic::{self, AssertUnwindSafe};

use git2_bridge::raw::{GIT_ERROR, GIT_ERROR_TREE};
use git2_bridge::{CallError, Tree, TreeWalkMode, TreeWalkResult};

fn tree(fake: &common::FakeTree) -> Tree {
    unsafe { Tree::from_raw(common::lib(), fake.raw()) }
}

#[test]
fn pre_order_walk_visits_every_entry_with_its_parent_path() {
    let fake = common::sample_tree();
    let mut seen = Vec::new();
    tree(&fake)
        .walk(TreeWalkMode::PreOrder, |root, entry| {
            seen.push(format!("{root}{}", entry.name().unwrap_or("?")));
            Ok::<_, String>(TreeWalkResult::Continue)
        })
        .expect("walk");
    assert_eq!(
        seen,
        vec!["src", "src/main.c", "src/lib", "src/lib/util.c", "README"],
        "pre-order visits parents first"
    );
}

#[test]
fn post_order_walk_visits_children_first() {
    let fake = common::sample_tree();
    let mut seen = Vec::new();
    tree(&fake)
        .walk(TreeWalkMode::PostOrder, |root, entry| {
            seen.push(format!("{root}{}", entry.name().unwrap_or("?")));
            Ok::<_, String>(TreeWalkResult::Continue)
        })
        .expect("walk");
    assert_eq!(seen, vec!["src/main.c", "src/lib/util.c", "src/lib", "src", "README"]);
}

#[test]
fn entries_expose_id_and_mode() {
    let fake = common::sample_tree();
    let mut modes = Vec::new();
    tree(&fake)
        .walk(TreeWalkMode::PreOrder, |_, entry| {
            modes.push((entry.name().map(str::to_owned), entry.id().as_bytes()[0], entry.filemode()));
            Ok::<_, String>(TreeWalkResult::Skip)
        })
        .expect("walk");
    assert_eq!(
        modes,
        vec![
            (Some("src".to_string()), 1, 0o040000),
            (Some("README".to_string()), 5, 0o100644),
        ],
        "skip keeps the walk out of src/"
    );
}

#[test]
fn callback_error_stops_the_walk_and_comes_back_unchanged() {
    let fake = common::sample_tree();
    let mut visited = 0;
    let err = tree(&fake)
        .walk(TreeWalkMode::PreOrder, |_, _| {
            visited += 1;
            if visited == 2 {
                return Err("stop requested".to_string());
            }
            Ok(TreeWalkResult::Continue)
        })
        .expect_err("walk must fail");

    assert_eq!(visited, 2, "no entry is visited after the failure");
    match err {
        CallError::Callback(msg) => assert_eq!(msg, "stop requested"),
        CallError::Native(err) => panic!("expected the callback's error, got {err}"),
    }
    assert_eq!(
        common::last_error_message().as_deref(),
        Some("stop requested"),
        "native error state carries the callback message"
    );
}

#[derive(Debug, PartialEq, Eq)]
struct Budget(u32);

impl std::fmt::Display for Budget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "budget of {} entries exhausted", self.0)
    }
}

#[test]
fn custom_error_types_keep_their_identity() {
    let fake = common::sample_tree();
    let mut left = 3u32;
    let err = tree(&fake)
        .walk(TreeWalkMode::PreOrder, |_, _| {
            if left == 0 {
                return Err(Budget(3));
            }
            left -= 1;
            Ok(TreeWalkResult::Continue)
        })
        .expect_err("budget runs out");
    assert_eq!(err.callback(), Some(Budget(3)));
    assert_eq!(
        common::last_error_message().as_deref(),
        Some("budget of 3 entries exhausted")
    );
}

#[test]
fn panic_in_callback_resumes_after_native_returns() {
    let fake = common::sample_tree();
    let mut visited = 0;
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let _ = tree(&fake).walk(TreeWalkMode::PreOrder, |_, _| {
            visited += 1;
            if visited == 1 {
                panic!("walker exploded");
            }
            Ok::<_, String>(TreeWalkResult::Continue)
        });
    }));

    let payload = result.expect_err("panic must propagate to the caller");
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"walker exploded"));
    assert_eq!(visited, 1, "native code stopped at the panicking entry");
    let message = common::last_error_message().expect("native error set");
    assert!(message.contains("walker exploded"), "message: {message}");
}

#[test]
fn native_failure_is_reported_with_the_native_error_state() {
    let fake = common::FakeTree {
        entries: vec![common::FakeEntry::blob("a", 1)],
        corrupt: true,
    };
    let mut called = false;
    let err = tree(&fake)
        .walk(TreeWalkMode::PreOrder, |_, _| {
            called = true;
            Ok::<_, String>(TreeWalkResult::Continue)
        })
        .expect_err("corrupt tree");
    assert!(!called);
    let native = err.native().expect("native error");
    assert_eq!(native.code(), GIT_ERROR);
    assert_eq!(native.class(), GIT_ERROR_TREE);
    assert_eq!(native.message(), "corrupt tree object");
}
