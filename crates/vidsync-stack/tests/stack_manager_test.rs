//! Integration tests: current watch stack updates and named stacks across devices

mod common;

use std::sync::Arc;

use common::{playlist_video, video};
use vidsync_stack::{
    StackError, StackItem, StackNameWithId, StackUpdate, VideoInfo, WatchStack, STACK_ID_CURRENT,
    STACK_ID_TO_BE_SET,
};
use vidsync_sync::MemoryRemote;

fn stack_ids(stack: &WatchStack) -> Vec<String> {
    stack.to_vec().iter().map(|i| i.id().to_string()).collect()
}

#[tokio::test]
async fn going_back_pops_the_top() {
    let remote = Arc::new(MemoryRemote::new());
    let t = common::tab(&remote, "alice");

    t.page.watch(&video("v1"));
    assert_eq!(t.stacks.update_current_watch_stack().await.unwrap(), StackUpdate::Pushed);
    t.page.watch(&video("v2"));
    assert_eq!(t.stacks.update_current_watch_stack().await.unwrap(), StackUpdate::Pushed);

    t.page.watch(&video("v1"));
    assert_eq!(t.stacks.update_current_watch_stack().await.unwrap(), StackUpdate::Popped);
    let stack = t.stacks.load_current_watch_stack().await.unwrap();
    assert_eq!(stack_ids(&stack), vec!["v1"]);

    // a second update on the same page does not pop again
    assert_eq!(t.stacks.update_current_watch_stack().await.unwrap(), StackUpdate::Unchanged);
}

#[tokio::test]
async fn same_video_at_top_and_below_is_not_a_pop() {
    let remote = Arc::new(MemoryRemote::new());
    let t = common::tab(&remote, "alice");

    let mut named = WatchStack::new(STACK_ID_TO_BE_SET, "repeat");
    named.push(video("v1"));
    named.push(video("v1"));
    let id = t.stacks.save_stack(&named).await.unwrap();
    t.stacks
        .set_active_stack(Some(&StackNameWithId {
            id,
            name: "repeat".into(),
        }))
        .await
        .unwrap();

    t.page.watch(&video("v1"));
    assert_eq!(t.stacks.update_current_watch_stack().await.unwrap(), StackUpdate::Unchanged);
    assert_eq!(t.stacks.load_current_watch_stack().await.unwrap().len(), 2);
}

#[tokio::test]
async fn progress_replaces_the_top_in_place() {
    let remote = Arc::new(MemoryRemote::new());
    let t = common::tab(&remote, "alice");

    t.page.watch(&video("v1"));
    t.stacks.update_current_watch_stack().await.unwrap();

    let mut watched = video("v1");
    watched.video_mut().time_current = Some(30.0);
    t.page.watch(&watched);
    assert_eq!(t.stacks.update_current_watch_stack().await.unwrap(), StackUpdate::Replaced);
    assert_eq!(t.stacks.update_current_watch_stack().await.unwrap(), StackUpdate::Unchanged);

    let stack = t.stacks.load_current_watch_stack().await.unwrap();
    assert_eq!(stack.len(), 1);
    assert_eq!(stack.peek(0).unwrap().video().time_current, Some(30.0));
}

#[tokio::test]
async fn playlist_advance_replaces_instead_of_pushing() {
    let remote = Arc::new(MemoryRemote::new());
    let t = common::tab(&remote, "alice");

    t.page.watch(&video("v0"));
    t.stacks.update_current_watch_stack().await.unwrap();
    t.page.watch(&playlist_video("p3", "PL", 3));
    assert_eq!(t.stacks.update_current_watch_stack().await.unwrap(), StackUpdate::Pushed);

    t.page.watch(&playlist_video("p4", "PL", 4));
    assert_eq!(t.stacks.update_current_watch_stack().await.unwrap(), StackUpdate::Advanced);

    let stack = t.stacks.load_current_watch_stack().await.unwrap();
    assert_eq!(stack_ids(&stack), vec!["p4", "v0"]);
}

#[tokio::test]
async fn leaving_a_playlist_pushes() {
    let remote = Arc::new(MemoryRemote::new());
    let t = common::tab(&remote, "alice");

    t.page.watch(&playlist_video("p3", "PL", 3));
    t.stacks.update_current_watch_stack().await.unwrap();

    t.page.watch(&video("v9"));
    assert_eq!(t.stacks.update_current_watch_stack().await.unwrap(), StackUpdate::Pushed);

    t.page.watch(&playlist_video("q1", "OTHER", 1));
    assert_eq!(t.stacks.update_current_watch_stack().await.unwrap(), StackUpdate::Pushed);

    let stack = t.stacks.load_current_watch_stack().await.unwrap();
    assert_eq!(stack_ids(&stack), vec!["q1", "v9", "p3"]);
}

#[tokio::test]
async fn leaving_the_player_resets_current_and_active_stack() {
    let remote = Arc::new(MemoryRemote::new());
    let t = common::tab(&remote, "alice");

    let mut named = WatchStack::new(STACK_ID_TO_BE_SET, "later");
    named.push(video("n1"));
    let id = t.stacks.save_stack(&named).await.unwrap();
    t.stacks
        .set_active_stack(Some(&StackNameWithId {
            id,
            name: "later".into(),
        }))
        .await
        .unwrap();

    t.page.watch(&video("v1"));
    t.stacks.update_current_watch_stack().await.unwrap();
    assert_eq!(t.stacks.load_current_watch_stack().await.unwrap().len(), 2);

    t.page.set_url("/channel/UC1");
    assert_eq!(t.stacks.update_current_watch_stack().await.unwrap(), StackUpdate::Reset);
    assert!(t.stacks.get_active_stack().await.unwrap().is_none());
    assert!(t.stacks.load_current_watch_stack().await.unwrap().is_empty());
}

#[tokio::test]
async fn active_stack_prefills_the_current_stack() {
    let remote = Arc::new(MemoryRemote::new());
    let t = common::tab(&remote, "alice");

    let mut named = WatchStack::new(STACK_ID_TO_BE_SET, "queue");
    for id in ["a", "b", "c"] {
        named.push(video(id));
    }
    let id = t.stacks.save_stack(&named).await.unwrap();
    assert_ne!(id, STACK_ID_TO_BE_SET);

    // an existing snapshot is dropped when the active stack changes
    t.page.watch(&video("x"));
    t.stacks.update_current_watch_stack().await.unwrap();
    t.stacks
        .set_active_stack(Some(&StackNameWithId {
            id: id.clone(),
            name: "queue".into(),
        }))
        .await
        .unwrap();

    let current = t.stacks.load_current_watch_stack().await.unwrap();
    assert_eq!(current.id, STACK_ID_CURRENT);
    assert_eq!(current.name, "Current Stack");
    assert_eq!(stack_ids(&current), vec!["c", "b", "a"]);

    let loaded = t.stacks.load_stack(STACK_ID_CURRENT).await.unwrap();
    assert_eq!(loaded, current);
}

#[tokio::test]
async fn named_stacks_sync_between_devices() {
    let remote = Arc::new(MemoryRemote::new());
    let a = common::tab(&remote, "alice");
    let b = common::tab(&remote, "alice");

    let mut named = WatchStack::new(STACK_ID_TO_BE_SET, "music");
    named.push(video("m1"));
    named.push(playlist_video("m2", "PL", 2));
    let id = a.stacks.save_stack(&named).await.unwrap();

    let listed = b.stacks.list_stacks().await.unwrap();
    assert_eq!(
        listed,
        vec![StackNameWithId {
            id: id.clone(),
            name: "music".into()
        }]
    );
    let on_b = b.stacks.load_stack(&id).await.unwrap();
    assert_eq!(on_b.items(), named.items());

    let mut edited = on_b.clone();
    edited.name = "music (old)".into();
    edited.push(StackItem::from(VideoInfo::new("m3")));
    b.stacks.save_stack(&edited).await.unwrap();
    let on_a = a.stacks.load_stack(&id).await.unwrap();
    assert_eq!(on_a.name, "music (old)");
    assert_eq!(on_a.len(), 3);

    a.stacks.delete_stack(&id).await.unwrap();
    assert!(a.stacks.list_stacks().await.unwrap().is_empty());

    let err = a.stacks.delete_stack(STACK_ID_CURRENT).await.unwrap_err();
    assert!(matches!(err, StackError::CurrentNotDeletable));
}
