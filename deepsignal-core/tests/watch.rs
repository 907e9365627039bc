//! Integration Tests for Patch Watchers
//!
//! These tests drive writes through wrapped handles and check the batches
//! delivered to `watch` callbacks.

use std::cell::RefCell;
use std::rc::Rc;

use deepsignal_core::value::Object;
use deepsignal_core::watch::{flush_now, patch_version, watcher_count};
use deepsignal_core::{
    deep_signal, deep_signal_with, root_id, run_microtasks, tick, watch, DeepObject, DeepPatch,
    DeepSignalError, DeepSignalOptions, DeepValue, PatchKind, PatchOp, Value, WatchHandle,
    WatchOptions,
};
use serde_json::json;

type Batches = Rc<RefCell<Vec<(Option<u64>, Vec<DeepPatch>)>>>;

fn root(json: serde_json::Value) -> DeepObject {
    deep_signal(json).unwrap().into_object().unwrap()
}

/// Watch `target`, collecting every delivery.
fn collect(target: &DeepObject, options: WatchOptions) -> (WatchHandle, Batches) {
    let batches: Batches = Rc::default();
    let sink = batches.clone();
    let handle = watch(
        target,
        move |event| sink.borrow_mut().push((event.version, event.patches.to_vec())),
        options,
    )
    .unwrap();
    (handle, batches)
}

fn pointers(patches: &[DeepPatch]) -> Vec<String> {
    patches.iter().map(DeepPatch::pointer).collect()
}

/// Test that a burst of writes reaches the watcher as one batch.
#[tokio::test]
async fn burst_is_delivered_as_one_batch() {
    let state = root(json!({ "a": { "b": { "c": 1 } } }));
    let (_handle, batches) = collect(&state, WatchOptions::default());

    let a = state.get_object("a").unwrap();
    a.get_object("b").unwrap().set("c", 2).unwrap();
    a.set("b", json!({ "c": 3 })).unwrap();

    // Nothing is delivered before the microtask runs.
    assert!(batches.borrow().is_empty());

    tick().await;

    let batches = batches.borrow();
    assert_eq!(batches.len(), 1);
    let (version, patches) = &batches[0];
    assert_eq!(*version, Some(1));
    assert_eq!(pointers(patches), ["/a/b/c", "/a/b"]);

    let replaced = &patches[1];
    assert_eq!(replaced.op, PatchOp::Set);
    assert_eq!(replaced.kind, Some(PatchKind::Object));
    assert_eq!(replaced.value, Some(json!({ "c": 3 })));
    assert_eq!(replaced.old_value, Some(json!({ "c": 2 })));
}

/// Test that writes through a set entry reached by iteration are addressed
/// by the entry's synthetic id.
#[tokio::test]
async fn set_entries_are_addressed_by_synthetic_id() {
    let raw: Object = [("s", Value::set(Vec::<Value>::new()))].into_iter().collect();
    let state = deep_signal_with(raw, DeepSignalOptions::new().with_synthetic_id_property("id"))
        .unwrap()
        .into_object()
        .unwrap();
    let (_handle, batches) = collect(&state, WatchOptions::default());

    let set = state.get_set("s").unwrap();
    set.add(json!({ "id": "e1", "inner": { "v": 1 } })).unwrap();
    tick().await;

    {
        let batches = batches.borrow();
        let added = &batches[0].1[0];
        assert_eq!(added.pointer(), "/s/e1");
        assert_eq!(added.op, PatchOp::Add);
        assert_eq!(added.kind, Some(PatchKind::Object));
    }

    for entry in set.iter() {
        let inner = entry.into_object().and_then(|e| e.get_object("inner")).unwrap();
        inner.set("v", 2).unwrap();
    }
    tick().await;

    let batches = batches.borrow();
    assert_eq!(batches.len(), 2);
    let patch = &batches[1].1[0];
    assert!(patch.ends_with(&["inner", "v"]));
    assert_eq!(patch.pointer(), "/s/e1/inner/v");
    assert_eq!(patch.value, Some(json!(2)));
}

/// Test that primitive set entries are reported at the set's own path.
#[test]
fn primitive_set_entries_are_reported_at_the_set() {
    let raw: Object = [("tags", Value::set(["a"]))].into_iter().collect();
    let state = deep_signal(raw).unwrap().into_object().unwrap();
    let (_handle, batches) = collect(&state, WatchOptions::default());

    let tags = state.get_set("tags").unwrap();
    tags.add("b").unwrap();
    tags.remove("a").unwrap();
    run_microtasks();

    let batches = batches.borrow();
    let patches = &batches[0].1;
    assert_eq!(pointers(patches), ["/tags", "/tags"]);
    assert_eq!(patches[0].op, PatchOp::Add);
    assert_eq!(patches[0].value, Some(json!(["b"])));
    assert_eq!(patches[1].op, PatchOp::Delete);
    assert_eq!(patches[1].value, Some(json!("a")));
}

/// Test that clearing a set drops the burst's entry records.
#[test]
fn clear_replaces_pending_entry_records() {
    let raw: Object = [("tags", Value::set(Vec::<Value>::new()))].into_iter().collect();
    let state = deep_signal(raw).unwrap().into_object().unwrap();
    let (_handle, batches) = collect(&state, WatchOptions::default());

    let tags = state.get_set("tags").unwrap();
    tags.add("x").unwrap();
    tags.add(json!({ "name": "obj" })).unwrap();
    tags.clear().unwrap();
    run_microtasks();

    let batches = batches.borrow();
    let patches = &batches[0].1;
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].op, PatchOp::Clear);
    assert_eq!(patches[0].kind, Some(PatchKind::Set));
    assert_eq!(patches[0].pointer(), "/tags");
}

/// Test the serialized shapes of object field records.
#[test]
fn object_records_serialize_in_camel_case() {
    let state = root(json!({ "n": 1 }));
    let (_handle, batches) = collect(&state, WatchOptions::default());

    state.set("n", 2).unwrap();
    state.set("fresh", true).unwrap();
    state.delete("n").unwrap();
    run_microtasks();

    let batches = batches.borrow();
    let encoded = serde_json::to_value(&batches[0].1).unwrap();
    assert_eq!(
        encoded,
        json!([
            { "path": ["n"], "op": "set", "value": 2, "oldValue": 1 },
            { "path": ["fresh"], "op": "add", "value": true },
            { "path": ["n"], "op": "delete", "oldValue": 2 },
        ])
    );
}

/// Test that an append records the new slot and the length change.
#[test]
fn array_push_records_slot_and_length() {
    let state = root(json!({ "items": [1, 2] }));
    let (_handle, batches) = collect(&state, WatchOptions::default());

    state.get_array("items").unwrap().push(3).unwrap();
    run_microtasks();

    let batches = batches.borrow();
    let patches = &batches[0].1;
    assert_eq!(pointers(patches), ["/items/2", "/items/length"]);
    assert_eq!(patches[0].op, PatchOp::Add);
    assert_eq!(patches[0].value, Some(json!(3)));
    assert_eq!(patches[1].op, PatchOp::Set);
    assert_eq!(patches[1].value, Some(json!(3)));
    assert_eq!(patches[1].old_value, Some(json!(2)));
}

/// Test that special characters in field names are escaped in paths.
#[test]
fn field_names_are_escaped() {
    let state = root(json!({}));
    let (_handle, batches) = collect(&state, WatchOptions::default());

    state.set("a/b", 1).unwrap();
    state.set("t~", 2).unwrap();
    run_microtasks();

    assert_eq!(pointers(&batches.borrow()[0].1), ["/a~1b", "/t~0"]);
}

/// Test that a `once` watcher stops after its first batch.
#[tokio::test]
async fn once_watcher_fires_once() {
    let state = root(json!({ "n": 0 }));
    let (handle, batches) = collect(&state, WatchOptions::once());

    state.set("n", 1).unwrap();
    tick().await;
    state.set("n", 2).unwrap();
    tick().await;

    assert_eq!(batches.borrow().len(), 1);
    assert!(!handle.is_listening());
}

/// Test that an immediate watcher is called at registration.
#[test]
fn immediate_watcher_is_called_on_registration() {
    let state = root(json!({ "n": 0 }));
    let (_handle, batches) = collect(&state, WatchOptions::immediate());

    {
        let batches = batches.borrow();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].0, None);
        assert!(batches[0].1.is_empty());
    }

    state.set("n", 1).unwrap();
    run_microtasks();
    assert_eq!(batches.borrow().len(), 2);
}

/// Test that the immediate call does not use up a `once` watcher.
#[test]
fn immediate_call_does_not_count_as_once() {
    let state = root(json!({ "n": 0 }));
    let options = WatchOptions {
        once: true,
        immediate: true,
        ..WatchOptions::default()
    };
    let (_handle, batches) = collect(&state, options);
    assert_eq!(batches.borrow().len(), 1);

    state.set("n", 1).unwrap();
    run_microtasks();
    state.set("n", 2).unwrap();
    run_microtasks();

    assert_eq!(batches.borrow().len(), 2);
}

/// Test that a just-in-time watcher sees each record synchronously.
#[test]
fn instant_watcher_sees_each_write() {
    let state = root(json!({ "n": 0 }));
    let (_handle, batches) = collect(&state, WatchOptions::instant());

    state.set("n", 1).unwrap();
    assert_eq!(batches.borrow().len(), 1);
    state.set("n", 2).unwrap();
    assert_eq!(batches.borrow().len(), 2);

    for (version, patches) in batches.borrow().iter() {
        assert_eq!(*version, None);
        assert_eq!(patches.len(), 1);
    }

    // Nothing was buffered for a later flush.
    assert_eq!(run_microtasks(), 0);
}

/// Test that a watcher can unsubscribe from inside its callback.
#[test]
fn stop_listening_from_the_callback() {
    let state = root(json!({ "n": 0 }));
    let calls = Rc::new(RefCell::new(0));
    let slot: Rc<RefCell<Option<WatchHandle>>> = Rc::default();

    let handle = watch(
        &state,
        {
            let calls = calls.clone();
            let slot = slot.clone();
            move |_| {
                *calls.borrow_mut() += 1;
                if let Some(handle) = slot.borrow().as_ref() {
                    handle.stop_listening();
                }
            }
        },
        WatchOptions::default(),
    )
    .unwrap();
    *slot.borrow_mut() = Some(handle);

    state.set("n", 1).unwrap();
    run_microtasks();
    state.set("n", 2).unwrap();
    run_microtasks();

    assert_eq!(*calls.borrow(), 1);
    assert_eq!(watcher_count(&state), 0);
    slot.borrow_mut().take();
}

/// Test that writes made by a callback arrive in the next batch.
#[test]
fn callback_writes_land_in_the_next_batch() {
    let state = root(json!({ "n": 0, "echo": 0 }));
    let versions = Rc::new(RefCell::new(Vec::new()));

    let _handle = watch(
        &state,
        {
            let versions = versions.clone();
            move |event| {
                versions.borrow_mut().push((event.version, pointers(event.patches)));
                if event.version == Some(1) {
                    if let Some(root) = event.new_value.as_object() {
                        root.set("echo", 1).unwrap();
                    }
                }
            }
        },
        WatchOptions::default(),
    )
    .unwrap();

    state.set("n", 1).unwrap();
    run_microtasks();

    assert_eq!(
        *versions.borrow(),
        vec![(Some(1), vec!["/n".to_string()]), (Some(2), vec!["/echo".to_string()])]
    );
    assert_eq!(patch_version(&state), 2);
}

/// Test that watchers receive a batch in registration order, including
/// writes made before a later watcher joined.
#[test]
fn watchers_run_in_registration_order() {
    let state = root(json!({ "n": 0 }));
    let order = Rc::new(RefCell::new(Vec::new()));

    let register = |name: &'static str| {
        let order = order.clone();
        watch(
            &state,
            move |event| order.borrow_mut().push((name, event.patches.len())),
            WatchOptions::default(),
        )
        .unwrap()
    };

    let _first = register("first");
    state.set("n", 1).unwrap();
    let _second = register("second");
    run_microtasks();

    assert_eq!(*order.borrow(), [("first", 1), ("second", 1)]);
}

/// Test that writes made while nobody watches are not replayed later.
#[test]
fn unwatched_writes_are_not_buffered() {
    let state = root(json!({ "n": 0 }));
    state.set("n", 1).unwrap();

    let (_handle, batches) = collect(&state, WatchOptions::default());
    run_microtasks();
    assert!(batches.borrow().is_empty());
}

/// Test that writes through a detached handle produce no records.
#[test]
fn detached_handles_are_silent() {
    let state = root(json!({ "a": { "x": 0 } }));
    let old = state.get_object("a").unwrap();
    let (_handle, batches) = collect(&state, WatchOptions::default());

    state.set("a", json!({})).unwrap();
    old.set("x", 1).unwrap();
    run_microtasks();

    let batches = batches.borrow();
    assert_eq!(batches.len(), 1);
    assert_eq!(pointers(&batches[0].1), ["/a"]);
}

/// Test that a nested handle or the root id watches the whole root.
#[test]
fn nested_handles_and_root_ids_watch_the_root() {
    let state = root(json!({ "a": { "b": 1 }, "c": 1 }));
    let nested = state.get("a");
    let id = root_id(&state).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let by_node = watch(
        &nested,
        {
            let seen = seen.clone();
            move |event| seen.borrow_mut().push(("node", pointers(event.patches)))
        },
        WatchOptions::default(),
    )
    .unwrap();
    let by_id = watch(
        &id,
        {
            let seen = seen.clone();
            move |event| seen.borrow_mut().push(("id", pointers(event.patches)))
        },
        WatchOptions::default(),
    )
    .unwrap();

    state.set("c", 2).unwrap();
    run_microtasks();

    assert_eq!(
        *seen.borrow(),
        [("node", vec!["/c".to_string()]), ("id", vec!["/c".to_string()])]
    );
    by_node.stop_listening();
    by_id.stop_listening();
}

/// Test that plain values cannot be watched.
#[test]
fn watching_plain_values_fails() {
    let result = watch(&json!({}), |_| {}, WatchOptions::default());
    assert!(matches!(result, Err(DeepSignalError::NotADeepSignal { .. })));

    let result = watch(&Value::object(), |_| {}, WatchOptions::default());
    assert!(matches!(result, Err(DeepSignalError::NotADeepSignal { .. })));

    let plain = DeepValue::Plain(Value::from(1));
    assert!(watch(&plain, |_| {}, WatchOptions::default()).is_err());
}

/// Test that a pending batch can be flushed by hand.
#[test]
fn flush_now_delivers_pending_batch() {
    let state = root(json!({ "n": 0 }));
    let (_handle, batches) = collect(&state, WatchOptions::default());

    state.set("n", 1).unwrap();
    assert!(flush_now(&state));
    assert_eq!(batches.borrow().len(), 1);
    assert_eq!(patch_version(&state), 1);

    // The scheduled flush finds nothing left.
    run_microtasks();
    assert_eq!(batches.borrow().len(), 1);
}
