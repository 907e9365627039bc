use criterion::{criterion_group, criterion_main, Criterion};
use deepsignal_core::{
    deep_signal, run_microtasks, traverse, watch, DeepObject, Effect, WatchOptions,
};
use serde_json::json;

fn nested(depth: usize) -> serde_json::Value {
    (0..depth).fold(json!({ "leaf": 0 }), |inner, _| json!({ "child": inner }))
}

fn leaf_parent(root: &DeepObject, depth: usize) -> DeepObject {
    (0..depth).fold(root.clone(), |node, _| node.get_object("child").unwrap())
}

fn effect_deep_update(c: &mut Criterion) {
    c.bench_function("effect_deep_update", |b| {
        let root = deep_signal(nested(32)).unwrap().into_object().unwrap();
        let parent = leaf_parent(&root, 32);
        let effects: Vec<Effect> = (0..100)
            .map(|_| {
                let root = root.clone();
                Effect::new(move || {
                    leaf_parent(&root, 32).get("leaf");
                })
                .unwrap()
            })
            .collect();

        let mut n = 0;
        b.iter(|| {
            n += 1;
            parent.set("leaf", n).unwrap();
        });
        effects.iter().for_each(Effect::stop);
    });
}

fn traverse_wide(c: &mut Criterion) {
    let wide: serde_json::Value = (0..1000).map(|i| (format!("k{i}"), json!({ "v": i }))).collect();
    let root = deep_signal(wide).unwrap();

    c.bench_function("traverse_wide", |b| {
        b.iter(|| {
            let effect = Effect::new({
                let root = root.clone();
                move || traverse(&root, 2)
            })
            .unwrap();
            effect.stop();
        });
    });
}

fn watch_burst(c: &mut Criterion) {
    c.bench_function("watch_burst", |b| {
        let root = deep_signal(json!({ "items": [] })).unwrap().into_object().unwrap();
        let handle = watch(
            &root,
            |event| assert!(!event.patches.is_empty()),
            WatchOptions::default(),
        )
        .unwrap();
        let items = root.get_array("items").unwrap();

        b.iter(|| {
            for i in 0..100 {
                items.push(i).unwrap();
            }
            items.clear().unwrap();
            run_microtasks();
        });
        handle.stop_listening();
    });
}

criterion_group!(benches, effect_deep_update, traverse_wide, watch_burst);
criterion_main!(benches);
