use super::*;
use crate::graph::manifest::Manifest;
use crate::render::compositor::{Compositor, CompositorOpts};

#[test]
fn snapshot_mirrors_the_plan() {
    let mut store = GraphStore::from_manifest(Manifest::starter());
    store.add_asset("extra", "");
    let recipe = store.roots().recipe.clone().unwrap();
    let snap = store.snapshot_for_viewer(&recipe).unwrap();

    assert_eq!((snap.out_w, snap.out_h), (128, 128));
    assert_eq!(snap.frames.len(), 2);
    assert_eq!(snap.frames[0].name, "f000");
    assert_eq!(snap.frames[0].duration, 100.0);
    assert_eq!(snap.layers.len(), 1);
    assert_eq!(snap.rects.len(), 1);
    assert_eq!(snap.assets.len(), 2);
}

#[test]
fn snapshot_json_uses_viewer_field_names() {
    let mut store = GraphStore::from_manifest(Manifest::starter());
    let recipe = store.roots().recipe.clone().unwrap();
    let layer = store.list_nodes_of_type(NodeKind::Layer)[0].0.clone();
    store.update_node(&layer, |n| {
        if let Node::Layer(l) = n {
            l.asset = None;
        }
    });
    let v = serde_json::to_value(store.snapshot_for_viewer(&recipe).unwrap()).unwrap();
    assert!(v["outW"].is_u64());
    assert_eq!(v["layers"][0]["asset"], "");
    assert!(v["layers"][0]["defaultRect"].as_str().is_some_and(|s| !s.is_empty()));
}

#[test]
fn plan_from_snapshot_composes_identically() {
    let mut store = GraphStore::from_manifest(Manifest::starter());
    let recipe = store.roots().recipe.clone().unwrap();
    let snap = store.snapshot_for_viewer(&recipe).unwrap();
    let text = snap.to_json().unwrap();
    let parsed: ViewerSnapshot = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, snap);

    let remote = RenderPlan::from_viewer_snapshot(&parsed, store.generation());
    let local = store.build_plan(&recipe).unwrap();

    let mut c = Compositor::new(CompositorOpts::default());
    for i in 0..local.frame_count() {
        assert_eq!(
            c.compose_frame(&local, i).frame.data,
            c.compose_frame(&remote, i).frame.data
        );
    }
}

#[test]
fn missing_recipe_has_no_snapshot() {
    let mut store = GraphStore::new();
    assert!(store.snapshot_for_viewer(&NodeId::from("anim:0x0000000000000000")).is_none());
}
