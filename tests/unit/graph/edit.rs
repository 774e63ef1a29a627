use serde_json::json;

use super::*;
use crate::foundation::error::HexflipError;
use crate::graph::id::NodeKind;
use crate::graph::manifest::Manifest;

fn starter_store() -> GraphStore {
    GraphStore::from_manifest(Manifest::starter())
}

fn template(store: &GraphStore) -> crate::graph::node::TemplateNode {
    let id = store.roots().template.clone().unwrap();
    store.get_node(&id).unwrap().as_template().unwrap().clone()
}

#[test]
fn add_frame_slot_appends_named_slots() {
    let mut store = starter_store();
    let id = store.add_frame_slot().unwrap();
    let tpl = template(&store);
    assert_eq!(tpl.frames.last(), Some(&id));
    let slot = store.get_node(&id).unwrap().as_frame_slot().unwrap();
    assert_eq!(slot.name, "f002");
    assert_eq!(slot.effective_duration_ms(), 100.0);
}

#[test]
fn add_rect_uses_the_first_root_asset() {
    let mut store = starter_store();
    let id = store.add_rect().unwrap();
    let rect = store.get_node(&id).unwrap().as_rect().unwrap();
    assert_eq!(rect.name, "rect1");
    assert_eq!(rect.asset.as_ref(), store.roots().assets.first());
    assert_eq!(rect.dest_size(), (32.0, 32.0));
    assert_eq!(template(&store).rects.len(), 2);
}

#[test]
fn minted_ids_never_clash() {
    let mut store = starter_store();
    let a = store.add_asset("dup", "");
    let b = store.add_asset("dup", "");
    assert_ne!(a, b);
    assert_eq!(a.namespace(), Some("asset"));
    assert_eq!(b.namespace(), Some("asset"));
    assert_eq!(store.list_nodes_of_type(NodeKind::Asset).len(), 3);
}

#[test]
fn add_layer_points_at_first_rect() {
    let mut store = starter_store();
    let id = store.add_layer().unwrap();
    let layer = store.get_node(&id).unwrap().as_layer().unwrap();
    assert_eq!(layer.name, "Layer 2");
    assert!(layer.visible);
    assert_eq!(layer.default_rect.as_ref(), template(&store).rects.first());
}

#[test]
fn edits_without_roots_are_validation_errors() {
    let mut store = GraphStore::new();
    assert!(matches!(store.add_rect(), Err(HexflipError::Validation(_))));
    assert!(matches!(store.add_layer(), Err(HexflipError::Validation(_))));
    assert!(store.set_template_tiling(1.0, 1.0, 1.0, 1.0).is_err());
}

#[test]
fn empty_override_removes_the_entry() {
    let mut store = starter_store();
    let layer = store.list_nodes_of_type(NodeKind::Layer)[0].0.clone();
    let frame = template(&store).frames[1].clone();

    store
        .set_override(
            &layer,
            &frame,
            Override {
                dx: Some(4.0),
                ..Override::default()
            },
        )
        .unwrap();
    let l = store.get_node(&layer).unwrap().as_layer().unwrap();
    assert_eq!(l.overrides.len(), 1);

    store
        .set_override(&layer, &frame, Override::default())
        .unwrap();
    let l = store.get_node(&layer).unwrap().as_layer().unwrap();
    assert!(l.overrides.is_empty());
    assert!(!store.clear_override(&layer, &frame).unwrap());
}

#[test]
fn tiling_is_clamped() {
    let mut store = starter_store();
    store.set_template_tiling(32.0, 32.0, 2.0, 0.0).unwrap();
    let tpl = template(&store);
    assert_eq!(tpl.grid_h, 1.0);
    assert_eq!(tpl.output_size(), (64, 32));
}

#[test]
fn tasks_are_listed_and_editable() {
    let mut store = starter_store();
    let t = store.add_task();
    assert_eq!(store.roots().tasks, vec![t.clone()]);
    store
        .set_task(&t, "wave", vec![json!({"op": "wave"})])
        .unwrap();
    let task = store.get_node(&t).unwrap().as_task().unwrap();
    assert_eq!(task.name, "wave");
    assert_eq!(task.commands.len(), 1);
    let tpl = store.roots().template.clone().unwrap();
    assert!(store.set_task(&tpl, "x", vec![]).is_err());
}

#[test]
fn deleting_a_rect_prunes_layers_and_template() {
    let mut store = starter_store();
    let rect = template(&store).rects[0].clone();
    let layer = store.list_nodes_of_type(NodeKind::Layer)[0].0.clone();
    let frame = template(&store).frames[0].clone();
    store
        .set_override(
            &layer,
            &frame,
            Override {
                rect: Some(rect.clone()),
                ..Override::default()
            },
        )
        .unwrap();

    assert!(store.delete_node(&rect).is_some());
    assert!(template(&store).rects.is_empty());
    let l = store.get_node(&layer).unwrap().as_layer().unwrap();
    assert_eq!(l.default_rect, None);
    assert!(l.overrides.is_empty());
    for (_, node) in store.iter() {
        assert!(!node.references().contains(&&rect));
    }
}

#[test]
fn deleting_roots_clears_pointers() {
    let mut store = starter_store();
    let asset = store.roots().assets[0].clone();
    let recipe = store.roots().recipe.clone().unwrap();
    store.delete_node(&asset);
    store.delete_node(&recipe);
    assert!(store.roots().assets.is_empty());
    assert!(store.roots().recipe.is_none());
    assert!(store.delete_node(&recipe).is_none());
}
