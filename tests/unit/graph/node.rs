use serde_json::json;

use super::*;

#[test]
fn known_nodes_round_trip_with_type_tag() {
    let raw = json!({
        "type": "Layer",
        "name": "L",
        "visible": true,
        "asset": "asset:0x0000000000000001",
        "defaultRect": "tpl:0x0000000000000002",
        "opacity": 0.5,
        "overrides": { "tpl:0x0000000000000003": { "dx": 4 } }
    });
    let node = Node::from_value(raw).unwrap();
    let layer = node.as_layer().unwrap();
    assert_eq!(layer.effective_opacity(), 0.5);
    assert_eq!(
        layer.default_rect.as_ref().map(NodeId::as_str),
        Some("tpl:0x0000000000000002")
    );

    let back = serde_json::to_value(&node).unwrap();
    assert_eq!(back["type"], "Layer");
    assert_eq!(back["defaultRect"], "tpl:0x0000000000000002");
    assert_eq!(Node::from_value(back).unwrap(), node);
}

#[test]
fn empty_string_references_read_as_absent() {
    let node = Node::from_value(json!({"type": "Rect", "name": "r", "asset": ""})).unwrap();
    assert_eq!(node.as_rect().unwrap().asset, None);
    let out = serde_json::to_value(&node).unwrap();
    assert!(out.get("asset").is_none());
}

#[test]
fn unknown_kinds_are_kept_verbatim() {
    let raw = json!({"type": "Sprite", "weird": [1, 2]});
    let node = Node::from_value(raw.clone()).unwrap();
    assert_eq!(node.kind(), None);
    assert_eq!(node.type_tag(), "Sprite");
    assert_eq!(serde_json::to_value(&node).unwrap(), raw);
}

#[test]
fn malformed_known_node_is_an_error() {
    let err = Node::from_value(json!({"type": "Rect", "sx": "wide"})).unwrap_err();
    assert!(err.to_string().contains("malformed Rect node"));
    assert!(Node::from_value(json!({"name": "no tag"})).is_err());
}

#[test]
fn frame_duration_defaults_and_clamps() {
    let d = |v: f64| {
        FrameSlotNode {
            name: String::new(),
            duration: v,
        }
        .effective_duration_ms()
    };
    assert_eq!(d(0.0), 100.0);
    assert_eq!(d(f64::NAN), 100.0);
    assert_eq!(d(-5.0), 1.0);
    assert_eq!(d(0.2), 1.0);
    assert_eq!(d(250.0), 250.0);
    assert_eq!(d(1.5), 1.5);
}

#[test]
fn template_output_size_has_a_floor() {
    let t = TemplateNode {
        tile_w: 32.0,
        tile_h: 32.0,
        grid_w: 2.0,
        grid_h: 1.0,
        ..TemplateNode::default()
    };
    assert_eq!(t.output_size(), (64, 32));

    let degenerate = TemplateNode {
        tile_w: 0.0,
        tile_h: -4.0,
        ..TemplateNode::default()
    };
    assert_eq!(degenerate.output_size(), (1, 1));
}

#[test]
fn rect_dest_size_falls_back_to_source_size() {
    let r = RectNode {
        sw: 16.0,
        sh: 8.0,
        ..RectNode::default()
    };
    assert_eq!(r.dest_size(), (16.0, 8.0));
    let r = RectNode {
        sw: 16.0,
        sh: 8.0,
        dw: 32.0,
        dh: 24.0,
        ..RectNode::default()
    };
    assert_eq!(r.dest_size(), (32.0, 24.0));
}

#[test]
fn prune_clears_rect_references_and_empty_overrides() {
    let rect: NodeId = "tpl:0x00000000000000aa".into();
    let frame_a: NodeId = "tpl:0x00000000000000f1".into();
    let frame_b: NodeId = "tpl:0x00000000000000f2".into();
    let mut overrides = BTreeMap::new();
    overrides.insert(
        frame_a.clone(),
        Override {
            rect: Some(rect.clone()),
            ..Override::default()
        },
    );
    overrides.insert(
        frame_b.clone(),
        Override {
            rect: Some(rect.clone()),
            dx: Some(3.0),
            ..Override::default()
        },
    );
    let mut node = Node::Layer(LayerNode {
        default_rect: Some(rect.clone()),
        overrides,
        ..LayerNode::default()
    });

    assert!(node.prune_references_to(&rect));
    let layer = node.as_layer().unwrap();
    assert_eq!(layer.default_rect, None);
    assert!(!layer.overrides.contains_key(&frame_a));
    assert_eq!(layer.overrides[&frame_b].dx, Some(3.0));
    assert_eq!(layer.overrides[&frame_b].rect, None);
    assert!(!node.prune_references_to(&rect));
}

#[test]
fn rewrite_refs_renames_override_keys() {
    let old: NodeId = "tpl:0x0000000000000001".into();
    let new: NodeId = "tpl:0x0000000000000002".into();
    let mut overrides = BTreeMap::new();
    overrides.insert(
        old.clone(),
        Override {
            rect: Some(old.clone()),
            ..Override::default()
        },
    );
    let mut node = Node::Layer(LayerNode {
        overrides,
        ..LayerNode::default()
    });
    let (o, n) = (old.clone(), new.clone());
    node.rewrite_refs(&move |id: &NodeId| (id == &o).then(|| n.clone()));
    let layer = node.as_layer().unwrap();
    assert_eq!(layer.overrides[&new].rect.as_ref(), Some(&new));
    assert!(node.references().iter().all(|r| **r == new));
}
