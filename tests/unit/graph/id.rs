use super::*;

#[test]
fn from_hash_pads_to_sixteen_digits() {
    let id = NodeId::from_hash("tpl", 0xabc);
    assert_eq!(id.as_str(), "tpl:0x0000000000000abc");
    assert_eq!(id.namespace(), Some("tpl"));
}

#[test]
fn parse_accepts_canonical_shape_only() {
    assert!(NodeId::parse("asset:0x0123456789abcdef").is_ok());
    assert!(NodeId::parse("asset:0x0123456789ABCDEF").is_err());
    assert!(NodeId::parse("asset:0x0123").is_err());
    assert!(NodeId::parse("0x0123456789abcdef").is_err());
    assert!(NodeId::parse(":0x0123456789abcdef").is_err());
    assert!(NodeId::parse("asset:0123456789abcdef00").is_err());
}

#[test]
fn kinds_round_trip_through_tags() {
    for kind in NodeKind::REID_ORDER {
        assert_eq!(NodeKind::parse(kind.as_str()), Some(kind));
    }
    assert_eq!(NodeKind::parse("Sprite"), None);
    assert_eq!(NodeKind::Layer.namespace(), "anim");
    assert_eq!(NodeKind::FrameSlot.namespace(), "tpl");
}

#[test]
fn reid_order_puts_layers_before_templates() {
    let pos = |k: NodeKind| NodeKind::REID_ORDER.iter().position(|x| *x == k).unwrap();
    assert!(pos(NodeKind::FrameSlot) < pos(NodeKind::Layer));
    assert!(pos(NodeKind::Layer) < pos(NodeKind::Template));
    assert!(pos(NodeKind::Template) < pos(NodeKind::Recipe));
}
