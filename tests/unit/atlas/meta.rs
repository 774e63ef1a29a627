use super::*;

fn entry(x: u32, duration: f64) -> AtlasFrameEntry {
    AtlasFrameEntry {
        frame: FrameBox { x, y: 0, w: 8, h: 8 },
        rotated: false,
        trimmed: false,
        sprite_source_size: FrameBox {
            x: 0,
            y: 0,
            w: 8,
            h: 8,
        },
        source_size: Size { w: 8, h: 8 },
        duration,
    }
}

#[test]
fn duplicate_names_keep_first_position_and_last_value() {
    let mut frames = AtlasFrames::default();
    frames.insert("walk".into(), entry(0, 100.0));
    frames.insert("idle".into(), entry(8, 100.0));
    frames.insert("walk".into(), entry(16, 50.0));

    let names: Vec<&str> = frames.iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["walk", "idle"]);
    assert_eq!(frames.get("walk").unwrap().frame.x, 16);
    assert_eq!(frames.len(), 2);
}

#[test]
fn frames_serialize_in_insertion_order() {
    let mut frames = AtlasFrames::default();
    frames.insert("zeta".into(), entry(0, 100.0));
    frames.insert("alpha".into(), entry(8, 100.0));
    let text = serde_json::to_string(&frames).unwrap();
    assert!(text.find("zeta").unwrap() < text.find("alpha").unwrap());
    assert!(text.contains("\"spriteSourceSize\""));
    assert!(text.contains("\"sourceSize\""));

    let back: AtlasFrames = serde_json::from_str(&text).unwrap();
    assert_eq!(back, frames);
}

#[test]
fn meta_has_fixed_fields() {
    let meta = AtlasMeta::new("atlas.png", Size { w: 64, h: 32 });
    let v = serde_json::to_value(&meta).unwrap();
    assert_eq!(v["app"], "hexflip");
    assert_eq!(v["format"], "RGBA8888");
    assert_eq!(v["scale"], "1");
    assert_eq!(v["frameTags"], serde_json::json!([]));
    assert_eq!(v["size"], serde_json::json!({"w": 64, "h": 32}));
}

#[test]
fn durations_keep_fractions_and_print_whole_values_as_integers() {
    let mut frames = AtlasFrames::default();
    frames.insert("a".into(), entry(0, 100.0));
    frames.insert("b".into(), entry(8, 1.5));
    let v = serde_json::to_value(&frames).unwrap();
    assert!(v["a"]["duration"].is_i64());
    assert_eq!(v["a"]["duration"], 100);
    assert_eq!(v["b"]["duration"].as_f64(), Some(1.5));

    let text = serde_json::to_string(&frames).unwrap();
    assert!(text.contains("\"duration\":100,") || text.contains("\"duration\":100}"));
    let back: AtlasFrames = serde_json::from_str(&text).unwrap();
    assert_eq!(back, frames);
}
