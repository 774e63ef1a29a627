use std::collections::BTreeMap;
use std::io::Cursor;

use base64::Engine as _;

use super::*;
use crate::graph::node::{AssetNode, FrameSlotNode, LayerNode, Override, RectNode};
use crate::render::plan::{PlanFrame, PlanLayer};

fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

fn quad_data_url() -> String {
    let mut img = image::RgbaImage::new(2, 2);
    img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
    img.put_pixel(1, 0, image::Rgba([0, 255, 0, 255]));
    img.put_pixel(0, 1, image::Rgba([0, 0, 255, 255]));
    img.put_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    )
}

fn layer() -> LayerNode {
    LayerNode {
        name: "L".into(),
        visible: true,
        default_rect: Some(id("tpl:r")),
        ..LayerNode::default()
    }
}

/// 8x8 canvas, two frames, one 2x2 source box scaled to 4x4 at (1, 1).
fn plan(layers: Vec<LayerNode>, src: &str) -> RenderPlan {
    let mut rects = BTreeMap::new();
    rects.insert(
        id("tpl:r"),
        RectNode {
            name: "r".into(),
            asset: Some(id("asset:a")),
            sw: 2.0,
            sh: 2.0,
            dx: 1.0,
            dy: 1.0,
            dw: 4.0,
            dh: 4.0,
            ..RectNode::default()
        },
    );
    let mut assets = BTreeMap::new();
    assets.insert(
        id("asset:a"),
        AssetNode {
            name: "a".into(),
            src: src.to_string(),
        },
    );
    RenderPlan {
        recipe: None,
        template: None,
        generation: 1,
        canvas: Canvas {
            width: 8,
            height: 8,
        },
        frames: ["tpl:f0", "tpl:f1"]
            .into_iter()
            .map(|f| PlanFrame {
                id: id(f),
                slot: FrameSlotNode::default(),
            })
            .collect(),
        rects,
        layers: layers
            .into_iter()
            .enumerate()
            .map(|(i, layer)| PlanLayer {
                id: id(&format!("anim:l{i}")),
                layer,
            })
            .collect(),
        assets,
    }
}

fn transparent() -> Compositor {
    Compositor::new(CompositorOpts {
        checkerboard: false,
        ..CompositorOpts::default()
    })
}

#[test]
fn checkerboard_alternates_cells() {
    let mut c = Compositor::new(CompositorOpts::default());
    let out = c.compose_frame(&plan(vec![], ""), 0);
    let f = &out.frame;
    assert_eq!(f.pixel(0, 0), Some([0x0c, 0x11, 0x18, 255]));
    assert_eq!(f.pixel(7, 7), Some([0x0c, 0x11, 0x18, 255]));

    let mut wide = plan(vec![], "");
    wide.canvas = Canvas {
        width: 16,
        height: 16,
    };
    let out = c.compose_frame(&wide, 0);
    assert_eq!(out.frame.pixel(8, 0), Some([0x0a, 0x0e, 0x14, 255]));
    assert_eq!(out.frame.pixel(8, 8), Some([0x0c, 0x11, 0x18, 255]));
}

#[test]
fn out_of_range_index_draws_background_only() {
    let mut c = transparent();
    let out = c.compose_frame(&plan(vec![layer()], &quad_data_url()), 5);
    assert!(out.complete);
    assert!(out.frame.data.iter().all(|&b| b == 0));
}

#[test]
fn nearest_neighbor_scales_the_source_box() {
    let mut c = transparent();
    let out = c.compose_frame(&plan(vec![layer()], &quad_data_url()), 0);
    assert!(out.complete);
    let f = &out.frame;
    assert_eq!(f.pixel(0, 0), Some([0, 0, 0, 0]));
    assert_eq!(f.pixel(1, 1), Some([255, 0, 0, 255]));
    assert_eq!(f.pixel(2, 2), Some([255, 0, 0, 255]));
    assert_eq!(f.pixel(3, 1), Some([0, 255, 0, 255]));
    assert_eq!(f.pixel(1, 3), Some([0, 0, 255, 255]));
    assert_eq!(f.pixel(4, 4), Some([255, 255, 255, 255]));
    assert_eq!(f.pixel(5, 5), Some([0, 0, 0, 0]));
}

#[test]
fn layer_and_override_opacity_multiply() {
    let mut l = layer();
    l.opacity = Some(0.5);
    l.overrides.insert(
        id("tpl:f1"),
        Override {
            opacity: Some(2.0),
            dx: Some(2.0),
            ..Override::default()
        },
    );
    let p = plan(vec![l], &quad_data_url());
    let mut c = transparent();

    let f0 = c.compose_frame(&p, 0);
    assert_eq!(f0.frame.pixel(1, 1), Some([128, 0, 0, 128]));

    let f1 = c.compose_frame(&p, 1);
    assert_eq!(f1.frame.pixel(1, 1), Some([0, 0, 0, 0]));
    assert_eq!(f1.frame.pixel(3, 1), Some([128, 0, 0, 128]));
}

#[test]
fn hidden_layers_and_foreign_rects_are_skipped() {
    let mut hidden = layer();
    hidden.visible = false;
    let mut foreign = layer();
    foreign.default_rect = Some(id("tpl:not-in-template"));
    let mut c = transparent();
    let out = c.compose_frame(&plan(vec![hidden, foreign], &quad_data_url()), 0);
    assert!(out.frame.data.iter().all(|&b| b == 0));
}

#[test]
fn missing_asset_draws_placeholder() {
    let mut c = transparent();
    let mut p = plan(vec![layer()], "");
    p.rects.get_mut(&id("tpl:r")).unwrap().dx = 0.0;
    p.rects.get_mut(&id("tpl:r")).unwrap().dy = 0.0;
    p.rects.get_mut(&id("tpl:r")).unwrap().dw = 32.0;
    p.rects.get_mut(&id("tpl:r")).unwrap().dh = 32.0;
    p.canvas = Canvas {
        width: 32,
        height: 32,
    };
    let out = c.compose_frame(&p, 0);
    assert!(out.complete);

    let fill = out.frame.pixel(20, 20).unwrap();
    assert_eq!(fill, [41, 33, 16, 41]);
    let border = out.frame.pixel(0, 0).unwrap();
    assert!(border[3] > fill[3]);
    let label = out.frame.pixel(4, 6).unwrap();
    assert!(label[3] > fill[3]);
}

#[test]
fn undecodable_asset_fails_once_and_draws_placeholder() {
    let mut c = transparent();
    let p = plan(vec![layer()], "data:image/png;base64,AAAA");
    let out = c.compose_frame(&p, 0);
    assert!(out.complete);
    assert!(matches!(
        c.decode_state(&id("asset:a")),
        Some(DecodeState::Failed(_))
    ));
    assert_ne!(out.frame.pixel(2, 2), Some([0, 0, 0, 0]));
    c.compose_frame(&p, 1);
    assert_eq!(c.decode_count(), 1);
}

#[test]
fn deferred_decoding_marks_frames_incomplete_until_jobs_finish() {
    let mut c = Compositor::new(CompositorOpts {
        checkerboard: false,
        decode: DecodePolicy::Deferred,
        ..CompositorOpts::default()
    });
    let p = plan(vec![layer()], &quad_data_url());

    let first = c.compose_frame(&p, 0);
    assert!(!first.complete);
    assert!(matches!(
        c.decode_state(&id("asset:a")),
        Some(DecodeState::Pending)
    ));
    assert_eq!(c.prepare_plan(&p), 1);

    let jobs = c.take_decode_jobs();
    assert_eq!(jobs.len(), 1);
    for job in jobs {
        assert!(c.complete(job.run()));
    }

    let second = c.compose_frame(&p, 0);
    assert!(second.complete);
    assert_eq!(second.frame.pixel(1, 1), Some([255, 0, 0, 255]));
}

#[test]
fn composition_is_deterministic() {
    let p = plan(vec![layer()], &quad_data_url());
    let a = transparent().compose_frame(&p, 0);
    let b = transparent().compose_frame(&p, 0);
    assert_eq!(a.frame.data, b.frame.data);
}

#[test]
fn zero_size_source_box_draws_nothing() {
    let mut p = plan(vec![layer()], &quad_data_url());
    p.rects.get_mut(&id("tpl:r")).unwrap().sw = 0.0;
    let out = transparent().compose_frame(&p, 0);
    assert!(out.complete);
    assert!(out.frame.data.iter().all(|&b| b == 0));

    p.rects.get_mut(&id("tpl:r")).unwrap().sw = 2.0;
    p.rects.get_mut(&id("tpl:r")).unwrap().sh = -1.0;
    let out = transparent().compose_frame(&p, 0);
    assert!(out.frame.data.iter().all(|&b| b == 0));
}

#[test]
fn canvas_over_the_pixel_budget_is_not_allocated() {
    let mut p = plan(vec![layer()], &quad_data_url());
    p.canvas = Canvas {
        width: u32::MAX,
        height: u32::MAX,
    };
    let out = transparent().compose_frame(&p, 0);
    assert!(!out.complete);
    assert_eq!((out.frame.width, out.frame.height), (0, 0));
    assert!(out.frame.data.is_empty());
}

#[test]
fn new_generation_evicts_assets_the_plan_dropped() {
    let mut c = transparent();
    let mut p = plan(vec![layer()], &quad_data_url());
    p.assets.insert(
        id("asset:b"),
        AssetNode {
            name: "b".into(),
            src: quad_data_url(),
        },
    );
    c.compose_frame(&p, 0);
    assert_eq!(c.cached_assets(), 2);

    p.assets.remove(&id("asset:b"));
    c.compose_frame(&p, 0);
    assert_eq!(c.cached_assets(), 2);

    p.generation += 1;
    c.compose_frame(&p, 0);
    assert_eq!(c.cached_assets(), 1);
    assert!(c.decode_state(&id("asset:b")).is_none());
    assert!(matches!(
        c.decode_state(&id("asset:a")),
        Some(DecodeState::Ready(_))
    ));
    assert_eq!(c.decode_count(), 2);
}
