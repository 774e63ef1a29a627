use std::collections::BTreeMap;

use super::*;
use crate::foundation::core::Canvas;
use crate::graph::id::NodeId;
use crate::graph::node::FrameSlotNode;
use crate::render::plan::PlanFrame;

fn plan(durations: &[f64]) -> RenderPlan {
    RenderPlan {
        recipe: None,
        template: None,
        generation: 0,
        canvas: Canvas {
            width: 1,
            height: 1,
        },
        frames: durations
            .iter()
            .enumerate()
            .map(|(i, d)| PlanFrame {
                id: NodeId::from(format!("tpl:f{i}")),
                slot: FrameSlotNode {
                    name: String::new(),
                    duration: *d,
                },
            })
            .collect(),
        rects: BTreeMap::new(),
        layers: Vec::new(),
        assets: BTreeMap::new(),
    }
}

#[test]
fn stopped_playback_never_renders() {
    let mut pb = Playback::new();
    assert_eq!(pb.tick(0.0, Some(&plan(&[100.0]))), Tick::Stopped);
}

#[test]
fn frames_advance_after_their_duration() {
    let p = plan(&[100.0, 40.0]);
    let mut pb = Playback::new();
    pb.play();

    assert_eq!(pb.tick(0.0, Some(&p)), Tick::Render { frame: 0 });
    assert_eq!(pb.tick(50.0, Some(&p)), Tick::Idle { next_at_ms: 100.0 });
    assert_eq!(pb.tick(100.0, Some(&p)), Tick::Render { frame: 1 });
    assert_eq!(pb.tick(120.0, Some(&p)), Tick::Idle { next_at_ms: 140.0 });
    assert_eq!(pb.tick(140.0, Some(&p)), Tick::Render { frame: 0 });
}

#[test]
fn zero_duration_uses_the_default() {
    let p = plan(&[0.0]);
    let mut pb = Playback::new();
    pb.play();
    pb.tick(10.0, Some(&p));
    assert_eq!(pb.tick(20.0, Some(&p)), Tick::Idle { next_at_ms: 110.0 });
}

#[test]
fn empty_or_missing_plan_stops_playback() {
    let mut pb = Playback::new();
    pb.play();
    assert_eq!(pb.tick(0.0, Some(&plan(&[]))), Tick::Stopped);
    assert!(!pb.is_playing());

    pb.play();
    assert_eq!(pb.tick(0.0, None), Tick::Stopped);
    assert!(!pb.is_playing());
}

#[test]
fn step_and_seek_wrap() {
    let p = plan(&[100.0, 100.0, 100.0]);
    let mut pb = Playback::new();
    pb.step(-1, &p);
    assert_eq!(pb.current(), 2);
    pb.step(2, &p);
    assert_eq!(pb.current(), 1);
    pb.seek(7, &p);
    assert_eq!(pb.current(), 1);
    assert!(pb.toggle());
    pb.reset();
    assert_eq!(pb.current(), 0);
    assert!(!pb.is_playing());
}

#[test]
fn fractional_durations_are_not_rounded() {
    let p = plan(&[12.5, 100.0]);
    let mut pb = Playback::new();
    pb.play();
    assert_eq!(pb.tick(0.0, Some(&p)), Tick::Render { frame: 0 });
    assert_eq!(pb.tick(1.0, Some(&p)), Tick::Idle { next_at_ms: 12.5 });
}
