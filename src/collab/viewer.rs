//! State handed to an out-of-process preview window, and the way back to a [`RenderPlan`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

use crate::foundation::core::Canvas;
use crate::graph::id::{NodeId, NodeKind, opt_ref};
use crate::graph::node::{
    AssetNode, FrameSlotNode, LayerNode, Node, Override, RectNode, serialize_ms,
};
use crate::graph::store::GraphStore;
use crate::render::plan::{PlanFrame, PlanLayer, RenderPlan};

fn ref_or_empty<S: Serializer>(id: &Option<NodeId>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(id.as_ref().map_or("", NodeId::as_str))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// Timeline entry as the viewer sees it.
pub struct ViewerFrame {
    /// FrameSlot ID.
    pub id: NodeId,
    /// Display name.
    pub name: String,
    /// Effective duration in milliseconds.
    #[serde(serialize_with = "serialize_ms")]
    pub duration: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Layer as the viewer sees it; references are `""` when absent.
pub struct ViewerLayer {
    /// Layer ID.
    pub id: NodeId,
    /// Display name.
    pub name: String,
    /// Hidden layers are not drawn.
    pub visible: bool,
    /// Asset override.
    #[serde(
        default,
        deserialize_with = "opt_ref::deserialize",
        serialize_with = "ref_or_empty"
    )]
    pub asset: Option<NodeId>,
    /// Default rect.
    #[serde(
        default,
        deserialize_with = "opt_ref::deserialize",
        serialize_with = "ref_or_empty"
    )]
    pub default_rect: Option<NodeId>,
    /// Clamped opacity.
    pub opacity: f64,
    /// Per-frame overrides.
    #[serde(default)]
    pub overrides: BTreeMap<NodeId, Override>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Everything a preview window needs to draw a recipe.
pub struct ViewerSnapshot {
    /// Output width.
    pub out_w: u32,
    /// Output height.
    pub out_h: u32,
    /// Timeline.
    pub frames: Vec<ViewerFrame>,
    /// Layers, back to front.
    pub layers: Vec<ViewerLayer>,
    /// The template's rects.
    pub rects: BTreeMap<NodeId, RectNode>,
    /// Every Asset in the store.
    pub assets: BTreeMap<NodeId, AssetNode>,
}

impl ViewerSnapshot {
    /// Compact JSON text.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl RenderPlan {
    /// Rebuild a plan from a viewer snapshot so the viewer can reuse the same compositor.
    pub fn from_viewer_snapshot(snap: &ViewerSnapshot, generation: u64) -> Self {
        let frames = snap
            .frames
            .iter()
            .map(|f| PlanFrame {
                id: f.id.clone(),
                slot: FrameSlotNode {
                    name: f.name.clone(),
                    duration: f.duration,
                },
            })
            .collect();
        let layers = snap
            .layers
            .iter()
            .map(|l| PlanLayer {
                id: l.id.clone(),
                layer: LayerNode {
                    name: l.name.clone(),
                    visible: l.visible,
                    asset: l.asset.clone(),
                    default_rect: l.default_rect.clone(),
                    opacity: Some(l.opacity),
                    overrides: l.overrides.clone(),
                },
            })
            .collect();
        Self {
            recipe: None,
            template: None,
            generation,
            canvas: Canvas {
                width: snap.out_w.max(1),
                height: snap.out_h.max(1),
            },
            frames,
            rects: snap.rects.clone(),
            layers,
            assets: snap.assets.clone(),
        }
    }
}

impl GraphStore {
    /// Viewer state for `recipe`, or `None` when it has no plan.
    pub fn snapshot_for_viewer(&mut self, recipe: &NodeId) -> Option<ViewerSnapshot> {
        let plan = self.build_plan(recipe)?;
        let frames = plan
            .frames
            .iter()
            .map(|f| ViewerFrame {
                id: f.id.clone(),
                name: f.slot.name.clone(),
                duration: f.slot.effective_duration_ms(),
            })
            .collect();
        let layers = plan
            .layers
            .iter()
            .map(|pl| ViewerLayer {
                id: pl.id.clone(),
                name: pl.layer.name.clone(),
                visible: pl.layer.visible,
                asset: pl.layer.asset.clone(),
                default_rect: pl.layer.default_rect.clone(),
                opacity: pl.layer.effective_opacity(),
                overrides: pl.layer.overrides.clone(),
            })
            .collect();
        let assets = self
            .list_nodes_of_type(NodeKind::Asset)
            .into_iter()
            .filter_map(|(id, n)| match n {
                Node::Asset(a) => Some((id.clone(), a.clone())),
                _ => None,
            })
            .collect();
        Some(ViewerSnapshot {
            out_w: plan.canvas.width,
            out_h: plan.canvas.height,
            frames,
            layers,
            rects: plan.rects.clone(),
            assets,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/collab/viewer.rs"]
mod tests;
