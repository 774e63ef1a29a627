use std::collections::BTreeMap;
use std::sync::Arc;

use crate::foundation::core::Canvas;
use crate::graph::id::NodeId;
use crate::graph::node::{AssetNode, FrameSlotNode, LayerNode, Node, RectNode};

#[derive(Clone, Debug, PartialEq)]
/// One timeline entry of a [`RenderPlan`].
pub struct PlanFrame {
    /// FrameSlot ID; override lookups key on it.
    pub id: NodeId,
    /// FrameSlot contents.
    pub slot: FrameSlotNode,
}

#[derive(Clone, Debug, PartialEq)]
/// One layer of a [`RenderPlan`], back to front.
pub struct PlanLayer {
    /// Layer ID.
    pub id: NodeId,
    /// Layer contents.
    pub layer: LayerNode,
}

#[derive(Clone, Debug, PartialEq)]
/// Everything needed to composite a recipe, detached from the store.
///
/// A plan holds:
/// - the output canvas (`tileW*gridW x tileH*gridH`, at least 1x1)
/// - the timeline (`frames`), skipping references that are missing or not FrameSlots
/// - the template's rects (`rects`); layers pointing outside this set are not drawn
/// - the layers (`layers`), skipping references that are missing or not Layers
/// - every Asset a layer or rect may read (`assets`)
///
/// The compositor reads nothing but the plan.
pub struct RenderPlan {
    /// Source recipe; `None` for plans rebuilt from a viewer snapshot.
    pub recipe: Option<NodeId>,
    /// Source template; `None` for plans rebuilt from a viewer snapshot.
    pub template: Option<NodeId>,
    /// Store generation the plan was built from.
    pub generation: u64,
    /// Output size.
    pub canvas: Canvas,
    /// Timeline.
    pub frames: Vec<PlanFrame>,
    /// Rect lookup, restricted to the template's rects.
    pub rects: BTreeMap<NodeId, RectNode>,
    /// Layers, back to front.
    pub layers: Vec<PlanLayer>,
    /// Assets reachable from layers and rects.
    pub assets: BTreeMap<NodeId, AssetNode>,
}

impl RenderPlan {
    /// Number of timeline frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Effective duration of frame `index` in milliseconds, if it exists.
    pub fn frame_duration_ms(&self, index: usize) -> Option<f64> {
        self.frames
            .get(index)
            .map(|f| f.slot.effective_duration_ms())
    }

    /// Sum of all frame durations.
    pub fn total_duration_ms(&self) -> f64 {
        self.frames
            .iter()
            .map(|f| f.slot.effective_duration_ms())
            .sum()
    }
}

/// Build the plan for `recipe`, reading nodes through `resolve`.
///
/// Returns `None` when the recipe or its template is missing or of the wrong kind, or when the
/// output would exceed [`crate::MAX_CANVAS_PIXELS`]. Every other broken reference is skipped.
#[tracing::instrument(skip(resolve), fields(recipe = %recipe))]
pub(crate) fn build_render_plan(
    recipe: &NodeId,
    generation: u64,
    resolve: &mut dyn FnMut(&NodeId) -> Option<Arc<Node>>,
) -> Option<RenderPlan> {
    let rec_node = resolve(recipe)?;
    let Some(rec) = rec_node.as_recipe() else {
        tracing::debug!("not a Recipe node");
        return None;
    };
    let tpl_id = rec.template.clone()?;
    let tpl_node = resolve(&tpl_id)?;
    let Some(tpl) = tpl_node.as_template() else {
        tracing::debug!(template = %tpl_id, "recipe template is not a Template node");
        return None;
    };

    let (width, height) = tpl.output_size();
    let canvas = Canvas { width, height };
    if !canvas.fits_pixel_budget() {
        tracing::warn!(width, height, "template output exceeds the canvas pixel budget");
        return None;
    }

    let mut frames = Vec::with_capacity(tpl.frames.len());
    for fid in &tpl.frames {
        match resolve(fid).as_deref() {
            Some(Node::FrameSlot(slot)) => frames.push(PlanFrame {
                id: fid.clone(),
                slot: slot.clone(),
            }),
            _ => tracing::debug!(frame = %fid, "skipping missing frame slot"),
        }
    }

    let mut rects = BTreeMap::new();
    for rid in &tpl.rects {
        match resolve(rid).as_deref() {
            Some(Node::Rect(r)) => {
                rects.insert(rid.clone(), r.clone());
            }
            _ => tracing::debug!(rect = %rid, "skipping missing rect"),
        }
    }

    let mut layers = Vec::with_capacity(rec.layers.len());
    for lid in &rec.layers {
        match resolve(lid).as_deref() {
            Some(Node::Layer(l)) => layers.push(PlanLayer {
                id: lid.clone(),
                layer: l.clone(),
            }),
            _ => tracing::debug!(layer = %lid, "skipping missing layer"),
        }
    }

    let wanted: Vec<NodeId> = layers
        .iter()
        .filter_map(|l| l.layer.asset.clone())
        .chain(rects.values().filter_map(|r| r.asset.clone()))
        .collect();
    let mut assets = BTreeMap::new();
    for aid in wanted {
        if assets.contains_key(&aid) {
            continue;
        }
        if let Some(Node::Asset(a)) = resolve(&aid).as_deref() {
            assets.insert(aid, a.clone());
        }
    }

    Some(RenderPlan {
        recipe: Some(recipe.clone()),
        template: Some(tpl_id),
        generation,
        canvas,
        frames,
        rects,
        layers,
        assets,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/render/plan.rs"]
mod tests;
