use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::foundation::error::{HexflipError, HexflipResult};
use crate::foundation::math::clamp01;
use crate::graph::id::{NodeId, NodeKind, opt_ref};

/// Default frame duration in milliseconds when a FrameSlot carries none.
pub const DEFAULT_FRAME_DURATION_MS: u32 = 100;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
/// Embedded raster image. `src` is a `data:image/...;base64,` URL or empty.
pub struct AssetNode {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Embedded image data.
    #[serde(default)]
    pub src: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
/// Named source box on an asset and the destination box it lands on.
pub struct RectNode {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Asset the source box is read from.
    #[serde(
        default,
        deserialize_with = "opt_ref::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub asset: Option<NodeId>,
    /// Source x.
    #[serde(default)]
    pub sx: f64,
    /// Source y.
    #[serde(default)]
    pub sy: f64,
    /// Source width.
    #[serde(default)]
    pub sw: f64,
    /// Source height.
    #[serde(default)]
    pub sh: f64,
    /// Destination x.
    #[serde(default)]
    pub dx: f64,
    /// Destination y.
    #[serde(default)]
    pub dy: f64,
    /// Destination width; zero falls back to `sw`.
    #[serde(default)]
    pub dw: f64,
    /// Destination height; zero falls back to `sh`.
    #[serde(default)]
    pub dh: f64,
}

impl RectNode {
    /// Destination size after the `dw -> sw -> 0` fallback chain.
    pub fn dest_size(&self) -> (f64, f64) {
        (nonzero_or(self.dw, self.sw), nonzero_or(self.dh, self.sh))
    }
}

fn nonzero_or(primary: f64, fallback: f64) -> f64 {
    if primary.is_finite() && primary != 0.0 {
        primary
    } else if fallback.is_finite() {
        fallback
    } else {
        0.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// One timeline tick.
pub struct FrameSlotNode {
    /// Display name; also the atlas frame name when non-blank.
    #[serde(default)]
    pub name: String,
    /// Duration in milliseconds as stored.
    #[serde(default = "default_duration")]
    pub duration: f64,
}

/// Write whole milliseconds as JSON integers and keep fractions otherwise.
pub(crate) fn serialize_ms<S: serde::Serializer>(ms: &f64, s: S) -> Result<S::Ok, S::Error> {
    if ms.fract() == 0.0 && ms.abs() < 9_007_199_254_740_992.0 {
        s.serialize_i64(*ms as i64)
    } else {
        s.serialize_f64(*ms)
    }
}

fn default_duration() -> f64 {
    f64::from(DEFAULT_FRAME_DURATION_MS)
}

impl Default for FrameSlotNode {
    fn default() -> Self {
        Self {
            name: String::new(),
            duration: default_duration(),
        }
    }
}

impl FrameSlotNode {
    /// Playback duration: zero or non-finite means the default, and never less than 1 ms.
    /// Fractional milliseconds are kept.
    pub fn effective_duration_ms(&self) -> f64 {
        let d = if self.duration.is_finite() && self.duration != 0.0 {
            self.duration
        } else {
            default_duration()
        };
        d.max(1.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Output grid plus the ordered rect and frame lists.
pub struct TemplateNode {
    /// Tile width in pixels.
    #[serde(default = "one")]
    pub tile_w: f64,
    /// Tile height in pixels.
    #[serde(default = "one")]
    pub tile_h: f64,
    /// Tiles across.
    #[serde(default = "one")]
    pub grid_w: f64,
    /// Tiles down.
    #[serde(default = "one")]
    pub grid_h: f64,
    /// Rects available to layers, in declaration order.
    #[serde(default)]
    pub rects: Vec<NodeId>,
    /// Timeline, in playback order.
    #[serde(default)]
    pub frames: Vec<NodeId>,
}

fn one() -> f64 {
    1.0
}

impl Default for TemplateNode {
    fn default() -> Self {
        Self {
            tile_w: 1.0,
            tile_h: 1.0,
            grid_w: 1.0,
            grid_h: 1.0,
            rects: Vec::new(),
            frames: Vec::new(),
        }
    }
}

impl TemplateNode {
    /// Output size `tileW*gridW x tileH*gridH`, never smaller than 1x1.
    pub fn output_size(&self) -> (u32, u32) {
        let dim = |tile: f64, grid: f64| {
            let t = if tile.is_finite() && tile != 0.0 { tile } else { 1.0 };
            let g = if grid.is_finite() && grid != 0.0 { grid } else { 1.0 };
            (t * g).floor().clamp(1.0, f64::from(u32::MAX)) as u32
        };
        (dim(self.tile_w, self.grid_w), dim(self.tile_h, self.grid_h))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
/// Sparse per-frame patch of a layer. Absent fields fall back to layer and rect defaults.
pub struct Override {
    /// Replacement rect for this frame.
    #[serde(
        default,
        deserialize_with = "opt_ref::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub rect: Option<NodeId>,
    /// Extra x offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dx: Option<f64>,
    /// Extra y offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dy: Option<f64>,
    /// Opacity multiplier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

impl Override {
    /// An override with no fields is equivalent to no override at all.
    pub fn is_empty(&self) -> bool {
        self.rect.is_none() && self.dx.is_none() && self.dy.is_none() && self.opacity.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// One compositing layer.
pub struct LayerNode {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Hidden layers are skipped entirely.
    #[serde(default)]
    pub visible: bool,
    /// Asset override; when absent the rect's own asset is used.
    #[serde(
        default,
        deserialize_with = "opt_ref::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub asset: Option<NodeId>,
    /// Rect used on frames without a rect override.
    #[serde(
        default,
        deserialize_with = "opt_ref::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_rect: Option<NodeId>,
    /// Layer opacity; absent means 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    /// Per-FrameSlot overrides.
    #[serde(default)]
    pub overrides: BTreeMap<NodeId, Override>,
}

impl LayerNode {
    /// Override for `frame`, treating empty entries as absent.
    pub fn override_for(&self, frame: &NodeId) -> Option<&Override> {
        self.overrides.get(frame).filter(|o| !o.is_empty())
    }

    /// Clamped layer opacity.
    pub fn effective_opacity(&self) -> f64 {
        self.opacity.map(clamp01).unwrap_or(1.0)
    }

    /// Drop override entries with no remaining fields.
    pub fn prune_empty_overrides(&mut self) -> bool {
        let before = self.overrides.len();
        self.overrides.retain(|_, o| !o.is_empty());
        before != self.overrides.len()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
/// Animation root.
pub struct RecipeNode {
    /// Template providing the canvas, rects and timeline.
    #[serde(
        default,
        deserialize_with = "opt_ref::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub template: Option<NodeId>,
    /// Layers, back to front.
    #[serde(default)]
    pub layers: Vec<NodeId>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
/// Named command list. Commands are opaque to the graph.
pub struct TaskNode {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Command records forwarded verbatim to the task runner.
    #[serde(default)]
    pub commands: Vec<Value>,
}

#[derive(Clone, Debug, PartialEq)]
/// A node whose `type` tag is not one of the known kinds; kept verbatim.
pub struct UnknownNode {
    /// The unrecognized `type` tag.
    pub kind: String,
    /// Full JSON object, including the tag.
    pub raw: Value,
}

/// A typed graph node.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// See [`AssetNode`].
    Asset(AssetNode),
    /// See [`RectNode`].
    Rect(RectNode),
    /// See [`FrameSlotNode`].
    FrameSlot(FrameSlotNode),
    /// See [`TemplateNode`].
    Template(TemplateNode),
    /// See [`LayerNode`].
    Layer(LayerNode),
    /// See [`RecipeNode`].
    Recipe(RecipeNode),
    /// See [`TaskNode`].
    Task(TaskNode),
    /// See [`UnknownNode`].
    Unknown(UnknownNode),
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum TaggedRef<'a> {
    Asset(&'a AssetNode),
    Rect(&'a RectNode),
    FrameSlot(&'a FrameSlotNode),
    Template(&'a TemplateNode),
    Layer(&'a LayerNode),
    Recipe(&'a RecipeNode),
    Task(&'a TaskNode),
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum TaggedOwned {
    Asset(AssetNode),
    Rect(RectNode),
    FrameSlot(FrameSlotNode),
    Template(TemplateNode),
    Layer(LayerNode),
    Recipe(RecipeNode),
    Task(TaskNode),
}

impl From<TaggedOwned> for Node {
    fn from(t: TaggedOwned) -> Self {
        match t {
            TaggedOwned::Asset(n) => Node::Asset(n),
            TaggedOwned::Rect(n) => Node::Rect(n),
            TaggedOwned::FrameSlot(n) => Node::FrameSlot(n),
            TaggedOwned::Template(n) => Node::Template(n),
            TaggedOwned::Layer(n) => Node::Layer(n),
            TaggedOwned::Recipe(n) => Node::Recipe(n),
            TaggedOwned::Task(n) => Node::Task(n),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let tagged = match self {
            Node::Asset(n) => TaggedRef::Asset(n),
            Node::Rect(n) => TaggedRef::Rect(n),
            Node::FrameSlot(n) => TaggedRef::FrameSlot(n),
            Node::Template(n) => TaggedRef::Template(n),
            Node::Layer(n) => TaggedRef::Layer(n),
            Node::Recipe(n) => TaggedRef::Recipe(n),
            Node::Task(n) => TaggedRef::Task(n),
            Node::Unknown(n) => return n.raw.serialize(s),
        };
        tagged.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(d)?;
        Node::from_value(raw).map_err(serde::de::Error::custom)
    }
}

impl Node {
    /// Decode a node from its manifest JSON object.
    ///
    /// Unknown `type` tags produce [`Node::Unknown`]; a known tag with ill-typed fields is an
    /// error.
    pub fn from_value(raw: Value) -> HexflipResult<Self> {
        let tag = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| HexflipError::manifest("node has no string 'type' tag"))?
            .to_string();
        if NodeKind::parse(&tag).is_none() {
            return Ok(Node::Unknown(UnknownNode { kind: tag, raw }));
        }
        let tagged: TaggedOwned = serde_json::from_value(raw)
            .map_err(|e| HexflipError::manifest(format!("malformed {tag} node: {e}")))?;
        Ok(tagged.into())
    }

    /// Kind of this node; `None` for unknown tags.
    pub fn kind(&self) -> Option<NodeKind> {
        Some(match self {
            Node::Asset(_) => NodeKind::Asset,
            Node::Rect(_) => NodeKind::Rect,
            Node::FrameSlot(_) => NodeKind::FrameSlot,
            Node::Template(_) => NodeKind::Template,
            Node::Layer(_) => NodeKind::Layer,
            Node::Recipe(_) => NodeKind::Recipe,
            Node::Task(_) => NodeKind::Task,
            Node::Unknown(_) => return None,
        })
    }

    /// The manifest `type` tag.
    pub fn type_tag(&self) -> &str {
        match self {
            Node::Unknown(n) => &n.kind,
            known => known.kind().map(NodeKind::as_str).unwrap_or_default(),
        }
    }

    /// Every ID this node references, in field order. Override keys are included.
    pub fn references(&self) -> Vec<&NodeId> {
        let mut out = Vec::new();
        match self {
            Node::Rect(r) => out.extend(r.asset.as_ref()),
            Node::Template(t) => {
                out.extend(t.rects.iter());
                out.extend(t.frames.iter());
            }
            Node::Layer(l) => {
                out.extend(l.asset.as_ref());
                out.extend(l.default_rect.as_ref());
                for (frame, o) in &l.overrides {
                    out.push(frame);
                    out.extend(o.rect.as_ref());
                }
            }
            Node::Recipe(r) => {
                out.extend(r.template.as_ref());
                out.extend(r.layers.iter());
            }
            Node::Asset(_) | Node::FrameSlot(_) | Node::Task(_) | Node::Unknown(_) => {}
        }
        out
    }

    /// Rewrite every reference for which `map` returns a replacement.
    pub fn rewrite_refs(&mut self, map: &dyn Fn(&NodeId) -> Option<NodeId>) {
        let swap = |slot: &mut NodeId| {
            if let Some(new) = map(slot) {
                *slot = new;
            }
        };
        match self {
            Node::Rect(r) => r.asset.iter_mut().for_each(swap),
            Node::Template(t) => {
                t.rects.iter_mut().for_each(swap);
                t.frames.iter_mut().for_each(swap);
            }
            Node::Layer(l) => {
                l.asset.iter_mut().for_each(swap);
                l.default_rect.iter_mut().for_each(swap);
                let old = std::mem::take(&mut l.overrides);
                for (frame, mut o) in old {
                    o.rect.iter_mut().for_each(swap);
                    let key = map(&frame).unwrap_or(frame);
                    l.overrides.insert(key, o);
                }
            }
            Node::Recipe(r) => {
                r.template.iter_mut().for_each(swap);
                r.layers.iter_mut().for_each(swap);
            }
            Node::Asset(_) | Node::FrameSlot(_) | Node::Task(_) | Node::Unknown(_) => {}
        }
    }

    /// Remove every reference to `target`. Returns `true` when anything changed.
    ///
    /// Override entries keyed by `target` are dropped, override `rect`s pointing at it are
    /// cleared, and overrides left empty are pruned.
    pub fn prune_references_to(&mut self, target: &NodeId) -> bool {
        let clear = |slot: &mut Option<NodeId>| {
            if slot.as_ref() == Some(target) {
                *slot = None;
                true
            } else {
                false
            }
        };
        let strip = |list: &mut Vec<NodeId>| {
            let before = list.len();
            list.retain(|id| id != target);
            before != list.len()
        };
        match self {
            Node::Rect(r) => clear(&mut r.asset),
            Node::Template(t) => strip(&mut t.rects) | strip(&mut t.frames),
            Node::Layer(l) => {
                let mut changed = clear(&mut l.asset) | clear(&mut l.default_rect);
                changed |= l.overrides.remove(target).is_some();
                for o in l.overrides.values_mut() {
                    changed |= clear(&mut o.rect);
                }
                changed | l.prune_empty_overrides()
            }
            Node::Recipe(r) => clear(&mut r.template) | strip(&mut r.layers),
            Node::Asset(_) | Node::FrameSlot(_) | Node::Task(_) | Node::Unknown(_) => false,
        }
    }

    /// Borrow as an asset.
    pub fn as_asset(&self) -> Option<&AssetNode> {
        match self {
            Node::Asset(n) => Some(n),
            _ => None,
        }
    }

    /// Borrow as a rect.
    pub fn as_rect(&self) -> Option<&RectNode> {
        match self {
            Node::Rect(n) => Some(n),
            _ => None,
        }
    }

    /// Borrow as a frame slot.
    pub fn as_frame_slot(&self) -> Option<&FrameSlotNode> {
        match self {
            Node::FrameSlot(n) => Some(n),
            _ => None,
        }
    }

    /// Borrow as a template.
    pub fn as_template(&self) -> Option<&TemplateNode> {
        match self {
            Node::Template(n) => Some(n),
            _ => None,
        }
    }

    /// Borrow as a layer.
    pub fn as_layer(&self) -> Option<&LayerNode> {
        match self {
            Node::Layer(n) => Some(n),
            _ => None,
        }
    }

    /// Borrow as a recipe.
    pub fn as_recipe(&self) -> Option<&RecipeNode> {
        match self {
            Node::Recipe(n) => Some(n),
            _ => None,
        }
    }

    /// Borrow as a task.
    pub fn as_task(&self) -> Option<&TaskNode> {
        match self {
            Node::Task(n) => Some(n),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/node.rs"]
mod tests;
