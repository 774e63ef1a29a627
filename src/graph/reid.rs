//! Topological re-identification: remint every known node's content hash bottom-up and rewrite
//! every reference to match.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use crate::foundation::math::{clamp01, finite_or_zero};
use crate::graph::canonical::{canonicalize, make_id};
use crate::graph::id::{NodeId, NodeKind};
use crate::graph::manifest::union_ids;
use crate::graph::node::Node;
use crate::graph::store::GraphStore;

/// Outcome of [`GraphStore::recompute_ids`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReidReport {
    /// Known-kind nodes that were re-hashed.
    pub visited: usize,
    /// Nodes whose ID changed.
    pub renamed: usize,
    /// Nodes that landed on an ID another node already took.
    pub collapsed: usize,
    /// IDs of nodes with unrecognized kinds; kept as-is.
    pub unknown: Vec<NodeId>,
    /// References to existing nodes that had not been re-hashed yet when they were read.
    pub forward_refs: usize,
    /// Old ID to new ID, for changed IDs only.
    pub renames: BTreeMap<NodeId, NodeId>,
}

fn ref_or_empty(id: Option<&NodeId>, map: &mut dyn FnMut(&NodeId) -> NodeId) -> Value {
    match id {
        Some(id) => Value::String(map(id).to_string()),
        None => Value::String(String::new()),
    }
}

fn id_list(ids: &[NodeId], map: &mut dyn FnMut(&NodeId) -> NodeId) -> Value {
    Value::Array(
        ids.iter()
            .map(|id| Value::String(map(id).to_string()))
            .collect(),
    )
}

fn at_least_one(x: f64) -> f64 {
    if x.is_finite() && x != 0.0 { x.max(1.0) } else { 1.0 }
}

/// Normalized hashing payload of `node`, with every reference passed through `map`.
///
/// Returns `None` for unknown kinds.
pub(crate) fn node_payload(node: &Node, map: &mut dyn FnMut(&NodeId) -> NodeId) -> Option<Value> {
    let payload = match node {
        Node::Asset(a) => json!({ "name": a.name, "src": a.src }),
        Node::Rect(r) => json!({
            "name": r.name,
            "asset": ref_or_empty(r.asset.as_ref(), map),
            "sx": finite_or_zero(r.sx),
            "sy": finite_or_zero(r.sy),
            "sw": finite_or_zero(r.sw),
            "sh": finite_or_zero(r.sh),
            "dx": finite_or_zero(r.dx),
            "dy": finite_or_zero(r.dy),
            "dw": finite_or_zero(r.dw),
            "dh": finite_or_zero(r.dh),
        }),
        Node::FrameSlot(f) => json!({
            "name": f.name,
            "duration": finite_or_zero(f.duration).max(0.0),
        }),
        Node::Layer(l) => {
            let mut overrides = Map::new();
            for (frame, o) in l.overrides.iter().filter(|(_, o)| !o.is_empty()) {
                let mut entry = Map::new();
                if let Some(rect) = &o.rect {
                    entry.insert("rect".into(), Value::String(map(rect).to_string()));
                }
                if let Some(dx) = o.dx {
                    entry.insert("dx".into(), json!(dx));
                }
                if let Some(dy) = o.dy {
                    entry.insert("dy".into(), json!(dy));
                }
                if let Some(op) = o.opacity {
                    entry.insert("opacity".into(), json!(clamp01(op)));
                }
                overrides.insert(map(frame).to_string(), Value::Object(entry));
            }
            json!({
                "name": l.name,
                "visible": l.visible,
                "asset": ref_or_empty(l.asset.as_ref(), map),
                "defaultRect": ref_or_empty(l.default_rect.as_ref(), map),
                "opacity": l.effective_opacity(),
                "overrides": canonicalize(&Value::Object(overrides)),
            })
        }
        Node::Template(t) => json!({
            "tileW": at_least_one(t.tile_w),
            "tileH": at_least_one(t.tile_h),
            "gridW": at_least_one(t.grid_w),
            "gridH": at_least_one(t.grid_h),
            "rects": id_list(&t.rects, map),
            "frames": id_list(&t.frames, map),
        }),
        Node::Recipe(r) => json!({
            "template": ref_or_empty(r.template.as_ref(), map),
            "layers": id_list(&r.layers, map),
        }),
        Node::Task(t) => json!({
            "name": t.name,
            "commands": canonicalize(&Value::Array(t.commands.clone())),
        }),
        Node::Unknown(_) => return None,
    };
    Some(payload)
}

/// Content ID of `node` taken as-is, without remapping its references.
///
/// Unknown kinds hash their raw JSON under the `node` namespace.
pub fn content_id(node: &Node) -> NodeId {
    match (node.kind(), node_payload(node, &mut NodeId::clone)) {
        (Some(kind), Some(payload)) => make_id(kind.namespace(), kind.as_str(), &payload),
        _ => match node {
            Node::Unknown(u) => make_id("node", &u.kind, &u.raw),
            _ => make_id("node", node.type_tag(), &Value::Null),
        },
    }
}

impl GraphStore {
    /// Re-derive every known node's ID from its content, bottom-up, and rewrite all references.
    ///
    /// Kinds are visited Asset, Rect, FrameSlot, Layer, Template, Recipe, Task, each in sorted
    /// ID order, so a node's payload already sees its children's new IDs. Nodes whose content
    /// becomes identical collapse into one. Unknown kinds keep their IDs. Running twice renames
    /// nothing the second time.
    #[tracing::instrument(skip(self), fields(nodes = self.nodes.len()))]
    pub fn recompute_ids(&mut self) -> ReidReport {
        let mut report = ReidReport::default();
        let mut remap: BTreeMap<NodeId, NodeId> = BTreeMap::new();

        for kind in NodeKind::REID_ORDER {
            for (id, node) in self.nodes.iter().filter(|(_, n)| n.kind() == Some(kind)) {
                let nodes = &self.nodes;
                let mut forward = 0usize;
                let payload = node_payload(node, &mut |r: &NodeId| {
                    if let Some(new) = remap.get(r) {
                        return new.clone();
                    }
                    if nodes.get(r).and_then(Node::kind).is_some() {
                        forward += 1;
                        tracing::warn!(node = %id, reference = %r, "forward reference; keeping old id");
                    }
                    r.clone()
                });
                let Some(payload) = payload else { continue };
                report.forward_refs += forward;
                report.visited += 1;
                let new_id = make_id(kind.namespace(), kind.as_str(), &payload);
                if &new_id != id {
                    report.renamed += 1;
                    report.renames.insert(id.clone(), new_id.clone());
                }
                remap.insert(id.clone(), new_id);
            }
        }

        let lookup = |r: &NodeId| report.renames.get(r).cloned();
        let old = std::mem::take(&mut self.nodes);
        let mut collapsed = 0usize;
        for (old_id, mut node) in old {
            if node.kind().is_none() {
                report.unknown.push(old_id.clone());
            }
            node.rewrite_refs(&lookup);
            let new_id = lookup(&old_id).unwrap_or(old_id);
            if self.nodes.insert(new_id, node).is_some() {
                collapsed += 1;
            }
        }
        report.collapsed = collapsed;

        let roots = &mut self.roots;
        if let Some(new) = roots.template.as_ref().and_then(|t| lookup(t)) {
            roots.template = Some(new);
        }
        if let Some(new) = roots.recipe.as_ref().and_then(|r| lookup(r)) {
            roots.recipe = Some(new);
        }
        let assets = std::mem::take(&mut roots.assets);
        union_ids(
            &mut roots.assets,
            assets.into_iter().map(|a| lookup(&a).unwrap_or(a)),
        );
        let tasks = std::mem::take(&mut roots.tasks);
        union_ids(
            &mut roots.tasks,
            tasks.into_iter().map(|t| lookup(&t).unwrap_or(t)),
        );

        if !report.unknown.is_empty() {
            tracing::warn!(count = report.unknown.len(), "unknown node kinds kept their ids");
        }
        self.invalidate();
        self.mark_clean();
        tracing::info!(
            visited = report.visited,
            renamed = report.renamed,
            collapsed = report.collapsed,
            "recomputed node ids"
        );
        report
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/reid.rs"]
mod tests;
