use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::foundation::error::{HexflipError, HexflipResult};
use crate::graph::id::{NodeId, NodeKind, opt_ref};
use crate::graph::node::{
    AssetNode, FrameSlotNode, LayerNode, Node, RecipeNode, RectNode, TemplateNode,
};
use crate::graph::reid::content_id;
use crate::graph::store::GraphStore;

/// Manifest format version written by this crate.
pub const MANIFEST_VERSION: u32 = 1;

/// Named entry points into the graph.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Roots {
    /// Template being edited.
    #[serde(
        default,
        deserialize_with = "opt_ref::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub template: Option<NodeId>,
    /// Recipe being previewed and exported.
    #[serde(
        default,
        deserialize_with = "opt_ref::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub recipe: Option<NodeId>,
    /// Known assets, in insertion order.
    #[serde(default, deserialize_with = "lenient_ids")]
    pub assets: Vec<NodeId>,
    /// Tasks, in run order.
    #[serde(default, deserialize_with = "lenient_ids")]
    pub tasks: Vec<NodeId>,
}

fn lenient_ids<'de, D>(d: D) -> Result<Vec<NodeId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Value::deserialize(d)?;
    Ok(match raw {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.is_empty() => Some(NodeId::from(s)),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// Append `incoming` to `list`, skipping IDs already present. Order is preserved.
pub(crate) fn union_ids(list: &mut Vec<NodeId>, incoming: impl IntoIterator<Item = NodeId>) {
    for id in incoming {
        if !list.contains(&id) {
            list.push(id);
        }
    }
}

/// The JSON file format: `{manifestVersion, nodes, roots}`.
///
/// A manifest may describe a whole graph or any subset of one; stores merge them uniformly.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Declared format version; anything other than [`MANIFEST_VERSION`] merges with a warning.
    pub manifest_version: u32,
    /// Node table.
    pub nodes: BTreeMap<NodeId, Node>,
    /// Root pointers.
    pub roots: Roots,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            manifest_version: MANIFEST_VERSION,
            nodes: BTreeMap::new(),
            roots: Roots::default(),
        }
    }
}

impl<'de> Deserialize<'de> for Manifest {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(d)?;
        Manifest::from_value(raw).map_err(serde::de::Error::custom)
    }
}

impl Manifest {
    /// Parse manifest JSON text.
    pub fn from_json_str(text: &str) -> HexflipResult<Self> {
        let raw: Value = serde_json::from_str(text)
            .map_err(|e| HexflipError::manifest(format!("parse manifest JSON: {e}")))?;
        Self::from_value(raw)
    }

    /// Parse a manifest JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> HexflipResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read manifest '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Build a manifest from an already-parsed JSON value.
    ///
    /// The payload must be an object and `nodes`, when present, must be an object. Entries that
    /// are not objects or lack a `type` tag are skipped; a known node kind with ill-typed fields
    /// fails the whole manifest.
    pub fn from_value(raw: Value) -> HexflipResult<Self> {
        let Value::Object(mut obj) = raw else {
            return Err(HexflipError::manifest("manifest must be a JSON object"));
        };

        let manifest_version = obj
            .get("manifestVersion")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0);

        let mut nodes = BTreeMap::new();
        match obj.remove("nodes") {
            None | Some(Value::Null) => {}
            Some(Value::Object(entries)) => {
                for (id, node) in entries {
                    let has_tag = node.get("type").is_some_and(Value::is_string);
                    if !node.is_object() || !has_tag {
                        tracing::warn!(node = %id, "skipping manifest entry without a type tag");
                        continue;
                    }
                    nodes.insert(NodeId::from(id), Node::from_value(node)?);
                }
            }
            Some(_) => return Err(HexflipError::manifest("manifest 'nodes' must be an object")),
        }

        let roots = match obj.remove("roots") {
            Some(r @ Value::Object(_)) => serde_json::from_value(r)
                .map_err(|e| HexflipError::manifest(format!("malformed manifest roots: {e}")))?,
            None | Some(Value::Null) => Roots::default(),
            Some(_) => {
                tracing::warn!("ignoring manifest 'roots' that is not an object");
                Roots::default()
            }
        };

        Ok(Self {
            manifest_version,
            nodes,
            roots,
        })
    }

    /// Pretty-printed JSON text.
    pub fn to_json_pretty(&self) -> HexflipResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| HexflipError::serde(format!("serialize manifest: {e}")))
    }

    /// Write pretty JSON to `path`, creating parent directories.
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> HexflipResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir '{}'", parent.display()))?;
        }
        std::fs::write(path, self.to_json_pretty()?)
            .with_context(|| format!("write manifest '{}'", path.display()))?;
        Ok(())
    }

    /// The default graph: one empty asset, one 32x32 rect, two 100 ms frames on a 4x4 grid of
    /// 32 px tiles, and one visible layer. All IDs are content hashes.
    pub fn starter() -> Self {
        let mut nodes = BTreeMap::new();
        let mut add = |node: Node| {
            let id = content_id(&node);
            nodes.insert(id.clone(), node);
            id
        };

        let asset = add(Node::Asset(AssetNode {
            name: "(drop image here)".to_string(),
            src: String::new(),
        }));
        let rect = add(Node::Rect(RectNode {
            name: "rect0".to_string(),
            asset: Some(asset.clone()),
            sw: 32.0,
            sh: 32.0,
            dw: 32.0,
            dh: 32.0,
            ..RectNode::default()
        }));
        let frames: Vec<NodeId> = (0..2)
            .map(|i| {
                add(Node::FrameSlot(FrameSlotNode {
                    name: format!("f{i:03}"),
                    duration: 100.0,
                }))
            })
            .collect();
        let template = add(Node::Template(TemplateNode {
            tile_w: 32.0,
            tile_h: 32.0,
            grid_w: 4.0,
            grid_h: 4.0,
            rects: vec![rect.clone()],
            frames,
        }));
        let layer = add(Node::Layer(LayerNode {
            name: "Layer 1".to_string(),
            visible: true,
            asset: Some(asset.clone()),
            default_rect: Some(rect),
            opacity: Some(1.0),
            overrides: BTreeMap::new(),
        }));
        let recipe = add(Node::Recipe(RecipeNode {
            template: Some(template.clone()),
            layers: vec![layer],
        }));

        Self {
            manifest_version: MANIFEST_VERSION,
            nodes,
            roots: Roots {
                template: Some(template),
                recipe: Some(recipe),
                assets: vec![asset],
                tasks: Vec::new(),
            },
        }
    }
}

impl GraphStore {
    /// Template root plus its rects, frames, and the assets those rects reference.
    ///
    /// Returns `None` when there is no Template root.
    pub fn template_manifest(&self) -> Option<Manifest> {
        let tpl_id = self.roots().template.clone()?;
        let tpl = self.get_node(&tpl_id)?.as_template()?;

        let mut out = Manifest::default();
        let mut assets = Vec::new();
        for rid in &tpl.rects {
            if let Some(node @ Node::Rect(r)) = self.get_node(rid) {
                out.nodes.insert(rid.clone(), node.clone());
                union_ids(&mut assets, r.asset.clone());
            }
        }
        for fid in &tpl.frames {
            if let Some(node @ Node::FrameSlot(_)) = self.get_node(fid) {
                out.nodes.insert(fid.clone(), node.clone());
            }
        }
        self.copy_assets_into(&mut out, &assets);
        out.nodes
            .insert(tpl_id.clone(), Node::Template(tpl.clone()));
        out.roots.template = Some(tpl_id);
        out.roots.assets = assets;
        Some(out)
    }

    /// Recipe root plus its layers and the assets those layers reference.
    ///
    /// The template is referenced by ID only. Returns `None` when there is no Recipe root.
    pub fn recipe_manifest(&self) -> Option<Manifest> {
        let rec_id = self.roots().recipe.clone()?;
        let rec = self.get_node(&rec_id)?.as_recipe()?;

        let mut out = Manifest::default();
        let mut assets = Vec::new();
        for lid in &rec.layers {
            if let Some(node @ Node::Layer(l)) = self.get_node(lid) {
                out.nodes.insert(lid.clone(), node.clone());
                union_ids(&mut assets, l.asset.clone());
            }
        }
        self.copy_assets_into(&mut out, &assets);
        out.nodes.insert(rec_id.clone(), Node::Recipe(rec.clone()));
        out.roots.recipe = Some(rec_id);
        out.roots.assets = assets;
        Some(out)
    }

    /// Every Task node. Returns `None` when the store has no tasks.
    pub fn tasks_manifest(&self) -> Option<Manifest> {
        let tasks = self.list_nodes_of_type(NodeKind::Task);
        if tasks.is_empty() {
            return None;
        }
        let mut out = Manifest::default();
        for (id, node) in tasks {
            out.nodes.insert(id.clone(), node.clone());
            out.roots.tasks.push(id.clone());
        }
        Some(out)
    }

    fn copy_assets_into(&self, out: &mut Manifest, assets: &[NodeId]) {
        for aid in assets {
            if let Some(node @ Node::Asset(_)) = self.get_node(aid) {
                out.nodes.insert(aid.clone(), node.clone());
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/manifest.rs"]
mod tests;
