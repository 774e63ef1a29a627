//! Editing operations on the root template and recipe.

use serde_json::Value;

use crate::foundation::error::{HexflipError, HexflipResult};
use crate::graph::canonical::make_id;
use crate::graph::id::NodeId;
use crate::graph::node::{
    AssetNode, DEFAULT_FRAME_DURATION_MS, FrameSlotNode, LayerNode, Node, Override, RectNode,
    TaskNode,
};
use crate::graph::reid::{content_id, node_payload};
use crate::graph::store::GraphStore;

impl GraphStore {
    /// Fresh ID for `node`: its content hash, salted until it no longer clashes with a stored ID.
    pub fn mint_id(&self, node: &Node) -> NodeId {
        let base = content_id(node);
        if !self.contains(&base) {
            return base;
        }
        let (Some(kind), Some(payload)) = (node.kind(), node_payload(node, &mut NodeId::clone))
        else {
            return base;
        };
        let Value::Object(mut payload) = payload else {
            return base;
        };
        let mut salt = 1u64;
        loop {
            payload.insert("__mint".into(), Value::from(salt));
            let id = make_id(kind.namespace(), kind.as_str(), &Value::Object(payload.clone()));
            if !self.contains(&id) {
                return id;
            }
            salt += 1;
        }
    }

    fn insert_minted(&mut self, node: Node) -> NodeId {
        let id = self.mint_id(&node);
        self.nodes.insert(id.clone(), node);
        id
    }

    fn template_root_id(&self) -> HexflipResult<NodeId> {
        self.roots
            .template
            .clone()
            .filter(|id| matches!(self.nodes.get(id), Some(Node::Template(_))))
            .ok_or_else(|| HexflipError::validation("store has no Template root"))
    }

    fn recipe_root_id(&self) -> HexflipResult<NodeId> {
        self.roots
            .recipe
            .clone()
            .filter(|id| matches!(self.nodes.get(id), Some(Node::Recipe(_))))
            .ok_or_else(|| HexflipError::validation("store has no Recipe root"))
    }

    /// Add an Asset and list it under `roots.assets`.
    pub fn add_asset(&mut self, name: impl Into<String>, src: impl Into<String>) -> NodeId {
        let id = self.insert_minted(Node::Asset(AssetNode {
            name: name.into(),
            src: src.into(),
        }));
        self.push_asset_root(id.clone());
        id
    }

    /// Append a 32x32 Rect on the first root asset to the template root.
    pub fn add_rect(&mut self) -> HexflipResult<NodeId> {
        let tpl_id = self.template_root_id()?;
        let n = self.nodes[&tpl_id].as_template().map_or(0, |t| t.rects.len());
        let rect = RectNode {
            name: format!("rect{n}"),
            asset: self.roots.assets.first().cloned(),
            sw: 32.0,
            sh: 32.0,
            dw: 32.0,
            dh: 32.0,
            ..RectNode::default()
        };
        let id = self.insert_minted(Node::Rect(rect));
        if let Some(Node::Template(t)) = self.nodes.get_mut(&tpl_id) {
            t.rects.push(id.clone());
        }
        self.invalidate();
        Ok(id)
    }

    /// Append a default-duration FrameSlot named `fNNN` to the template root.
    pub fn add_frame_slot(&mut self) -> HexflipResult<NodeId> {
        let tpl_id = self.template_root_id()?;
        let idx = self.nodes[&tpl_id].as_template().map_or(0, |t| t.frames.len());
        let id = self.insert_minted(Node::FrameSlot(FrameSlotNode {
            name: format!("f{idx:03}"),
            duration: f64::from(DEFAULT_FRAME_DURATION_MS),
        }));
        if let Some(Node::Template(t)) = self.nodes.get_mut(&tpl_id) {
            t.frames.push(id.clone());
        }
        self.invalidate();
        Ok(id)
    }

    /// Append a visible Layer on the first root asset and the template's first rect.
    pub fn add_layer(&mut self) -> HexflipResult<NodeId> {
        let rec_id = self.recipe_root_id()?;
        let rec = self.nodes[&rec_id].as_recipe().cloned().unwrap_or_default();
        let default_rect = rec
            .template
            .as_ref()
            .and_then(|t| self.nodes.get(t))
            .and_then(Node::as_template)
            .and_then(|t| t.rects.first().cloned());
        let layer = LayerNode {
            name: format!("Layer {}", rec.layers.len() + 1),
            visible: true,
            asset: self.roots.assets.first().cloned(),
            default_rect,
            opacity: Some(1.0),
            ..LayerNode::default()
        };
        let id = self.insert_minted(Node::Layer(layer));
        if let Some(Node::Recipe(r)) = self.nodes.get_mut(&rec_id) {
            r.layers.push(id.clone());
        }
        self.invalidate();
        Ok(id)
    }

    /// Add an empty Task and list it under `roots.tasks`.
    pub fn add_task(&mut self) -> NodeId {
        let name = format!("Task {}", self.roots.tasks.len() + 1);
        let id = self.insert_minted(Node::Task(TaskNode {
            name,
            commands: Vec::new(),
        }));
        self.push_task_root(id.clone());
        id
    }

    /// Replace a task's name and command list.
    pub fn set_task(
        &mut self,
        id: &NodeId,
        name: impl Into<String>,
        commands: Vec<Value>,
    ) -> HexflipResult<()> {
        let Some(Node::Task(task)) = self.nodes.get_mut(id) else {
            return Err(HexflipError::validation(format!("{id} is not a Task")));
        };
        task.name = name.into();
        task.commands = commands;
        self.invalidate();
        Ok(())
    }

    /// Set `layer`'s override for `frame`. An empty override removes the entry.
    pub fn set_override(
        &mut self,
        layer: &NodeId,
        frame: &NodeId,
        ov: Override,
    ) -> HexflipResult<()> {
        let Some(Node::Layer(l)) = self.nodes.get_mut(layer) else {
            return Err(HexflipError::validation(format!("{layer} is not a Layer")));
        };
        if ov.is_empty() {
            l.overrides.remove(frame);
        } else {
            l.overrides.insert(frame.clone(), ov);
        }
        self.invalidate();
        Ok(())
    }

    /// Drop `layer`'s override for `frame`. Returns `true` when one existed.
    pub fn clear_override(&mut self, layer: &NodeId, frame: &NodeId) -> HexflipResult<bool> {
        let Some(Node::Layer(l)) = self.nodes.get_mut(layer) else {
            return Err(HexflipError::validation(format!("{layer} is not a Layer")));
        };
        let removed = l.overrides.remove(frame).is_some();
        if removed {
            self.invalidate();
        }
        Ok(removed)
    }

    /// Set the template root's tile size and grid, each clamped to at least 1.
    pub fn set_template_tiling(
        &mut self,
        tile_w: f64,
        tile_h: f64,
        grid_w: f64,
        grid_h: f64,
    ) -> HexflipResult<()> {
        let tpl_id = self.template_root_id()?;
        let clamp = |v: f64| if v.is_finite() { v.max(1.0) } else { 1.0 };
        if let Some(Node::Template(t)) = self.nodes.get_mut(&tpl_id) {
            t.tile_w = clamp(tile_w);
            t.tile_h = clamp(tile_h);
            t.grid_w = clamp(grid_w);
            t.grid_h = clamp(grid_h);
        }
        self.invalidate();
        Ok(())
    }

    /// Point the recipe root at another template.
    pub fn set_recipe_template(&mut self, template: Option<NodeId>) -> HexflipResult<()> {
        let rec_id = self.recipe_root_id()?;
        if let Some(Node::Recipe(r)) = self.nodes.get_mut(&rec_id) {
            r.template = template;
        }
        self.invalidate();
        Ok(())
    }

    /// Remove a node and prune every reference to it, including root pointers.
    pub fn delete_node(&mut self, id: &NodeId) -> Option<Node> {
        let removed = self.nodes.remove(id)?;
        let mut touched = 0usize;
        for node in self.nodes.values_mut() {
            if node.prune_references_to(id) {
                touched += 1;
            }
        }
        if self.roots.template.as_ref() == Some(id) {
            self.roots.template = None;
        }
        if self.roots.recipe.as_ref() == Some(id) {
            self.roots.recipe = None;
        }
        self.roots.assets.retain(|a| a != id);
        self.roots.tasks.retain(|t| t != id);
        tracing::debug!(node = %id, touched, "deleted node");
        self.invalidate();
        Some(removed)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/edit.rs"]
mod tests;
