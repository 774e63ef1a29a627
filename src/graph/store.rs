use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use crate::foundation::core::FrameRGBA;
use crate::foundation::error::HexflipResult;
use crate::graph::id::{NodeId, NodeKind};
use crate::graph::manifest::{MANIFEST_VERSION, Manifest, Roots, union_ids};
use crate::graph::node::Node;
use crate::render::compositor::{ComposedFrame, Compositor, CompositorOpts};
use crate::render::plan::{RenderPlan, build_render_plan};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ComposeKey {
    recipe: NodeId,
    frame: usize,
    opts: CompositorOpts,
}

#[derive(Debug, Default)]
struct Caches {
    resolved: HashMap<NodeId, Arc<Node>>,
    plans: HashMap<NodeId, Arc<RenderPlan>>,
    composed: HashMap<ComposeKey, Arc<FrameRGBA>>,
}

impl Caches {
    fn clear(&mut self) {
        self.resolved.clear();
        self.plans.clear();
        self.composed.clear();
    }

    fn is_empty(&self) -> bool {
        self.resolved.is_empty() && self.plans.is_empty() && self.composed.is_empty()
    }
}

/// The document: node table, roots, and the derived caches built from them.
///
/// A store is owned by one logical thread. Every mutation clears all caches before it returns,
/// bumps [`GraphStore::generation`] and marks the store dirty until the next
/// [`GraphStore::recompute_ids`].
#[derive(Debug, Default)]
pub struct GraphStore {
    pub(crate) nodes: BTreeMap<NodeId, Node>,
    pub(crate) roots: Roots,
    caches: Caches,
    generation: u64,
    dirty: bool,
}

impl GraphStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded from a manifest.
    pub fn from_manifest(manifest: Manifest) -> Self {
        let mut store = Self::new();
        store.merge_manifest(manifest);
        store
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when the store holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `true` when a node with `id` exists.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Look up a node.
    pub fn get_node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Insert or replace a node.
    pub fn set_node(&mut self, id: NodeId, node: Node) {
        self.nodes.insert(id, node);
        self.invalidate();
    }

    /// Edit a node in place. Returns `None` (and changes nothing) when `id` is absent.
    pub fn update_node<R>(&mut self, id: &NodeId, f: impl FnOnce(&mut Node) -> R) -> Option<R> {
        let out = f(self.nodes.get_mut(id)?);
        self.invalidate();
        Some(out)
    }

    /// Remove a node without touching anything that references it.
    ///
    /// See [`GraphStore::delete_node`] for removal with reference pruning.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<Node> {
        let removed = self.nodes.remove(id)?;
        self.invalidate();
        Some(removed)
    }

    /// All nodes of `kind`, in ID order.
    pub fn list_nodes_of_type(&self, kind: NodeKind) -> Vec<(&NodeId, &Node)> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.kind() == Some(kind))
            .collect()
    }

    /// Iterate every node in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Node)> {
        self.nodes.iter()
    }

    /// Root pointers.
    pub fn roots(&self) -> &Roots {
        &self.roots
    }

    /// Point the template root at `id`, or clear it.
    pub fn set_template_root(&mut self, id: Option<NodeId>) {
        self.roots.template = id;
        self.invalidate();
    }

    /// Point the recipe root at `id`, or clear it.
    pub fn set_recipe_root(&mut self, id: Option<NodeId>) {
        self.roots.recipe = id;
        self.invalidate();
    }

    /// Append an asset root unless it is already listed.
    pub fn push_asset_root(&mut self, id: NodeId) {
        union_ids(&mut self.roots.assets, [id]);
        self.invalidate();
    }

    /// Append a task root unless it is already listed.
    pub fn push_task_root(&mut self, id: NodeId) {
        union_ids(&mut self.roots.tasks, [id]);
        self.invalidate();
    }

    /// Merge a manifest: same-ID nodes are overwritten, scalar roots overwritten when present,
    /// root arrays unioned in order. Returns the number of nodes merged.
    pub fn merge_manifest(&mut self, manifest: Manifest) -> usize {
        if manifest.manifest_version != MANIFEST_VERSION {
            tracing::warn!(
                version = manifest.manifest_version,
                expected = MANIFEST_VERSION,
                "manifest version mismatch; merging anyway"
            );
        }
        let Manifest { nodes, roots, .. } = manifest;
        let merged = nodes.len();
        self.nodes.extend(nodes);
        if roots.template.is_some() {
            self.roots.template = roots.template;
        }
        if roots.recipe.is_some() {
            self.roots.recipe = roots.recipe;
        }
        union_ids(&mut self.roots.assets, roots.assets);
        union_ids(&mut self.roots.tasks, roots.tasks);
        self.invalidate();
        tracing::debug!(merged, total = self.nodes.len(), "merged manifest");
        merged
    }

    /// Parse and merge manifest JSON text. On error the store is left untouched.
    pub fn merge_manifest_str(&mut self, text: &str) -> HexflipResult<usize> {
        let manifest = Manifest::from_json_str(text)?;
        Ok(self.merge_manifest(manifest))
    }

    /// Read, parse and merge a manifest file. On error the store is left untouched.
    pub fn merge_manifest_path(&mut self, path: impl AsRef<Path>) -> HexflipResult<usize> {
        let manifest = Manifest::from_path(path)?;
        Ok(self.merge_manifest(manifest))
    }

    /// Drop every node and root, then merge `manifest`.
    pub fn replace_with_manifest(&mut self, manifest: Manifest) -> usize {
        self.nodes.clear();
        self.roots = Roots::default();
        self.merge_manifest(manifest)
    }

    /// Full manifest of the current state.
    pub fn snapshot(&self) -> Manifest {
        Manifest {
            manifest_version: MANIFEST_VERSION,
            nodes: self.nodes.clone(),
            roots: self.roots.clone(),
        }
    }

    /// Fill in the starter graph when the template or recipe root is missing.
    ///
    /// Existing nodes and roots are kept. Returns `true` when anything was added.
    pub fn ensure_defaults(&mut self) -> bool {
        if self.roots.template.is_some() && self.roots.recipe.is_some() {
            return false;
        }
        let starter = Manifest::starter();
        for (id, node) in starter.nodes {
            self.nodes.entry(id).or_insert(node);
        }
        if self.roots.template.is_none() {
            self.roots.template = starter.roots.template;
        }
        if self.roots.recipe.is_none() {
            self.roots.recipe = starter.roots.recipe;
        }
        union_ids(&mut self.roots.assets, starter.roots.assets);
        self.invalidate();
        true
    }

    /// Clear every cache, bump the generation and mark the store dirty.
    pub fn invalidate(&mut self) {
        if !self.caches.is_empty() {
            tracing::debug!(generation = self.generation, "clearing graph caches");
        }
        self.caches.clear();
        self.generation = self.generation.wrapping_add(1);
        self.dirty = true;
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Mutation counter; plans record the generation they were built from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `true` when edits happened since the last re-identification.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Shared handle to a node, memoized until the next mutation.
    pub fn resolve(&mut self, id: &NodeId) -> Option<Arc<Node>> {
        if let Some(hit) = self.caches.resolved.get(id) {
            return Some(Arc::clone(hit));
        }
        let node = Arc::new(self.nodes.get(id)?.clone());
        self.caches
            .resolved
            .insert(id.clone(), Arc::clone(&node));
        Some(node)
    }

    /// Render plan for `recipe`, memoized until the next mutation.
    pub fn build_plan(&mut self, recipe: &NodeId) -> Option<Arc<RenderPlan>> {
        if let Some(hit) = self.caches.plans.get(recipe) {
            return Some(Arc::clone(hit));
        }
        let generation = self.generation;
        let plan = Arc::new(build_render_plan(recipe, generation, &mut |id| {
            self.resolve(id)
        })?);
        self.caches
            .plans
            .insert(recipe.clone(), Arc::clone(&plan));
        Some(plan)
    }

    /// Compose frame `index` of `recipe` with `compositor`.
    ///
    /// Complete frames are memoized per recipe, index and compositor options until the next
    /// mutation. Frames drawn while a decode is pending are returned but not cached.
    pub fn compose_frame(
        &mut self,
        compositor: &mut Compositor,
        recipe: &NodeId,
        index: usize,
    ) -> Option<ComposedFrame> {
        let key = ComposeKey {
            recipe: recipe.clone(),
            frame: index,
            opts: *compositor.opts(),
        };
        if let Some(hit) = self.caches.composed.get(&key) {
            return Some(ComposedFrame {
                frame: Arc::clone(hit),
                complete: true,
            });
        }
        let plan = self.build_plan(recipe)?;
        let composed = compositor.compose_frame(&plan, index);
        if composed.complete {
            self.caches
                .composed
                .insert(key, Arc::clone(&composed.frame));
        }
        Some(composed)
    }

    #[cfg(test)]
    pub(crate) fn cache_sizes(&self) -> (usize, usize, usize) {
        (
            self.caches.resolved.len(),
            self.caches.plans.len(),
            self.caches.composed.len(),
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/store.rs"]
mod tests;
