//! hexflip is a content-addressed scene graph for sprite flipbook animations.
//!
//! A document is a set of typed nodes (assets, rects, frame slots, templates, layers, recipes and
//! tasks), each keyed by a hash of its own canonical content. From that graph hexflip builds
//! render plans, composes frames into pixels (`FrameRGBA`) and packs every frame of a recipe into
//! a sprite sheet with JSON metadata.
//!
//! # Pipeline overview
//!
//! 1. **Load**: merge one or more [`Manifest`]s into a [`GraphStore`]
//! 2. **Plan**: `GraphStore + recipe -> RenderPlan` (memoized until the next edit)
//! 3. **Compose**: `RenderPlan + frame index -> FrameRGBA` via a [`Compositor`]
//! 4. **Export** (optional): [`pack_atlas`] lays all frames out on one sheet
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Deterministic**: identical graphs produce identical IDs and identical pixels.
//! - **Explicit IDs**: edits never rename nodes; [`GraphStore::recompute_ids`] re-derives every
//!   hash in one pass and rewrites all references.
//! - **Premultiplied RGBA8** end-to-end: composed frames are premultiplied pixels.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod atlas;
mod collab;
mod foundation;
mod graph;
mod render;

pub use atlas::meta::{AtlasFrameEntry, AtlasFrames, AtlasMeta, AtlasMetadata, FrameBox, Size};
pub use atlas::pack::{Atlas, AtlasLayout, AtlasOpts, DEFAULT_MAX_WIDTH, pack_atlas};
pub use collab::tasks::{CommandSink, TaskRunReport, forward_tasks};
pub use collab::viewer::{ViewerFrame, ViewerLayer, ViewerSnapshot};
pub use foundation::core::{Canvas, FrameRGBA, MAX_CANVAS_PIXELS, PixelRect};
pub use foundation::error::{HexflipError, HexflipResult};
pub use graph::canonical::{canonical_text, canonicalize, make_id};
pub use graph::id::{NodeId, NodeKind};
pub use graph::manifest::{MANIFEST_VERSION, Manifest, Roots};
pub use graph::node::{
    AssetNode, DEFAULT_FRAME_DURATION_MS, FrameSlotNode, LayerNode, Node, Override, RecipeNode,
    RectNode, TaskNode, TemplateNode, UnknownNode,
};
pub use graph::reid::{ReidReport, content_id};
pub use graph::store::GraphStore;
pub use render::blend::{PremulRgba8, over};
pub use render::compositor::{ComposedFrame, Compositor, CompositorOpts, DecodePolicy};
pub use render::decode::{
    DecodeJob, DecodeOutcome, DecodeState, DecodedImage, decode_data_url, decode_image,
};
pub use render::playback::{Playback, Tick};
pub use render::plan::{PlanFrame, PlanLayer, RenderPlan};
