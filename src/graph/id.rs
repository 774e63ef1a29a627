use std::fmt;

use crate::foundation::error::{HexflipError, HexflipResult};

/// Namespaced content-hash identifier of the form `<namespace>:0x<16 hex digits>`.
///
/// IDs are plain strings on the wire. Freshly loaded manifests may carry IDs that were minted by
/// other tools, so construction from a string never validates; use [`NodeId::parse`] when the
/// shape matters.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Build an ID from a namespace and a 64-bit hash.
    pub fn from_hash(namespace: &str, hash: u64) -> Self {
        Self(format!("{namespace}:0x{hash:016x}"))
    }

    /// Parse and validate the `<namespace>:0x<16 lowercase hex>` shape.
    pub fn parse(s: &str) -> HexflipResult<Self> {
        let (ns, rest) = s
            .split_once(':')
            .ok_or_else(|| HexflipError::validation(format!("node id '{s}' has no namespace")))?;
        if ns.is_empty() {
            return Err(HexflipError::validation(format!(
                "node id '{s}' has an empty namespace"
            )));
        }
        let hex = rest
            .strip_prefix("0x")
            .ok_or_else(|| HexflipError::validation(format!("node id '{s}' lacks 0x prefix")))?;
        let well_formed = hex.len() == 16
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(HexflipError::validation(format!(
                "node id '{s}' must end in 16 lowercase hex digits"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Borrow the raw string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace prefix (`asset`, `tpl`, `anim`, `tsk`, ...), if the ID has one.
    pub fn namespace(&self) -> Option<&str> {
        self.0.split_once(':').map(|(ns, _)| ns)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The seven node kinds understood by the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeKind {
    /// Embedded raster image.
    Asset,
    /// Named source/destination box on an asset.
    Rect,
    /// One timeline tick.
    FrameSlot,
    /// Output grid plus the rect and frame lists.
    Template,
    /// One compositing layer with per-frame overrides.
    Layer,
    /// Animation root: template plus ordered layers.
    Recipe,
    /// Opaque command list owned by the task runner.
    Task,
}

impl NodeKind {
    /// Re-identification visiting order; referenced kinds come before referencing kinds.
    pub const REID_ORDER: [NodeKind; 7] = [
        NodeKind::Asset,
        NodeKind::Rect,
        NodeKind::FrameSlot,
        NodeKind::Layer,
        NodeKind::Template,
        NodeKind::Recipe,
        NodeKind::Task,
    ];

    /// The `type` tag used in manifests.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Asset => "Asset",
            NodeKind::Rect => "Rect",
            NodeKind::FrameSlot => "FrameSlot",
            NodeKind::Template => "Template",
            NodeKind::Layer => "Layer",
            NodeKind::Recipe => "Recipe",
            NodeKind::Task => "Task",
        }
    }

    /// Parse a manifest `type` tag.
    pub fn parse(tag: &str) -> Option<Self> {
        Self::REID_ORDER.into_iter().find(|k| k.as_str() == tag)
    }

    /// ID namespace used when hashing nodes of this kind.
    pub fn namespace(self) -> &'static str {
        match self {
            NodeKind::Asset => "asset",
            NodeKind::Rect | NodeKind::FrameSlot | NodeKind::Template => "tpl",
            NodeKind::Layer | NodeKind::Recipe => "anim",
            NodeKind::Task => "tsk",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serde helper for optional references: `""`, `null` and a missing field all read as absent.
pub(crate) mod opt_ref {
    use serde::Deserialize;

    use super::NodeId;

    pub(crate) fn deserialize<'de, D>(d: D) -> Result<Option<NodeId>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.filter(|s| !s.is_empty()).map(NodeId::from))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/id.rs"]
mod tests;
