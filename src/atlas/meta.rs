//! Sprite-sheet JSON metadata in the common `{frames, meta}` hash layout.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::graph::node::serialize_ms;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Pixel box on the sheet.
pub struct FrameBox {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub w: u32,
    /// Height.
    pub h: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Width and height pair.
pub struct Size {
    /// Width.
    pub w: u32,
    /// Height.
    pub h: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Placement and timing of one frame.
pub struct AtlasFrameEntry {
    /// Slot on the sheet.
    pub frame: FrameBox,
    /// Always `false`.
    pub rotated: bool,
    /// Always `false`.
    pub trimmed: bool,
    /// Untrimmed box within the source frame.
    pub sprite_source_size: FrameBox,
    /// Source frame size.
    pub source_size: Size,
    /// Milliseconds, at least 1.
    #[serde(serialize_with = "serialize_ms")]
    pub duration: f64,
}

/// Frame entries keyed by name, serialized in insertion order.
///
/// Inserting a name twice keeps its first position and the last value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AtlasFrames(Vec<(String, AtlasFrameEntry)>);

impl AtlasFrames {
    /// Insert or replace `name`.
    pub fn insert(&mut self, name: String, entry: AtlasFrameEntry) {
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = entry,
            None => self.0.push((name, entry)),
        }
    }

    /// Entry for `name`.
    pub fn get(&self, name: &str) -> Option<&AtlasFrameEntry> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when no frames were recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AtlasFrameEntry)> {
        self.0.iter().map(|(n, e)| (n.as_str(), e))
    }
}

impl Serialize for AtlasFrames {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.0.len()))?;
        for (name, entry) in &self.0 {
            map.serialize_entry(name, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AtlasFrames {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct FramesVisitor;

        impl<'de> Visitor<'de> for FramesVisitor {
            type Value = AtlasFrames;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map of frame name to frame entry")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = AtlasFrames::default();
                while let Some((name, entry)) = access.next_entry::<String, AtlasFrameEntry>()? {
                    out.insert(name, entry);
                }
                Ok(out)
            }
        }

        d.deserialize_map(FramesVisitor)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Sheet-level metadata.
pub struct AtlasMeta {
    /// Producing application.
    pub app: String,
    /// Producer version.
    pub version: String,
    /// Sheet image file name.
    pub image: String,
    /// Always `RGBA8888`.
    pub format: String,
    /// Sheet size.
    pub size: Size,
    /// Always `"1"`.
    pub scale: String,
    /// Always empty.
    pub frame_tags: Vec<serde_json::Value>,
}

impl AtlasMeta {
    pub(crate) fn new(image: &str, size: Size) -> Self {
        Self {
            app: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            image: image.to_string(),
            format: "RGBA8888".to_string(),
            size,
            scale: "1".to_string(),
            frame_tags: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// The `atlas.json` document.
pub struct AtlasMetadata {
    /// Per-frame entries.
    pub frames: AtlasFrames,
    /// Sheet metadata.
    pub meta: AtlasMeta,
}

#[cfg(test)]
#[path = "../../tests/unit/atlas/meta.rs"]
mod tests;
