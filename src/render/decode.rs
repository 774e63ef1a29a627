use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use base64::Engine as _;

use crate::foundation::error::{HexflipError, HexflipResult};
use crate::foundation::math::{fnv1a64, mul_div255_u8};
use crate::graph::id::NodeId;

#[derive(Clone, Debug, PartialEq, Eq)]
/// A decoded asset image in premultiplied RGBA8.
pub struct DecodedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Tightly packed premultiplied RGBA8 rows.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl DecodedImage {
    /// Premultiplied pixel at `(x, y)`, or `None` when outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let px = self.rgba8_premul.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Decode encoded image bytes and convert to premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> HexflipResult<DecodedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(DecodedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

/// Decode a `data:image/<fmt>;base64,<payload>` URL.
pub fn decode_data_url(src: &str) -> HexflipResult<DecodedImage> {
    let rest = src
        .strip_prefix("data:image/")
        .ok_or_else(|| HexflipError::decode("asset src is not a data:image/ URL"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| HexflipError::decode("data URL has no payload"))?;
    if !header.ends_with(";base64") {
        return Err(HexflipError::decode("data URL is not base64 encoded"));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| HexflipError::decode(format!("invalid base64 payload: {e}")))?;
    decode_image(&bytes)
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = mul_div255_u8(u16::from(px[0]), a);
        px[1] = mul_div255_u8(u16::from(px[1]), a);
        px[2] = mul_div255_u8(u16::from(px[2]), a);
    }
}

#[derive(Clone, Debug, PartialEq)]
/// Decode status of one asset.
pub enum DecodeState {
    /// A [`DecodeJob`] has been handed out and not completed yet.
    Pending,
    /// Decoded and ready to draw.
    Ready(Arc<DecodedImage>),
    /// Empty, malformed or undecodable source.
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// A unit of decode work that any thread can run.
pub struct DecodeJob {
    /// Asset being decoded.
    pub asset: NodeId,
    /// The asset's `src` at the time the job was issued.
    pub src: String,
    /// Plan generation the job was issued for.
    pub generation: u64,
}

#[derive(Clone, Debug)]
/// Result of [`DecodeJob::run`], handed back to the cache.
pub struct DecodeOutcome {
    /// Asset that was decoded.
    pub asset: NodeId,
    /// Fingerprint of the decoded `src`.
    pub fingerprint: u64,
    /// Generation the job was issued for.
    pub generation: u64,
    /// Decoded image or failure message.
    pub result: Result<Arc<DecodedImage>, String>,
}

impl DecodeJob {
    /// Decode the job's source.
    pub fn run(&self) -> DecodeOutcome {
        DecodeOutcome {
            asset: self.asset.clone(),
            fingerprint: src_fingerprint(&self.src),
            generation: self.generation,
            result: decode_src(&self.src),
        }
    }
}

pub(crate) fn src_fingerprint(src: &str) -> u64 {
    fnv1a64(src.as_bytes())
}

pub(crate) fn decode_src(src: &str) -> Result<Arc<DecodedImage>, String> {
    if src.is_empty() {
        return Err("asset has no image data".to_string());
    }
    decode_data_url(src)
        .map(Arc::new)
        .map_err(|e| e.to_string())
}

#[derive(Clone, Debug)]
struct CacheEntry {
    fingerprint: u64,
    generation: u64,
    state: DecodeState,
}

/// Per-compositor decode cache keyed by asset ID.
///
/// Entries remember the fingerprint of the `src` they were decoded from, so an edited asset is
/// re-decoded. Failures are retried once the store generation moves on.
#[derive(Clone, Debug, Default)]
pub(crate) struct DecodeCache {
    entries: HashMap<NodeId, CacheEntry>,
    decodes: u64,
    seen_generation: Option<u64>,
}

impl DecodeCache {
    /// On the first call for a new `generation`, drop every entry `keep` rejects.
    pub(crate) fn retain_for_generation(&mut self, generation: u64, keep: impl Fn(&NodeId) -> bool) {
        if self.seen_generation == Some(generation) {
            return;
        }
        self.seen_generation = Some(generation);
        let before = self.entries.len();
        self.entries.retain(|id, _| keep(id));
        let evicted = before - self.entries.len();
        if evicted > 0 {
            tracing::debug!(evicted, generation, "evicted unreferenced decoded assets");
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Cached state for `asset` if it is still valid for `src` at `generation`.
    pub(crate) fn lookup(&self, asset: &NodeId, src: &str, generation: u64) -> Option<&DecodeState> {
        let entry = self.entries.get(asset)?;
        if entry.fingerprint != src_fingerprint(src) {
            return None;
        }
        if matches!(entry.state, DecodeState::Failed(_)) && entry.generation != generation {
            return None;
        }
        Some(&entry.state)
    }

    pub(crate) fn mark_pending(&mut self, asset: &NodeId, src: &str, generation: u64) {
        self.entries.insert(
            asset.clone(),
            CacheEntry {
                fingerprint: src_fingerprint(src),
                generation,
                state: DecodeState::Pending,
            },
        );
    }

    /// Store a finished decode. Outcomes for a `src` that has since changed are dropped.
    pub(crate) fn complete(&mut self, outcome: DecodeOutcome) -> bool {
        if let Some(existing) = self.entries.get(&outcome.asset)
            && existing.fingerprint != outcome.fingerprint
        {
            tracing::debug!(asset = %outcome.asset, "dropping stale decode outcome");
            return false;
        }
        self.decodes += 1;
        let state = match outcome.result {
            Ok(img) => {
                tracing::debug!(asset = %outcome.asset, w = img.width, h = img.height, "decoded asset");
                DecodeState::Ready(img)
            }
            Err(msg) => {
                tracing::debug!(asset = %outcome.asset, error = %msg, "asset decode failed");
                DecodeState::Failed(msg)
            }
        };
        self.entries.insert(
            outcome.asset,
            CacheEntry {
                fingerprint: outcome.fingerprint,
                generation: outcome.generation,
                state,
            },
        );
        true
    }

    pub(crate) fn state(&self, asset: &NodeId) -> Option<&DecodeState> {
        self.entries.get(asset).map(|e| &e.state)
    }

    pub(crate) fn decode_count(&self) -> u64 {
        self.decodes
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/decode.rs"]
mod tests;
