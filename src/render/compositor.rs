use std::sync::Arc;

use rayon::prelude::*;

use crate::foundation::core::{Canvas, FrameRGBA, PixelRect};
use crate::foundation::math::{clamp01, finite_or_zero};
use crate::graph::id::NodeId;
use crate::render::blend::{PremulRgba8, opaque, over_at};
use crate::render::decode::{DecodeCache, DecodeJob, DecodeOutcome, DecodeState, DecodedImage};
use crate::render::plan::RenderPlan;

const CHECKER_EVEN: PremulRgba8 = opaque(0x0c, 0x11, 0x18);
const CHECKER_ODD: PremulRgba8 = opaque(0x0a, 0x0e, 0x14);

const PLACEHOLDER: PremulRgba8 = opaque(255, 204, 102);
const PLACEHOLDER_FILL_OPACITY: f32 = 0.16;
const PLACEHOLDER_BORDER_OPACITY: f32 = 0.44;
const PLACEHOLDER_LABEL_OPACITY: f32 = 0.68;
const PLACEHOLDER_BORDER_PX: f64 = 2.0;
const PLACEHOLDER_LABEL: &str = "missing asset";
const LABEL_INSET: f64 = 4.0;
const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;
const GLYPH_ADVANCE: u32 = 6;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
/// When asset decoding happens.
pub enum DecodePolicy {
    /// Decode missing assets inline (fanned out over rayon) before drawing.
    #[default]
    Eager,
    /// Mark missing assets pending and hand out [`DecodeJob`]s instead.
    Deferred,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Compositor options.
pub struct CompositorOpts {
    /// Draw the debug checkerboard background; otherwise start from transparent.
    pub checkerboard: bool,
    /// Checkerboard cell size in pixels.
    pub checker_cell: u32,
    /// Decode scheduling.
    pub decode: DecodePolicy,
}

impl Default for CompositorOpts {
    fn default() -> Self {
        Self {
            checkerboard: true,
            checker_cell: 8,
            decode: DecodePolicy::Eager,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// A composed frame and whether every asset it needed was available.
pub struct ComposedFrame {
    /// Premultiplied pixels.
    pub frame: Arc<FrameRGBA>,
    /// `false` when a decode was still pending; such frames are drawn with placeholders.
    pub complete: bool,
}

/// Turns a [`RenderPlan`] and a frame index into pixels.
///
/// Each compositor owns its decode cache. Composition itself only reads the cache, so
/// [`Compositor::compose_prepared`] can run on many threads once [`Compositor::prepare_plan`]
/// has run.
#[derive(Debug, Default)]
pub struct Compositor {
    opts: CompositorOpts,
    cache: DecodeCache,
    pending_jobs: Vec<DecodeJob>,
}

impl Compositor {
    /// New compositor with an empty decode cache.
    pub fn new(opts: CompositorOpts) -> Self {
        Self {
            opts,
            cache: DecodeCache::default(),
            pending_jobs: Vec::new(),
        }
    }

    /// Active options.
    pub fn opts(&self) -> &CompositorOpts {
        &self.opts
    }

    /// Make sure every asset in `plan` is decoded, pending or failed.
    ///
    /// The first plan seen at a new store generation evicts decoded images of assets it no
    /// longer references.
    ///
    /// Returns the number of assets still pending.
    pub fn prepare_plan(&mut self, plan: &RenderPlan) -> usize {
        self.cache
            .retain_for_generation(plan.generation, |id| plan.assets.contains_key(id));
        let mut missing = Vec::new();
        for (id, asset) in &plan.assets {
            if asset.src.is_empty() {
                continue;
            }
            if self.cache.lookup(id, &asset.src, plan.generation).is_none() {
                missing.push(DecodeJob {
                    asset: id.clone(),
                    src: asset.src.clone(),
                    generation: plan.generation,
                });
            }
        }

        match self.opts.decode {
            DecodePolicy::Eager if !missing.is_empty() => {
                let outcomes: Vec<DecodeOutcome> = missing.par_iter().map(DecodeJob::run).collect();
                for outcome in outcomes {
                    self.cache.complete(outcome);
                }
            }
            DecodePolicy::Eager => {}
            DecodePolicy::Deferred => {
                for job in missing {
                    self.cache.mark_pending(&job.asset, &job.src, job.generation);
                    self.pending_jobs.push(job);
                }
            }
        }

        plan.assets
            .iter()
            .filter(|(id, a)| {
                matches!(
                    self.cache.lookup(id, &a.src, plan.generation),
                    Some(DecodeState::Pending)
                )
            })
            .count()
    }

    /// Prepare `plan` and compose frame `index`.
    pub fn compose_frame(&mut self, plan: &RenderPlan, index: usize) -> ComposedFrame {
        self.prepare_plan(plan);
        self.compose_prepared(plan, index)
    }

    /// Compose frame `index` using only what the decode cache already holds.
    ///
    /// Assets that are not ready yet are drawn as placeholders and make the frame incomplete.
    /// A plan whose canvas exceeds [`crate::MAX_CANVAS_PIXELS`] yields an empty, incomplete frame.
    pub fn compose_prepared(&self, plan: &RenderPlan, index: usize) -> ComposedFrame {
        if !plan.canvas.fits_pixel_budget() {
            tracing::warn!(
                width = plan.canvas.width,
                height = plan.canvas.height,
                "plan canvas exceeds the pixel budget; nothing drawn"
            );
            return ComposedFrame {
                frame: Arc::new(FrameRGBA::transparent(Canvas {
                    width: 0,
                    height: 0,
                })),
                complete: false,
            };
        }
        let mut frame = self.background(plan.canvas);
        let mut complete = true;

        let Some(slot) = plan.frames.get(index) else {
            return ComposedFrame {
                frame: Arc::new(frame),
                complete,
            };
        };

        for pl in &plan.layers {
            let layer = &pl.layer;
            if !layer.visible {
                continue;
            }
            let ov = layer.override_for(&slot.id);
            let rect_id = ov
                .and_then(|o| o.rect.as_ref())
                .or(layer.default_rect.as_ref());
            let Some(rect) = rect_id.and_then(|id| plan.rects.get(id)) else {
                continue;
            };

            let opacity = layer.effective_opacity() * ov.and_then(|o| o.opacity).map_or(1.0, clamp01);
            let dx = finite_or_zero(rect.dx) + ov.and_then(|o| o.dx).map_or(0.0, finite_or_zero);
            let dy = finite_or_zero(rect.dy) + ov.and_then(|o| o.dy).map_or(0.0, finite_or_zero);
            let (dw, dh) = rect.dest_size();
            let dest = PixelRect::new(dx, dy, dx + dw, dy + dh);

            let asset_id = layer.asset.as_ref().or(rect.asset.as_ref());
            match self.asset_image(plan, asset_id) {
                AssetImage::Ready(img) => {
                    let src = PixelRect::new(
                        finite_or_zero(rect.sx),
                        finite_or_zero(rect.sy),
                        finite_or_zero(rect.sx) + finite_or_zero(rect.sw),
                        finite_or_zero(rect.sy) + finite_or_zero(rect.sh),
                    );
                    blit_nearest(&mut frame, &img, src, dest, opacity as f32);
                }
                AssetImage::Pending => {
                    complete = false;
                    draw_placeholder(&mut frame, dest);
                }
                AssetImage::Unavailable => draw_placeholder(&mut frame, dest),
            }
        }

        ComposedFrame {
            frame: Arc::new(frame),
            complete,
        }
    }

    /// Take every decode job issued under [`DecodePolicy::Deferred`] so far.
    pub fn take_decode_jobs(&mut self) -> Vec<DecodeJob> {
        std::mem::take(&mut self.pending_jobs)
    }

    /// Feed back the outcome of a [`DecodeJob`]. Returns `false` for stale outcomes.
    pub fn complete(&mut self, outcome: DecodeOutcome) -> bool {
        self.cache.complete(outcome)
    }

    /// Current decode state of `asset`, if it was ever requested.
    pub fn decode_state(&self, asset: &NodeId) -> Option<&DecodeState> {
        self.cache.state(asset)
    }

    /// Number of decodes recorded by this compositor.
    pub fn decode_count(&self) -> u64 {
        self.cache.decode_count()
    }

    /// Number of assets the decode cache currently holds an entry for.
    pub fn cached_assets(&self) -> usize {
        self.cache.len()
    }

    fn background(&self, canvas: Canvas) -> FrameRGBA {
        let mut frame = FrameRGBA::transparent(canvas);
        if !self.opts.checkerboard {
            return frame;
        }
        let cell = self.opts.checker_cell.max(1);
        for (i, px) in frame.data.chunks_exact_mut(4).enumerate() {
            let x = (i % canvas.width as usize) as u32;
            let y = (i / canvas.width as usize) as u32;
            let color = if (x / cell + y / cell) % 2 == 0 {
                CHECKER_EVEN
            } else {
                CHECKER_ODD
            };
            px.copy_from_slice(&color);
        }
        frame
    }

    fn asset_image(&self, plan: &RenderPlan, asset: Option<&NodeId>) -> AssetImage {
        let Some((id, node)) = asset.and_then(|id| plan.assets.get_key_value(id)) else {
            return AssetImage::Unavailable;
        };
        if node.src.is_empty() {
            return AssetImage::Unavailable;
        }
        match self.cache.lookup(id, &node.src, plan.generation) {
            Some(DecodeState::Ready(img)) => AssetImage::Ready(Arc::clone(img)),
            Some(DecodeState::Failed(_)) => AssetImage::Unavailable,
            Some(DecodeState::Pending) | None => AssetImage::Pending,
        }
    }
}

enum AssetImage {
    Ready(Arc<DecodedImage>),
    Pending,
    Unavailable,
}

/// Integer pixel span whose centers fall inside `r`, clipped to `canvas`.
fn covered_span(r: PixelRect, canvas: Canvas) -> Option<(u32, u32, u32, u32)> {
    if !(r.width() > 0.0 && r.height() > 0.0) {
        return None;
    }
    let lo = |v: f64, max: u32| (v - 0.5).ceil().clamp(0.0, f64::from(max)) as u32;
    let (x0, x1) = (lo(r.x0, canvas.width), lo(r.x1, canvas.width));
    let (y0, y1) = (lo(r.y0, canvas.height), lo(r.y1, canvas.height));
    (x0 < x1 && y0 < y1).then_some((x0, x1, y0, y1))
}

/// Nearest-neighbor copy of `src` (in image pixels) onto `dest` (in frame pixels).
fn blit_nearest(
    frame: &mut FrameRGBA,
    img: &DecodedImage,
    src: PixelRect,
    dest: PixelRect,
    opacity: f32,
) {
    if src.width() <= 0.0 || src.height() <= 0.0 {
        return;
    }
    let Some((x0, x1, y0, y1)) = covered_span(dest, frame.canvas()) else {
        return;
    };
    let (sx_scale, sy_scale) = (src.width() / dest.width(), src.height() / dest.height());
    for y in y0..y1 {
        let sy = (src.y0 + (f64::from(y) + 0.5 - dest.y0) * sy_scale).floor();
        if sy < 0.0 || sy >= f64::from(img.height) {
            continue;
        }
        for x in x0..x1 {
            let sx = (src.x0 + (f64::from(x) + 0.5 - dest.x0) * sx_scale).floor();
            if sx < 0.0 || sx >= f64::from(img.width) {
                continue;
            }
            let (Some(px), Some(off)) = (img.pixel(sx as u32, sy as u32), frame.offset_of(x, y))
            else {
                continue;
            };
            over_at(&mut frame.data, off, px, opacity);
        }
    }
}

fn draw_placeholder(frame: &mut FrameRGBA, dest: PixelRect) {
    let Some((x0, x1, y0, y1)) = covered_span(dest, frame.canvas()) else {
        return;
    };
    for y in y0..y1 {
        let cy = f64::from(y) + 0.5;
        for x in x0..x1 {
            let cx = f64::from(x) + 0.5;
            let Some(off) = frame.offset_of(x, y) else {
                continue;
            };
            over_at(&mut frame.data, off, PLACEHOLDER, PLACEHOLDER_FILL_OPACITY);
            let edge = (cx - dest.x0)
                .min(dest.x1 - cx)
                .min(cy - dest.y0)
                .min(dest.y1 - cy);
            if edge < PLACEHOLDER_BORDER_PX {
                over_at(&mut frame.data, off, PLACEHOLDER, PLACEHOLDER_BORDER_OPACITY);
            }
        }
    }

    let ox = (dest.x0 + LABEL_INSET).floor();
    let oy = (dest.y0 + LABEL_INSET).floor();
    for (i, ch) in PLACEHOLDER_LABEL.chars().enumerate() {
        let Some(rows) = glyph(ch) else {
            continue;
        };
        let gx = ox + f64::from(i as u32 * GLYPH_ADVANCE);
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (1 << (GLYPH_W - 1 - col)) == 0 {
                    continue;
                }
                let px = gx + f64::from(col);
                let py = oy + row as f64;
                let inside = px >= f64::from(x0)
                    && px < f64::from(x1)
                    && py >= f64::from(y0)
                    && py < f64::from(y1);
                if !inside {
                    continue;
                }
                if let Some(off) = frame.offset_of(px as u32, py as u32) {
                    over_at(&mut frame.data, off, PLACEHOLDER, PLACEHOLDER_LABEL_OPACITY);
                }
            }
        }
    }
}

/// 5x7 bitmap rows for the placeholder label, most significant bit leftmost.
fn glyph(ch: char) -> Option<[u8; GLYPH_H as usize]> {
    Some(match ch {
        'a' => [0, 0, 0b01110, 0b00001, 0b01111, 0b10001, 0b01111],
        'e' => [0, 0, 0b01110, 0b10001, 0b11111, 0b10000, 0b01110],
        'g' => [0, 0b01111, 0b10001, 0b10001, 0b01111, 0b00001, 0b01110],
        'i' => [0b00100, 0, 0b01100, 0b00100, 0b00100, 0b00100, 0b01110],
        'm' => [0, 0, 0b11010, 0b10101, 0b10101, 0b10001, 0b10001],
        'n' => [0, 0, 0b10110, 0b11001, 0b10001, 0b10001, 0b10001],
        's' => [0, 0, 0b01111, 0b10000, 0b01110, 0b00001, 0b11110],
        't' => [0b01000, 0b01000, 0b11100, 0b01000, 0b01000, 0b01001, 0b00110],
        _ => return None,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
