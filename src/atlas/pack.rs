use std::path::{Path, PathBuf};

use anyhow::Context;
use rayon::prelude::*;

use crate::atlas::meta::{AtlasFrameEntry, AtlasFrames, AtlasMeta, AtlasMetadata, FrameBox, Size};
use crate::foundation::core::{Canvas, FrameRGBA, MAX_CANVAS_PIXELS};
use crate::foundation::error::{HexflipError, HexflipResult};
use crate::render::compositor::{ComposedFrame, Compositor};
use crate::render::plan::RenderPlan;

/// Default maximum sheet width in pixels.
pub const DEFAULT_MAX_WIDTH: u32 = 2048;

#[derive(Clone, Debug, PartialEq, Eq)]
/// Atlas packing options.
pub struct AtlasOpts {
    /// Widest sheet to aim for; a frame wider than this still gets one column.
    pub max_width: u32,
    /// Sheet file name recorded in the metadata and used by [`Atlas::write_to_dir`].
    pub image_name: String,
    /// Compose frames on rayon workers.
    pub parallel: bool,
}

impl Default for AtlasOpts {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            image_name: "atlas.png".to_string(),
            parallel: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Row-major grid of equally sized frame slots.
pub struct AtlasLayout {
    /// Size of every slot.
    pub frame: Canvas,
    /// Slots per row.
    pub columns: u32,
    /// Number of rows.
    pub rows: u32,
}

impl AtlasLayout {
    /// Grid for `count` frames of size `frame` within `max_width`.
    pub fn compute(frame: Canvas, count: usize, max_width: u32) -> Self {
        let columns = (max_width / frame.width.max(1)).max(1);
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        let rows = count.div_ceil(columns);
        Self {
            frame,
            columns,
            rows,
        }
    }

    /// Sheet size.
    pub fn sheet(&self) -> Canvas {
        Canvas {
            width: self.columns.saturating_mul(self.frame.width),
            height: self.rows.saturating_mul(self.frame.height),
        }
    }

    /// Top-left corner of slot `index`.
    pub fn slot(&self, index: usize) -> (u32, u32) {
        let i = u32::try_from(index).unwrap_or(u32::MAX);
        (
            (i % self.columns) * self.frame.width,
            (i / self.columns) * self.frame.height,
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
/// A packed sprite sheet and its metadata.
pub struct Atlas {
    /// Premultiplied sheet pixels.
    pub sheet: FrameRGBA,
    /// The JSON document.
    pub meta: AtlasMetadata,
    /// Grid the frames were placed on.
    pub layout: AtlasLayout,
}

impl Atlas {
    /// Pretty JSON metadata.
    pub fn metadata_json(&self) -> HexflipResult<String> {
        serde_json::to_string_pretty(&self.meta)
            .map_err(|e| HexflipError::serde(format!("serialize atlas metadata: {e}")))
    }

    /// Write the sheet PNG (straight alpha) and the metadata JSON into `dir`.
    ///
    /// The JSON file shares the image's stem. Returns both paths.
    pub fn write_to_dir(&self, dir: &Path) -> HexflipResult<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create atlas dir '{}'", dir.display()))?;
        let png = dir.join(&self.meta.meta.image);
        self.sheet.save_png(&png)?;
        let json = png.with_extension("json");
        std::fs::write(&json, self.metadata_json()?)
            .with_context(|| format!("write atlas metadata '{}'", json.display()))?;
        Ok((png, json))
    }
}

/// Compose every frame of `plan` and lay them out on one sheet.
///
/// Missing assets are decoded up front whatever the compositor's decode policy, so every frame
/// on the sheet is complete. A plan without frames, or one whose sheet would exceed
/// [`MAX_CANVAS_PIXELS`], is an error.
#[tracing::instrument(skip_all, fields(frames = plan.frame_count(), parallel = opts.parallel))]
pub fn pack_atlas(
    compositor: &mut Compositor,
    plan: &RenderPlan,
    opts: &AtlasOpts,
) -> HexflipResult<Atlas> {
    let count = plan.frame_count();
    if count == 0 {
        return Err(HexflipError::validation(
            "nothing to export: plan has no frames",
        ));
    }

    let layout = AtlasLayout::compute(plan.canvas, count, opts.max_width);
    let sheet_size = layout.sheet();
    if !sheet_size.fits_pixel_budget() {
        return Err(HexflipError::validation(format!(
            "atlas sheet {}x{} exceeds the {MAX_CANVAS_PIXELS} pixel budget",
            sheet_size.width, sheet_size.height
        )));
    }

    compositor.prepare_plan(plan);
    for job in compositor.take_decode_jobs() {
        compositor.complete(job.run());
    }

    let composer: &Compositor = compositor;
    let frames: Vec<ComposedFrame> = if opts.parallel {
        (0..count)
            .into_par_iter()
            .map(|i| composer.compose_prepared(plan, i))
            .collect()
    } else {
        (0..count)
            .map(|i| composer.compose_prepared(plan, i))
            .collect()
    };

    let mut sheet = FrameRGBA::transparent(sheet_size);
    let mut entries = AtlasFrames::default();
    let (w, h) = (plan.canvas.width, plan.canvas.height);
    for (i, (composed, pf)) in frames.iter().zip(&plan.frames).enumerate() {
        let (x, y) = layout.slot(i);
        sheet.copy_from(&composed.frame, x, y);

        let trimmed = pf.slot.name.trim();
        let name = if trimmed.is_empty() {
            format!("frame_{i:03}")
        } else {
            trimmed.to_string()
        };
        entries.insert(
            name,
            AtlasFrameEntry {
                frame: FrameBox { x, y, w, h },
                rotated: false,
                trimmed: false,
                sprite_source_size: FrameBox { x: 0, y: 0, w, h },
                source_size: Size { w, h },
                duration: pf.slot.effective_duration_ms(),
            },
        );
    }

    tracing::info!(
        width = sheet_size.width,
        height = sheet_size.height,
        columns = layout.columns,
        rows = layout.rows,
        "packed atlas"
    );
    Ok(Atlas {
        sheet,
        meta: AtlasMetadata {
            frames: entries,
            meta: AtlasMeta::new(
                &opts.image_name,
                Size {
                    w: sheet_size.width,
                    h: sheet_size.height,
                },
            ),
        },
        layout,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/atlas/pack.rs"]
mod tests;
