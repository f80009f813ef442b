//! Pixel-accurate preview compositing.
//!
//! [`PreviewCompositor::render`] paints one sample frame through the full
//! layer stack: aspect crop, base placement, translucent bands, the brand
//! icon, flanking lines, and styled text. The same scene compiled for the
//! external engine letterboxes instead of cropping but resolves every
//! percentage with the same formulas, so preview and export geometry line up.
//!
//! Rendering is deterministic: the same scene and frame always produce
//! byte-identical output.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use crate::assets::{AssetProvider, IconAsset};
use crate::color::Color;
use crate::error::{PlatemarkError, PlatemarkResult};
use crate::geometry::{Dimensions, fit_scale, pct_px, resolve_crop, resolve_offset};
use crate::raster::RasterImage;
use crate::scene::{BandAnchor, Layer, LineKind, LineLayer, Scene, TextRun, VideoPlacement};
use crate::text::{FontSubstitution, MeasuredRun, TextEngine};

/// Flanking line segments cover this much of the canvas width per side.
const LINE_SPAN_PCT: f64 = 40.0;
/// Dash pattern: painted length and full period in pixels.
const DASH_ON: u32 = 15;
const DASH_PERIOD: u32 = 25;
/// Vertical gap between stacked text runs sharing an anchor.
const TEXT_STACK_GAP: i64 = 5;
/// Padding around a boxed text run.
const TEXT_BOX_PAD: i64 = 10;
/// Drop shadow offset in pixels.
const TEXT_SHADOW_OFFSET: (i64, i64) = (2, 2);

#[derive(Clone, Copy)]
struct IconBounds {
    x: i64,
    y: i64,
    width: u32,
}

/// CPU compositor that renders scenes onto sample frames.
pub struct PreviewCompositor {
    icons: Arc<dyn AssetProvider>,
    fonts: Arc<dyn AssetProvider>,
    text: TextEngine,
    icon_cache: HashMap<String, IconAsset>,
}

impl PreviewCompositor {
    pub fn new(icons: Arc<dyn AssetProvider>, fonts: Arc<dyn AssetProvider>) -> Self {
        Self {
            icons,
            fonts,
            text: TextEngine::new(),
            icon_cache: HashMap::new(),
        }
    }

    /// Font swaps recorded by renders since the last call.
    pub fn take_font_substitutions(&mut self) -> Vec<FontSubstitution> {
        self.text.take_substitutions()
    }

    /// Composite the scene over a sample frame at full canvas resolution.
    #[tracing::instrument(skip(self, scene, sample_frame))]
    pub fn render(
        &mut self,
        scene: &Scene,
        sample_frame: &RasterImage,
    ) -> PlatemarkResult<RasterImage> {
        scene.validate()?;
        self.render_at(scene, sample_frame, scene.canvas)
    }

    /// Composite at a proxy resolution that fits inside `bounds` without
    /// upscaling. Percentage placement resolves against the proxy canvas, so
    /// the result is the full-resolution preview scaled down.
    #[tracing::instrument(skip(self, scene, sample_frame))]
    pub fn render_fit(
        &mut self,
        scene: &Scene,
        sample_frame: &RasterImage,
        bounds: Dimensions,
    ) -> PlatemarkResult<RasterImage> {
        scene.validate()?;
        let proxy = scene.canvas.scaled(fit_scale(scene.canvas, bounds));
        self.render_at(scene, sample_frame, proxy)
    }

    fn render_at(
        &mut self,
        scene: &Scene,
        sample_frame: &RasterImage,
        canvas_dims: Dimensions,
    ) -> PlatemarkResult<RasterImage> {
        let mut canvas = RasterImage::filled(canvas_dims.width, canvas_dims.height, Color::BLACK)?;
        self.paint_base(&mut canvas, scene, sample_frame, canvas_dims)?;

        let mut icon_bounds: Option<IconBounds> = None;
        let mut idx = 0;
        while idx < scene.layers.len() {
            match &scene.layers[idx] {
                Layer::Video(_) => {
                    idx += 1;
                }
                Layer::Band(band) => {
                    let band_h = pct_px(canvas_dims.height, band.height_pct);
                    let (x, y) = match band.offset {
                        Some(o) => (o.x, o.y),
                        None => match band.anchor {
                            BandAnchor::Top => (0, 0),
                            BandAnchor::Bottom => {
                                (0, i64::from(canvas_dims.height) - i64::from(band_h))
                            }
                        },
                    };
                    canvas.fill_rect(
                        x,
                        y,
                        canvas_dims.width,
                        band_h,
                        Color::BLACK,
                        band.opacity / 100.0,
                    );
                    idx += 1;
                }
                Layer::Icon(icon) => {
                    let asset = self.icon_for(&icon.asset)?;
                    let intrinsic = asset.intrinsic()?;
                    let width = pct_px(canvas_dims.width, icon.width_pct).max(1);
                    let height = match icon.height_pct {
                        Some(p) => pct_px(canvas_dims.height, p).max(1),
                        None => (f64::from(width) * f64::from(intrinsic.height)
                            / f64::from(intrinsic.width))
                        .round()
                        .max(1.0) as u32,
                    };
                    let sprite = asset.rasterize(Dimensions::new(width, height))?;
                    let x = resolve_offset(icon.x, canvas_dims.width, width);
                    let y = resolve_offset(icon.y, canvas_dims.height, height);
                    canvas.composite(&sprite, x, y);
                    icon_bounds = Some(IconBounds { x, y, width });
                    idx += 1;
                }
                Layer::Line(line) => {
                    let bounds = icon_bounds.ok_or_else(|| {
                        PlatemarkError::render("line layer painted before icon bounds were set")
                    })?;
                    self.paint_line(&mut canvas, canvas_dims, line, bounds);
                    idx += 1;
                }
                Layer::Text(first) => {
                    // Consecutive runs anchored at the same y stack as one
                    // group centered on the anchor.
                    let mut group: Vec<&TextRun> = vec![first];
                    let mut j = idx + 1;
                    while j < scene.layers.len() {
                        if let Layer::Text(next) = &scene.layers[j]
                            && next.y.0 == first.y.0
                        {
                            group.push(next);
                            j += 1;
                        } else {
                            break;
                        }
                    }
                    self.paint_text_group(&mut canvas, canvas_dims, &group)?;
                    idx = j;
                }
            }
        }

        tracing::debug!(
            width = canvas_dims.width,
            height = canvas_dims.height,
            layers = scene.layers.len(),
            "composited preview frame"
        );
        Ok(canvas)
    }

    /// Crop the frame to the scene aspect, scale it to the video layer's
    /// share of the canvas, and paste it per placement.
    fn paint_base(
        &mut self,
        canvas: &mut RasterImage,
        scene: &Scene,
        sample_frame: &RasterImage,
        canvas_dims: Dimensions,
    ) -> PlatemarkResult<()> {
        let video = scene.video().cloned().unwrap_or_default();
        let crop = resolve_crop(sample_frame.dimensions(), scene.aspect.ratio());
        let cropped = sample_frame.crop(crop)?;
        let target = canvas_dims.scaled(video.scale_pct / 100.0);
        let scaled = cropped.resize(target)?;

        let x = (i64::from(canvas_dims.width) - i64::from(target.width)) / 2;
        let y = match video.placement {
            VideoPlacement::Top => 0,
            VideoPlacement::Center => {
                (i64::from(canvas_dims.height) - i64::from(target.height)) / 2
            }
            VideoPlacement::Bottom => i64::from(canvas_dims.height) - i64::from(target.height),
        };
        canvas.composite(&scaled, x, y);
        Ok(())
    }

    fn icon_for(&mut self, reference: &str) -> PlatemarkResult<&IconAsset> {
        match self.icon_cache.entry(reference.to_string()) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(v) => {
                let bytes = self.icons.resolve(reference)?;
                Ok(v.insert(IconAsset::decode(&bytes)?))
            }
        }
    }

    fn paint_line(
        &mut self,
        canvas: &mut RasterImage,
        canvas_dims: Dimensions,
        line: &LineLayer,
        icon: IconBounds,
    ) {
        let span = pct_px(canvas_dims.width, LINE_SPAN_PCT);
        let y = resolve_offset(line.y, canvas_dims.height, line.thickness);
        let left_start = icon.x - i64::from(span);
        let right_start = icon.x + i64::from(icon.width);
        let opacity = line.opacity / 100.0;

        match line.kind {
            LineKind::Solid => {
                canvas.fill_rect(left_start, y, span, line.thickness, line.color, opacity);
                canvas.fill_rect(right_start, y, span, line.thickness, line.color, opacity);
            }
            LineKind::Dashed => {
                let mut start = 0u32;
                while start < span {
                    let seg = DASH_ON.min(span - start);
                    canvas.fill_rect(
                        left_start + i64::from(start),
                        y,
                        seg,
                        line.thickness,
                        line.color,
                        opacity,
                    );
                    canvas.fill_rect(
                        right_start + i64::from(start),
                        y,
                        seg,
                        line.thickness,
                        line.color,
                        opacity,
                    );
                    start += DASH_PERIOD;
                }
            }
            LineKind::Gradient => {
                let end = line.gradient_end.unwrap_or(line.color);
                for i in 0..span {
                    let t = f64::from(i) / f64::from(span.saturating_sub(1).max(1));
                    let color = line.color.lerp(end, t);
                    canvas.fill_rect(
                        left_start + i64::from(i),
                        y,
                        1,
                        line.thickness,
                        color,
                        opacity,
                    );
                    canvas.fill_rect(
                        right_start + i64::from(i),
                        y,
                        1,
                        line.thickness,
                        color,
                        opacity,
                    );
                }
            }
        }
    }

    fn paint_text_group(
        &mut self,
        canvas: &mut RasterImage,
        canvas_dims: Dimensions,
        group: &[&TextRun],
    ) -> PlatemarkResult<()> {
        let mut measured: Vec<(&TextRun, MeasuredRun)> = Vec::with_capacity(group.len());
        for run in group {
            let m = self.text.measure(run, self.fonts.as_ref())?;
            measured.push((run, m));
        }

        let heights: Vec<i64> = measured
            .iter()
            .map(|(_, m)| i64::from(m.height.ceil() as u32))
            .collect();
        let total: i64 =
            heights.iter().sum::<i64>() + TEXT_STACK_GAP * (heights.len() as i64 - 1).max(0);
        let anchor = group[0].y;
        let group_y = resolve_offset(
            anchor,
            canvas_dims.height,
            u32::try_from(total).unwrap_or(0),
        );

        let mut y = group_y;
        for ((run, m), h) in measured.iter().zip(&heights) {
            self.paint_text_run(canvas, canvas_dims, run, m, y)?;
            y += h + TEXT_STACK_GAP;
        }
        Ok(())
    }

    fn paint_text_run(
        &mut self,
        canvas: &mut RasterImage,
        canvas_dims: Dimensions,
        run: &TextRun,
        measured: &MeasuredRun,
        y: i64,
    ) -> PlatemarkResult<()> {
        let text_w = i64::from(measured.width.ceil() as u32);
        let text_h = i64::from(measured.height.ceil() as u32);
        let x = (i64::from(canvas_dims.width) - text_w) / 2 + run.x_offset_px;

        if let Some(boxed) = &run.boxed {
            canvas.fill_rect(
                x - TEXT_BOX_PAD,
                y - TEXT_BOX_PAD,
                (text_w + 2 * TEXT_BOX_PAD).max(0) as u32,
                (text_h + 2 * TEXT_BOX_PAD).max(0) as u32,
                boxed.color,
                boxed.opacity / 100.0,
            );
        }

        let sprite = measured.rasterize()?;
        if run.shadow {
            canvas.composite_tinted(
                &sprite,
                x + TEXT_SHADOW_OFFSET.0,
                y + TEXT_SHADOW_OFFSET.1,
                Color::BLACK,
            );
        }
        if run.outline {
            for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
                canvas.composite_tinted(&sprite, x + dx, y + dy, Color::BLACK);
            }
        }
        canvas.composite(&sprite, x, y);
        Ok(())
    }
}
