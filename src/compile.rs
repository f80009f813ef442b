//! Scene to filter-graph compilation.
//!
//! The compiler lowers a validated [`Scene`] into an ordered list of labeled
//! filter stages for the external video engine. Geometry that depends on
//! dimensions only the engine knows at execution time stays symbolic through
//! [`Expr`]; everything derived from the fixed canvas is emitted as literals.
//! The engine letterboxes the base stream (the preview crops instead), while
//! every percentage placement resolves through the same formulas as the
//! preview path.
//!
//! Asset references are embedded as path tokens and never opened here; the
//! export runner checks them per job. Fonts are the exception: stacked text
//! groups need measured heights, so font bytes resolve at compile time and a
//! missing font falls back to the engine's default face.

use std::collections::HashSet;
use std::sync::Arc;

use crate::assets::AssetProvider;
use crate::color::Color;
use crate::error::{PlatemarkError, PlatemarkResult};
use crate::expr::{Expr, centered_offset, position_offset};
use crate::geometry::{Dimensions, PositionSpec, pct_px};
use crate::scene::{BandAnchor, BandLayer, Layer, LineKind, LineLayer, Scene, TextRun, VideoPlacement};
use crate::text::{FontSubstitution, TextEngine, parse_color_spans};

/// Flanking line segments cover this much of the canvas width per side.
const LINE_SPAN_PCT: f64 = 40.0;
const DASH_ON: u32 = 15;
const DASH_PERIOD: u32 = 25;
const TEXT_STACK_GAP: i64 = 5;
const TEXT_BOX_PAD: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
    Base,
    Band,
    IconScale,
    Overlay,
    Line,
    Text,
}

/// One labeled filter step. `inputs` name upstream stream labels; `body` is
/// the comma-joined filter list for this step.
#[derive(Clone, Debug)]
pub struct Stage {
    pub kind: StageKind,
    pub label: String,
    pub inputs: Vec<String>,
    pub body: String,
}

impl Stage {
    fn render(&self) -> String {
        let mut out = String::new();
        for input in &self.inputs {
            out.push('[');
            out.push_str(input);
            out.push(']');
        }
        out.push_str(&self.body);
        out.push('[');
        out.push_str(&self.label);
        out.push(']');
        out
    }
}

/// Compiled filter graph plus the stream label carrying the final frame.
#[derive(Clone, Debug)]
pub struct FilterProgram {
    pub stages: Vec<Stage>,
    pub output_label: String,
    /// Icon reference to feed as the second input, when the scene has one.
    pub icon_asset: Option<String>,
}

impl FilterProgram {
    /// The full graph string: stages joined with `;`.
    pub fn chain(&self) -> String {
        let parts: Vec<String> = self.stages.iter().map(Stage::render).collect();
        parts.join(";")
    }

    pub fn uses_icon(&self) -> bool {
        self.icon_asset.is_some()
    }
}

struct IconPlacement {
    width: u32,
    x: PositionSpec,
}

/// Lowers scenes into [`FilterProgram`]s.
pub struct FilterGraphCompiler {
    fonts: Arc<dyn AssetProvider>,
    text: TextEngine,
    substitutions: Vec<FontSubstitution>,
}

impl FilterGraphCompiler {
    pub fn new(fonts: Arc<dyn AssetProvider>) -> Self {
        Self {
            fonts,
            text: TextEngine::new(),
            substitutions: Vec::new(),
        }
    }

    /// Font swaps recorded by compiles since the last call.
    pub fn take_font_substitutions(&mut self) -> Vec<FontSubstitution> {
        std::mem::take(&mut self.substitutions)
    }

    #[tracing::instrument(skip(self, scene))]
    pub fn compile(&mut self, scene: &Scene) -> PlatemarkResult<FilterProgram> {
        scene.validate()?;
        let canvas = scene.canvas;

        let mut stages = vec![base_stage(scene)];
        let mut last = "base".to_string();
        let mut icon_state: Option<IconPlacement> = None;
        let mut icon_asset: Option<String> = None;
        let (mut bands, mut lines, mut texts) = (0usize, 0usize, 0usize);

        let mut idx = 0;
        while idx < scene.layers.len() {
            match &scene.layers[idx] {
                Layer::Video(_) => idx += 1,
                Layer::Band(band) => {
                    bands += 1;
                    let label = format!("band{bands}");
                    stages.push(Stage {
                        kind: StageKind::Band,
                        label: label.clone(),
                        inputs: vec![last],
                        body: band_body(canvas, band),
                    });
                    last = label;
                    idx += 1;
                }
                Layer::Icon(icon) => {
                    let width = pct_px(canvas.width, icon.width_pct).max(1);
                    let height_arg = match icon.height_pct {
                        Some(p) => pct_px(canvas.height, p).max(1).to_string(),
                        None => "-1".to_string(),
                    };
                    stages.push(Stage {
                        kind: StageKind::IconScale,
                        label: "icon".to_string(),
                        inputs: vec!["1:v".to_string()],
                        body: format!("scale={width}:{height_arg}"),
                    });
                    let x = position_offset(icon.x, Expr::sym("main_w"), Expr::sym("overlay_w"));
                    let y = position_offset(icon.y, Expr::sym("main_h"), Expr::sym("overlay_h"));
                    stages.push(Stage {
                        kind: StageKind::Overlay,
                        label: "logo".to_string(),
                        inputs: vec![last, "icon".to_string()],
                        body: format!("overlay={x}:{y}"),
                    });
                    last = "logo".to_string();
                    icon_state = Some(IconPlacement { width, x: icon.x });
                    icon_asset = Some(icon.asset.clone());
                    idx += 1;
                }
                Layer::Line(line) => {
                    let placement = icon_state.as_ref().ok_or_else(|| {
                        PlatemarkError::compile("line layer compiled before icon placement")
                    })?;
                    lines += 1;
                    let label = format!("line{lines}");
                    stages.push(Stage {
                        kind: StageKind::Line,
                        label: label.clone(),
                        inputs: vec![last],
                        body: line_body(canvas, line, placement),
                    });
                    last = label;
                    idx += 1;
                }
                Layer::Text(first) => {
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
                    for body in self.text_group_bodies(&group)? {
                        texts += 1;
                        let label = format!("text{texts}");
                        stages.push(Stage {
                            kind: StageKind::Text,
                            label: label.clone(),
                            inputs: vec![last],
                            body,
                        });
                        last = label;
                    }
                    idx = j;
                }
            }
        }

        tracing::debug!(stages = stages.len(), output = %last, "compiled filter graph");
        Ok(FilterProgram {
            stages,
            output_label: last,
            icon_asset,
        })
    }

    /// One drawtext body per run. Single runs keep fully symbolic placement;
    /// stacked runs mix measured heights with the symbolic canvas height.
    fn text_group_bodies(&mut self, group: &[&TextRun]) -> PlatemarkResult<Vec<String>> {
        if group.len() == 1 {
            let run = group[0];
            let y = position_offset(run.y, Expr::sym("h"), Expr::sym("text_h"));
            let font = self.probe_font(run);
            return Ok(vec![drawtext_body(run, font.as_deref(), &y)]);
        }

        let mut heights = Vec::with_capacity(group.len());
        for run in group {
            let m = self.text.measure(run, self.fonts.as_ref())?;
            heights.push(i64::from(m.height.ceil() as u32));
        }
        let substituted: HashSet<String> = self
            .text
            .take_substitutions()
            .into_iter()
            .map(|s| {
                let requested = s.requested.clone();
                self.substitutions.push(s);
                requested
            })
            .collect();

        let total: i64 =
            heights.iter().sum::<i64>() + TEXT_STACK_GAP * (heights.len() as i64 - 1).max(0);
        let anchor = group[0].y;

        let mut bodies = Vec::with_capacity(group.len());
        let mut offset = 0i64;
        for (run, h) in group.iter().zip(&heights) {
            let y = position_offset(anchor, Expr::sym("h"), Expr::num(total as f64))
                + Expr::num(offset as f64);
            let font = run
                .font
                .as_deref()
                .filter(|r| !substituted.contains(*r))
                .map(str::to_string);
            bodies.push(drawtext_body(run, font.as_deref(), &y));
            offset += h + TEXT_STACK_GAP;
        }
        Ok(bodies)
    }

    /// Check a run's font reference without shaping. Unresolvable fonts fall
    /// back to the engine's default face and are recorded.
    fn probe_font(&mut self, run: &TextRun) -> Option<String> {
        let reference = run.font.as_deref()?;
        match self.fonts.resolve(reference) {
            Ok(_) => Some(reference.to_string()),
            Err(e) => {
                tracing::warn!(
                    requested = reference,
                    error = %e,
                    "font asset not found, drawtext will use the engine default"
                );
                self.substitutions.push(FontSubstitution {
                    requested: reference.to_string(),
                    family: "default".to_string(),
                });
                None
            }
        }
    }
}

/// Letterboxing base stage: scale to fit the video layer's share of the
/// canvas, then pad to the full canvas with black.
fn base_stage(scene: &Scene) -> Stage {
    let canvas = scene.canvas;
    let video = scene.video().cloned().unwrap_or_default();
    let content = canvas.scaled(video.scale_pct / 100.0);
    let pad_y = match video.placement {
        VideoPlacement::Top => "0",
        VideoPlacement::Center => "(oh-ih)/2",
        VideoPlacement::Bottom => "oh-ih",
    };
    Stage {
        kind: StageKind::Base,
        label: "base".to_string(),
        inputs: vec!["0:v".to_string()],
        body: format!(
            "scale={}:{}:force_original_aspect_ratio=decrease,pad={}:{}:(ow-iw)/2:{}:black",
            content.width, content.height, canvas.width, canvas.height, pad_y
        ),
    }
}

fn band_body(canvas: Dimensions, band: &BandLayer) -> String {
    let band_h = pct_px(canvas.height, band.height_pct);
    let opacity = band.opacity / 100.0;
    let (x, y) = match band.offset {
        Some(o) => (o.x.to_string(), o.y.to_string()),
        None => match band.anchor {
            BandAnchor::Top => ("0".to_string(), "0".to_string()),
            BandAnchor::Bottom => (
                "0".to_string(),
                (Expr::sym("ih") - Expr::num(f64::from(band_h))).to_string(),
            ),
        },
    };
    format!(
        "drawbox=x={x}:y={y}:w={}:h={band_h}:color=black@{opacity}:t=fill",
        canvas.width
    )
}

/// Unrolled draw operations for both flanking segments, joined into one
/// stage body.
fn line_body(canvas: Dimensions, line: &LineLayer, icon: &IconPlacement) -> String {
    let span = pct_px(canvas.width, LINE_SPAN_PCT);
    let y = position_offset(line.y, Expr::sym("ih"), Expr::num(f64::from(line.thickness)));
    let icon_x = position_offset(icon.x, Expr::sym("iw"), Expr::num(f64::from(icon.width)));
    let opacity = line.opacity / 100.0;

    let seg = |offset: i64, width: u32, color: Color| -> String {
        let x = icon_x.clone() + Expr::num(offset as f64);
        format!(
            "drawbox=x={x}:y={y}:w={width}:h={}:color={}:t=fill",
            line.thickness,
            paint_color(color, opacity)
        )
    };

    let mut ops = Vec::new();
    match line.kind {
        LineKind::Solid => {
            ops.push(seg(-i64::from(span), span, line.color));
            ops.push(seg(i64::from(icon.width), span, line.color));
        }
        LineKind::Dashed => {
            let mut start = 0u32;
            while start < span {
                let width = DASH_ON.min(span - start);
                ops.push(seg(i64::from(start) - i64::from(span), width, line.color));
                ops.push(seg(i64::from(icon.width) + i64::from(start), width, line.color));
                start += DASH_PERIOD;
            }
        }
        LineKind::Gradient => {
            let end = line.gradient_end.unwrap_or(line.color);
            for i in 0..span {
                let t = f64::from(i) / f64::from(span.saturating_sub(1).max(1));
                let color = line.color.lerp(end, t);
                ops.push(seg(i64::from(i) - i64::from(span), 1, color));
                ops.push(seg(i64::from(icon.width) + i64::from(i), 1, color));
            }
        }
    }
    ops.join(",")
}

fn drawtext_body(run: &TextRun, font: Option<&str>, y: &Expr) -> String {
    // The engine draws a run in a single color, so markup is stripped and
    // the default color wins. The preview honors per-span colors.
    let plain: String = parse_color_spans(&run.text, run.color)
        .into_iter()
        .map(|s| s.text)
        .collect();
    let x = centered_offset(Expr::sym("w"), Expr::sym("text_w"))
        + Expr::num(run.x_offset_px as f64);

    let mut body = String::from("drawtext=");
    if let Some(reference) = font {
        body.push_str("fontfile=");
        body.push_str(&quote_token(reference));
        body.push(':');
    }
    body.push_str("text=");
    body.push_str(&quote_token(&plain));
    body.push_str(&format!(
        ":x={x}:y={y}:fontsize={}:fontcolor={}",
        run.size_px,
        paint_color(run.color, 1.0)
    ));
    if let Some(boxed) = &run.boxed {
        body.push_str(&format!(
            ":box=1:boxcolor={}:boxborderw={TEXT_BOX_PAD}",
            paint_color(boxed.color, boxed.opacity / 100.0)
        ));
    }
    if run.outline {
        body.push_str(":borderw=1:bordercolor=black");
    }
    if run.shadow {
        body.push_str(":shadowx=2:shadowy=2:shadowcolor=black");
    }
    body
}

/// Hex color token with a blend alpha suffix when not fully opaque.
fn paint_color(color: Color, opacity: f64) -> String {
    let combined = opacity.clamp(0.0, 1.0) * f64::from(color.a) / 255.0;
    if combined >= 1.0 {
        color.hex_rgb()
    } else {
        format!("{}@{combined}", color.hex_rgb())
    }
}

/// Quote a drawtext value for the graph parser and the filter's own
/// expansion pass.
fn quote_token(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '%' => out.push_str("\\%"),
            '\'' => out.push_str("'\\''"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_token_escapes_quotes_and_percent() {
        assert_eq!(quote_token("plain"), "'plain'");
        assert_eq!(quote_token("it's 50%"), "'it'\\''s 50\\%'");
    }

    #[test]
    fn paint_color_appends_alpha_only_when_translucent() {
        assert_eq!(paint_color(Color::rgb(255, 0, 0), 1.0), "0xFF0000");
        assert_eq!(paint_color(Color::rgb(255, 0, 0), 0.5), "0xFF0000@0.5");
        assert_eq!(
            paint_color(Color::rgba(255, 255, 255, 127), 1.0),
            format!("0xFFFFFF@{}", 127.0 / 255.0)
        );
    }

    #[test]
    fn stage_render_concatenates_inputs_body_label() {
        let stage = Stage {
            kind: StageKind::Overlay,
            label: "logo".to_string(),
            inputs: vec!["base".to_string(), "icon".to_string()],
            body: "overlay=0:0".to_string(),
        };
        assert_eq!(stage.render(), "[base][icon]overlay=0:0[logo]");
    }
}
