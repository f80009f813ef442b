//! Text shaping, measurement, and glyph rasterization.
//!
//! Runs are laid out with Parley against fonts fetched through an
//! [`AssetProvider`]. A missing font is not fatal: the engine substitutes a
//! system face and records the swap so callers can surface it. Inline
//! `<colorname>...</colorname>` markup splits a run into colored spans before
//! shaping; the tags never reach the shaper.

use std::collections::HashMap;
use std::sync::Arc;

use crate::assets::AssetProvider;
use crate::color::Color;
use crate::error::{PlatemarkError, PlatemarkResult};
use crate::raster::{self, RasterImage};
use crate::scene::TextRun;

/// Glyph brush carried through Parley layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct TextBrush {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl From<Color> for TextBrush {
    fn from(c: Color) -> Self {
        Self {
            r: c.r,
            g: c.g,
            b: c.b,
            a: c.a,
        }
    }
}

/// One maximal stretch of text sharing a color.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorSpan {
    pub text: String,
    pub color: Color,
}

/// Split inline color markup into spans.
///
/// Tags are single level and case-insensitive. A well-formed pair with an
/// unknown name still strips the tags and renders in `default`; markup that
/// never closes stays in the text verbatim.
pub fn parse_color_spans(text: &str, default: Color) -> Vec<ColorSpan> {
    let mut spans: Vec<ColorSpan> = Vec::new();
    let mut plain = String::new();
    let mut rest = text;

    let mut flush = |plain: &mut String, spans: &mut Vec<ColorSpan>| {
        if !plain.is_empty() {
            spans.push(ColorSpan {
                text: std::mem::take(plain),
                color: default,
            });
        }
    };

    while let Some(lt) = rest.find('<') {
        plain.push_str(&rest[..lt]);
        let after = &rest[lt + 1..];
        let tag = after.find('>').map(|gt| &after[..gt]);
        let well_formed = tag.is_some_and(|name| {
            !name.is_empty() && name.chars().all(|c| c.is_ascii_alphabetic())
        });
        if !well_formed {
            plain.push('<');
            rest = after;
            continue;
        }
        let name = tag.unwrap_or_default().to_ascii_lowercase();
        let body = &after[name.len() + 1..];
        let closer = format!("</{name}>");
        match body.to_ascii_lowercase().find(&closer) {
            Some(end) => {
                flush(&mut plain, &mut spans);
                if end > 0 {
                    spans.push(ColorSpan {
                        text: body[..end].to_string(),
                        color: Color::from_name(&name).unwrap_or(default),
                    });
                }
                rest = &body[end + closer.len()..];
            }
            None => {
                plain.push('<');
                rest = after;
            }
        }
    }
    plain.push_str(rest);
    flush(&mut plain, &mut spans);
    spans
}

/// Record of a font swap performed while laying out a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontSubstitution {
    pub requested: String,
    pub family: String,
}

#[derive(Clone)]
pub(crate) struct FontHandle {
    pub(crate) family: String,
    bytes: Arc<Vec<u8>>,
    index: u32,
}

/// Stateful shaping engine wrapping Parley's font and layout contexts.
pub struct TextEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrush>,
    families: HashMap<String, FontHandle>,
    fallback: Option<FontHandle>,
    fallback_probed: bool,
    substitutions: Vec<FontSubstitution>,
}

impl Default for TextEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextEngine {
    pub fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
            families: HashMap::new(),
            fallback: None,
            fallback_probed: false,
            substitutions: Vec::new(),
        }
    }

    /// Font swaps recorded since the last call, oldest first.
    pub fn take_substitutions(&mut self) -> Vec<FontSubstitution> {
        std::mem::take(&mut self.substitutions)
    }

    /// Shape a run into a single-line layout and measure its pixel bounds.
    pub fn measure(
        &mut self,
        run: &TextRun,
        fonts: &dyn AssetProvider,
    ) -> PlatemarkResult<MeasuredRun> {
        let handle = self.resolve_font(run.font.as_deref(), fonts)?;
        let spans = parse_color_spans(&run.text, run.color);

        let mut plain = String::new();
        let mut ranges: Vec<(std::ops::Range<usize>, Color)> = Vec::new();
        for span in &spans {
            let start = plain.len();
            plain.push_str(&span.text);
            if span.color != run.color {
                ranges.push((start..plain.len(), span.color));
            }
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, &plain, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(handle.family.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(run.size_px as f32));
        builder.push_default(parley::style::StyleProperty::Brush(TextBrush::from(
            run.color,
        )));
        for (range, color) in ranges {
            builder.push(
                parley::style::StyleProperty::Brush(TextBrush::from(color)),
                range,
            );
        }

        let mut layout: parley::Layout<TextBrush> = builder.build(&plain);
        layout.break_all_lines(None);

        Ok(MeasuredRun {
            width: layout.width(),
            height: layout.height(),
            layout,
            font: handle,
            plain_text: plain,
        })
    }

    fn resolve_font(
        &mut self,
        font: Option<&str>,
        fonts: &dyn AssetProvider,
    ) -> PlatemarkResult<FontHandle> {
        if let Some(reference) = font {
            if let Some(handle) = self.families.get(reference) {
                return Ok(handle.clone());
            }
            match fonts.resolve(reference) {
                Ok(bytes) => {
                    let handle = self.register_bytes(bytes, 0)?;
                    self.families.insert(reference.to_string(), handle.clone());
                    return Ok(handle);
                }
                Err(PlatemarkError::AssetMissing(_)) => {}
                Err(e) => return Err(e),
            }
        }
        let fallback = self.fallback_font()?;
        if let Some(reference) = font {
            tracing::warn!(
                requested = reference,
                family = %fallback.family,
                "font asset not found, substituting system family"
            );
            self.substitutions.push(FontSubstitution {
                requested: reference.to_string(),
                family: fallback.family.clone(),
            });
        }
        Ok(fallback)
    }

    fn register_bytes(&mut self, bytes: Vec<u8>, index: u32) -> PlatemarkResult<FontHandle> {
        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(bytes.clone()), None);
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| PlatemarkError::render("no font families registered from font bytes"))?;
        let family = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| PlatemarkError::render("registered font family has no name"))?
            .to_string();
        Ok(FontHandle {
            family,
            bytes: Arc::new(bytes),
            index,
        })
    }

    fn fallback_font(&mut self) -> PlatemarkResult<FontHandle> {
        if !self.fallback_probed {
            self.fallback_probed = true;
            if let Some((bytes, index)) = system_sans_bytes() {
                match self.register_bytes(bytes, index) {
                    Ok(handle) => self.fallback = Some(handle),
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to register system fallback font");
                    }
                }
            }
        }
        self.fallback
            .clone()
            .ok_or_else(|| PlatemarkError::render("no usable fallback font on this system"))
    }
}

/// Locate a default sans-serif face through the system font database.
fn system_sans_bytes() -> Option<(Vec<u8>, u32)> {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    let query = usvg::fontdb::Query {
        families: &[
            usvg::fontdb::Family::SansSerif,
            usvg::fontdb::Family::Serif,
            usvg::fontdb::Family::Monospace,
        ],
        weight: usvg::fontdb::Weight::NORMAL,
        stretch: usvg::fontdb::Stretch::Normal,
        style: usvg::fontdb::Style::Normal,
    };
    let id = db
        .query(&query)
        .or_else(|| db.faces().next().map(|f| f.id))?;
    db.with_face_data(id, |data, face_index| (data.to_vec(), face_index))
}

/// A shaped, measured single-line run ready to rasterize.
pub struct MeasuredRun {
    pub(crate) layout: parley::Layout<TextBrush>,
    pub(crate) font: FontHandle,
    /// Run text with all markup stripped.
    pub plain_text: String,
    pub width: f32,
    pub height: f32,
}

impl MeasuredRun {
    /// Rasterize the glyphs into a straight-alpha sprite sized to the
    /// measured bounds.
    pub fn rasterize(&self) -> PlatemarkResult<RasterImage> {
        let w = (self.width.ceil() as u32).max(1);
        let h = (self.height.ceil() as u32).max(1);
        if w > u32::from(u16::MAX) || h > u32::from(u16::MAX) {
            return Err(PlatemarkError::render(format!(
                "text sprite {w}x{h} exceeds raster limits"
            )));
        }

        let mut ctx = vello_cpu::RenderContext::new(w as u16, h as u16);
        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(self.font.bytes.as_ref().clone()),
            self.font.index,
        );
        for line in self.layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let brush = run.style().brush;
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));
                let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(&font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        ctx.flush();

        let mut pixmap = vello_cpu::Pixmap::new(w as u16, h as u16);
        ctx.render_to_pixmap(&mut pixmap);
        let mut data = pixmap.data_as_u8_slice().to_vec();
        raster::unpremultiply(&mut data);
        RasterImage::from_rgba_bytes(w, h, data)
    }
}
