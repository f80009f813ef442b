//! Straight-alpha RGBA surface plus the blend primitives the preview
//! compositor paints with.
//!
//! Every mutation uses the same over rule: `round(overlay * opacity +
//! base * (1 - opacity))` per channel, with the alpha channel treated as
//! fully covered overlay content. Painting onto an opaque surface therefore
//! keeps it opaque.

use crate::color::Color;
use crate::error::{PlatemarkError, PlatemarkResult};
use crate::geometry::{CropRect, Dimensions};

/// Row-major straight-alpha RGBA8 pixel buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RasterImage {
    /// Allocate a fully transparent surface.
    pub fn new(width: u32, height: u32) -> PlatemarkResult<Self> {
        if width == 0 || height == 0 {
            return Err(PlatemarkError::validation(
                "raster dimensions must be non-zero",
            ));
        }
        Ok(Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        })
    }

    /// Allocate a surface filled with a single color.
    pub fn filled(width: u32, height: u32, color: Color) -> PlatemarkResult<Self> {
        let mut img = Self::new(width, height)?;
        for px in img.data.chunks_exact_mut(4) {
            px.copy_from_slice(&[color.r, color.g, color.b, color.a]);
        }
        Ok(img)
    }

    /// Wrap an existing straight-alpha RGBA byte buffer.
    pub fn from_rgba_bytes(width: u32, height: u32, data: Vec<u8>) -> PlatemarkResult<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 {
            return Err(PlatemarkError::validation(
                "raster dimensions must be non-zero",
            ));
        }
        if data.len() != expected {
            return Err(PlatemarkError::validation(format!(
                "raster buffer holds {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Read one pixel, `None` outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.index(x, y);
        Some(Color::rgba(
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ))
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Over-blend a filled rectangle. Coordinates may extend past the surface
    /// and are clipped; `opacity` is 0..=1 and multiplies the color's alpha.
    pub fn fill_rect(&mut self, x: i64, y: i64, w: u32, h: u32, color: Color, opacity: f64) {
        let op = opacity.clamp(0.0, 1.0) * f64::from(color.a) / 255.0;
        if op <= 0.0 {
            return;
        }
        let x0 = x.max(0) as u32;
        let y0 = y.max(0) as u32;
        let x1 = (x + i64::from(w)).clamp(0, i64::from(self.width)) as u32;
        let y1 = (y + i64::from(h)).clamp(0, i64::from(self.height)) as u32;
        for py in y0..y1 {
            for px in x0..x1 {
                let i = self.index(px, py);
                self.data[i] = over_channel(color.r, self.data[i], op);
                self.data[i + 1] = over_channel(color.g, self.data[i + 1], op);
                self.data[i + 2] = over_channel(color.b, self.data[i + 2], op);
                self.data[i + 3] = over_channel(255, self.data[i + 3], op);
            }
        }
    }

    /// Over-blend a sprite using its own per-pixel alpha. The sprite may hang
    /// off any edge; out-of-surface pixels are dropped.
    pub fn composite(&mut self, sprite: &RasterImage, x: i64, y: i64) {
        for sy in 0..sprite.height {
            let dy = y + i64::from(sy);
            if dy < 0 || dy >= i64::from(self.height) {
                continue;
            }
            for sx in 0..sprite.width {
                let dx = x + i64::from(sx);
                if dx < 0 || dx >= i64::from(self.width) {
                    continue;
                }
                let si = sprite.index(sx, sy);
                let sa = sprite.data[si + 3];
                if sa == 0 {
                    continue;
                }
                let op = f64::from(sa) / 255.0;
                let di = self.index(dx as u32, dy as u32);
                self.data[di] = over_channel(sprite.data[si], self.data[di], op);
                self.data[di + 1] = over_channel(sprite.data[si + 1], self.data[di + 1], op);
                self.data[di + 2] = over_channel(sprite.data[si + 2], self.data[di + 2], op);
                self.data[di + 3] = over_channel(255, self.data[di + 3], op);
            }
        }
    }

    /// Over-blend a sprite as a pure coverage mask painted in `tint`,
    /// ignoring the sprite's own colors. Used for text outlines and shadows.
    pub fn composite_tinted(&mut self, sprite: &RasterImage, x: i64, y: i64, tint: Color) {
        let tint_op = f64::from(tint.a) / 255.0;
        for sy in 0..sprite.height {
            let dy = y + i64::from(sy);
            if dy < 0 || dy >= i64::from(self.height) {
                continue;
            }
            for sx in 0..sprite.width {
                let dx = x + i64::from(sx);
                if dx < 0 || dx >= i64::from(self.width) {
                    continue;
                }
                let si = sprite.index(sx, sy);
                let sa = sprite.data[si + 3];
                if sa == 0 {
                    continue;
                }
                let op = f64::from(sa) / 255.0 * tint_op;
                let di = self.index(dx as u32, dy as u32);
                self.data[di] = over_channel(tint.r, self.data[di], op);
                self.data[di + 1] = over_channel(tint.g, self.data[di + 1], op);
                self.data[di + 2] = over_channel(tint.b, self.data[di + 2], op);
                self.data[di + 3] = over_channel(255, self.data[di + 3], op);
            }
        }
    }

    /// Copy out a sub-rectangle.
    pub fn crop(&self, rect: CropRect) -> PlatemarkResult<RasterImage> {
        let right = rect.x.checked_add(rect.width);
        let bottom = rect.y.checked_add(rect.height);
        if right.is_none_or(|r| r > self.width) || bottom.is_none_or(|b| b > self.height) {
            return Err(PlatemarkError::render(format!(
                "crop {}x{}+{}+{} exceeds {}x{} surface",
                rect.width, rect.height, rect.x, rect.y, self.width, self.height
            )));
        }
        let mut out = RasterImage::new(rect.width, rect.height)?;
        let row_bytes = rect.width as usize * 4;
        for row in 0..rect.height {
            let src = self.index(rect.x, rect.y + row);
            let dst = out.index(0, row);
            out.data[dst..dst + row_bytes].copy_from_slice(&self.data[src..src + row_bytes]);
        }
        Ok(out)
    }

    /// Bilinear resize to the target size.
    pub fn resize(&self, target: Dimensions) -> PlatemarkResult<RasterImage> {
        if target.width == self.width && target.height == self.height {
            return Ok(self.clone());
        }
        if target.width == 0 || target.height == 0 {
            return Err(PlatemarkError::render(
                "resize target must have non-zero dimensions",
            ));
        }
        let src = image::RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| PlatemarkError::render("raster buffer length mismatch"))?;
        let scaled = image::imageops::resize(
            &src,
            target.width,
            target.height,
            image::imageops::FilterType::Triangle,
        );
        RasterImage::from_rgba_bytes(target.width, target.height, scaled.into_raw())
    }
}

/// One channel of the over blend at the given opacity.
pub(crate) fn over_channel(overlay: u8, base: u8, opacity: f64) -> u8 {
    (f64::from(overlay) * opacity + f64::from(base) * (1.0 - opacity)).round() as u8
}

/// Convert premultiplied RGBA bytes (as produced by the glyph and SVG
/// rasterizers) to straight alpha in place.
pub(crate) fn unpremultiply(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let a = px[3];
        if a == 0 || a == 255 {
            continue;
        }
        let a16 = u16::from(a);
        for c in px.iter_mut().take(3) {
            let v = u16::from(*c) * 255 + a16 / 2;
            *c = (v / a16).min(255) as u8;
        }
    }
}
