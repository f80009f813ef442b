//! Asset resolution and brand icon decoding.
//!
//! Scenes refer to icons and fonts by relative reference strings. An
//! [`AssetProvider`] turns a reference into bytes; the filesystem provider
//! roots references under a directory and rejects escapes, while the memory
//! provider backs tests and embedded callers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::error::{PlatemarkError, PlatemarkResult};
use crate::geometry::Dimensions;
use crate::raster::{self, RasterImage};

/// Source of icon and font bytes, shared across render threads.
pub trait AssetProvider: Send + Sync {
    /// Fetch the bytes behind a reference, or `AssetMissing` if the provider
    /// does not know it.
    fn resolve(&self, reference: &str) -> PlatemarkResult<Vec<u8>>;
}

/// Provider serving references as files under a root directory.
#[derive(Debug, Clone)]
pub struct FsAssetProvider {
    root: PathBuf,
}

impl FsAssetProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetProvider for FsAssetProvider {
    fn resolve(&self, reference: &str) -> PlatemarkResult<Vec<u8>> {
        let rel = normalize_reference(reference)?;
        let path = self.root.join(&rel);
        if !path.is_file() {
            return Err(PlatemarkError::asset_missing(format!(
                "'{reference}' not found under '{}'",
                self.root.display()
            )));
        }
        std::fs::read(&path)
            .with_context(|| format!("read asset bytes from '{}'", path.display()))
            .map_err(PlatemarkError::from)
    }
}

/// In-memory provider keyed by reference string.
#[derive(Debug, Default, Clone)]
pub struct MemoryAssetProvider {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryAssetProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(reference.into(), bytes);
    }

    pub fn with(mut self, reference: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(reference, bytes);
        self
    }
}

impl AssetProvider for MemoryAssetProvider {
    fn resolve(&self, reference: &str) -> PlatemarkResult<Vec<u8>> {
        self.entries
            .get(reference)
            .cloned()
            .ok_or_else(|| PlatemarkError::asset_missing(format!("'{reference}' is not registered")))
    }
}

/// Normalize a scene asset reference to a `/`-separated relative path.
///
/// Rejects absolute paths, drive prefixes, and parent traversal so a scene
/// file cannot read outside the provider root.
pub fn normalize_reference(source: &str) -> PlatemarkResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') || s.contains(':') {
        return Err(PlatemarkError::validation(
            "asset references must be relative paths",
        ));
    }
    let mut out = Vec::new();
    for seg in s.split('/') {
        match seg {
            "" | "." => continue,
            ".." => {
                return Err(PlatemarkError::validation(
                    "asset references may not traverse parent directories",
                ));
            }
            seg => out.push(seg),
        }
    }
    if out.is_empty() {
        return Err(PlatemarkError::validation(
            "asset reference must contain a file name",
        ));
    }
    Ok(out.join("/"))
}

/// A decoded brand icon, either pre-rasterized pixels or a vector tree that
/// is rasterized at the exact placement size.
pub struct IconAsset {
    kind: IconKind,
}

enum IconKind {
    Raster(RasterImage),
    Svg(usvg::Tree),
}

impl IconAsset {
    /// Decode icon bytes, sniffing SVG markup from the content.
    pub fn decode(bytes: &[u8]) -> PlatemarkResult<Self> {
        if looks_like_svg(bytes) {
            let opts = usvg::Options::default();
            let tree = usvg::Tree::from_data(bytes, &opts)
                .context("parse svg icon")
                .map_err(PlatemarkError::from)?;
            return Ok(Self {
                kind: IconKind::Svg(tree),
            });
        }
        let decoded = image::load_from_memory(bytes)
            .context("decode icon image")
            .map_err(PlatemarkError::from)?
            .to_rgba8();
        let (w, h) = decoded.dimensions();
        Ok(Self {
            kind: IconKind::Raster(RasterImage::from_rgba_bytes(w, h, decoded.into_raw())?),
        })
    }

    /// Intrinsic pixel size; vector sizes round to whole pixels.
    pub fn intrinsic(&self) -> PlatemarkResult<Dimensions> {
        match &self.kind {
            IconKind::Raster(img) => Ok(img.dimensions()),
            IconKind::Svg(tree) => {
                let size = tree.size();
                if !size.width().is_finite() || !size.height().is_finite() {
                    return Err(PlatemarkError::render("svg icon has invalid size"));
                }
                Ok(Dimensions::new(
                    (size.width().round() as u32).max(1),
                    (size.height().round() as u32).max(1),
                ))
            }
        }
    }

    /// Produce straight-alpha pixels at the target size. Raster icons are
    /// scaled bilinearly; vectors render at the target resolution directly.
    pub fn rasterize(&self, target: Dimensions) -> PlatemarkResult<RasterImage> {
        match &self.kind {
            IconKind::Raster(img) => img.resize(target),
            IconKind::Svg(tree) => {
                let mut pixmap = resvg::tiny_skia::Pixmap::new(target.width, target.height)
                    .ok_or_else(|| PlatemarkError::render("failed to allocate svg pixmap"))?;
                let sx = target.width as f32 / tree.size().width();
                let sy = target.height as f32 / tree.size().height();
                let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);
                resvg::render(tree, xform, &mut pixmap.as_mut());
                let mut data = pixmap.data().to_vec();
                raster::unpremultiply(&mut data);
                RasterImage::from_rgba_bytes(target.width, target.height, data)
            }
        }
    }
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    let Ok(text) = std::str::from_utf8(head) else {
        return false;
    };
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    trimmed.starts_with("<svg") || (trimmed.starts_with("<?xml") && text.contains("<svg"))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "platemark_{name}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    fn png_bytes(rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_raw(1, 1, rgba.to_vec()).unwrap();
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn normalize_rejects_escapes() {
        assert!(normalize_reference("/etc/passwd").is_err());
        assert!(normalize_reference("..\\secrets.png").is_err());
        assert!(normalize_reference("icons/../../x.png").is_err());
        assert!(normalize_reference("C:\\icons\\x.png").is_err());
        assert!(normalize_reference("").is_err());
        assert_eq!(
            normalize_reference("./icons//logo.png").unwrap(),
            "icons/logo.png"
        );
    }

    #[test]
    fn fs_provider_reads_rooted_file() {
        let tmp = temp_dir("fs_provider");
        std::fs::create_dir_all(tmp.join("icons")).unwrap();
        std::fs::write(tmp.join("icons/logo.png"), png_bytes([1, 2, 3, 255])).unwrap();

        let provider = FsAssetProvider::new(&tmp);
        let bytes = provider.resolve("icons/logo.png").unwrap();
        assert!(!bytes.is_empty());

        let err = provider.resolve("icons/absent.png").unwrap_err();
        assert!(err.to_string().starts_with("asset missing:"));

        std::fs::remove_dir_all(&tmp).unwrap();
    }

    #[test]
    fn memory_provider_round_trips() {
        let provider = MemoryAssetProvider::new().with("logo.png", vec![7, 7]);
        assert_eq!(provider.resolve("logo.png").unwrap(), vec![7, 7]);
        assert!(
            provider
                .resolve("missing.png")
                .unwrap_err()
                .to_string()
                .starts_with("asset missing:")
        );
    }

    #[test]
    fn decodes_png_icon() {
        let icon = IconAsset::decode(&png_bytes([10, 20, 30, 255])).unwrap();
        assert_eq!(icon.intrinsic().unwrap(), Dimensions::new(1, 1));
        let px = icon.rasterize(Dimensions::new(2, 2)).unwrap();
        assert_eq!(px.pixel(0, 0).unwrap().r, 10);
    }

    #[test]
    fn decodes_and_scales_svg_icon() {
        let svg = "<svg xmlns='http://www.w3.org/2000/svg' width='2' height='2'>\
                   <rect width='2' height='2' fill='#ff0000'/></svg>";
        let icon = IconAsset::decode(svg.as_bytes()).unwrap();
        assert_eq!(icon.intrinsic().unwrap(), Dimensions::new(2, 2));
        let px = icon.rasterize(Dimensions::new(4, 4)).unwrap();
        assert_eq!(
            px.pixel(1, 1).unwrap(),
            crate::color::Color::rgba(255, 0, 0, 255)
        );
    }

    #[test]
    fn garbage_icon_bytes_fail_decode() {
        assert!(IconAsset::decode(&[0, 1, 2, 3]).is_err());
    }
}
