//! # Platemark guide (v0.1.0)
//!
//! This module is a standalone walkthrough of Platemark's architecture and public API.
//! Platemark composes a branded overlay onto video: the source frame letterboxed onto a
//! target canvas, translucent black bands, a brand icon, decorative flanking lines, and
//! styled text. The same scene renders two ways with identical geometry: a pixel-accurate
//! CPU preview, and a filter chain handed to the system `ffmpeg` for export.
//!
//! If you are looking for copy/paste commands, start with the repository `README.md`.
//! If you are implementing new features, start here.
//!
//! ---
//!
//! ## Core concepts
//!
//! - [`Scene`](crate::Scene): the canvas, target aspect, and ordered layer list
//! - [`Layer`](crate::Layer): one of `Video`, `Band`, `Icon`, `Line`, `Text`; paint order is list order
//! - [`PreviewCompositor`](crate::PreviewCompositor): renders a scene over a sample frame into pixels
//! - [`FilterGraphCompiler`](crate::FilterGraphCompiler): lowers a scene into a [`FilterProgram`](crate::FilterProgram)
//! - [`FilterProgram`](crate::FilterProgram): labeled filter stages plus the final stream label
//! - [`RasterImage`](crate::RasterImage): straight-alpha RGBA8 pixels
//! - [`AssetProvider`](crate::AssetProvider): the only place icon and font IO is allowed
//!
//! Both renditions go through the same placement arithmetic:
//!
//! 1. Percentage sizes resolve through [`pct_px`](crate::geometry::pct_px)
//! 2. Signed placement percentages resolve through [`resolve_offset`](crate::resolve_offset)
//!    (preview) and [`position_offset`](crate::expr::position_offset) (compiler), which
//!    encode the same formula over free space
//!
//! ---
//!
//! ## One geometry, two renditions
//!
//! The preview is the source of truth for what a pixel looks like; the compiler is the
//! source of truth for what `ffmpeg` executes. They agree on every percentage placement,
//! band size, line segment, and text anchor. The one deliberate divergence is the base
//! frame: the preview crops the sample frame to the scene aspect before fitting, while
//! the compiled chain letterboxes the full frame (`scale` with
//! `force_original_aspect_ratio=decrease`, then `pad`). Overlay geometry is unaffected
//! because it is resolved against the canvas, not the frame content.
//!
//! Dimensions known at compile time (canvas size, band heights, icon width, dash
//! boundaries) are emitted as literals. Dimensions only `ffmpeg` knows (`text_w`,
//! `overlay_w`) stay symbolic through [`Expr`](crate::Expr), which folds constants and
//! prints with minimal parentheses.
//!
//! ---
//!
//! ## Scene JSON
//!
//! Scenes are serde documents. Layers are tagged by kind; omitted fields take their
//! defaults (video scale 100, line thickness 5, text color white):
//!
//! ```json
//! {
//!     "canvas": { "width": 1080, "height": 1920 },
//!     "aspect": "9:16",
//!     "layers": [
//!         { "Video": { "scale_pct": 80, "placement": "Top" } },
//!         { "Band": { "height_pct": 15, "opacity": 70, "anchor": "Bottom" } },
//!         { "Icon": { "asset": "icons/logo.png", "width_pct": 40, "x": 0, "y": 60 } },
//!         { "Line": { "kind": "Solid", "color": "#ff4d00", "opacity": 100, "y": 60 } },
//!         { "Text": { "text": "SPRING DROP", "size_px": 64, "color": "#ffffff", "y": 75 } }
//!     ]
//! }
//! ```
//!
//! [`Scene::from_json`](crate::Scene::from_json) validates on parse; invalid scenes are
//! never constructed. Position values are signed percentages in `[-100, 100]`: `0`
//! centers, `-100` pins to the top/left edge, `100` to the bottom/right edge.
//!
//! ---
//!
//! ## Example: preview and compile without external assets
//!
//! Scenes without icon or text layers need no IO at all, which makes the round trip easy
//! to show end to end:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use platemark::{
//!     AssetProvider, Color, FilterGraphCompiler, MemoryAssetProvider, PreviewCompositor,
//!     RasterImage, Scene,
//! };
//!
//! # fn main() -> platemark::PlatemarkResult<()> {
//! let scene = Scene::from_json(
//!     r#"{
//!         "canvas": { "width": 1080, "height": 1920 },
//!         "aspect": "9:16",
//!         "layers": [
//!             { "Video": { "scale_pct": 80, "placement": "Top" } },
//!             { "Band": { "height_pct": 15, "opacity": 70, "anchor": "Bottom" } }
//!         ]
//!     }"#,
//! )?;
//!
//! let icons: Arc<dyn AssetProvider> = Arc::new(MemoryAssetProvider::new());
//! let fonts: Arc<dyn AssetProvider> = Arc::new(MemoryAssetProvider::new());
//!
//! // Pixel-accurate preview over a sample frame.
//! let mut preview = PreviewCompositor::new(icons, Arc::clone(&fonts));
//! let sample = RasterImage::filled(1080, 1920, Color::rgb(40, 40, 40))?;
//! let frame = preview.render(&scene, &sample)?;
//! assert_eq!(frame.dimensions(), scene.canvas);
//!
//! // The same scene lowered to a filter chain for the external encoder.
//! let mut compiler = FilterGraphCompiler::new(fonts);
//! let program = compiler.compile(&scene)?;
//! println!("{}", program.chain());
//! # Ok(())
//! # }
//! ```
//!
//! ---
//!
//! ## Asset references and validation
//!
//! Icon and font references are provider keys, not filesystem paths. Validation enforces:
//!
//! - **relative** references (no leading `/` or drive prefix)
//! - OS-agnostic separators (`\` normalized to `/`)
//! - no `..` components
//!
//! Well-formedness is checked up front; existence is checked when the asset is actually
//! resolved. [`FsAssetProvider`](crate::FsAssetProvider) serves keys from a root
//! directory; [`MemoryAssetProvider`](crate::MemoryAssetProvider) serves registered
//! byte blobs and is what most tests use.
//!
//! ---
//!
//! ## Fonts and substitution
//!
//! Text shaping runs on Parley with glyphs rasterized by `vello_cpu`. A run whose `font`
//! reference cannot be resolved does not fail the render: the engine falls back to a
//! system sans-serif face and records a [`FontSubstitution`](crate::FontSubstitution),
//! retrievable via `take_font_substitutions` on both the compositor and the compiler.
//! The compiled chain emits a `fontfile=` token only for resolvable references, leaving
//! `ffmpeg` to its default face otherwise.
//!
//! Inline markup of the form `<red>...</red>` colors spans in the preview. The compiled
//! `drawtext` supports one color per run, so the compiler strips markup and keeps the
//! run's base color.
//!
//! ---
//!
//! ## Export: `ffmpeg` as a runtime prerequisite
//!
//! Platemark does not link FFmpeg libraries. [`run_export`](crate::run_export) assembles
//! the argument list ([`export_args`](crate::export_args)) and spawns the system binary:
//! filter chain via `-filter_complex`, final label mapped with `-map`, audio passed
//! through with `-c:a copy`, encoder selected by [`VideoEncoder`](crate::VideoEncoder).
//! If `ffmpeg` is not on `PATH`, export returns a structured error; there is no silent
//! fallback. Probing and sample-frame extraction for previews go through
//! [`probe_media`](crate::probe_media) and [`extract_frame`](crate::extract_frame) the
//! same way.
//!
//! ---
//!
//! ## Batches and live sessions
//!
//! - [`run_batch`](crate::run_batch) fans jobs out over a bounded rayon pool; outcomes
//!   come back in submission order and one failed job never aborts the rest
//! - [`PreviewSession`](crate::PreviewSession) owns a worker thread that re-renders on
//!   scene submission, coalescing rapid edits through a debounce window; the latest
//!   submission wins
