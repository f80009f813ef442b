//! Platemark composes a branded overlay onto video: the source frame fitted
//! onto a target canvas, translucent black bands, a brand icon, decorative
//! flanking lines, and styled text.
//!
//! The same validated [`Scene`] renders two ways with identical geometry:
//!
//! - Pixel-accurate CPU preview via [`PreviewCompositor`]
//! - A filter chain for the system `ffmpeg` via [`FilterGraphCompiler`]
//!
//! Exports, batches, and live preview sessions build on those two paths.
//! See [`guide`] for the full walkthrough.
#![forbid(unsafe_code)]

pub mod assets;
pub mod batch;
pub mod color;
pub mod compile;
pub mod encode;
pub mod error;
pub mod expr;
pub mod geometry;
pub mod guide;
pub mod media;
pub mod preview;
pub mod raster;
pub mod scene;
pub mod session;
pub mod text;

pub use crate::assets::{AssetProvider, FsAssetProvider, IconAsset, MemoryAssetProvider};
pub use crate::batch::{
    BatchJob, BatchOpts, BatchReport, BatchStats, ExportRunner, JobOutcome, JobRunner, run_batch,
};
pub use crate::color::Color;
pub use crate::compile::{FilterGraphCompiler, FilterProgram, Stage, StageKind};
pub use crate::encode::{ExportConfig, VideoEncoder, export_args, is_ffmpeg_on_path, run_export};
pub use crate::error::{PlatemarkError, PlatemarkResult};
pub use crate::expr::Expr;
pub use crate::geometry::{
    AspectRatio, CropRect, Dimensions, PositionSpec, fit_scale, resolve_crop, resolve_offset,
};
pub use crate::media::{MediaInfo, extract_frame, probe_media};
pub use crate::preview::PreviewCompositor;
pub use crate::raster::RasterImage;
pub use crate::scene::{
    BandAnchor, BandLayer, IconLayer, Layer, LineKind, LineLayer, PixelOffset, Scene,
    TextBoxStyle, TextRun, VideoLayer, VideoPlacement,
};
pub use crate::session::{PreviewSession, PreviewUpdate, SessionOpts};
pub use crate::text::FontSubstitution;
