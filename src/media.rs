//! Media probing and frame extraction through the external `ffprobe` and
//! `ffmpeg` binaries.

use std::path::{Path, PathBuf};

use crate::error::{PlatemarkError, PlatemarkResult};
use crate::geometry::Dimensions;
use crate::raster::RasterImage;

/// Basic metadata about a source media file.
#[derive(Clone, Debug)]
pub struct MediaInfo {
    /// Path used for probing and frame extraction.
    pub path: PathBuf,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Frame rate numerator.
    pub fps_num: u32,
    /// Frame rate denominator.
    pub fps_den: u32,
    /// Container duration in seconds, 0 when the container does not report one.
    pub duration_sec: f64,
    /// Whether ffprobe detected at least one audio stream.
    pub has_audio: bool,
}

impl MediaInfo {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    pub fn fps(&self) -> f64 {
        if self.fps_den == 0 {
            return 0.0;
        }
        f64::from(self.fps_num) / f64::from(self.fps_den)
    }
}

/// Probe source media metadata through `ffprobe`.
pub fn probe_media(path: &Path) -> PlatemarkResult<MediaInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    if !path.is_file() {
        return Err(PlatemarkError::asset_missing(format!(
            "media file '{}' does not exist",
            path.display()
        )));
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| PlatemarkError::render(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(PlatemarkError::render(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| PlatemarkError::render(format!("ffprobe json parse failed: {e}")))?;
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| PlatemarkError::render("no video stream found"))?;
    let width = video_stream
        .width
        .ok_or_else(|| PlatemarkError::render("missing video width from ffprobe"))?;
    let height = video_stream
        .height
        .ok_or_else(|| PlatemarkError::render("missing video height from ffprobe"))?;

    let (fps_num, fps_den) = parse_ff_ratio(video_stream.r_frame_rate.as_deref().unwrap_or("0/1"))
        .ok_or_else(|| PlatemarkError::render("invalid video r_frame_rate"))?;
    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(MediaInfo {
        path: path.to_path_buf(),
        width,
        height,
        fps_num,
        fps_den,
        duration_sec,
        has_audio,
    })
}

/// Decode a single RGBA frame at `at_sec`, clamped into the probed duration.
pub fn extract_frame(info: &MediaInfo, at_sec: f64) -> PlatemarkResult<RasterImage> {
    let at = if info.duration_sec > 0.0 {
        at_sec.clamp(0.0, info.duration_sec)
    } else {
        at_sec.max(0.0)
    };

    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-ss", &format!("{at:.9}")])
        .arg("-i")
        .arg(&info.path)
        .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
        .output()
        .map_err(|e| PlatemarkError::render(format!("failed to run ffmpeg for frame decode: {e}")))?;

    if !out.status.success() {
        return Err(PlatemarkError::render(format!(
            "ffmpeg frame decode failed for '{}': {}",
            info.path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let expected_len = info.width as usize * info.height as usize * 4;
    if expected_len == 0 {
        return Err(PlatemarkError::render(
            "decoded frame size is zero (invalid source dimensions)",
        ));
    }
    if out.stdout.len() < expected_len || !out.stdout.len().is_multiple_of(expected_len) {
        return Err(PlatemarkError::render(format!(
            "decoded frame has invalid size: got {} bytes, expected {expected_len}",
            out.stdout.len()
        )));
    }

    RasterImage::from_rgba_bytes(info.width, info.height, out.stdout[..expected_len].to_vec())
}

fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = parts.next()?.parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}

// Probing and extraction shell out to `ffprobe`/`ffmpeg`; they are covered by
// integration tests that skip when the tools are unavailable.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ff_ratio_parses_and_rejects_zero_denominator() {
        assert_eq!(parse_ff_ratio("30000/1001"), Some((30000, 1001)));
        assert_eq!(parse_ff_ratio("25/1"), Some((25, 1)));
        assert_eq!(parse_ff_ratio("0/0"), None);
        assert_eq!(parse_ff_ratio("abc"), None);
    }
}
