//! Export invocation: assembling and running the external `ffmpeg` command
//! that applies a compiled [`FilterProgram`] to a source file.
//!
//! The system `ffmpeg` binary is used rather than linking FFmpeg libraries,
//! which keeps the build free of native dev headers.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context as _;

use crate::compile::FilterProgram;
use crate::error::{PlatemarkError, PlatemarkResult};

/// Video codec selection for export.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VideoEncoder {
    /// NVIDIA hardware encoder, constant quality 20.
    #[default]
    H264Nvenc,
    /// Software encoder with yuv420p output for maximum player compatibility.
    Libx264,
}

impl VideoEncoder {
    pub fn args(&self) -> &'static [&'static str] {
        match self {
            VideoEncoder::H264Nvenc => &["-c:v", "h264_nvenc", "-preset", "p4", "-cq", "20"],
            VideoEncoder::Libx264 => &[
                "-c:v", "libx264", "-preset", "medium", "-crf", "20", "-pix_fmt", "yuv420p",
            ],
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExportConfig {
    /// Primary media input.
    pub input: PathBuf,
    /// Destination file.
    pub output: PathBuf,
    /// Directory that icon and font references in the program resolve
    /// against. `ffmpeg` runs with this as its working directory.
    pub assets_root: Option<PathBuf>,
    pub encoder: VideoEncoder,
    pub overwrite: bool,
}

impl ExportConfig {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            assets_root: None,
            encoder: VideoEncoder::default(),
            overwrite: true,
        }
    }

    pub fn with_assets_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.assets_root = Some(root.into());
        self
    }

    pub fn with_encoder(mut self, encoder: VideoEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> PlatemarkResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// The full `ffmpeg` argument list for one export. Pure assembly, no
/// filesystem access.
pub fn export_args(program: &FilterProgram, cfg: &ExportConfig) -> Vec<String> {
    let mut args: Vec<String> = vec!["-loglevel".into(), "error".into()];
    args.push("-i".into());
    args.push(cfg.input.display().to_string());
    if let Some(icon) = &program.icon_asset {
        args.push("-i".into());
        args.push(icon.clone());
    }
    args.push("-filter_complex".into());
    args.push(program.chain());
    args.push("-map".into());
    args.push(format!("[{}]", program.output_label));
    args.push("-map".into());
    args.push("0:a?".into());
    args.extend(cfg.encoder.args().iter().map(|s| s.to_string()));
    args.push("-c:a".into());
    args.push("copy".into());
    args.push("-movflags".into());
    args.push("+faststart".into());
    args.push(if cfg.overwrite { "-y" } else { "-n" }.into());
    args.push(cfg.output.display().to_string());
    args
}

/// Run one export end to end: pre-flight checks, then the `ffmpeg` process.
#[tracing::instrument(skip(program, cfg), fields(output = %cfg.output.display()))]
pub fn run_export(program: &FilterProgram, cfg: &ExportConfig) -> PlatemarkResult<()> {
    if !cfg.input.is_file() {
        return Err(PlatemarkError::asset_missing(format!(
            "input media '{}' does not exist",
            cfg.input.display()
        )));
    }
    if let Some(icon) = &program.icon_asset {
        let resolved = match &cfg.assets_root {
            Some(root) => root.join(icon),
            None => PathBuf::from(icon),
        };
        if !resolved.is_file() {
            return Err(PlatemarkError::asset_missing(format!(
                "icon asset '{icon}' not found at '{}'",
                resolved.display()
            )));
        }
    }
    if !cfg.overwrite && cfg.output.exists() {
        return Err(PlatemarkError::validation(format!(
            "output file '{}' already exists",
            cfg.output.display()
        )));
    }
    ensure_parent_dir(&cfg.output)?;
    if !is_ffmpeg_on_path() {
        return Err(PlatemarkError::render(
            "ffmpeg is required for export, but was not found on PATH",
        ));
    }

    // Relative icon and font tokens in the chain resolve against the ffmpeg
    // working directory, so input/output must stay valid after the cwd moves.
    let mut effective = cfg.clone();
    if cfg.assets_root.is_some() {
        effective.input = std::path::absolute(&cfg.input)
            .with_context(|| format!("failed to absolutize '{}'", cfg.input.display()))?;
        effective.output = std::path::absolute(&cfg.output)
            .with_context(|| format!("failed to absolutize '{}'", cfg.output.display()))?;
    }

    let mut cmd = Command::new("ffmpeg");
    if let Some(root) = &cfg.assets_root {
        cmd.current_dir(root);
    }
    let out = cmd
        .args(export_args(program, &effective))
        .output()
        .map_err(|e| PlatemarkError::render(format!("failed to run ffmpeg: {e}")))?;

    if !out.status.success() {
        return Err(PlatemarkError::render(format!(
            "ffmpeg exited with status {}: {}",
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    tracing::info!("export finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{Stage, StageKind};

    fn program(icon: Option<&str>) -> FilterProgram {
        FilterProgram {
            stages: vec![Stage {
                kind: StageKind::Base,
                label: "base".to_string(),
                inputs: vec!["0:v".to_string()],
                body: "scale=1080:1920:force_original_aspect_ratio=decrease,pad=1080:1920:(ow-iw)/2:(oh-ih)/2:black".to_string(),
            }],
            output_label: "base".to_string(),
            icon_asset: icon.map(str::to_string),
        }
    }

    #[test]
    fn args_map_final_label_and_pass_audio_through() {
        let cfg = ExportConfig::new("in.mp4", "out.mp4");
        let args = export_args(&program(None), &cfg);
        let map_at = args.iter().position(|a| a == "-map").unwrap();
        assert_eq!(args[map_at + 1], "[base]");
        assert_eq!(args[map_at + 2], "-map");
        assert_eq!(args[map_at + 3], "0:a?");
        let ca = args.iter().position(|a| a == "-c:a").unwrap();
        assert_eq!(args[ca + 1], "copy");
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn icon_program_adds_second_input() {
        let cfg = ExportConfig::new("in.mp4", "out.mp4");
        let args = export_args(&program(Some("icons/logo.png")), &cfg);
        let inputs: Vec<&String> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "-i")
            .map(|(i, _)| &args[i + 1])
            .collect();
        assert_eq!(inputs, ["in.mp4", "icons/logo.png"]);
    }

    #[test]
    fn encoder_choice_switches_codec_args() {
        let cfg = ExportConfig::new("in.mp4", "out.mp4").with_encoder(VideoEncoder::Libx264);
        let args = export_args(&program(None), &cfg);
        assert!(args.iter().any(|a| a == "libx264"));
        assert!(args.iter().any(|a| a == "yuv420p"));

        let cfg = cfg.with_encoder(VideoEncoder::H264Nvenc);
        let args = export_args(&program(None), &cfg);
        assert!(args.iter().any(|a| a == "h264_nvenc"));
        assert!(args.iter().any(|a| a == "-cq"));
    }

    #[test]
    fn overwrite_flag_flips_between_y_and_n() {
        let cfg = ExportConfig::new("in.mp4", "out.mp4");
        assert!(export_args(&program(None), &cfg).iter().any(|a| a == "-y"));
        let cfg = cfg.with_overwrite(false);
        assert!(export_args(&program(None), &cfg).iter().any(|a| a == "-n"));
    }
}
