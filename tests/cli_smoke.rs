use std::path::{Path, PathBuf};

use platemark::{
    AspectRatio, BandAnchor, BandLayer, Dimensions, Layer, Scene, is_ffmpeg_on_path,
};

fn smoke_dir() -> PathBuf {
    let dir = PathBuf::from("target").join("cli_smoke");
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn ffprobe_available() -> bool {
    std::process::Command::new("ffprobe")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn write_scene(path: &Path, canvas: Dimensions, aspect: AspectRatio) {
    let scene = Scene {
        canvas,
        aspect,
        layers: vec![Layer::Band(BandLayer {
            height_pct: 15.0,
            opacity: 70.0,
            anchor: BandAnchor::Top,
            offset: None,
        })],
    };
    let f = std::fs::File::create(path).unwrap();
    serde_json::to_writer_pretty(f, &scene).unwrap();
}

fn platemark_exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_platemark")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "platemark.exe"
            } else {
                "platemark"
            });
            p
        })
}

#[test]
fn cli_compile_prints_the_filter_chain() {
    let dir = smoke_dir();
    let scene_path = dir.join("compile_scene.json");
    write_scene(&scene_path, Dimensions::new(1080, 1920), AspectRatio::VERTICAL);

    let out = std::process::Command::new(platemark_exe())
        .args(["compile", "--scene"])
        .arg(&scene_path)
        .output()
        .unwrap();

    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("[0:v]scale=1080:1920:"), "got: {stdout}");
    assert!(stdout.contains(";[base]drawbox="), "got: {stdout}");
    assert!(stdout.trim_end().ends_with("[band1]"), "got: {stdout}");
}

#[test]
fn cli_preview_writes_png() {
    if !is_ffmpeg_on_path() || !ffprobe_available() {
        eprintln!("skipping: ffmpeg/ffprobe not on PATH");
        return;
    }

    let dir = smoke_dir();
    let clip_path = dir.join("clip.mp4");
    let scene_path = dir.join("preview_scene.json");
    let out_path = dir.join("preview.png");
    let _ = std::fs::remove_file(&out_path);

    // Synthesize a short solid-color clip to sample from.
    let generated = std::process::Command::new("ffmpeg")
        .args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "lavfi",
            "-i",
            "color=c=gray:s=320x640:d=1",
            "-pix_fmt",
            "yuv420p",
        ])
        .arg(&clip_path)
        .status();
    if !generated.map(|s| s.success()).unwrap_or(false) {
        eprintln!("skipping: could not synthesize a test clip");
        return;
    }

    write_scene(
        &scene_path,
        Dimensions::new(320, 640),
        AspectRatio::new(1, 2).unwrap(),
    );

    let status = std::process::Command::new(platemark_exe())
        .args(["preview", "--scene"])
        .arg(&scene_path)
        .args(["--in"])
        .arg(&clip_path)
        .args(["--at", "0.1", "--out"])
        .arg(&out_path)
        .status()
        .unwrap();

    assert!(status.success());
    assert!(out_path.exists());
}
