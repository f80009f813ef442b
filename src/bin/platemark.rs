use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

use platemark::{
    AssetProvider, BatchJob, BatchOpts, Dimensions, ExportConfig, ExportRunner,
    FilterGraphCompiler, FsAssetProvider, PreviewCompositor, Scene, VideoEncoder, extract_frame,
    probe_media, run_batch, run_export,
};

#[derive(Parser, Debug)]
#[command(name = "platemark", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the scene over a sampled frame as a PNG (requires `ffmpeg` on PATH).
    Preview(PreviewArgs),
    /// Print the compiled filter chain for a scene.
    Compile(CompileArgs),
    /// Export one media file with the scene overlay (requires `ffmpeg` on PATH).
    Export(ExportArgs),
    /// Run a manifest of export jobs on a worker pool.
    Batch(BatchArgs),
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Scene JSON.
    #[arg(long)]
    scene: PathBuf,

    /// Input media file to sample.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Sample timestamp in seconds.
    #[arg(long, default_value_t = 0.0)]
    at: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Directory icon and font references resolve against (default: the scene's directory).
    #[arg(long)]
    assets_root: Option<PathBuf>,

    /// Fit the preview inside this width (requires --fit-height).
    #[arg(long)]
    fit_width: Option<u32>,

    /// Fit the preview inside this height (requires --fit-width).
    #[arg(long)]
    fit_height: Option<u32>,
}

#[derive(Parser, Debug)]
struct CompileArgs {
    /// Scene JSON.
    #[arg(long)]
    scene: PathBuf,

    /// Directory font references resolve against (default: the scene's directory).
    #[arg(long)]
    assets_root: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Scene JSON.
    #[arg(long)]
    scene: PathBuf,

    /// Input media file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output media path.
    #[arg(long)]
    out: PathBuf,

    /// Directory icon and font references resolve against (default: the scene's directory).
    #[arg(long)]
    assets_root: Option<PathBuf>,

    /// Video encoder.
    #[arg(long, value_enum, default_value_t = EncoderChoice::Nvenc)]
    encoder: EncoderChoice,

    /// Fail instead of overwriting an existing output file.
    #[arg(long, default_value_t = false)]
    no_overwrite: bool,
}

#[derive(Parser, Debug)]
struct BatchArgs {
    /// Job manifest JSON: an array of {"scene", "input", "output"} entries
    /// with paths relative to the manifest file.
    #[arg(long)]
    manifest: PathBuf,

    /// Worker threads (default 4).
    #[arg(long)]
    threads: Option<usize>,

    /// Directory icon and font references resolve against (default: the manifest's directory).
    #[arg(long)]
    assets_root: Option<PathBuf>,

    /// Video encoder.
    #[arg(long, value_enum, default_value_t = EncoderChoice::Nvenc)]
    encoder: EncoderChoice,

    /// Fail instead of overwriting existing output files.
    #[arg(long, default_value_t = false)]
    no_overwrite: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EncoderChoice {
    Nvenc,
    X264,
}

impl From<EncoderChoice> for VideoEncoder {
    fn from(choice: EncoderChoice) -> Self {
        match choice {
            EncoderChoice::Nvenc => VideoEncoder::H264Nvenc,
            EncoderChoice::X264 => VideoEncoder::Libx264,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Preview(args) => cmd_preview(args),
        Command::Compile(args) => cmd_compile(args),
        Command::Export(args) => cmd_export(args),
        Command::Batch(args) => cmd_batch(args),
    }
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let scene = load_scene(&args.scene)?;
    let root = assets_root_for(&args.scene, args.assets_root.as_deref());
    let provider: Arc<dyn AssetProvider> = Arc::new(FsAssetProvider::new(root));
    let mut compositor = PreviewCompositor::new(Arc::clone(&provider), provider);

    let info = probe_media(&args.in_path)?;
    let sample = extract_frame(&info, args.at)?;

    let frame = match (args.fit_width, args.fit_height) {
        (Some(w), Some(h)) => compositor.render_fit(&scene, &sample, Dimensions::new(w, h))?,
        (None, None) => compositor.render(&scene, &sample)?,
        _ => anyhow::bail!("--fit-width and --fit-height must be given together"),
    };
    report_substitutions(compositor.take_font_substitutions());

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        frame.data(),
        frame.width(),
        frame.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_compile(args: CompileArgs) -> anyhow::Result<()> {
    let scene = load_scene(&args.scene)?;
    let root = assets_root_for(&args.scene, args.assets_root.as_deref());
    let provider: Arc<dyn AssetProvider> = Arc::new(FsAssetProvider::new(root));

    let mut compiler = FilterGraphCompiler::new(provider);
    let program = compiler.compile(&scene)?;
    report_substitutions(compiler.take_font_substitutions());

    println!("{}", program.chain());
    eprintln!("final stream label: [{}]", program.output_label);
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let scene = load_scene(&args.scene)?;
    let root = assets_root_for(&args.scene, args.assets_root.as_deref());
    let provider: Arc<dyn AssetProvider> = Arc::new(FsAssetProvider::new(root.clone()));

    let mut compiler = FilterGraphCompiler::new(provider);
    let program = compiler.compile(&scene)?;
    report_substitutions(compiler.take_font_substitutions());

    let cfg = ExportConfig::new(args.in_path, args.out.clone())
        .with_assets_root(root)
        .with_encoder(args.encoder.into())
        .with_overwrite(!args.no_overwrite);
    run_export(&program, &cfg)?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_batch(args: BatchArgs) -> anyhow::Result<()> {
    #[derive(serde::Deserialize)]
    struct ManifestEntry {
        scene: PathBuf,
        input: PathBuf,
        output: PathBuf,
    }

    let manifest = std::fs::read_to_string(&args.manifest)
        .with_context(|| format!("read manifest '{}'", args.manifest.display()))?;
    let entries: Vec<ManifestEntry> = serde_json::from_str(&manifest)
        .with_context(|| format!("parse manifest '{}'", args.manifest.display()))?;
    let base = args
        .manifest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    let mut jobs = Vec::with_capacity(entries.len());
    for entry in entries {
        jobs.push(BatchJob {
            scene: load_scene(&rebase(&base, &entry.scene))?,
            input: rebase(&base, &entry.input),
            output: rebase(&base, &entry.output),
        });
    }

    let root = assets_root_for(&args.manifest, args.assets_root.as_deref());
    let provider: Arc<dyn AssetProvider> = Arc::new(FsAssetProvider::new(root.clone()));
    let opts = BatchOpts {
        threads: args.threads,
        encoder: args.encoder.into(),
        assets_root: Some(root),
        overwrite: !args.no_overwrite,
    };
    let runner = ExportRunner::new(provider);
    let report = run_batch(&jobs, &runner, &opts)?;

    for outcome in &report.outcomes {
        if let Some(error) = &outcome.error {
            eprintln!("job {} ({}): {error}", outcome.index, outcome.output.display());
        }
    }
    eprintln!(
        "{} of {} jobs succeeded",
        report.stats.succeeded, report.stats.jobs_total
    );
    if !report.all_succeeded() {
        anyhow::bail!("{} job(s) failed", report.stats.failed);
    }
    Ok(())
}

fn load_scene(path: &Path) -> anyhow::Result<Scene> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("read scene '{}'", path.display()))?;
    Ok(Scene::from_json(&json)?)
}

fn assets_root_for(anchor: &Path, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(root) => root.to_path_buf(),
        None => anchor
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf(),
    }
}

fn rebase(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn report_substitutions(subs: Vec<platemark::FontSubstitution>) {
    for sub in subs {
        eprintln!(
            "font '{}' not found, substituted '{}'",
            sub.requested, sub.family
        );
    }
}
