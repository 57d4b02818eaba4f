use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

use shotblast::{
    BatchOrchestrator, CaptureChannel, ContainerFormat, Encoder, EncodeStatus, FrameIndex,
    FrameRange, ImageSequenceSource, JsonConfigStore, NoConfig, PlayblastRequest, PresetResolver,
    QualityTier, ResolutionSpec,
};

#[derive(Parser, Debug)]
#[command(name = "shotblast", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Produce one playblast from a staged image sequence.
    Blast(BlastArgs),
    /// Run a batch of playblast requests described in a JSON file.
    Batch(BatchArgs),
}

#[derive(Parser, Debug)]
struct SourceArgs {
    /// Directory holding staged frames named `<camera>.<frame:04>.png`.
    #[arg(long)]
    frames_dir: PathBuf,

    /// Scene name used by `{scene}` tags.
    #[arg(long)]
    scene: String,

    /// Frame rate of the staged sequence.
    #[arg(long, default_value_t = 24.0)]
    fps: f64,

    /// First staged frame.
    #[arg(long)]
    start: i64,

    /// Last staged frame (inclusive).
    #[arg(long)]
    end: i64,

    /// Optional JSON preference file (flat `shotblast.*` keys).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Font file for shot-mask text; system fonts are searched when omitted.
    #[arg(long)]
    font: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct BlastArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Camera whose frames to use.
    #[arg(long)]
    camera: String,

    /// Output directory.
    #[arg(long)]
    out_dir: PathBuf,

    /// Output filename template (`{scene}` / `{camera}` expand).
    #[arg(long, default_value = "{scene}")]
    filename: String,

    /// Resolution preset name, or explicit `WIDTHxHEIGHT`.
    #[arg(long, default_value = "HD 1080")]
    resolution: String,

    #[arg(long, value_enum, default_value_t = FormatChoice::Mp4)]
    format: FormatChoice,

    #[arg(long, value_enum, default_value_t = EncoderChoice::H264)]
    encoder: EncoderChoice,

    #[arg(long, value_enum, default_value_t = QualityChoice::High)]
    quality: QualityChoice,

    /// Mask template preset name.
    #[arg(long, default_value = "Standard")]
    mask_template: String,

    /// Disable the shot mask entirely.
    #[arg(long)]
    no_mask: bool,

    /// Audio file to mux into the output.
    #[arg(long)]
    audio: Option<PathBuf>,

    /// Start offset into the audio file, in seconds.
    #[arg(long, default_value_t = 0.0)]
    audio_offset: f64,
}

#[derive(Parser, Debug)]
struct BatchArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// JSON file with an array of playblast requests.
    #[arg(long)]
    requests: PathBuf,

    /// Worker count.
    #[arg(long, default_value_t = 2)]
    concurrency: usize,

    /// Cancel the batch on the first failure instead of continuing.
    #[arg(long)]
    fail_fast: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Mp4,
    Mov,
    Image,
}

impl From<FormatChoice> for ContainerFormat {
    fn from(c: FormatChoice) -> Self {
        match c {
            FormatChoice::Mp4 => ContainerFormat::Mp4,
            FormatChoice::Mov => ContainerFormat::Mov,
            FormatChoice::Image => ContainerFormat::Image,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EncoderChoice {
    H264,
    Prores,
    Png,
    Jpg,
    Tif,
}

impl From<EncoderChoice> for Encoder {
    fn from(c: EncoderChoice) -> Self {
        match c {
            EncoderChoice::H264 => Encoder::H264,
            EncoderChoice::Prores => Encoder::ProRes,
            EncoderChoice::Png => Encoder::Png,
            EncoderChoice::Jpg => Encoder::Jpg,
            EncoderChoice::Tif => Encoder::Tif,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum QualityChoice {
    VeryHigh,
    High,
    Medium,
    Low,
}

impl From<QualityChoice> for QualityTier {
    fn from(c: QualityChoice) -> Self {
        match c {
            QualityChoice::VeryHigh => QualityTier::VeryHigh,
            QualityChoice::High => QualityTier::High,
            QualityChoice::Medium => QualityTier::Medium,
            QualityChoice::Low => QualityTier::Low,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Blast(args) => cmd_blast(args),
        Command::Batch(args) => cmd_batch(args),
    }
}

fn build_orchestrator(source: &SourceArgs) -> anyhow::Result<(BatchOrchestrator, PresetResolver)> {
    let range = FrameRange::new(FrameIndex(source.start), FrameIndex(source.end))?;
    let capture = ImageSequenceSource::new(&source.frames_dir, &source.scene, source.fps, range)?;
    let channel = CaptureChannel::new(Box::new(capture));

    let resolver = match &source.config {
        Some(path) => PresetResolver::new(Arc::new(JsonConfigStore::load(path)?)),
        None => PresetResolver::new(Arc::new(NoConfig)),
    };

    let mut orchestrator = BatchOrchestrator::new(channel, resolver.clone());
    if let Some(font) = &source.font {
        let bytes = std::fs::read(font)
            .with_context(|| format!("read mask font '{}'", font.display()))?;
        orchestrator = orchestrator.with_mask_font(bytes);
    }
    Ok((orchestrator, resolver))
}

fn check_encoder(requests: &[PlayblastRequest], resolver: &PresetResolver) -> anyhow::Result<()> {
    let needs_encoder = requests.iter().any(|r| r.format != ContainerFormat::Image);
    if needs_encoder
        && !shotblast::encode::is_encoder_available(resolver.ffmpeg_path().as_deref())
    {
        anyhow::bail!(
            "ffmpeg is not available; install it, set shotblast.ffmpeg_path, or use image output"
        );
    }
    Ok(())
}

fn parse_resolution(raw: &str) -> ResolutionSpec {
    if let Some((w, h)) = raw.split_once('x')
        && let (Ok(width), Ok(height)) = (w.trim().parse(), h.trim().parse())
    {
        return ResolutionSpec::Custom { width, height };
    }
    ResolutionSpec::Preset(raw.to_string())
}

fn cmd_blast(args: BlastArgs) -> anyhow::Result<()> {
    let (orchestrator, resolver) = build_orchestrator(&args.source)?;

    let mut request = PlayblastRequest::new(&args.camera, &args.out_dir);
    request.filename = args.filename;
    request.resolution = parse_resolution(&args.resolution);
    request.format = args.format.into();
    request.encoder = args.encoder.into();
    request.quality = args.quality.into();
    request.shot_mask = !args.no_mask;
    request.mask_template = args.mask_template;
    request.audio = args.audio.map(|path| shotblast::AudioInput {
        path,
        offset_secs: args.audio_offset,
    });

    check_encoder(std::slice::from_ref(&request), &resolver)?;
    let result = orchestrator.run_batch(std::slice::from_ref(&request), 1);
    report(&result)
}

fn cmd_batch(args: BatchArgs) -> anyhow::Result<()> {
    let (orchestrator, resolver) = build_orchestrator(&args.source)?;
    let orchestrator = orchestrator.with_fail_fast(args.fail_fast);

    let raw = std::fs::read_to_string(&args.requests)
        .with_context(|| format!("read requests '{}'", args.requests.display()))?;
    let requests: Vec<PlayblastRequest> =
        serde_json::from_str(&raw).with_context(|| "parse requests JSON")?;
    if requests.is_empty() {
        anyhow::bail!("requests file '{}' is empty", args.requests.display());
    }

    check_encoder(&requests, &resolver)?;
    let result = orchestrator.run_batch(&requests, args.concurrency);
    report(&result)
}

fn report(result: &shotblast::BatchResult) -> anyhow::Result<()> {
    for outcome in &result.outcomes {
        let path: &Path = &outcome.result.output_path;
        match outcome.result.status {
            EncodeStatus::Success => eprintln!("wrote {}", path.display()),
            EncodeStatus::Cancelled => eprintln!("cancelled {} ({})", outcome.camera, path.display()),
            EncodeStatus::Failed => {
                let detail = outcome
                    .result
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".to_string());
                eprintln!("failed {}: {detail}", outcome.camera);
            }
        }
    }
    if result.all_succeeded() {
        Ok(())
    } else {
        anyhow::bail!(
            "{} of {} requests did not succeed",
            result.outcomes.len() - result.count(EncodeStatus::Success),
            result.outcomes.len()
        )
    }
}
