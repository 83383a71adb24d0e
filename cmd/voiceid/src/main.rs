//! voiceid - enroll and verify voice identities from WAV files.
//!
//! Drives the verification core end-to-end with the built-in stub engines:
//! useful for exercising the registry, the pool, and the result handle
//! without a vendor SDK.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use voiceid::stub::StubFactory;
use voiceid::{
    AudioSample, DirAssets, EngineRegistry, FileTemplateStore, TemplateMode, TemplateStore,
    VerificationRunner,
};

#[derive(Parser, Debug)]
#[command(name = "voiceid")]
#[command(about = "Voice identity enrollment and verification demo")]
struct Args {
    /// Engine assets directory (must contain the init-data subdirectories)
    #[arg(long)]
    assets: PathBuf,

    /// Template store directory
    #[arg(long)]
    store: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute an enrollment template from a WAV file and persist it
    Enroll {
        /// Input WAV file (PCM16, 16 kHz preferred)
        wav: PathBuf,

        /// Verification mode
        #[arg(long, value_enum, default_value_t = Mode::TextIndependent)]
        mode: Mode,
    },
    /// Verify a WAV file against the enrolled template
    Verify {
        /// Input WAV file (PCM16, 16 kHz preferred)
        wav: PathBuf,

        /// Verification mode
        #[arg(long, value_enum, default_value_t = Mode::TextIndependent)]
        mode: Mode,

        /// Also run the liveness check
        #[arg(long)]
        liveness: bool,

        /// Give up waiting for the result after this many milliseconds
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    TextDependent,
    TextIndependent,
}

impl From<Mode> for TemplateMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::TextDependent => TemplateMode::TextDependent,
            Mode::TextIndependent => TemplateMode::TextIndependent,
        }
    }
}

/// Reads a WAV file into an [`AudioSample`], keeping the first channel.
fn read_wav(path: &Path) -> Result<AudioSample> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("open {}", path.display()))?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        bail!(
            "{}: expected 16-bit integer PCM, got {:?}/{} bits",
            path.display(),
            spec.sample_format,
            spec.bits_per_sample
        );
    }
    if spec.channels == 0 {
        bail!("{}: WAV header declares zero channels", path.display());
    }

    let channels = spec.channels as usize;
    let samples: Vec<i16> = reader
        .samples::<i16>()
        .step_by(channels)
        .collect::<Result<_, _>>()
        .with_context(|| format!("decode {}", path.display()))?;
    Ok(AudioSample::new(samples, spec.sample_rate))
}

fn open_registry(assets: &Path) -> Result<Arc<EngineRegistry>> {
    let registry = Arc::new(EngineRegistry::new(Box::new(StubFactory)));
    registry
        .init(&DirAssets(assets.to_path_buf()))
        .context("record assets directory")?;
    Ok(registry)
}

async fn enroll(args: &Args, wav: &Path, mode: TemplateMode) -> Result<()> {
    let sample = read_wav(wav)?;
    let registry = open_registry(&args.assets)?;
    let store = FileTemplateStore::new(&args.store)?;

    // Gate on recording quality before paying for template creation.
    let summary = registry.get_summary_engine()?.summarize(&sample)?;
    if summary.speech_ratio() < 0.3 {
        tracing::warn!(
            speech_ms = summary.speech_ms,
            total_ms = summary.total_ms,
            "clip is mostly silence; enrollment quality will be poor"
        );
    }

    let engine = registry.get_verify_engine(mode)?;
    let template = engine.create_template(&sample)?;
    store.save(mode, template.as_bytes())?;

    println!(
        "{}",
        serde_json::json!({
            "enrolled": mode,
            "template_bytes": template.as_bytes().len(),
            "speech_ms": summary.speech_ms,
            "total_ms": summary.total_ms,
        })
    );
    Ok(())
}

async fn verify(
    args: &Args,
    wav: &Path,
    mode: TemplateMode,
    liveness: bool,
    timeout_ms: u64,
) -> Result<()> {
    let sample = Arc::new(read_wav(wav)?);
    let registry = open_registry(&args.assets)?;
    let store: Arc<dyn TemplateStore> = Arc::new(FileTemplateStore::new(&args.store)?);

    let runner = VerificationRunner::new(registry, store, liveness);
    let handle = runner.execute(sample, mode);

    // The runner reports failures only through the log; the deadline here is
    // the caller-side timeout the core asks hosts to provide.
    let result = tokio::time::timeout(Duration::from_millis(timeout_ms), handle.wait()).await;
    match result {
        Ok(Ok(combined)) => {
            println!("{}", serde_json::to_string_pretty(&combined)?);
            Ok(())
        }
        Ok(Err(_)) => bail!("verification attempt abandoned (see log for the cause)"),
        Err(_) => bail!("no result within {timeout_ms}ms"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }

    match &args.command {
        Command::Enroll { wav, mode } => enroll(&args, wav, (*mode).into()).await,
        Command::Verify {
            wav,
            mode,
            liveness,
            timeout_ms,
        } => verify(&args, wav, (*mode).into(), *liveness, *timeout_ms).await,
    }
}
