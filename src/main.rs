use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use scribed::config::Config;
use scribed::dispatcher::Dispatcher;
use scribed::engine::{EnergyDiarizer, FixtureEngine};
use scribed::export::{ArtifactFormat, Exporter, TextVariant};
use scribed::job::{JobOptions, JobStatus, ModelSize};
use scribed::queue::QueueSet;
use scribed::service::JobService;
use scribed::stage::{DialectMapper, Redactor, StageRegistry};
use scribed::store::{MemoryStore, PersistenceGateway};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "scribed", version, about = "Dialect-aware transcription job pipeline")]
struct Cli {
    /// Path to a config file (default: ~/.config/scribed/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe one WAV file end to end and print the result
    Run {
        /// WAV file to transcribe
        audio: PathBuf,

        /// Output format: txt, srt, vtt, or jsonl
        #[arg(long, default_value = "txt")]
        format: String,

        /// Recognition model size
        #[arg(long)]
        model: Option<String>,

        /// Language hint (e.g. "th", "en")
        #[arg(long)]
        language: Option<String>,

        /// Queue to submit to
        #[arg(long)]
        queue: Option<String>,

        /// Map regional dialect tokens to standard Thai and print that variant
        #[arg(long)]
        dialect: bool,

        /// Mask phone numbers, national ids, and account numbers
        #[arg(long)]
        redact: bool,

        #[arg(long)]
        no_diarization: bool,

        #[arg(long)]
        no_punct: bool,

        #[arg(long)]
        no_itn: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    config.validate()?;

    match cli.command {
        Commands::Run {
            audio,
            format,
            model,
            language,
            queue,
            dialect,
            redact,
            no_diarization,
            no_punct,
            no_itn,
        } => {
            let format: ArtifactFormat = format
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            let model_size = match model {
                Some(name) => name
                    .parse::<ModelSize>()
                    .map_err(|e| anyhow::anyhow!(e))?,
                None => config.pipeline.model_size,
            };
            let options = JobOptions {
                model_size,
                enable_diarization: !no_diarization,
                enable_punct: !no_punct,
                enable_itn: !no_itn,
                enable_dialect_map: dialect,
                enable_redaction: redact,
                language_hint: language.or_else(|| Some(config.pipeline.language.clone())),
                custom_lexicon: None,
                context_prompt: None,
            };
            run_one(&config, &audio, options, format, dialect, redact, queue.as_deref())
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Run a single job through an in-process dispatcher and print the artifact.
fn run_one(
    config: &Config,
    audio: &std::path::Path,
    options: JobOptions,
    format: ArtifactFormat,
    dialect: bool,
    redact: bool,
    queue: Option<&str>,
) -> Result<()> {
    let gateway = Arc::new(PersistenceGateway::new(Arc::new(MemoryStore::new())));
    let queues = Arc::new(QueueSet::new());
    let exporter = Arc::new(Exporter::new(config.data_dir().join("artifacts")));

    let mut mapper = DialectMapper::default();
    if let Some(csv) = &config.pipeline.dialect_csv {
        mapper
            .load_csv(csv)
            .with_context(|| format!("failed to load dialect table {}", csv.display()))?;
    }
    let redactor = if config.pipeline.redact_patterns.is_empty() {
        Redactor::default()
    } else {
        Redactor::new(&config.pipeline.redact_patterns)
            .context("invalid redaction pattern in config")?
    };
    let registry = Arc::new(StageRegistry::standard(
        Arc::new(FixtureEngine::new()),
        Arc::new(EnergyDiarizer::default()),
        mapper,
        redactor,
    ));

    let service = JobService::new(gateway.clone(), queues.clone(), exporter.clone(), config)?;
    let record = service.submit_path(audio, options, queue)?;
    let id = record.id;

    let handle = Dispatcher::new(gateway, queues, registry, exporter, config.clone())
        .with_queue_names(vec![record.queue.clone()])
        .start()?;

    let view = loop {
        let view = service.status(id)?;
        if view.status.is_terminal() {
            break view;
        }
        std::thread::sleep(Duration::from_millis(50));
    };
    handle.stop();

    if view.status == JobStatus::Error {
        bail!(
            "transcription failed: {}",
            view.error_message.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    let variant = if dialect {
        TextVariant::Dialect
    } else {
        TextVariant::Standard
    };
    let (_, bytes) = service.artifact(id, format, variant, redact)?;
    print!("{}", String::from_utf8_lossy(&bytes));
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "scribed=info",
        1 => "scribed=debug",
        _ => "scribed=trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/scribed/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&std::path::Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else if let Some(default_path) = Config::default_path() {
        Config::load_or_default(&default_path)?
    } else {
        Config::default()
    };

    Ok(config.with_env_overrides())
}
