// crates/sctrace-cli/src/main.rs

#![forbid(unsafe_code)]
#![deny(
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo
)]

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ndarray::ArrayD;
use sctrace_core::{
    batches, ArraySpec, Batch, IndexStrategy, Location, MultipleConfig, MultipleContainer,
    Processing, Section, Selection, ShapePolicy, TraceBatchContainer, TraceContainer,
};
use sctrace_synth::generator::{generate_many, SynthParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Sub = TraceBatchContainer<f32, u8>;

#[derive(Parser, Debug)]
#[command(
    name = "sctrace-cli",
    about = "Side-channel trace concatenation CLI",
    long_about = "Side-channel trace concatenation CLI.\n\nBuilds synthetic trace containers of the given lengths, concatenates them without copying, and prints lookups and merged batches as JSON.",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    #[command(flatten)]
    global: Global,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Args, Debug)]
struct Global {
    /// TOML file with optional `[container]` and `[synth]` tables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Index lookup strategy (overrides the config file)
    #[arg(long, value_enum, global = true)]
    strategy: Option<StrategyOpt>,

    /// Derived-spec policy (overrides the config file)
    #[arg(long, value_enum, global = true)]
    shape_policy: Option<PolicyOpt>,
}

/// Which synthetic containers to concatenate.
#[derive(Args, Debug, Clone)]
struct Source {
    /// Comma-separated sub-container lengths, e.g. `3,4`
    #[arg(long, value_delimiter = ',', num_args = 1.., required = true)]
    lengths: Vec<usize>,

    /// Points per leakage sample
    #[arg(long)]
    samples: Option<usize>,

    /// Base RNG seed; each sub-container derives its own
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Print the concatenation's size, per-container lengths and derived specs.
    Inspect {
        #[command(flatten)]
        source: Source,
    },

    /// Fetch a single index or a contiguous span as one merged batch.
    Fetch {
        #[command(flatten)]
        source: Source,

        /// Range start (default 0)
        #[arg(long)]
        start: Option<usize>,

        /// Range stop, exclusive (default: total)
        #[arg(long)]
        stop: Option<usize>,

        /// Range step; anything but 1 is rejected
        #[arg(long)]
        step: Option<usize>,

        /// Explicit comma-separated positions; must be consecutive
        #[arg(long, value_delimiter = ',', conflicts_with_all = ["start", "stop", "step"])]
        indices: Option<Vec<usize>>,

        /// Leakage section, `lo..hi` or `a,b,c`
        #[arg(long)]
        section: Option<Section>,

        /// Value section, `lo..hi` or `a,b,c`
        #[arg(long)]
        value_section: Option<Section>,

        /// Subtract each leakage sample's mean
        #[arg(long, default_value_t = false)]
        center: bool,
    },

    /// Translate a global position into (container, offset).
    Locate {
        #[command(flatten)]
        source: Source,

        /// Global position in `[0, total]`
        #[arg(long)]
        position: usize,
    },

    /// Stream the concatenation in fixed-size batches and summarize each.
    Scan {
        #[command(flatten)]
        source: Source,

        /// Traces per batch (>0)
        #[arg(long, default_value_t = 64)]
        size: usize,
    },
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum StrategyOpt {
    /// Precomputed per-position table
    Table,
    /// Cumulative offsets with binary search
    Offsets,
}

impl From<StrategyOpt> for IndexStrategy {
    fn from(o: StrategyOpt) -> Self {
        match o {
            StrategyOpt::Table => Self::Table,
            StrategyOpt::Offsets => Self::Offsets,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum PolicyOpt {
    /// Trust the last sub-container written
    LastWriterWins,
    /// Require all non-empty sub-containers to agree
    RequireUniform,
}

impl From<PolicyOpt> for ShapePolicy {
    fn from(o: PolicyOpt) -> Self {
        match o {
            PolicyOpt::LastWriterWins => Self::LastWriterWins,
            PolicyOpt::RequireUniform => Self::RequireUniform,
        }
    }
}

/// Contents of `--config`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
struct FileConfig {
    container: MultipleConfig,
    synth: SynthParams,
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg = load_config(&cli.global)?;
    match cli.cmd {
        Cmd::Inspect { source } => inspect(&cfg, &source),

        Cmd::Fetch {
            source,
            start,
            stop,
            step,
            indices,
            section,
            value_section,
            center,
        } => fetch(
            &cfg,
            &source,
            &selection(start, stop, step, indices),
            section,
            value_section,
            center,
        ),

        Cmd::Locate { source, position } => locate(&cfg, &source, position),

        Cmd::Scan { source, size } => scan(&cfg, &source, size),
    }
}

/// Initialize tracing with an env-driven filter (default INFO).
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false).with_level(true).compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Read `--config` (if any), then apply flag overrides.
fn load_config(global: &Global) -> Result<FileConfig> {
    let mut cfg = match &global.config {
        Some(path) => read_config(path)?,
        None => FileConfig::default(),
    };
    if let Some(s) = global.strategy {
        cfg.container.strategy = s.into();
    }
    if let Some(p) = global.shape_policy {
        cfg.container.shape_policy = p.into();
    }
    Ok(cfg)
}

fn read_config(path: &Path) -> Result<FileConfig> {
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    parse_config(&src).with_context(|| format!("parse config {}", path.display()))
}

fn parse_config(src: &str) -> Result<FileConfig> {
    Ok(toml::from_str(src)?)
}

/// Map the fetch flags to a request; an index list wins over range bounds.
fn selection(
    start: Option<usize>,
    stop: Option<usize>,
    step: Option<usize>,
    indices: Option<Vec<usize>>,
) -> Selection {
    match indices {
        Some(list) => Selection::Indices(list),
        None => Selection::Range { start, stop, step },
    }
}

fn build(cfg: &FileConfig, source: &Source) -> Result<Vec<Sub>> {
    let params = SynthParams {
        samples: source.samples.unwrap_or(cfg.synth.samples),
        seed: source.seed.unwrap_or(cfg.synth.seed),
        ..cfg.synth
    };
    info!(lengths = ?source.lengths, samples = params.samples, seed = params.seed, "generating containers");
    generate_many(&source.lengths, &params).context("generating synthetic containers")
}

fn concat<'a>(cfg: &FileConfig, subs: &'a mut [Sub]) -> Result<MultipleContainer<'a, Sub>> {
    MultipleContainer::with_config(subs.iter_mut().collect(), cfg.container)
        .context("concatenating containers")
}

fn print_json<T: Serialize>(v: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(v).context("serialize report")?);
    Ok(())
}

#[derive(Serialize)]
struct InspectReport {
    total: usize,
    lengths: Vec<usize>,
    leakage: ArraySpec,
    value: ArraySpec,
    strategy: IndexStrategy,
    shape_policy: ShapePolicy,
}

fn inspect(cfg: &FileConfig, source: &Source) -> Result<()> {
    let mut subs = build(cfg, source)?;
    let multi = concat(cfg, &mut subs)?;
    print_json(&InspectReport {
        total: multi.len(),
        lengths: multi.index_map().lengths().to_vec(),
        leakage: multi.leakage_spec(),
        value: multi.value_spec(),
        strategy: multi.index_map().strategy(),
        shape_policy: multi.config().shape_policy,
    })
}

#[derive(Serialize)]
struct FetchReport<'b> {
    traces: usize,
    leakage: ArraySpec,
    value: ArraySpec,
    batch: &'b Batch<f32, u8>,
}

fn fetch(
    cfg: &FileConfig,
    source: &Source,
    request: &Selection,
    section: Option<Section>,
    value_section: Option<Section>,
    center: bool,
) -> Result<()> {
    let mut subs = build(cfg, source)?;
    let mut multi = concat(cfg, &mut subs)?;

    if section.is_some() {
        multi
            .set_leakage_section(section)
            .context("applying leakage section")?;
    }
    if value_section.is_some() {
        multi
            .set_value_section(value_section)
            .context("applying value section")?;
    }
    if center {
        let centered = Processing::new("center", |x: ArrayD<f32>| {
            let mean = x.mean().unwrap_or(0.0);
            x - mean
        });
        multi
            .set_leakage_processing(Some(centered))
            .context("applying leakage processing")?;
    }

    info!(?request, total = multi.len(), "fetching");
    let batch = multi
        .select(request)
        .with_context(|| format!("fetching {request:?}"))?;
    print_json(&FetchReport {
        traces: batch.len(),
        leakage: batch.leakage_spec(),
        value: batch.value_spec(),
        batch: &batch,
    })
}

#[derive(Serialize)]
struct LocateReport {
    position: usize,
    #[serde(flatten)]
    location: Location,
    sentinel: bool,
}

fn locate(cfg: &FileConfig, source: &Source, position: usize) -> Result<()> {
    let mut subs = build(cfg, source)?;
    let multi = concat(cfg, &mut subs)?;
    let location = multi
        .locate(position)
        .with_context(|| format!("locating position {position}"))?;
    print_json(&LocateReport {
        position,
        location,
        sentinel: position == multi.len(),
    })
}

fn scan(cfg: &FileConfig, source: &Source, size: usize) -> Result<()> {
    let mut subs = build(cfg, source)?;
    let multi = concat(cfg, &mut subs)?;

    let mut seen = 0usize;
    for (i, item) in batches(&multi, size).context("starting batch scan")?.enumerate() {
        let batch = item.with_context(|| format!("reading batch {i}"))?;
        let mean = batch.leakages().mean().unwrap_or(0.0);
        println!(
            "batch {i}: traces {}..{} mean leakage {mean:.3}",
            seen,
            seen + batch.len()
        );
        seen += batch.len();
    }
    println!("Scanned {seen} traces in batches of {size}");
    Ok(())
}
