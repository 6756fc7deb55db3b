mod check;
mod config;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use config::{CliOverrides, ConfigMerger};
use pwaify_core::adapters::FsScanner;
use pwaify_core::ports::Scanner;
use pwaify_core::{PipelineResult, PipelineRunner, RunOutcome, StageName};
use pwaify_types::manifest::{CachingStrategy, DisplayMode};
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "pwaify",
    version,
    about = "Turn an existing web project into an installable PWA, transactionally."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate icons, manifest and service worker, and inject head tags.
    Init(InitArgs),
    /// Detect the project's framework without changing anything.
    Scan(ScanArgs),
    /// Check whether a project is already PWA-ready.
    Check(CheckArgs),
}

#[derive(Debug, Parser)]
struct InitArgs {
    /// Project root (default: current directory).
    #[arg(long, default_value = ".")]
    project_root: Utf8PathBuf,

    /// App name (default: project directory name).
    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    short_name: Option<String>,

    #[arg(long)]
    theme_color: Option<String>,

    #[arg(long)]
    background_color: Option<String>,

    #[arg(long, value_enum)]
    display: Option<DisplayArg>,

    /// Icon source image (PNG, JPEG, WebP or SVG), relative to the project root.
    #[arg(long)]
    icon: Option<Utf8PathBuf>,

    /// Maximum concurrent icon renders.
    #[arg(long)]
    icon_workers: Option<usize>,

    /// Output directory relative to the project root (default: detected).
    #[arg(long)]
    output_dir: Option<Utf8PathBuf>,

    /// URL prefix the output directory is served under.
    #[arg(long)]
    base_path: Option<String>,

    #[arg(long, value_enum)]
    caching: Option<CachingArg>,

    /// HTML file to inject into (repeatable). Default: discover.
    #[arg(long)]
    html: Vec<Utf8PathBuf>,

    /// Skip a stage (repeatable).
    #[arg(long, value_enum)]
    skip: Vec<StageArg>,

    /// Continue with static-site defaults when the project scan fails.
    /// Off by default: a failed scan aborts and rolls back.
    #[arg(long, default_value_t = false, conflicts_with = "no_fallback")]
    fallback: bool,

    /// Abort when the project scan fails, even if pwaify.toml enables the fallback.
    #[arg(long, default_value_t = false)]
    no_fallback: bool,

    /// Run every stage, then roll all changes back.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Print the run result as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Parser)]
struct ScanArgs {
    /// Project root (default: current directory).
    #[arg(long, default_value = ".")]
    project_root: Utf8PathBuf,

    /// Print the scan result as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Parser)]
struct CheckArgs {
    /// Project root (default: current directory).
    #[arg(long, default_value = ".")]
    project_root: Utf8PathBuf,

    /// Print the check report as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum DisplayArg {
    Fullscreen,
    Standalone,
    MinimalUi,
    Browser,
}

impl From<DisplayArg> for DisplayMode {
    fn from(arg: DisplayArg) -> Self {
        match arg {
            DisplayArg::Fullscreen => DisplayMode::Fullscreen,
            DisplayArg::Standalone => DisplayMode::Standalone,
            DisplayArg::MinimalUi => DisplayMode::MinimalUi,
            DisplayArg::Browser => DisplayMode::Browser,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CachingArg {
    Aggressive,
    Balanced,
    Conservative,
}

impl From<CachingArg> for CachingStrategy {
    fn from(arg: CachingArg) -> Self {
        match arg {
            CachingArg::Aggressive => CachingStrategy::Aggressive,
            CachingArg::Balanced => CachingStrategy::Balanced,
            CachingArg::Conservative => CachingStrategy::Conservative,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum StageArg {
    Scan,
    Icons,
    Manifest,
    ServiceWorker,
    Injection,
}

impl From<StageArg> for StageName {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Scan => StageName::Scan,
            StageArg::Icons => StageName::Icons,
            StageArg::Manifest => StageName::Manifest,
            StageArg::ServiceWorker => StageName::ServiceWorker,
            StageArg::Injection => StageName::Injection,
        }
    }
}

/// Exit code 2 = pipeline failed or project not ready, 1 = tool error.
fn main() -> ExitCode {
    match real_main() {
        Ok(true) => ExitCode::from(0),
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(1)
        }
    }
}

fn real_main() -> anyhow::Result<bool> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Init(args) => cmd_init(args),
        Command::Scan(args) => cmd_scan(args),
        Command::Check(args) => cmd_check(args),
    }
}

fn cmd_init(args: InitArgs) -> anyhow::Result<bool> {
    let root = args.project_root;
    anyhow::ensure!(root.is_dir(), "project root {} is not a directory", root);

    let file_config = config::load_or_default(&root).context("load pwaify.toml config")?;
    let overrides = CliOverrides {
        name: args.name,
        short_name: args.short_name,
        theme_color: args.theme_color,
        background_color: args.background_color,
        display: args.display.map(Into::into),
        icon_source: args.icon,
        icon_workers: args.icon_workers,
        output_dir: args.output_dir,
        base_path: args.base_path,
        caching_strategy: args.caching.map(Into::into),
        html: args.html,
        skip: args.skip.into_iter().map(Into::into).collect(),
        fallback: match (args.fallback, args.no_fallback) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        },
        dry_run: args.dry_run,
    };
    let settings = ConfigMerger::new(file_config).merge(root, overrides);
    debug!(?settings, "merged settings");

    let result = PipelineRunner::with_defaults(settings).run();
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("serialize result")?
        );
    } else {
        print_result(&result);
    }
    info!(txid = %result.transaction_id, "done");
    Ok(result.success)
}

fn print_result(result: &PipelineResult) {
    let status = match (result.success, result.outcome) {
        (true, RunOutcome::Committed) => "PWA enabled",
        (true, RunOutcome::RolledBack) => "dry run complete, nothing changed",
        (false, _) => "failed, all changes rolled back",
    };
    println!("pwaify: {status}");
    if let Some(scan) = &result.scan {
        println!("  framework:  {} ({:?})", scan.framework, scan.confidence);
    }
    if let Some(path) = &result.manifest_path {
        println!("  manifest:   {path}");
    }
    if let Some(path) = &result.service_worker_path {
        println!("  worker:     {path}");
    }
    println!("  icons:      {}", result.icons_generated);
    println!("  html files: {}", result.html_files_injected);
    for note in &result.notes {
        println!("  note: {note}");
    }
    for warning in &result.warnings {
        println!("  warning: {warning}");
    }
    for err in &result.errors {
        println!("  error: {err}");
    }
}

fn cmd_scan(args: ScanArgs) -> anyhow::Result<bool> {
    let scan = FsScanner.scan(&args.project_root)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&scan)?);
    } else {
        println!("framework:    {}", scan.framework);
        println!("architecture: {:?}", scan.architecture);
        println!("build tool:   {:?}", scan.build_tool);
        println!("confidence:   {:?}", scan.confidence);
        for indicator in &scan.indicators {
            println!("  - {indicator}");
        }
    }
    Ok(true)
}

fn cmd_check(args: CheckArgs) -> anyhow::Result<bool> {
    let root = args.project_root;
    let file_config = config::load_or_default(&root).context("load pwaify.toml config")?;
    let settings = ConfigMerger::new(file_config).merge(root, CliOverrides::default());

    let report = check::check_project(&settings)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "pwaify: {}",
            if report.valid { "ready" } else { "not ready" }
        );
        for page in &report.pages {
            println!("  {}: {} marker(s)", page.path, page.markers.values().sum::<usize>());
        }
        for warning in &report.warnings {
            println!("  warning: {warning}");
        }
        for err in &report.errors {
            println!("  error: {err}");
        }
    }
    Ok(report.valid)
}
