//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use joblens_core::{AnalyzeConfig, AnalyzeResult, Analyzer, ProgressReporter, RowStage};
use joblens_shared::{AppConfig, RendererKind, init_config, load_config, validate_api_key};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// JobLens: classify the job postings behind a table of links.
#[derive(Parser)]
#[command(
    name = "joblens",
    version,
    about = "Render job links, classify each posting with an LLM, and write the results back to the table.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Rendering backend override.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum RendererArg {
    Chromium,
    Http,
}

impl From<RendererArg> for RendererKind {
    fn from(arg: RendererArg) -> Self {
        match arg {
            RendererArg::Chromium => RendererKind::Chromium,
            RendererArg::Http => RendererKind::Http,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Analyze every job link in a CSV table.
    Analyze {
        /// CSV table with at least a `Link` column.
        input: PathBuf,

        /// Write results here instead of rewriting the input.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Rendering backend (overrides `[fetcher] renderer`).
        #[arg(long)]
        renderer: Option<RendererArg>,

        /// Persist after this many rows (overrides `[defaults] persist_every`).
        #[arg(long)]
        persist_every: Option<usize>,
    },

    /// Serve the HTTP analyze trigger.
    Serve {
        /// Address to bind (overrides `[server] bind`).
        #[arg(long)]
        bind: Option<String>,

        /// Directory holding `<company>.csv` tables (overrides `[server] input_dir`).
        #[arg(long)]
        input_dir: Option<PathBuf>,

        /// Directory for `<company>-analysis.csv` results (overrides `[defaults] output_dir`).
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "joblens=info",
        1 => "joblens=debug",
        _ => "joblens=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Analyze {
            input,
            out,
            renderer,
            persist_every,
        } => cmd_analyze(input, out, renderer, persist_every).await,
        Command::Serve {
            bind,
            input_dir,
            output_dir,
        } => cmd_serve(bind, input_dir, output_dir).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_analyze(
    input: PathBuf,
    out: Option<PathBuf>,
    renderer: Option<RendererArg>,
    persist_every: Option<usize>,
) -> Result<()> {
    let mut config = load_config()?;
    if let Some(renderer) = renderer {
        config.fetcher.renderer = renderer.into();
    }
    if let Some(n) = persist_every {
        config.defaults.persist_every = n;
    }

    // Validate API key before doing anything
    let api_key = validate_api_key(&config)?;

    let output = out.unwrap_or_else(|| input.clone());
    let analyzer = Analyzer::from_config(&config, Some(api_key))?;
    let analyze_config = AnalyzeConfig::new(&input, &output, &config);

    info!(
        input = %input.display(),
        output = %output.display(),
        renderer = ?config.fetcher.renderer,
        "analyzing job table"
    );

    let reporter = CliProgress::new();
    let result = match analyzer.analyze(&analyze_config, &reporter).await {
        Ok(result) => result,
        Err(e) => {
            reporter.abandon();
            return Err(e.into());
        }
    };

    println!();
    println!("  Job table analyzed!");
    println!("  Rows:       {}", result.rows);
    println!("  Classified: {}", result.classified);
    println!("  No link:    {}", result.skipped);
    println!("  No text:    {}", result.degraded);
    println!("  Output:     {}", result.output.display());
    println!("  Time:       {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_serve(
    bind: Option<String>,
    input_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config()?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(dir) = input_dir {
        config.server.input_dir = dir.to_string_lossy().into_owned();
    }
    if let Some(dir) = output_dir {
        config.defaults.output_dir = dir.to_string_lossy().into_owned();
    }

    let api_key = validate_api_key(&config)?;
    let analyzer = Analyzer::from_config(&config, Some(api_key))?;

    crate::server::serve(config, analyzer).await
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn abandon(&self) {
        self.spinner.abandon_with_message("analysis stopped");
    }
}

impl ProgressReporter for CliProgress {
    fn started(&self, total_rows: usize) {
        self.spinner.set_message(format!("Loaded {total_rows} rows"));
    }

    fn row_stage(&self, index: usize, total: usize, title: &str, stage: RowStage) {
        let title = if title.is_empty() { "(untitled)" } else { title };
        self.spinner
            .set_message(format!("[{}/{total}] {stage}: {title}", index + 1));
    }

    fn done(&self, _result: &AnalyzeResult) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_arguments_parse() {
        let cli = Cli::try_parse_from([
            "joblens",
            "-v",
            "analyze",
            "jobs.csv",
            "--out",
            "out.csv",
            "--renderer",
            "http",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Analyze {
                input,
                out,
                renderer,
                persist_every,
            } => {
                assert_eq!(input, PathBuf::from("jobs.csv"));
                assert_eq!(out, Some(PathBuf::from("out.csv")));
                assert!(matches!(renderer, Some(RendererArg::Http)));
                assert_eq!(persist_every, None);
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn serve_accepts_bind_override() {
        let cli = Cli::try_parse_from(["joblens", "--log-format", "json", "serve", "--bind", "0.0.0.0:9000"])
            .unwrap();
        assert!(matches!(cli.log_format, LogFormat::Json));
        assert!(matches!(cli.command, Command::Serve { bind: Some(ref b), .. } if b == "0.0.0.0:9000"));
    }
}
