//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use wikireq_core::{
    IndexSource, PageLoaderTool, PageSource, Pipeline, PipelineOutput, ProgressReporter,
};
use wikireq_shared::{AppConfig, init_config, load_config, load_config_from};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// wikireq: enrich Confluence use-case pages with their requirement definitions.
#[derive(Parser)]
#[command(
    name = "wikireq",
    version,
    about = "Turn Confluence use-case pages into requirement-enriched plain text.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.wikireq/wikireq.toml.
    #[arg(long, global = true, env = "WIKIREQ_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch a page and its requirements from Confluence and enrich it.
    Load {
        /// Page URL (/spaces/SPACE/pages/ID/... or ...?pageId=ID).
        url: String,

        /// Confluence base URL (overrides config).
        #[arg(long, env = "WIKIREQ_BASE_URL")]
        base_url: Option<String>,

        /// Abort each fetch after this many seconds.
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Frame the output the way the agent page loader tool does.
        #[arg(long)]
        tool: bool,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Enrich a local page export with a local requirements index.
    Enrich {
        /// Page markup file.
        #[arg(long)]
        page: PathBuf,

        /// Requirements index JSON file. Without it every marker stays unresolved.
        #[arg(long)]
        index: Option<PathBuf>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Show the page id and space key a URL resolves to.
    ParseUrl {
        /// Page URL.
        url: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options shared by commands that run the pipeline.
#[derive(Args)]
pub(crate) struct RunArgs {
    /// Write the plain text here instead of stdout.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Write debug artifacts (enriched markup + plain text) to this directory.
    #[arg(long)]
    pub artifacts: Option<PathBuf>,

    /// Truncate inserted excerpts to this many characters.
    #[arg(long)]
    pub excerpt_limit: Option<usize>,
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

/// Initialize tracing based on CLI flags. Logs go to stderr so stdout stays
/// clean for the page text.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "wikireq=info",
        1 => "wikireq=debug",
        _ => "wikireq=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Load {
            url,
            base_url,
            deadline_secs,
            tool,
            run,
        } => {
            let mut config = resolve_config(config_path.as_deref(), &run)?;
            if let Some(base_url) = base_url {
                config.confluence.base_url = base_url;
            }
            cmd_load(&config, &url, deadline_secs, tool, &run).await
        }
        Command::Enrich { page, index, run } => {
            let config = resolve_config(config_path.as_deref(), &run)?;
            cmd_enrich(&config, page, index, &run).await
        }
        Command::ParseUrl { url } => {
            let config = read_config(config_path.as_deref())?;
            cmd_parse_url(&config, &url)
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn read_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Config file values overridden by per-run flags.
fn resolve_config(path: Option<&Path>, run: &RunArgs) -> Result<AppConfig> {
    let mut config = read_config(path)?;
    if let Some(dir) = &run.artifacts {
        config.output.debug_artifacts = true;
        config.output.artifacts_dir = dir.to_string_lossy().to_string();
    }
    if run.excerpt_limit.is_some() {
        config.enrichment.excerpt_limit = run.excerpt_limit;
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_load(
    config: &AppConfig,
    url: &str,
    deadline_secs: Option<u64>,
    tool: bool,
    run: &RunArgs,
) -> Result<()> {
    let mut pipeline = Pipeline::connect(config)?;
    if let Some(secs) = deadline_secs {
        pipeline = pipeline.with_fetch_deadline(Duration::from_secs(secs));
    }

    info!(url, "loading page");
    let reporter = CliProgress::new();

    if tool {
        let text = PageLoaderTool::new(pipeline)
            .call_with_progress(url, &reporter)
            .await;
        reporter.finish();
        return emit(&text, run.out.as_deref());
    }

    let output = pipeline.run_url(url, &reporter).await?;
    reporter.finish();
    print_summary(&output);
    emit(&output.text, run.out.as_deref())
}

async fn cmd_enrich(
    config: &AppConfig,
    page: PathBuf,
    index: Option<PathBuf>,
    run: &RunArgs,
) -> Result<()> {
    if !page.exists() {
        return Err(eyre!("page file '{}' does not exist", page.display()));
    }

    let pipeline = Pipeline::new(config);
    let index = index.map_or(IndexSource::None, IndexSource::File);
    info!(page = %page.display(), %index, "enriching local page");

    let reporter = CliProgress::new();
    let output = pipeline.run(&PageSource::File(page), &index, &reporter).await;
    reporter.finish();

    print_summary(&output);
    emit(&output.text, run.out.as_deref())
}

fn cmd_parse_url(config: &AppConfig, url: &str) -> Result<()> {
    let page = Pipeline::new(config).parse_url(url)?;
    println!("page_id:   {}", page.page_id);
    println!("space_key: {}", page.space_key);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = read_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Write the result to `out`, or stdout.
fn emit(text: &str, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, text)
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            eprintln!("  Output: {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn print_summary(output: &PipelineOutput) {
    eprintln!();
    eprintln!("  Run:        {}", output.run_id);
    eprintln!("  Index:      {} requirements", output.index_len);
    eprintln!("  Markers:    {}", output.report.markers);
    eprintln!("  Annotated:  {}", output.report.annotated.len());
    eprintln!("  Unresolved: {}", output.report.unresolved.len());
    if output.report.missing_key > 0 {
        eprintln!("  No key:     {}", output.report.missing_key);
    }
    if let Some(artifacts) = &output.artifacts {
        eprintln!("  Artifacts:  {}", artifacts.enriched_markup.display());
        eprintln!("              {}", artifacts.plain_text.display());
    }
    for diagnostic in &output.diagnostics {
        eprintln!("  ! {diagnostic}");
    }
    if output.is_empty() {
        eprintln!("  (no page content)");
    }
    eprintln!("  Time:       {:.1}s", output.elapsed.as_secs_f64());
    eprintln!();
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
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, output: &PipelineOutput) {
        self.spinner.finish_and_clear();
        info!(
            annotated = output.report.annotated.len(),
            unresolved = output.report.unresolved.len(),
            "page enriched"
        );
    }
}
