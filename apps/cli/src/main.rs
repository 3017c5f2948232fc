use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use futures::future::join_all;
use indicatif::ProgressBar;
use output::{OutputFormat, Renderer};
use progress::spinner;
use puzzle_markup::{convert_html, puzzle_url, ConversionResult};
use settings::Settings;
use tokio::{fs, io::AsyncReadExt, task};
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser, Clone)]
#[command(
    name = "puzzle-md",
    version,
    about = "Convert saved puzzle pages into Markdown for the archive."
)]
struct Cli {
    /// What to print for each converted page (overrides the settings file).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,
    /// Settings file in TOML format. Defaults to `puzzle-md.toml` when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Disable ANSI colors in log output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Only log warnings and errors.
    #[arg(long, global = true)]
    quiet: bool,
    /// Disable progress indicators for batch conversions.
    #[arg(long, global = true)]
    no_progress: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand, Clone)]
enum Command {
    /// Convert saved puzzle pages. Reads stdin when no input is given.
    Convert {
        /// `PATH` or `PATH=URL`; `-` reads stdin.
        #[arg(value_parser = parse_input)]
        inputs: Vec<InputSpec>,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Print only the puzzle title of a saved page.
    Title {
        /// `PATH` or `PATH=URL`; stdin when omitted.
        #[arg(value_parser = parse_input)]
        input: Option<InputSpec>,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Source URL shared by every input that does not name its own.
#[derive(Debug, Args, Clone, Default)]
struct SourceArgs {
    /// Page address written into the attribution line.
    #[arg(long, conflicts_with_all = ["year", "day"])]
    url: Option<String>,
    /// Puzzle year; combined with `--day` and the configured base URL.
    #[arg(long, requires = "day")]
    year: Option<u16>,
    /// Puzzle day (1-25).
    #[arg(long, requires = "year")]
    day: Option<u8>,
}

impl SourceArgs {
    fn default_url(&self, base_url: &str) -> Result<Option<String>> {
        if let Some(url) = &self.url {
            return Ok(Some(url.clone()));
        }
        match (self.year, self.day) {
            (Some(year), Some(day)) => Ok(Some(puzzle_url(base_url, year, day)?)),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InputSpec {
    /// `None` reads stdin.
    path: Option<PathBuf>,
    url: Option<String>,
}

impl InputSpec {
    fn stdin() -> Self {
        Self {
            path: None,
            url: None,
        }
    }

    fn label(&self) -> String {
        self.path
            .as_ref()
            .map_or_else(|| "<stdin>".to_string(), |path| path.display().to_string())
    }
}

fn parse_input(raw: &str) -> std::result::Result<InputSpec, String> {
    let (path, url) = match raw.split_once('=') {
        Some((_, "")) => return Err(format!("missing URL after `=` in `{raw}`")),
        Some((path, url)) => (path, Some(url.to_string())),
        None => (raw, None),
    };
    if path.is_empty() {
        return Err(format!("missing input path in `{raw}`"));
    }
    Ok(InputSpec {
        path: (path != "-").then(|| PathBuf::from(path)),
        url,
    })
}

#[derive(Debug)]
struct Job {
    label: String,
    path: Option<PathBuf>,
    url: String,
}

#[derive(Debug)]
struct Outcome {
    label: String,
    result: Result<ConversionResult>,
}

impl Cli {
    fn progress_enabled(&self) -> bool {
        !self.quiet && !self.no_progress
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let settings = Settings::load(cli.config.as_deref())?;
    debug!(
        target: "puzzle_archive_cli",
        base_url = %settings.base_url,
        format = ?settings.format,
        "settings loaded"
    );

    match &cli.command {
        Command::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(*shell, &mut command, "puzzle-md", &mut std::io::stdout());
            Ok(())
        }
        Command::Convert { inputs, source } => {
            let format = cli.format.unwrap_or(settings.format);
            run_conversion(&cli, &settings, inputs.clone(), source, format).await
        }
        Command::Title { input, source } => {
            let inputs = input.clone().into_iter().collect();
            run_conversion(&cli, &settings, inputs, source, OutputFormat::Title).await
        }
    }
}

async fn run_conversion(
    cli: &Cli,
    settings: &Settings,
    inputs: Vec<InputSpec>,
    source: &SourceArgs,
    format: OutputFormat,
) -> Result<()> {
    let default_url = source.default_url(&settings.base_url)?;
    let jobs = plan_jobs(inputs, default_url.as_deref())?;
    let total = jobs.len();

    let spinner = spinner(
        cli.progress_enabled() && total > 1,
        format!("Converting {total} pages..."),
    );
    let outcomes = convert_jobs(jobs).await;

    let mut pages = Vec::with_capacity(outcomes.len());
    let mut failed = 0usize;
    for Outcome { label, result } in outcomes {
        match result {
            Ok(page) => pages.push((label, page)),
            Err(error) => {
                failed += 1;
                error!(
                    target: "puzzle_archive_cli",
                    input = %label,
                    error = %format!("{error:#}"),
                    "conversion failed"
                );
            }
        }
    }
    finish_spinner(
        spinner,
        Some(format!("Converted {} of {total} pages", pages.len())),
    );

    if !pages.is_empty() {
        print!("{}", Renderer::new(format).pages(&pages)?);
    }

    if failed > 0 {
        bail!("{failed} of {total} pages failed to convert");
    }
    info!(target: "puzzle_archive_cli", total, "all pages converted");
    Ok(())
}

fn plan_jobs(inputs: Vec<InputSpec>, default_url: Option<&str>) -> Result<Vec<Job>> {
    let inputs = if inputs.is_empty() {
        vec![InputSpec::stdin()]
    } else {
        inputs
    };
    if inputs.iter().filter(|input| input.path.is_none()).count() > 1 {
        bail!("stdin can only be used as one input");
    }

    inputs
        .into_iter()
        .map(|input| {
            let label = input.label();
            let url = input
                .url
                .or_else(|| default_url.map(str::to_string))
                .with_context(|| {
                    format!("no source URL for {label}: use PATH=URL, --url, or --year with --day")
                })?;
            Ok(Job {
                label,
                path: input.path,
                url,
            })
        })
        .collect()
}

/// Converts every job concurrently; one failure does not cancel the others.
async fn convert_jobs(jobs: Vec<Job>) -> Vec<Outcome> {
    join_all(jobs.into_iter().map(|job| async move {
        let result = load_and_convert(job.path.as_deref(), job.url).await;
        Outcome {
            label: job.label,
            result,
        }
    }))
    .await
}

async fn load_and_convert(path: Option<&Path>, url: String) -> Result<ConversionResult> {
    let html = read_input(path).await?;
    debug!(target: "puzzle_archive_cli", url = %url, bytes = html.len(), "page loaded");
    let page = task::spawn_blocking(move || convert_html(&html, &url))
        .await
        .context("conversion task panicked")??;
    Ok(page)
}

async fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut html = String::new();
            tokio::io::stdin()
                .read_to_string(&mut html)
                .await
                .context("failed to read stdin")?;
            Ok(html)
        }
    }
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let default_directives = if cli.quiet {
        "warn"
    } else {
        "info,puzzle_archive_cli=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .without_time()
        .with_ansi(!cli.no_color)
        .compact()
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow!("failed to initialize logging: {error}"))
}

fn finish_spinner(spinner: Option<ProgressBar>, message: Option<String>) {
    if let Some(spinner) = spinner {
        match message {
            Some(message) => spinner.finish_with_message(message),
            None => spinner.finish_and_clear(),
        }
    }
}

mod output {
    use anyhow::Result;
    use clap::ValueEnum;
    use puzzle_markup::ConversionResult;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum OutputFormat {
        /// Markdown body, ready to be saved as a README.
        Markdown,
        /// `{title, body}` objects.
        Json,
        /// Puzzle titles, one per line.
        Title,
    }

    #[derive(Debug, Clone, Copy)]
    pub struct Renderer {
        format: OutputFormat,
    }

    impl Renderer {
        pub fn new(format: OutputFormat) -> Self {
            Self { format }
        }

        /// Renders converted pages; JSON output is an array only for batches.
        pub fn pages(&self, pages: &[(String, ConversionResult)]) -> Result<String> {
            let rendered: String = match self.format {
                OutputFormat::Markdown => pages.iter().map(|(_, page)| page.body.as_str()).collect(),
                OutputFormat::Title => pages
                    .iter()
                    .map(|(_, page)| format!("{}\n", page.title))
                    .collect(),
                OutputFormat::Json => {
                    let payload = match pages {
                        [(_, page)] => serde_json::to_value(page)?,
                        _ => pages
                            .iter()
                            .map(|(input, page)| {
                                json!({ "input": input, "title": page.title, "body": page.body })
                            })
                            .collect(),
                    };
                    format!("{}\n", serde_json::to_string_pretty(&payload)?)
                }
            };
            Ok(rendered)
        }
    }
}

mod progress {
    use std::time::Duration;

    use indicatif::{ProgressBar, ProgressStyle};

    pub fn spinner(enabled: bool, message: impl Into<String>) -> Option<ProgressBar> {
        if !enabled {
            return None;
        }
        let progress = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        progress.set_style(style);
        progress.set_message(message.into());
        progress.enable_steady_tick(Duration::from_millis(80));
        Some(progress)
    }
}

mod settings {
    use std::path::Path;

    use anyhow::{Context, Result};
    use config::{Config, Environment, File, FileFormat};
    use serde::Deserialize;

    use crate::output::OutputFormat;

    pub const DEFAULT_BASE_URL: &str = "https://adventofcode.com";
    const DEFAULT_FILE_STEM: &str = "puzzle-md";
    const ENV_PREFIX: &str = "PUZZLE_MD";

    /// Layered settings: defaults, then the TOML file, then `PUZZLE_MD_*`.
    #[derive(Debug, Clone, Deserialize)]
    pub struct Settings {
        pub base_url: String,
        pub format: OutputFormat,
    }

    impl Settings {
        pub fn load(path: Option<&Path>) -> Result<Self> {
            let file = match path {
                Some(path) => File::new(&path.to_string_lossy(), FileFormat::Toml).required(true),
                None => File::new(DEFAULT_FILE_STEM, FileFormat::Toml).required(false),
            };

            Config::builder()
                .set_default("base_url", DEFAULT_BASE_URL)?
                .set_default("format", "markdown")?
                .add_source(file)
                .add_source(Environment::with_prefix(ENV_PREFIX))
                .build()
                .context("failed to load settings")?
                .try_deserialize()
                .context("invalid settings")
        }
    }
}
