//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use exampaper_classify::{default_chain, offline_chain};
use exampaper_core::{
    AssemblyRequest, PaperAssembler, ProgressReporter, RunReport, generate_paper, parse_pool,
};
use exampaper_ingest::{LlmQuestionGenerator, load_document};
use exampaper_llm::ChatClient;
use exampaper_shared::{
    AppConfig, CandidateQuestion, PaperDocument, config_file_path, init_config, load_config,
    load_config_from, validate_api_key,
};
use exampaper_validation::{RuleSet, build_keyword_set, validate};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ExamPaper: build exact-total exam papers from syllabus text.
#[derive(Parser)]
#[command(
    name = "exampaper",
    version,
    about = "Generate, validate, classify, and assemble exam questions into an exact-total paper.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.exampaper/exampaper.toml.
    #[arg(long, global = true, env = "EXAMPAPER_CONFIG")]
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
    /// Run the full pipeline over a syllabus and write the paper JSON.
    Generate {
        /// Syllabus text file (.txt or .md).
        file: PathBuf,

        /// Exact paper total (defaults to [defaults].total_score).
        #[arg(short, long)]
        target: Option<i64>,

        /// Write the paper here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Attach the run report to the output.
        #[arg(long)]
        debug: bool,

        /// Classify with the keyword heuristic only (generation still calls the model).
        #[arg(long)]
        offline: bool,
    },

    /// Validate a newline-separated question file against a source's keywords.
    Validate {
        /// Source text the questions must be grounded in.
        source: PathBuf,

        /// One candidate question per line.
        #[arg(short, long)]
        questions: PathBuf,
    },

    /// Print the keyword set extracted from a source text.
    Keywords {
        /// Source text file.
        source: PathBuf,

        /// Print a JSON array instead of one keyword per line.
        #[arg(long)]
        json: bool,
    },

    /// Assemble a paper from a pre-labeled question pool.
    Assemble {
        /// JSON array of {text, label, score?, verb?} entries.
        #[arg(short, long)]
        pool: PathBuf,

        /// Exact paper total (defaults to [defaults].total_score).
        #[arg(short, long)]
        target: Option<i64>,

        /// Write the paper here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
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
///
/// Logs go to stderr so paper JSON on stdout stays clean.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "exampaper=info",
        1 => "exampaper=debug",
        _ => "exampaper=trace",
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
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Generate {
            file,
            target,
            out,
            debug,
            offline,
        } => cmd_generate(config_path, &file, target, out.as_deref(), debug, offline).await,
        Command::Validate { source, questions } => cmd_validate(config_path, &source, &questions),
        Command::Keywords { source, json } => cmd_keywords(config_path, &source, json),
        Command::Assemble { pool, target, out } => {
            cmd_assemble(config_path, &pool, target, out.as_deref())
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Write pretty JSON to `out`, or to stdout when no path is given.
fn emit_json(value: &serde_json::Value, out: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => std::fs::write(path, json + "\n")
            .wrap_err_with(|| format!("failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_generate(
    config_path: Option<&Path>,
    file: &Path,
    target: Option<i64>,
    out: Option<&Path>,
    debug: bool,
    offline: bool,
) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    if let Some(target) = target {
        config.defaults.total_score = target;
    }

    // Fail on a missing key before reading anything large.
    let api_key = validate_api_key(&config)?;
    let source_text = load_document(file)?;

    let client = ChatClient::new(&config.llm, api_key)?;
    let generator = LlmQuestionGenerator::from_config(client.clone(), &config);
    let chain = if offline {
        offline_chain()
    } else {
        default_chain(client, &config)?
    };

    info!(
        file = %file.display(),
        target = config.defaults.total_score,
        strategies = ?chain.names(),
        "generating paper"
    );

    let reporter = CliProgress::new();
    let result = generate_paper(&config, &source_text, &generator, &chain, &reporter).await;
    reporter.clear();
    let run = result?;

    let mut document = run.document;
    if debug {
        document.report = Some(serde_json::to_value(&run.report)?);
    }
    emit_json(&serde_json::to_value(&document)?, out)?;

    if let Some(path) = out {
        print_paper_summary(&document, path);
        println!("  Bank:     {} labeled questions", run.report.bank_size_total);
        println!(
            "  Rejected: {} ({})",
            run.report.rejected_questions,
            run.report.top_rejections_text()
        );
        println!();
    }

    Ok(())
}

fn cmd_validate(config_path: Option<&Path>, source: &Path, questions: &Path) -> Result<()> {
    let config = resolve_config(config_path)?;
    let rules = RuleSet::from(&config.validation);

    let source_text = load_document(source)?;
    let keywords = build_keyword_set(&source_text, &rules);

    let raw = std::fs::read_to_string(questions)
        .wrap_err_with(|| format!("failed to read {}", questions.display()))?;
    let candidates: Vec<CandidateQuestion> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| CandidateQuestion::new(line, None))
        .collect();
    if candidates.is_empty() {
        return Err(eyre!("no questions found in {}", questions.display()));
    }

    let outcome = validate(&candidates, Some(&keywords), &rules);
    info!(
        keywords = keywords.len(),
        accepted = outcome.accepted.len(),
        rejected = outcome.rejected.len(),
        "validation finished"
    );
    emit_json(&serde_json::to_value(&outcome)?, None)
}

fn cmd_keywords(config_path: Option<&Path>, source: &Path, json: bool) -> Result<()> {
    let config = resolve_config(config_path)?;
    let rules = RuleSet::from(&config.validation);

    let source_text = load_document(source)?;
    let keywords = build_keyword_set(&source_text, &rules);

    if json {
        let list: Vec<&str> = keywords.iter().collect();
        return emit_json(&serde_json::to_value(list)?, None);
    }
    for keyword in keywords.iter() {
        println!("{keyword}");
    }
    Ok(())
}

fn cmd_assemble(
    config_path: Option<&Path>,
    pool_path: &Path,
    target: Option<i64>,
    out: Option<&Path>,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let target = target.unwrap_or(config.defaults.total_score);

    let scores = config.labels.score_table()?;
    let distribution = config.paper.label_distribution()?;
    let assembler = PaperAssembler::new(config.paper.tiers)?;

    let raw = std::fs::read_to_string(pool_path)
        .wrap_err_with(|| format!("failed to read {}", pool_path.display()))?;
    let pool = parse_pool(&raw, &scores)?;

    let request =
        AssemblyRequest::from_distribution(target, distribution, &scores, config.paper.tiers);
    info!(
        pool = pool.len(),
        target,
        desired = ?request.desired,
        "assembling paper from pool"
    );

    let paper = assembler.assemble(&pool, &request)?;
    let document = PaperDocument::new(&raw, paper);
    emit_json(&serde_json::to_value(&document)?, out)?;

    if let Some(path) = out {
        print_paper_summary(&document, path);
        println!();
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config file created at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };
    let content = toml::to_string_pretty(&config)?;
    println!("# Config file: {}", path.display());
    println!();
    println!("{content}");
    Ok(())
}

fn print_paper_summary(document: &PaperDocument, path: &Path) {
    let paper = &document.paper;
    println!();
    println!("  Paper assembled!");
    println!("  ID:       {}", document.id);
    println!("  Total:    {}", paper.total_score);
    println!("  Items:    {}", paper.items.len());
    println!(
        "  Tiers:    {} light, {} medium, {} heavy",
        paper.tier_counts.light, paper.tier_counts.medium, paper.tier_counts.heavy
    );
    println!("  Path:     {}", path.display());
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
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn clear(&self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn chunk_generated(&self, current: usize, total: usize, questions: usize) {
        self.spinner.set_message(format!(
            "Generating [{current}/{total}] {questions} questions from last chunk"
        ));
    }

    fn done(&self, report: &RunReport) {
        self.spinner.finish_and_clear();
        info!(
            selected = report.selected_questions,
            bank = report.bank_size_total,
            "pipeline finished"
        );
    }
}
