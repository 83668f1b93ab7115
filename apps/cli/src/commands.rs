//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use transfit_core::pipeline::{
    ExerciseReport, PlanStep, ProgressReporter, RunConfig, RunSummary, plan_enrichment,
    run_enrichment,
};
use transfit_core::tagger::tag_research;
use transfit_generator::{OpenAiGenerator, OpenAiOptions, TipGenerator};
use transfit_shared::{
    AppConfig, format_topics, init_config, load_config, load_config_from, validate_api_key,
};
use transfit_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// TransFit: evidence-grounded coaching tips for exercises.
#[derive(Parser)]
#[command(
    name = "transfit",
    version,
    about = "Tag research, match it to exercises, and generate reviewed coaching tips.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.transfit/transfit.toml.
    #[arg(long = "config", global = true, env = "TRANSFIT_CONFIG")]
    pub config_file: Option<PathBuf>,

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
    /// Tag research, then generate tips for a batch of exercises.
    Enrich {
        #[command(flatten)]
        target: TargetArgs,

        /// Maximum tips to persist this run (0 for no limit).
        #[arg(long)]
        max: Option<usize>,

        /// Maximum research articles per evidence context.
        #[arg(long)]
        max_articles: Option<usize>,

        /// Generation model (overrides config).
        #[arg(long)]
        model: Option<String>,
    },

    /// Tag relevant research with topics and exit.
    Tag {
        /// Database path (overrides config).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Show what an enrichment run would do, without writing anything.
    Plan {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Database and tip-tuple selection shared by `enrich` and `plan`.
#[derive(Args)]
pub(crate) struct TargetArgs {
    /// Database path (overrides config).
    #[arg(long)]
    db: Option<PathBuf>,

    /// Population key (overrides config).
    #[arg(long)]
    population: Option<String>,

    /// Context key (overrides config).
    #[arg(long)]
    context: Option<String>,
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
        0 => "transfit=info",
        1 => "transfit=debug",
        _ => "transfit=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
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
    let config = match &cli.config_file {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Enrich {
            target,
            max,
            max_articles,
            model,
        } => cmd_enrich(config, &target, max, max_articles, model).await,
        Command::Tag { db } => cmd_tag(&config, db.as_deref()).await,
        Command::Plan { target } => cmd_plan(&config, &target).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&config).await,
        },
    }
}

/// Run settings from config, with command-line overrides applied.
fn run_config(config: &AppConfig, target: &TargetArgs) -> RunConfig {
    let mut run = RunConfig::from(&config.defaults);
    if let Some(population) = &target.population {
        run.population = population.clone();
    }
    if let Some(context) = &target.context {
        run.context = context.clone();
    }
    run
}

fn database_path(config: &AppConfig, flag: Option<&Path>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.defaults.database_path))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_enrich(
    mut config: AppConfig,
    target: &TargetArgs,
    max: Option<usize>,
    max_articles: Option<usize>,
    model: Option<String>,
) -> Result<()> {
    // Credentials first: nothing is read or written without them.
    let api_key = validate_api_key(&config)?;

    if let Some(model) = model {
        config.openai.model = model;
    }
    if let Some(max) = max {
        config.defaults.max_exercises = max;
    }
    if let Some(n) = max_articles {
        config.defaults.max_articles = n;
    }

    let run = run_config(&config, target);
    let generator = OpenAiGenerator::new(OpenAiOptions::from_config(&config.openai, api_key))?;

    let db_path = database_path(&config, target.db.as_deref());
    let storage = Storage::open(&db_path).await?;

    info!(
        db = %db_path.display(),
        population = %run.population,
        context = %run.context,
        model = generator.model_id(),
        "starting enrichment"
    );

    let reporter = CliProgress::new();
    let summary = run_enrichment(&run, &storage, &generator, &reporter).await?;

    print_summary(&summary);
    Ok(())
}

async fn cmd_tag(config: &AppConfig, db: Option<&Path>) -> Result<()> {
    let db_path = database_path(config, db);
    let storage = Storage::open(&db_path).await?;

    let report = tag_research(&storage).await?;

    println!();
    for article in &report.articles {
        let title = article.title.as_deref().unwrap_or("Untitled");
        println!("  {:>5}  {title}", article.id);
        println!("         [{}]", format_topics(&article.topics));
    }
    println!();
    println!("  Articles: {}", report.articles.len());
    println!("  Updated:  {}", report.updated);
    println!();

    Ok(())
}

async fn cmd_plan(config: &AppConfig, target: &TargetArgs) -> Result<()> {
    let db_path = database_path(config, target.db.as_deref());
    if !db_path.exists() {
        return Err(eyre!("database not found: {}", db_path.display()));
    }
    let storage = Storage::open_readonly(&db_path).await?;
    let run = run_config(config, target);

    let plan = plan_enrichment(&run, &storage).await?;

    println!();
    for entry in &plan {
        let step = match entry.step {
            PlanStep::Generate => "GENERATE".to_string(),
            PlanStep::Skip(outcome) => outcome.to_string(),
        };
        println!("  {:>5}  {:<12} {}", entry.exercise_id, step, entry.name);
        if !entry.topics.is_empty() {
            println!(
                "         topics [{}] via {}",
                format_topics(&entry.topics),
                entry.rules.join(", ")
            );
        }
        if entry.evidence_articles > 0 {
            println!(
                "         evidence {} article(s), {} DOI(s)",
                entry.evidence_articles,
                entry.dois.len()
            );
        }
    }

    let generate = plan
        .iter()
        .filter(|p| p.step == PlanStep::Generate)
        .count();
    println!();
    println!("  Exercises:      {}", plan.len());
    println!("  Would generate: {generate}");
    if let Some(limit) = run.max_tips {
        println!("  Batch limit:    {limit}");
    }
    println!();

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("  Enrichment complete.");
    println!(
        "  Research:    {} ({} retagged)",
        summary.research, summary.retagged
    );
    println!(
        "  Exercises:   {} ({} visited)",
        summary.exercises,
        summary.visited()
    );
    println!("  Persisted:   {}", summary.persisted);
    println!("  Skipped:     {}", summary.skipped());
    println!("    duplicate:   {}", summary.duplicate);
    println!("    no topic:    {}", summary.no_topic);
    println!("    no evidence: {}", summary.no_evidence);
    println!("    gen error:   {}", summary.gen_error);
    println!("  Time:        {:.1}s", summary.elapsed.as_secs_f64());
    println!();
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
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn exercise_done(&self, report: &ExerciseReport, current: usize, total: usize) {
        self.spinner.set_message(format!(
            "[{current}/{total}] {} {}",
            report.outcome, report.name
        ));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}
