// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;

use aphasia_exercises::app_config::{API_KEY_ENV, Config, LogLevel, ProviderKind};
use aphasia_exercises::database::models::{Difficulty, Visibility};
use aphasia_exercises::generation::VnestRequest;
use aphasia_exercises::{Controller, WorkflowKind};

/// CLI Wrapper for ProviderKind to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliProvider {
    Azure,
    #[value(name = "openai")]
    OpenAI,
    Ollama,
}

impl From<CliProvider> for ProviderKind {
    fn from(cli_provider: CliProvider) -> Self {
        match cli_provider {
            CliProvider::Azure => ProviderKind::Azure,
            CliProvider::OpenAI => ProviderKind::OpenAI,
            CliProvider::Ollama => ProviderKind::Ollama,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for WorkflowKind to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliWorkflow {
    Vnest,
    Sr,
    Personalization,
    Profile,
}

impl From<CliWorkflow> for WorkflowKind {
    fn from(cli_workflow: CliWorkflow) -> Self {
        match cli_workflow {
            CliWorkflow::Vnest => WorkflowKind::Vnest,
            CliWorkflow::Sr => WorkflowKind::Sr,
            CliWorkflow::Personalization => WorkflowKind::Personalization,
            CliWorkflow::Profile => WorkflowKind::Profile,
        }
    }
}

/// Patient profile given inline or from a file
#[derive(Args, Debug)]
struct ProfileArgs {
    /// Profile as a JSON string (defaults to the stored patient profile)
    #[arg(long, conflicts_with = "profile_file")]
    profile: Option<String>,

    /// Profile JSON file
    #[arg(long)]
    profile_file: Option<PathBuf>,
}

impl ProfileArgs {
    fn load(&self) -> Result<Option<Value>> {
        let raw = match (&self.profile, &self.profile_file) {
            (Some(inline), _) => inline.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read profile file: {:?}", path))?,
            (None, None) => return Ok(None),
        };
        let profile = serde_json::from_str(&raw).context("Profile is not valid JSON")?;
        Ok(Some(profile))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Select the next VNEST exercise for a patient
    Select {
        /// Patient identifier
        #[arg(long)]
        patient: String,
        /// Linguistic context, e.g. "Un hospital"
        #[arg(long)]
        context: String,
        /// Verb, e.g. "cortar"
        #[arg(long)]
        verb: String,
    },

    /// Assign an exercise to a patient
    Assign {
        #[arg(long)]
        patient: String,
        #[arg(long)]
        exercise: String,
        /// Allow exercises without a linguistic context
        #[arg(long)]
        no_context: bool,
    },

    /// Record that a patient performed an assigned exercise
    Complete {
        #[arg(long)]
        patient: String,
        #[arg(long)]
        exercise: String,
    },

    /// Record a spaced-retrieval recall attempt
    Review {
        #[arg(long)]
        exercise: String,
        /// The patient failed to recall the answer
        #[arg(long)]
        failed: bool,
    },

    /// Set or clear the therapist-reviewed flag of an exercise
    MarkReviewed {
        #[arg(long)]
        exercise: String,
        /// Clear the flag instead of setting it
        #[arg(long)]
        unset: bool,
    },

    /// Generate and store a VNEST exercise
    GenerateVnest {
        /// Linguistic context
        #[arg(long)]
        context: String,
        /// Difficulty: facil, medio or dificil
        #[arg(long, default_value = "facil")]
        level: String,
        /// Creator recorded on the exercise
        #[arg(long, default_value = "terapeuta")]
        created_by: String,
        /// Store the exercise as public
        #[arg(long)]
        public: bool,
    },

    /// Generate spaced-retrieval cards for a patient
    GenerateSr {
        #[arg(long)]
        patient: String,
        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Personalize an exercise for a patient
    Personalize {
        #[arg(long)]
        patient: String,
        #[arg(long)]
        exercise: String,
        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Structure free text into a patient profile
    StructureProfile {
        #[arg(long)]
        patient: String,
        /// Free text describing the patient
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        text: Option<String>,
        /// File with the free text
        #[arg(long)]
        file: Option<PathBuf>,
        /// Save the structured profile on the patient record
        #[arg(long)]
        save: bool,
    },

    /// Export a workflow as a Mermaid graph
    Graph {
        #[arg(value_enum)]
        workflow: CliWorkflow,
        /// Output file (defaults to graphs/langgraph_<workflow>.mmd)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show record counts of the store
    Stats,

    /// Check that the completion provider is reachable
    Check,

    /// Generate shell completions for aphasia-exercises
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// aphasia-exercises - Therapy exercises for aphasia with AI
///
/// Selects, assigns and schedules VNEST and spaced-retrieval exercises, and
/// generates new ones with a chat completion model.
#[derive(Parser, Debug)]
#[command(name = "aphasia-exercises")]
#[command(version)]
#[command(about = "Therapy exercise management for aphasia")]
#[command(long_about = "Selects, assigns and schedules VNEST and spaced-retrieval exercises, and generates new ones with a chat completion model.

EXAMPLES:
    aphasia-exercises select --patient ana@example.com --context \"Un hospital\" --verb cortar
    aphasia-exercises generate-vnest --context \"Un hospital\" --level medio
    aphasia-exercises generate-sr --patient ana@example.com
    aphasia-exercises structure-profile --patient ana@example.com --file notas.txt --save
    aphasia-exercises graph vnest
    aphasia-exercises completions bash > aphasia-exercises.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.

SUPPORTED PROVIDERS:
    azure  - Azure OpenAI deployment (requires API key, endpoint and api_version)
    openai - OpenAI-compatible API (requires API key)
    ollama - Local Ollama server")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "conf.json")]
    config: PathBuf,

    /// Completion provider to use
    #[arg(short, long, global = true, value_enum)]
    provider: Option<CliProvider>,

    /// Model or deployment name
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// SQLite database path
    #[arg(short, long, global = true)]
    database: Option<String>,

    /// API key for hosted providers
    #[arg(long, global = true, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    /// Set logging level
    #[arg(short, long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// Custom logger that writes coloured lines to stderr
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour and tag for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("1;31", "ERROR"),
            Level::Warn => ("1;33", "WARN "),
            Level::Info => ("1;32", "INFO "),
            Level::Debug => ("1;36", "DEBUG"),
            Level::Trace => ("1;35", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (colour, tag) = Self::style_for_level(record.level());
            let _ = writeln!(std::io::stderr(), "\x1B[{}m{} {} {}\x1B[0m", colour, now, tag, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize result")?;
    println!("{}", json);
    Ok(())
}

/// Load conf.json and apply command line overrides
fn load_config(cli: &CommandLineOptions) -> Result<Config> {
    let mut config = Config::load_or_create(&cli.config)?;

    if let Some(provider) = &cli.provider {
        config.llm.provider = provider.clone().into();
    }
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }
    if let Some(database) = &cli.database {
        config.database_path = Some(database.clone());
    }
    if let Some(api_key) = &cli.api_key {
        config.llm.api_key = api_key.clone();
    }
    if let Some(log_level) = &cli.log_level {
        config.log_level = log_level.clone().into();
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Start at info; the configured level is applied once conf.json is read
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "aphasia-exercises", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli)?;
    log::set_max_level(config.log_level.into());

    let controller = Controller::with_config(config).context("Failed to initialize application")?;
    run_command(&controller, cli.command).await
}

async fn run_command(controller: &Controller, command: Commands) -> Result<()> {
    match command {
        Commands::Select { patient, context, verb } => print_json(&controller.select(&patient, &context, &verb).await),
        Commands::Assign { patient, exercise, no_context } => {
            print_json(&controller.assign(&patient, &exercise, !no_context).await?)
        }
        Commands::Complete { patient, exercise } => print_json(&controller.complete(&patient, &exercise).await?),
        Commands::Review { exercise, failed } => print_json(&controller.review(&exercise, !failed).await?),
        Commands::MarkReviewed { exercise, unset } => print_json(&controller.mark_reviewed(&exercise, !unset).await?),
        Commands::GenerateVnest { context, level, created_by, public } => {
            let level: Difficulty = level.parse()?;
            let visibility = if public { Visibility::Public } else { Visibility::Private };
            let request = VnestRequest::new(context, level)
                .created_by(created_by)
                .visibility(visibility);
            print_json(&controller.generate_vnest(&request).await?)
        }
        Commands::GenerateSr { patient, profile } => {
            print_json(&controller.generate_sr(&patient, profile.load()?).await?)
        }
        Commands::Personalize { patient, exercise, profile } => {
            print_json(&controller.personalize(&patient, &exercise, profile.load()?).await?)
        }
        Commands::StructureProfile { patient, text, file, save } => {
            let raw_text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read profile text: {:?}", path))?,
                (None, None) => return Err(anyhow!("Either --text or --file is required")),
            };
            print_json(&controller.structure_profile(&patient, &raw_text, save).await?)
        }
        Commands::Graph { workflow, output } => {
            let path = controller.export_graph(workflow.into(), output.as_deref())?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::Stats => {
            let stats = controller.stats().await?;
            info!("{}", stats);
            print_json(&stats)
        }
        Commands::Check => {
            let name = controller.check_provider().await?;
            println!("{} OK", name);
            Ok(())
        }
        Commands::Completions { .. } => Ok(()),
    }
}
