//! `unitflow process` - run one document through an external command.

use clap::{Args, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use unitflow::config::ConfigFile;
use unitflow::engine::{JobResult, UnitEngine};
use unitflow::job::JobId;
use unitflow::logging::{default_log_dir, init_logging, DEFAULT_LOG_FILE};
use unitflow::processor::CommandProvider;
use unitflow::source::Document;

use crate::error::CliError;

/// How to interpret the input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputMode {
    /// Page JSON if the content looks like it, plain text otherwise
    Auto,
    /// Plain text, split on paragraph boundaries when large
    Text,
    /// JSON array of {"page_number", "content"} objects
    Pages,
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// Input document
    pub input: PathBuf,

    /// Command each unit is piped through (stdin to stdout), e.g. "tr a-z A-Z"
    #[arg(long, short = 'c')]
    pub command: String,

    /// Write the result here instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Input format
    #[arg(long, value_enum, default_value = "auto")]
    pub mode: InputMode,

    /// Workers for this job (overrides [engine] max_workers)
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Job id used in logs (default: derived from the input file name)
    #[arg(long)]
    pub job_id: Option<String>,

    /// Exit with an error if any unit kept its original content
    #[arg(long)]
    pub strict: bool,

    /// Directory for the log file (default: ~/.unitflow/logs)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

/// Run the process command.
pub async fn run(args: ProcessArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let log_dir = args.log_dir.clone().unwrap_or_else(default_log_dir);
    let _logging = init_logging(&log_dir, DEFAULT_LOG_FILE, "info").map_err(CliError::LoggingInit)?;

    let config = match config_path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    let mut engine_config = config.engine_config();
    if let Some(workers) = args.workers {
        if workers == 0 {
            return Err(CliError::InvalidArgument(
                "--workers must be at least 1".to_string(),
            ));
        }
        engine_config.max_workers = workers;
    }

    let provider = CommandProvider::from_command_line(&args.command)
        .ok_or_else(|| CliError::InvalidArgument("--command must not be empty".to_string()))?;

    let content = std::fs::read_to_string(&args.input).map_err(|error| CliError::FileRead {
        path: args.input.clone(),
        error,
    })?;
    let document = match args.mode {
        InputMode::Auto => Document::parse(content),
        InputMode::Text => Document::Text(content),
        InputMode::Pages => Document::Pages(content),
    };

    tracing::info!(
        input = %args.input.display(),
        pages = document.is_pages(),
        command = %args.command,
        workers = engine_config.max_workers,
        "Processing document"
    );

    let job_id = args
        .job_id
        .clone()
        .map(JobId::from)
        .unwrap_or_else(|| job_id_for(&args.input));
    let engine = UnitEngine::new(engine_config, Arc::new(provider));
    let result = match &document {
        Document::Text(text) => engine.process_text_as(job_id, text).await?,
        Document::Pages(_) => {
            let units = document.units(engine.config().chunk_size)?;
            let workers = engine.config().max_workers;
            engine.submit_job(job_id, units, workers)?.result().await?
        }
    };

    let rendered = document.render(result.units())?;
    write_output(args.output.as_deref(), &rendered)?;
    report(&result);

    let degraded = result.result.degraded_count();
    if args.strict && degraded > 0 {
        return Err(CliError::Degraded {
            degraded,
            total: result.result.len(),
        });
    }
    Ok(())
}

fn job_id_for(input: &Path) -> JobId {
    input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(JobId::from)
        .unwrap_or_else(JobId::auto)
}

fn write_output(path: Option<&Path>, rendered: &str) -> Result<(), CliError> {
    match path {
        Some(path) => std::fs::write(path, rendered).map_err(|error| CliError::FileWrite {
            path: path.to_path_buf(),
            error,
        }),
        None => {
            println!("{}", rendered);
            Ok(())
        }
    }
}

fn report(result: &JobResult) {
    let total = result.result.len();
    let degraded = result.result.degraded_count();
    tracing::info!(
        job_id = %result.job_id,
        units = total,
        succeeded = result.result.success_count(),
        degraded,
        pressure_events = result.pressure.len(),
        "Document processed"
    );
    if degraded > 0 {
        eprintln!(
            "Warning: {} of {} units kept their original content",
            degraded, total
        );
    }
}
