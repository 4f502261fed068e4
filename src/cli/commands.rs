//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cli::output::{
    OutputFormat, PushReport, format_batch_list, format_push_report, format_records,
    format_session_list, format_status,
};
use crate::cli::parser::{Cli, Commands};
use crate::codec::decode_records;
use crate::config::PipelineConfig;
use crate::core::EditEvent;
use crate::error::{CodecError, CommandError, Error, Result, StorageError};
use crate::io::{EventReader, open_source};
use crate::pipeline::{BufferController, FlushableBuffer, TracingStatusSink, run};
use crate::sink::{MemorySink, RemoteSink, StoreSink};
use crate::storage::{SqliteStorage, Storage};

/// Events buffered between the source reader and the pipeline.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Options of the `push` command.
#[derive(Debug, Clone, Copy)]
pub struct PushOptions<'a> {
    /// JSON-lines event source, `-` for stdin.
    pub events: &'a Path,
    /// Document path override.
    pub document: Option<&'a str>,
    /// Book override.
    pub book: Option<&'a str>,
    /// Flush threshold override.
    pub threshold: Option<usize>,
    /// Overflow ceiling override, 0 for unbounded.
    pub overflow_limit: Option<usize>,
    /// Flush interval override, 0 to disable.
    pub flush_interval: Option<u64>,
    /// Skip the event store.
    pub dry_run: bool,
}

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let db_path = cli.get_db_path();

    match &cli.command {
        Commands::Init { force } => cmd_init(&db_path, *force, format),
        Commands::Status => cmd_status(&db_path, format),
        Commands::Push {
            events,
            document,
            book,
            threshold,
            overflow_limit,
            flush_interval,
            dry_run,
        } => {
            let options = PushOptions {
                events,
                document: document.as_deref(),
                book: book.as_deref(),
                threshold: *threshold,
                overflow_limit: *overflow_limit,
                flush_interval: *flush_interval,
                dry_run: *dry_run,
            };
            let config = resolve_config(cli.config.as_deref(), &options)?;
            cmd_push(&db_path, &config, &options, format)
        }
        Commands::Sessions { document } => cmd_sessions(&db_path, document.as_deref(), format),
        Commands::Batches { session } => cmd_batches(&db_path, session, format),
        Commands::Replay { session, batch } => {
            cmd_replay(&db_path, session, batch.as_deref(), format)
        }
        Commands::Reset { yes } => cmd_reset(&db_path, *yes, format),
    }
}

/// Opens storage and ensures it's initialized.
fn open_storage(db_path: &Path) -> Result<SqliteStorage> {
    let storage = SqliteStorage::open(db_path)?;

    if !storage.is_initialized()? {
        return Err(StorageError::NotInitialized.into());
    }

    Ok(storage)
}

/// Layers command-line overrides on top of the config file.
fn resolve_config(config_path: Option<&Path>, options: &PushOptions<'_>) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::discover(config_path)?;

    if let Some(threshold) = options.threshold {
        config = config.with_flush_threshold(threshold);
    }
    if let Some(limit) = options.overflow_limit {
        config = config.with_overflow_limit((limit > 0).then_some(limit));
    }
    if let Some(secs) = options.flush_interval {
        config = config.with_flush_interval((secs > 0).then_some(secs));
    }
    if let Some(book) = options.book {
        config = config.with_book_id(book);
    }

    config.validate()?;
    debug!(?config, "resolved pipeline config");
    Ok(config)
}

/// Resolves the session a push writes into and the sink behind it.
fn open_session(
    db_path: &Path,
    document: &str,
    config: &PipelineConfig,
    dry_run: bool,
) -> Result<(Arc<dyn RemoteSink>, String)> {
    if dry_run {
        return Ok((Arc::new(MemorySink::new()), Uuid::new_v4().to_string()));
    }

    let mut storage = open_storage(db_path)?;
    let file = storage.find_or_create_file(document, &config.book_id)?;
    let session = storage.create_session(&file.file_id)?;
    debug!(file_id = %file.file_id, session_id = %session.session_id, "session opened");

    let sink = StoreSink::new(Arc::new(Mutex::new(storage)));
    Ok((Arc::new(sink), session.session_id))
}

/// Reads events into the pipeline channel, counting malformed lines.
///
/// Stops early if the pipeline hangs up.
fn feed_events<R: std::io::BufRead>(
    reader: EventReader<R>,
    tx: &mpsc::Sender<EditEvent>,
) -> Result<usize> {
    let mut malformed = 0;
    for item in reader {
        match item {
            Ok(event) => {
                if tx.blocking_send(event).is_err() {
                    break;
                }
            }
            Err(Error::Codec(err @ CodecError::MalformedEvent { .. })) => {
                warn!(error = %err, "skipping malformed event");
                malformed += 1;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(malformed)
}

// ==================== Command Implementations ====================

fn cmd_init(db_path: &Path, force: bool, _format: OutputFormat) -> Result<String> {
    if db_path.exists() && !force {
        return Err(CommandError::ExecutionFailed(
            "Database already exists. Use --force to reinitialize.".to_string(),
        )
        .into());
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            CommandError::ExecutionFailed(format!("Failed to create directory: {e}"))
        })?;
    }

    if force && db_path.exists() {
        std::fs::remove_file(db_path).map_err(|e| {
            CommandError::ExecutionFailed(format!("Failed to remove existing database: {e}"))
        })?;
    }

    let mut storage = SqliteStorage::open(db_path)?;
    storage.init()?;

    Ok(format!(
        "Initialized event store at: {}\n",
        db_path.display()
    ))
}

fn cmd_status(db_path: &Path, format: OutputFormat) -> Result<String> {
    let storage = open_storage(db_path)?;
    let stats = storage.stats()?;
    Ok(format_status(&stats, format))
}

fn cmd_reset(db_path: &Path, yes: bool, _format: OutputFormat) -> Result<String> {
    if !yes {
        return Err(CommandError::ExecutionFailed(
            "Use --yes to confirm reset. This will delete all data.".to_string(),
        )
        .into());
    }

    let mut storage = open_storage(db_path)?;
    storage.reset()?;

    Ok("Event store reset successfully.\n".to_string())
}

fn cmd_push(
    db_path: &Path,
    config: &PipelineConfig,
    options: &PushOptions<'_>,
    format: OutputFormat,
) -> Result<String> {
    let document = options
        .document
        .map_or_else(|| options.events.to_string_lossy().to_string(), str::to_string);
    let reader = open_source(options.events)?;
    let (sink, session_id) = open_session(db_path, &document, config, options.dry_run)?;

    let controller = BufferController::new(FlushableBuffer::new(sink, session_id.clone()), config)
        .with_status_sink(Arc::new(TracingStatusSink));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let (summary, malformed) = runtime.block_on(async {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let reader_task = tokio::task::spawn_blocking(move || feed_events(reader, &tx));

        let summary = run(&controller, rx, config.flush_interval()).await?;
        let malformed = reader_task
            .await
            .map_err(|e| CommandError::ExecutionFailed(format!("event reader failed: {e}")))??;
        Ok::<_, Error>((summary, malformed))
    })?;

    let report = PushReport {
        session_id,
        document,
        dry_run: options.dry_run,
        malformed,
        summary,
    };
    Ok(format_push_report(&report, format))
}

fn cmd_sessions(db_path: &Path, document: Option<&str>, format: OutputFormat) -> Result<String> {
    let storage = open_storage(db_path)?;

    let file_id = match document {
        Some(path) => {
            let file = storage
                .find_file(path)?
                .ok_or_else(|| StorageError::FileNotFound {
                    identifier: path.to_string(),
                })?;
            Some(file.file_id)
        }
        None => None,
    };

    let sessions = storage.list_sessions(file_id.as_deref())?;
    Ok(format_session_list(&sessions, format))
}

fn cmd_batches(db_path: &Path, session_id: &str, format: OutputFormat) -> Result<String> {
    let storage = open_storage(db_path)?;
    require_session(&storage, session_id)?;
    let batches = storage.list_batches(session_id)?;
    Ok(format_batch_list(&batches, format))
}

fn cmd_replay(
    db_path: &Path,
    session_id: &str,
    batch_id: Option<&str>,
    format: OutputFormat,
) -> Result<String> {
    let storage = open_storage(db_path)?;
    require_session(&storage, session_id)?;

    let batches = match batch_id {
        Some(id) => {
            let batch = storage
                .get_batch(id)?
                .filter(|b| b.session_id == session_id)
                .ok_or_else(|| StorageError::BatchNotFound { id: id.to_string() })?;
            vec![batch]
        }
        None => storage.list_batches(session_id)?,
    };

    // Batches arrive in flush order; each decodes oldest first.
    let mut records = Vec::new();
    for batch in &batches {
        records.extend(decode_records(&batch.payload)?);
    }
    debug!(batches = batches.len(), records = records.len(), "replayed session");

    Ok(format_records(&records, format))
}

fn require_session(storage: &SqliteStorage, session_id: &str) -> Result<()> {
    if storage.get_session(session_id)?.is_none() {
        return Err(StorageError::SessionNotFound {
            id: session_id.to_string(),
        }
        .into());
    }
    Ok(())
}
