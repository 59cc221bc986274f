//! `memory-assist` command-line entry point.
//!
//! # Responsibility
//! - Wire configuration, logging, storage and core services per command.
//! - Print successful results as JSON on stdout.
//! - Map failures onto a per-category exit code.

mod config;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset};
use clap::{Args, Parser, Subcommand};
use config::Config;
use memassist_core::{
    db::migrations::current_version, open_db, ChatError, CommandFaceEncoder, CreateTaskInput,
    ErrorCategory, FaceRegistry, IdentityError, IdentityService, MemoryChatbot, MemoryService,
    MemoryServiceError, PersonRepository, PhotoStore, RepeatDays, SqliteMemoryRepository,
    SqlitePersonRepository, SqliteTaskRepository, TaskService, TaskServiceError,
};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "memory-assist",
    version,
    about = "Memory companion: recognize people, track reminders, recall memories"
)]
struct Cli {
    /// Data directory (overrides MEMASSIST_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Log level (overrides MEMASSIST_LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Do not mirror log records to stderr
    #[arg(long, short, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage registered people
    #[command(subcommand)]
    Person(PersonCommand),
    /// Identify the person in a photo
    Identify {
        /// Photo to identify (JPEG, PNG or GIF, at most 5MB)
        photo: PathBuf,
        /// Maximum face distance for a match
        #[arg(long)]
        tolerance: Option<f64>,
        #[command(flatten)]
        encoder: EncoderArg,
    },
    /// Manage reminder tasks
    #[command(subcommand)]
    Task(TaskCommand),
    /// Manage memory log entries
    #[command(subcommand)]
    Memory(MemoryCommand),
    /// Ask the memory chatbot
    Chat {
        /// Message text
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Show configuration and store status
    Status,
}

#[derive(Subcommand)]
enum PersonCommand {
    /// Register a person from a photo
    Add {
        /// Photo of the person (JPEG, PNG or GIF, at most 5MB)
        photo: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        relation: String,
        #[arg(long, default_value = "")]
        description: String,
        #[command(flatten)]
        encoder: EncoderArg,
    },
    /// List registered people, newest first
    List,
    /// Forget the face vector stored for a name
    Remove { name: String },
    /// Delete a person record (and its vector when no other record shares the name)
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum TaskCommand {
    /// Create a reminder task
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Reminder time, HH:MM
        #[arg(long)]
        reminder_time: Option<String>,
        /// none, daily, weekly or monthly
        #[arg(long)]
        repeat_type: Option<String>,
        #[arg(long)]
        repeat_time: Option<String>,
        /// Comma-separated weekday names
        #[arg(long)]
        repeat_days: Option<String>,
        /// Last repeat date, YYYY-MM-DD
        #[arg(long)]
        repeat_until: Option<String>,
    },
    /// List tasks, newest first
    List,
    /// Show one task
    Show { id: i64 },
    /// Mark a task completed
    Complete {
        id: i64,
        /// Mark the task as not completed instead
        #[arg(long)]
        undo: bool,
    },
}

#[derive(Subcommand)]
enum MemoryCommand {
    /// Record a memory
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
    },
    /// List memories, newest first
    List {
        /// Show at most this many entries
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[derive(Args)]
struct EncoderArg {
    /// Face encoder command line (overrides MEMASSIST_ENCODER)
    #[arg(long)]
    encoder: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut config = Config::from_env(cli.data_dir.as_deref());
    if let Some(level) = cli.log_level.clone() {
        config.log_level = level;
    }

    if let Err(err) = memassist_core::init_logging(&config.log_level, &config.log_dir, !cli.quiet)
    {
        eprintln!("warning: logging disabled: {err}");
    }

    match run(cli.command, &config) {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("error: cannot render output: {err}");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            let category = error_category(&err);
            log::error!(
                "event=cli_command module=cli status=error category={}",
                category.map_or("unclassified", |c| c.as_str())
            );
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(category))
        }
    }
}

fn run(command: Commands, config: &Config) -> Result<Value> {
    match command {
        Commands::Person(command) => run_person(command, config),
        Commands::Identify {
            photo,
            tolerance,
            encoder,
        } => {
            let image = read_photo(&photo)?;
            let conn = open_store(config)?;
            let mut registry = open_registry(config)?;
            let service = identity_service(&conn, &mut registry, config, encoder)?;
            let found = service.identify(&image, tolerance.unwrap_or(config.tolerance))?;
            Ok(serde_json::to_value(found)?)
        }
        Commands::Task(command) => run_task(command, config),
        Commands::Memory(command) => run_memory(command, config),
        Commands::Chat { message } => {
            let conn = open_store(config)?;
            let chatbot = MemoryChatbot::new(SqliteMemoryRepository::try_new(&conn)?);
            let reply = chatbot.respond(&message.join(" "))?;
            Ok(json!({ "response": reply }))
        }
        Commands::Status => {
            let conn = open_store(config)?;
            let registry = open_registry(config)?;
            Ok(json!({
                "version": memassist_core::core_version(),
                "schema_version": current_version(&conn)?,
                "known_faces": registry.len(),
                "encoder_configured": config.encoder_command.is_some(),
                "tolerance": config.tolerance,
                "utc_offset": config.utc_offset.to_string(),
                "paths": {
                    "data_dir": config.data_dir,
                    "db_path": config.db_path,
                    "faces_dir": config.faces_dir,
                    "uploads_dir": config.uploads_dir,
                    "log_dir": config.log_dir,
                },
                "logging": memassist_core::logging_status()
                    .map(|(level, dir)| json!({ "level": level, "log_dir": dir })),
            }))
        }
    }
}

fn run_person(command: PersonCommand, config: &Config) -> Result<Value> {
    let conn = open_store(config)?;
    let mut registry = open_registry(config)?;

    match command {
        PersonCommand::Add {
            photo,
            name,
            relation,
            description,
            encoder,
        } => {
            let image = read_photo(&photo)?;
            let mut service = identity_service(&conn, &mut registry, config, encoder)?;
            let person = service.register(&image, &name, &relation, &description)?;
            localized(&person, person.created_at, config.utc_offset)
        }
        PersonCommand::List => {
            let people = SqlitePersonRepository::try_new(&conn)?.list_people()?;
            people
                .iter()
                .map(|person| localized(person, person.created_at, config.utc_offset))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        PersonCommand::Remove { name } => {
            let mut service = identity_service(&conn, &mut registry, config, EncoderArg::none())?;
            let removed = service.remove(&name)?;
            Ok(json!({ "name": name, "removed": removed }))
        }
        PersonCommand::Delete { id } => {
            let mut service = identity_service(&conn, &mut registry, config, EncoderArg::none())?;
            let person = service.delete_person(id)?;
            Ok(json!({
                "deleted": localized(&person, person.created_at, config.utc_offset)?,
                "vector_kept": service.registry().get(&person.name).is_some(),
            }))
        }
    }
}

fn run_task(command: TaskCommand, config: &Config) -> Result<Value> {
    let mut conn = open_store(config)?;
    let mut service = TaskService::new(SqliteTaskRepository::try_new(&mut conn)?);

    let task = match command {
        TaskCommand::Add {
            name,
            description,
            reminder_time,
            repeat_type,
            repeat_time,
            repeat_days,
            repeat_until,
        } => service.create_task(&CreateTaskInput {
            name,
            description,
            reminder_time,
            repeat_type,
            repeat_time,
            repeat_days: repeat_days.map(RepeatDays::Delimited),
            repeat_until,
        })?,
        TaskCommand::List => {
            return service
                .list_tasks()?
                .iter()
                .map(|task| localized(task, task.created_at, config.utc_offset))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array);
        }
        TaskCommand::Show { id } => service
            .get_task(id)?
            .ok_or(TaskServiceError::TaskNotFound(id))?,
        TaskCommand::Complete { id, undo } => service.set_completion(id, !undo)?,
    };
    localized(&task, task.created_at, config.utc_offset)
}

fn run_memory(command: MemoryCommand, config: &Config) -> Result<Value> {
    let conn = open_store(config)?;
    let service = MemoryService::new(SqliteMemoryRepository::try_new(&conn)?);

    match command {
        MemoryCommand::Add { title, content } => {
            let memory = service.add_memory(&title, &content)?;
            localized(&memory, memory.timestamp, config.utc_offset)
        }
        MemoryCommand::List { limit } => service
            .list_memories(limit)?
            .iter()
            .map(|memory| localized(memory, memory.timestamp, config.utc_offset))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
    }
}

impl EncoderArg {
    fn none() -> Self {
        Self { encoder: None }
    }
}

fn identity_service<'reg>(
    conn: &'reg Connection,
    registry: &'reg mut FaceRegistry,
    config: &Config,
    encoder: EncoderArg,
) -> Result<IdentityService<'reg, SqlitePersonRepository<'reg>, Box<dyn memassist_core::FaceEncoder>>>
{
    let photos = PhotoStore::open(&config.uploads_dir).with_context(|| {
        format!(
            "cannot open uploads directory `{}`",
            config.uploads_dir.display()
        )
    })?;
    Ok(IdentityService::new(
        SqlitePersonRepository::try_new(conn)?,
        face_encoder(config, encoder),
        photos,
        registry,
    ))
}

/// External encoder when configured; otherwise an encoder that fails on use,
/// so commands that never encode (remove, delete) still work.
fn face_encoder(config: &Config, arg: EncoderArg) -> Box<dyn memassist_core::FaceEncoder> {
    match arg
        .encoder
        .or_else(|| config.encoder_command.clone())
        .as_deref()
        .and_then(CommandFaceEncoder::from_command_line)
    {
        Some(encoder) => Box::new(encoder),
        None => Box::new(MissingEncoder),
    }
}

struct MissingEncoder;

impl memassist_core::FaceEncoder for MissingEncoder {
    fn encode_faces(
        &self,
        _image: &[u8],
    ) -> std::result::Result<Vec<memassist_core::FaceEncoding>, memassist_core::EncoderError> {
        Err(memassist_core::EncoderError::InvalidOutput(
            "no face encoder configured; set MEMASSIST_ENCODER or pass --encoder".to_string(),
        ))
    }
}

fn open_store(config: &Config) -> Result<Connection> {
    open_db(&config.db_path)
        .with_context(|| format!("cannot open database `{}`", config.db_path.display()))
}

fn open_registry(config: &Config) -> Result<FaceRegistry> {
    Ok(FaceRegistry::open(&config.faces_dir)?)
}

fn read_photo(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        bail!("photo `{}` is not a readable file", path.display());
    }
    std::fs::read(path).with_context(|| format!("cannot read photo `{}`", path.display()))
}

/// Serializes `record` and adds `local_time`, the epoch-ms stamp rendered in
/// the configured offset.
fn localized<T: Serialize>(record: &T, epoch_ms: i64, offset: FixedOffset) -> Result<Value> {
    let mut value = serde_json::to_value(record)?;
    if let Value::Object(fields) = &mut value {
        let local = DateTime::from_timestamp_millis(epoch_ms)
            .map(|utc| utc.with_timezone(&offset).to_rfc3339());
        fields.insert("local_time".to_string(), json!(local));
    }
    Ok(value)
}

fn error_category(err: &anyhow::Error) -> Option<ErrorCategory> {
    err.chain().find_map(|cause| {
        if let Some(err) = cause.downcast_ref::<IdentityError>() {
            Some(err.category())
        } else if let Some(err) = cause.downcast_ref::<TaskServiceError>() {
            Some(err.category())
        } else if let Some(err) = cause.downcast_ref::<MemoryServiceError>() {
            Some(err.category())
        } else if let Some(err) = cause.downcast_ref::<ChatError>() {
            Some(err.category())
        } else if cause.is::<memassist_core::RepoError>() || cause.is::<memassist_core::DbError>()
        {
            Some(ErrorCategory::Persistence)
        } else {
            None
        }
    })
}

/// Exit status per failure category; 1 is unclassified, 2 is clap usage.
fn exit_code(category: Option<ErrorCategory>) -> u8 {
    match category {
        None => 1,
        Some(ErrorCategory::Validation) => 3,
        Some(ErrorCategory::NotFound) => 4,
        Some(ErrorCategory::NoFaceDetected) => 5,
        Some(ErrorCategory::PersonNotRecognized) => 6,
        Some(ErrorCategory::Persistence) => 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn chat_joins_words() {
        let cli = Cli::parse_from(["memory-assist", "chat", "tell", "me", "about", "Goa"]);
        match cli.command {
            Commands::Chat { message } => assert_eq!(message.join(" "), "tell me about Goa"),
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn memory_list_takes_an_optional_limit() {
        let cli = Cli::parse_from(["memory-assist", "memory", "list", "--limit", "5"]);
        match cli.command {
            Commands::Memory(MemoryCommand::List { limit }) => assert_eq!(limit, Some(5)),
            _ => panic!("expected memory list"),
        }
        let cli = Cli::parse_from(["memory-assist", "memory", "list"]);
        match cli.command {
            Commands::Memory(MemoryCommand::List { limit }) => assert_eq!(limit, None),
            _ => panic!("expected memory list"),
        }
    }

    #[test]
    fn categories_have_distinct_exit_codes() {
        let codes = [
            exit_code(None),
            exit_code(Some(ErrorCategory::Validation)),
            exit_code(Some(ErrorCategory::NotFound)),
            exit_code(Some(ErrorCategory::NoFaceDetected)),
            exit_code(Some(ErrorCategory::PersonNotRecognized)),
            exit_code(Some(ErrorCategory::Persistence)),
        ];
        let unique: std::collections::BTreeSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
        assert!(!codes.contains(&2));
    }

    #[test]
    fn service_errors_keep_their_category_through_anyhow() {
        let err = anyhow::Error::from(TaskServiceError::TaskNotFound(9));
        assert_eq!(error_category(&err), Some(ErrorCategory::NotFound));

        let err = anyhow::Error::from(IdentityError::NoFaceDetected).context("identify failed");
        assert_eq!(error_category(&err), Some(ErrorCategory::NoFaceDetected));

        assert_eq!(error_category(&anyhow::anyhow!("plain")), None);
    }

    #[test]
    fn local_time_uses_configured_offset() {
        let offset = config::parse_utc_offset("+05:30").unwrap();
        let value = localized(&json!({ "id": 1 }), 0, offset).unwrap();
        assert_eq!(value["local_time"], "1970-01-01T05:30:00+05:30");
        assert_eq!(value["id"], 1);
    }
}
