mod console;

use std::fmt;
use std::time::Duration;

use phrase_core::model::{Language, LessonId};
use services::{AppServices, Clock, QuizSettings};
use tracing_subscriber::EnvFilter;

use crate::console::Console;

const MEMORY_DB: &str = "memory";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingOperand { command: &'static str },
    UnknownArg(String),
    InvalidLessonId { raw: String },
    InvalidLanguage { raw: String },
    InvalidMillis { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingOperand { command } => write!(f, "{command} requires an argument"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidLessonId { raw } => write!(f, "invalid lesson id: {raw}"),
            ArgsError::InvalidLanguage { raw } => {
                write!(f, "invalid language: {raw} (expected en or ja)")
            }
            ArgsError::InvalidMillis { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app lessons               [options]");
    eprintln!("  app show <lesson-id>      [options]");
    eprintln!("  app quiz <lesson-id>      [options]");
    eprintln!("  app language <en|ja>      [options]");
    eprintln!("  app progress              [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url|memory>  (default sqlite://phrase.sqlite3)");
    eprintln!("  --eval-timeout-ms <ms>    (default 10000)");
    eprintln!("  --eval-delay-ms <ms>      (default 800)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PHRASE_DB_URL, PHRASE_EVAL_TIMEOUT_MS, PHRASE_EVAL_DELAY_MS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Lessons,
    Show(LessonId),
    Quiz(LessonId),
    Language(Language),
    Progress,
}

impl Command {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let Some(name) = args.next() else {
            return Ok(None);
        };
        let command = match name.as_str() {
            "lessons" => Self::Lessons,
            "progress" => Self::Progress,
            "show" => Self::Show(lesson_operand(args, "show")?),
            "quiz" => Self::Quiz(lesson_operand(args, "quiz")?),
            "language" => {
                let raw = args
                    .next()
                    .ok_or(ArgsError::MissingOperand { command: "language" })?;
                let language = raw
                    .parse::<Language>()
                    .map_err(|_| ArgsError::InvalidLanguage { raw: raw.clone() })?;
                Self::Language(language)
            }
            _ => return Err(ArgsError::UnknownArg(name)),
        };
        Ok(Some(command))
    }
}

fn parse_command_line(
    args: &mut impl Iterator<Item = String>,
) -> Result<Option<(Command, Args)>, ArgsError> {
    let Some(cmd) = Command::parse(args)? else {
        return Ok(None);
    };
    Ok(Some((cmd, Args::parse(args)?)))
}

fn lesson_operand(
    args: &mut impl Iterator<Item = String>,
    command: &'static str,
) -> Result<LessonId, ArgsError> {
    let raw = args.next().ok_or(ArgsError::MissingOperand { command })?;
    raw.parse::<LessonId>()
        .map_err(|_| ArgsError::InvalidLessonId { raw: raw.clone() })
}

struct Args {
    db_url: String,
    settings: QuizSettings,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("PHRASE_DB_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map_or_else(|| "sqlite://phrase.sqlite3".into(), normalize_sqlite_url);
        let mut settings = QuizSettings::from_env();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--eval-timeout-ms" => {
                    let timeout = parse_millis(args, "--eval-timeout-ms")?;
                    if timeout.is_zero() {
                        return Err(ArgsError::InvalidMillis {
                            flag: "--eval-timeout-ms",
                            raw: "0".into(),
                        });
                    }
                    settings = settings.with_evaluation_timeout(timeout);
                }
                "--eval-delay-ms" => {
                    settings = settings.with_evaluator_delay(parse_millis(args, "--eval-delay-ms")?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, settings })
    }
}

fn parse_millis(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<Duration, ArgsError> {
    let value = require_value(args, flag)?;
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ArgsError::InvalidMillis { flag, raw: value })
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == MEMORY_DB || raw.starts_with("sqlite://") || raw.starts_with("sqlite:file:") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_dir(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1).peekable();
    if matches!(argv.peek().map(String::as_str), Some("--help" | "-h")) {
        print_usage();
        return Ok(());
    }

    let (cmd, args) = match parse_command_line(&mut argv) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(e) => {
            eprintln!("{e}");
            print_usage();
            return Err(e.into());
        }
    };

    let clock = Clock::default();
    let app = if args.db_url == MEMORY_DB {
        AppServices::in_memory(clock, args.settings).await?
    } else {
        prepare_sqlite_dir(&args.db_url)?;
        AppServices::new_sqlite(&args.db_url, clock, args.settings).await?
    };

    let mut console = Console::new(app);
    match cmd {
        Command::Lessons => console.list_lessons(),
        Command::Show(id) => console.show_lesson(id)?,
        Command::Quiz(id) => console.run_quiz(id).await?,
        Command::Language(language) => console.set_language(language).await?,
        Command::Progress => console.show_progress(),
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
