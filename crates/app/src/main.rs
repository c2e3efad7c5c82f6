use std::fmt;
use std::path::PathBuf;

use quiz_core::model::{AttemptId, SubjectId};
use quiz_core::scoring::format_time;
use services::history::DEFAULT_HISTORY_LIMIT;
use services::{AdminConfig, AppServices, Clock};
use tracing_subscriber::EnvFilter;

mod play;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidNumber { flag: &'static str, raw: String },
    MissingSubject,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::MissingSubject => write!(f, "a subject id is required"),
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
    eprintln!("  app subjects [--db <sqlite_url>] [--state-dir <dir>]");
    eprintln!("  app play [<subject-id>] [--db <sqlite_url>] [--state-dir <dir>]");
    eprintln!("  app history [--limit <n>] [--delete <attempt-id>] [--clear <subject-id>]");
    eprintln!("  app admin <show|hide|reset> <subject-id> --password <secret>");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:quiz.sqlite3");
    eprintln!("  --state-dir .quiz-state");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_STATE_DIR, QUIZ_ADMIN_PASSWORD, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Subjects,
    Play,
    History,
    Admin,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "subjects" => Some(Self::Subjects),
            "play" => Some(Self::Play),
            "history" => Some(Self::History),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisibilityChange {
    Show,
    Hide,
    Reset,
}

struct Args {
    db_url: String,
    state_dir: PathBuf,
    admin_password: Option<String>,
    subject: Option<SubjectId>,
    limit: u32,
    delete: Option<AttemptId>,
    clear: Option<SubjectId>,
    visibility: Option<VisibilityChange>,
    login: Option<String>,
}

impl Args {
    fn from_env() -> Self {
        Self {
            db_url: std::env::var("QUIZ_DB_URL")
                .ok()
                .map_or_else(|| normalize_sqlite_url("sqlite:quiz.sqlite3".into()), normalize_sqlite_url),
            state_dir: std::env::var("QUIZ_STATE_DIR")
                .ok()
                .filter(|dir| !dir.trim().is_empty())
                .map_or_else(|| PathBuf::from(".quiz-state"), PathBuf::from),
            admin_password: std::env::var("QUIZ_ADMIN_PASSWORD").ok(),
            subject: None,
            limit: DEFAULT_HISTORY_LIMIT,
            delete: None,
            clear: None,
            visibility: None,
            login: None,
        }
    }

    fn parse(cmd: Command, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self::from_env();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--state-dir" => {
                    parsed.state_dir = PathBuf::from(require_value(args, "--state-dir")?);
                }
                "--limit" if cmd == Command::History => {
                    let value = require_value(args, "--limit")?;
                    parsed.limit = value.parse().map_err(|_| ArgsError::InvalidNumber {
                        flag: "--limit",
                        raw: value.clone(),
                    })?;
                }
                "--delete" if cmd == Command::History => {
                    let value = require_value(args, "--delete")?;
                    let id: i64 = value.parse().map_err(|_| ArgsError::InvalidNumber {
                        flag: "--delete",
                        raw: value.clone(),
                    })?;
                    parsed.delete = Some(AttemptId::new(id));
                }
                "--clear" if cmd == Command::History => {
                    parsed.clear = Some(SubjectId::new(require_value(args, "--clear")?));
                }
                "--password" if cmd == Command::Admin => {
                    parsed.login = Some(require_value(args, "--password")?);
                }
                "show" | "hide" | "reset" if cmd == Command::Admin && parsed.visibility.is_none() => {
                    parsed.visibility = Some(match arg.as_str() {
                        "show" => VisibilityChange::Show,
                        "hide" => VisibilityChange::Hide,
                        _ => VisibilityChange::Reset,
                    });
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                positional
                    if matches!(cmd, Command::Play | Command::Admin)
                        && !positional.starts_with("--")
                        && parsed.subject.is_none() =>
                {
                    parsed.subject = Some(SubjectId::new(positional));
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if cmd == Command::Admin && (parsed.subject.is_none() || parsed.visibility.is_none()) {
            return Err(ArgsError::MissingSubject);
        }
        Ok(parsed)
    }

    fn admin_config(&self) -> AdminConfig {
        self.admin_password
            .as_deref()
            .map_or_else(AdminConfig::disabled, AdminConfig::with_password)
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.contains("mode=memory") {
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
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => Command::Play,
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let parsed = Args::parse(cmd, &mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let services = AppServices::new_sqlite(
        &parsed.db_url,
        &parsed.state_dir,
        Clock::system(),
        parsed.admin_config(),
    )
    .await?;
    tracing::debug!(db = %parsed.db_url, state_dir = %parsed.state_dir.display(), "services ready");

    match cmd {
        Command::Subjects => list_subjects(&services).await,
        Command::Play => play::run(&services, parsed.subject).await,
        Command::History => show_history(&services, &parsed).await,
        Command::Admin => change_visibility(&services, &parsed).await,
    }
}

async fn list_subjects(services: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = services.session();
    let catalog = session.load_catalog().await?;
    let visible = services.admin().visible_subjects(catalog);
    if visible.is_empty() {
        println!("No subjects available. Import one with the `seed` binary.");
        return Ok(());
    }
    for subject in visible {
        println!(
            "{:<16} {:<32} {:>6}  pass {}%",
            subject.id(),
            subject.name(),
            format_time(subject.duration_secs()),
            subject.passing_score()
        );
    }
    Ok(())
}

async fn show_history(
    services: &AppServices,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let history = services.history();
    if let Some(id) = args.delete {
        history.delete_attempt(id).await?;
        println!("Deleted attempt {id}.");
        return Ok(());
    }
    if let Some(subject) = &args.clear {
        let removed = history.clear_subject(subject).await?;
        println!("Deleted {removed} attempt(s) for {subject}.");
        return Ok(());
    }

    let rows = history.list_recent(args.limit).await?;
    if rows.is_empty() {
        println!("No attempts yet.");
        return Ok(());
    }
    for row in &rows {
        let record = &row.record;
        println!(
            "#{:<5} {}  {:<28} {:>3}/{:<3} {:>3.0}%  {}  {}",
            row.id,
            record.attempted_at.format("%Y-%m-%d %H:%M"),
            record.subject_name,
            record.score,
            record.total_questions,
            record.percentage,
            if record.passed { "PASS" } else { "FAIL" },
            format_time(record.time_taken_secs),
        );
    }

    let global = history.global_stats().await?;
    println!();
    println!(
        "{} attempt(s), {} passed ({:.0}%), average {:.0}%",
        global.attempts, global.passed, global.pass_rate, global.average_percentage
    );
    for stats in history.subject_stats().await? {
        println!(
            "  {:<28} {} attempt(s), best {:.0}%, average {:.0}%",
            stats.subject_name, stats.attempts, stats.best_percentage, stats.average_percentage
        );
    }
    Ok(())
}

async fn change_visibility(
    services: &AppServices,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let (Some(subject), Some(change)) = (&args.subject, args.visibility) else {
        return Err(ArgsError::MissingSubject.into());
    };
    let admin = services.admin();
    let password = args.login.as_deref().unwrap_or_default();
    if !admin.login(password)? {
        return Err("incorrect admin password".into());
    }

    let mut session = services.session();
    if !session.load_catalog().await?.iter().any(|s| s.id() == subject) {
        return Err(format!("unknown subject: {subject}").into());
    }
    match change {
        VisibilityChange::Show => admin.set_visibility(subject, true)?,
        VisibilityChange::Hide => admin.set_visibility(subject, false)?,
        VisibilityChange::Reset => admin.reset_visibility(subject)?,
    }
    admin.logout();
    println!("Updated visibility of {subject}.");
    Ok(())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" || db_url.contains("mode=memory") {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
