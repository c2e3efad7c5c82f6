use std::fmt;
use std::path::PathBuf;

use quiz_core::model::{DEFAULT_PASSING_SCORE, Question, QuestionId, Subject, SubjectId};
use serde::Deserialize;
use storage::repository::Storage;

/// Quiz file layout used by the static question banks.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuizFile {
    title: String,
    duration: u32,
    passing_score: Option<u32>,
    questions: Vec<QuizFileQuestion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuizFileQuestion {
    id: u64,
    question: String,
    options: Vec<String>,
    correct_answer: u32,
    topic: Option<String>,
}

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    file: PathBuf,
    subject_id: Option<String>,
    name: Option<String>,
    order: i64,
    inactive: bool,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFile,
    UnknownArg(String),
    InvalidOrder { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFile => write!(f, "--file is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidOrder { raw } => write!(f, "invalid --order value: {raw}"),
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("QUIZ_DB_URL").unwrap_or_else(|_| "sqlite:quiz.sqlite3?mode=rwc".into());
        let mut file = None;
        let mut subject_id = None;
        let mut name = None;
        let mut order = 0_i64;
        let mut inactive = false;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--file" => file = Some(PathBuf::from(require_value(&mut args, "--file")?)),
                "--subject-id" => subject_id = Some(require_value(&mut args, "--subject-id")?),
                "--name" => name = Some(require_value(&mut args, "--name")?),
                "--order" => {
                    let value = require_value(&mut args, "--order")?;
                    order = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidOrder { raw: value.clone() })?;
                }
                "--inactive" => inactive = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            file: file.ok_or(ArgsError::MissingFile)?,
            subject_id,
            name,
            order,
            inactive,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- --file <quiz.json> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:quiz.sqlite3?mode=rwc)");
    eprintln!("  --file <path>             Quiz JSON file to import");
    eprintln!("  --subject-id <id>         Subject id (default: file stem)");
    eprintln!("  --name <name>             Subject name (default: quiz title)");
    eprintln!("  --order <n>               Display order (default: 0)");
    eprintln!("  --inactive                Import the subject hidden");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let raw = std::fs::read_to_string(&args.file)?;
    let quiz: QuizFile = serde_json::from_str(&raw)?;

    let subject_id = args.subject_id.clone().unwrap_or_else(|| {
        args.file
            .file_stem()
            .map_or_else(|| "subject".into(), |s| s.to_string_lossy().into_owned())
    });
    let subject = Subject::new(
        SubjectId::new(subject_id),
        args.name.clone().unwrap_or(quiz.title),
        quiz.duration,
        quiz.passing_score
            .unwrap_or_else(|| u32::from(DEFAULT_PASSING_SCORE)),
        !args.inactive,
        args.order,
    )?;

    // Validate everything before touching the database.
    let mut questions = Vec::with_capacity(quiz.questions.len());
    for q in quiz.questions {
        questions.push(Question::new(
            QuestionId::new(q.id),
            q.question,
            q.options,
            q.correct_answer,
            q.topic,
        )?);
    }

    let storage = Storage::sqlite(&args.db_url).await?;
    storage.subjects.upsert_subject(&subject).await?;
    for question in &questions {
        storage.questions.upsert_question(subject.id(), question).await?;
    }

    println!(
        "Seeded subject {} ({}) with {} questions into {}",
        subject.id(),
        subject.name(),
        questions.len(),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
