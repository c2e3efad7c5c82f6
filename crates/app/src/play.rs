//! Interactive terminal session: line commands on stdin raced against
//! countdown notifications.

use quiz_core::model::SubjectId;
use quiz_core::scoring::{ScoreReport, format_time};
use quiz_core::session::SessionPhase;
use services::{AppServices, SessionEvent, SessionOrchestrator};
use tokio::io::{AsyncBufReadExt, BufReader};

const OPTION_LABELS: [char; 4] = ['a', 'b', 'c', 'd'];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Answer(u8),
    Next,
    Prev,
    Goto(usize),
    Submit,
    Start,
    Restart,
    Home,
    Open(SubjectId),
    List,
    Help,
    Exit,
}

impl Input {
    fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let head = words.next()?;
        let arg = words.next();
        let input = match (head, arg) {
            ("a" | "b" | "c" | "d", None) => {
                let index = OPTION_LABELS.iter().position(|c| head.starts_with(*c))?;
                Self::Answer(u8::try_from(index).ok()?)
            }
            ("n", None) => Self::Next,
            ("p", None) => Self::Prev,
            ("g", Some(n)) => Self::Goto(n.parse::<usize>().ok()?.checked_sub(1)?),
            ("s", None) => Self::Submit,
            ("start", None) => Self::Start,
            ("r", None) => Self::Restart,
            ("q", None) => Self::Home,
            ("open", Some(id)) => Self::Open(SubjectId::new(id)),
            ("list", None) => Self::List,
            ("help" | "?", None) => Self::Help,
            ("exit", None) => Self::Exit,
            _ => return None,
        };
        Some(input)
    }
}

pub async fn run(
    services: &AppServices,
    subject: Option<SubjectId>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = services.session();
    if session.mount().await? {
        println!("Resuming your unfinished test.");
        session.wait_for_questions().await;
    } else if let Some(id) = subject {
        session.select_subject_by_id(&id).await?;
        session.wait_for_questions().await;
    }
    render(services, &session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some(input) = Input::parse(line.trim()) else {
                    println!("Unrecognised command. Type `help` for the list.");
                    continue;
                };
                if input == Input::Exit {
                    break;
                }
                apply(&mut session, input, services).await;
                render(services, &session);
            }
            Some(event) = session.next_event() => {
                let tick = matches!(event, SessionEvent::TimerTick(_));
                let was_submitted = session.state().test_submitted();
                session.handle_event(event).await;
                if tick {
                    announce_time(session.state().time_left_secs());
                } else {
                    if !was_submitted && session.state().test_submitted() {
                        println!("Time is up! Your answers were submitted.");
                    }
                    render(services, &session);
                }
            }
        }
    }
    Ok(())
}

async fn apply(session: &mut SessionOrchestrator, input: Input, services: &AppServices) {
    match input {
        Input::Answer(option) => session.answer_current(option).await,
        Input::Next => session.next_question().await,
        Input::Prev => session.prev_question().await,
        Input::Goto(index) => session.go_to_question(index).await,
        Input::Submit => session.submit().await,
        Input::Start => session.start_test().await,
        Input::Restart => session.restart().await,
        Input::Home => session.back_to_home().await,
        Input::Open(id) => {
            let visible = services.admin().visible_subjects(session.catalog());
            if !visible.iter().any(|s| s.id() == &id) {
                println!("No subject `{id}`. Type `list` to see subjects.");
                return;
            }
            if let Err(e) = session.select_subject_by_id(&id).await {
                println!("{e}");
                return;
            }
            session.wait_for_questions().await;
        }
        Input::List => {
            for subject in services.admin().visible_subjects(session.catalog()) {
                println!("  {:<16} {}", subject.id(), subject.name());
            }
        }
        Input::Help => print_help(),
        Input::Exit => {}
    }
}

fn announce_time(left: u32) {
    if left <= 10 || left % 60 == 0 {
        println!("[{} left]", format_time(left));
    }
}

fn render(services: &AppServices, session: &SessionOrchestrator) {
    let state = session.state();
    match state.phase() {
        SessionPhase::NoSubject => {
            println!();
            println!("Choose a subject with `open <id>`:");
            for subject in services.admin().visible_subjects(session.catalog()) {
                println!(
                    "  {:<16} {} ({})",
                    subject.id(),
                    subject.name(),
                    format_time(subject.duration_secs())
                );
            }
        }
        SessionPhase::Loading => println!("Loading questions..."),
        SessionPhase::Error => {
            println!("Error: {}", state.error().unwrap_or("unknown error"));
            println!("Type `q` to go back.");
        }
        SessionPhase::Ready => {
            if let Some(set) = state.question_set() {
                println!();
                println!("{}", set.title());
                println!(
                    "{} questions, {} minutes, pass mark {}%",
                    set.len(),
                    set.duration_secs() / 60,
                    set.passing_score()
                );
                println!("Type `start` to begin or `q` to go back.");
            }
        }
        SessionPhase::InProgress => render_question(session),
        SessionPhase::Submitted => {
            if let Some(report) = session.report() {
                render_report(session, &report);
            }
        }
    }
}

fn render_question(session: &SessionOrchestrator) {
    let state = session.state();
    let progress = session.progress();
    let Some(question) = state.current_question() else {
        return;
    };
    let selected = state.answers().get(question.id());

    println!();
    println!(
        "Question {}   answered {}/{}   time {}",
        progress.position(),
        progress.answered,
        progress.total,
        progress.clock()
    );
    if let Some(topic) = question.topic() {
        println!("[{topic}]");
    }
    println!("{}", question.text());
    for (label, (index, option)) in OPTION_LABELS.iter().zip(question.options().iter().enumerate()) {
        let marker = if selected.is_some_and(|s| usize::from(s) == index) {
            '*'
        } else {
            ' '
        };
        println!(" {marker}{label}) {option}");
    }
}

fn render_report(session: &SessionOrchestrator, report: &ScoreReport) {
    let state = session.state();
    println!();
    println!(
        "Score {}/{} ({}%) - {}",
        report.score,
        report.total,
        report.rounded_percentage(),
        if report.passed { "PASSED" } else { "FAILED" }
    );
    println!(
        "{} incorrect, {} unanswered",
        report.incorrect, report.unanswered
    );
    if let Some(set) = state.question_set() {
        for item in &report.review {
            let Some(question) = set.get(item.index) else {
                continue;
            };
            let chosen = item
                .selected
                .and_then(|s| OPTION_LABELS.get(usize::from(s)))
                .map_or_else(|| "-".to_string(), char::to_string);
            let correct = OPTION_LABELS
                .get(usize::from(item.correct))
                .map_or_else(|| "?".to_string(), char::to_string);
            println!(
                "  Q{} {}  yours: {chosen}  correct: {correct}",
                item.index + 1,
                question.text()
            );
        }
    }
    if session.last_attempt_id().is_none() {
        println!("(this attempt could not be saved to history)");
    }
    println!("Type `r` to retake or `q` to choose another subject.");
}

fn print_help() {
    println!("Commands:");
    println!("  open <id>   choose a subject      list   show subjects");
    println!("  start       begin the test        a-d    answer the current question");
    println!("  n / p       next / previous       g <n>  jump to question n");
    println!("  s           submit                r      retake after submitting");
    println!("  q           back to subjects      exit   leave (progress is kept)");
}
