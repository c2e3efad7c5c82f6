use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quiz_core::model::{
    AttemptId, AttemptRecord, AttemptRow, Question, QuestionId, Subject, SubjectId,
};
use quiz_core::session::SessionPhase;
use quiz_core::time::fixed_now;
use services::{AttemptHistoryService, Clock, SessionOrchestrator};
use storage::kv::{InMemoryKeyValueStore, KeyValueStore};
use storage::repository::{
    AttemptLog, InMemoryRepository, QuestionStore, StorageError, SubjectCatalog,
};
use storage::snapshot::{SESSION_SNAPSHOT_KEY, SnapshotStore};

struct Fixture {
    repo: InMemoryRepository,
    kv: Arc<InMemoryKeyValueStore>,
}

impl Fixture {
    async fn new() -> Self {
        let repo = InMemoryRepository::new();
        add_subject(&repo, "ds", "Data Structures", 600, &[1, 2]).await;
        add_subject(&repo, "os", "Operating Systems", 300, &[0, 0, 3]).await;
        add_subject(&repo, "quick", "Quick Check", 3, &[0]).await;
        Self {
            repo,
            kv: Arc::new(InMemoryKeyValueStore::new()),
        }
    }

    fn snapshots(&self) -> SnapshotStore {
        SnapshotStore::new(self.kv.clone())
    }

    fn session(&self) -> SessionOrchestrator {
        self.session_with_log(Arc::new(self.repo.clone()))
    }

    fn session_with_log(&self, attempts: Arc<dyn AttemptLog>) -> SessionOrchestrator {
        self.session_at(Clock::fixed(fixed_now()), attempts)
    }

    fn session_at(&self, clock: Clock, attempts: Arc<dyn AttemptLog>) -> SessionOrchestrator {
        SessionOrchestrator::new(
            clock,
            Arc::new(self.repo.clone()),
            Arc::new(self.repo.clone()),
            attempts,
            self.snapshots(),
        )
    }

    async fn attempts(&self) -> Vec<AttemptRow> {
        self.repo.list_attempts(100).await.unwrap()
    }
}

async fn add_subject(
    repo: &InMemoryRepository,
    id: &str,
    name: &str,
    duration: u32,
    correct: &[u32],
) {
    let subject = Subject::with_defaults(SubjectId::from(id), name, duration).unwrap();
    repo.upsert_subject(&subject).await.unwrap();
    for (n, &answer) in (1_u64..).zip(correct) {
        let question = Question::new(
            QuestionId::new(n),
            format!("{name} question {n}"),
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            answer,
            None,
        )
        .unwrap();
        repo.upsert_question(subject.id(), &question).await.unwrap();
    }
}

async fn ready(session: &mut SessionOrchestrator, subject: &str) {
    session.mount().await.unwrap();
    session
        .select_subject_by_id(&SubjectId::from(subject))
        .await
        .unwrap();
    session.wait_for_questions().await;
}

async fn pump(session: &mut SessionOrchestrator, events: usize) {
    for _ in 0..events {
        let event = session.next_event().await.unwrap();
        session.handle_event(event).await;
    }
}

#[tokio::test(start_paused = true)]
async fn full_session_records_one_failed_attempt() {
    let fixture = Fixture::new().await;
    let mut session = fixture.session();

    ready(&mut session, "ds").await;
    assert_eq!(session.state().phase(), SessionPhase::Ready);
    assert_eq!(session.state().time_left_secs(), 600);

    session.start_test().await;
    session.answer(QuestionId::new(1), 1).await;
    session.next_question().await;
    session.answer(QuestionId::new(2), 0).await;
    pump(&mut session, 5).await;
    assert_eq!(session.state().time_left_secs(), 595);

    session.submit().await;

    assert_eq!(session.state().phase(), SessionPhase::Submitted);
    assert_eq!(session.state().score(), 1);
    let report = session.report().unwrap();
    assert!((report.percentage - 50.0).abs() < f64::EPSILON);
    assert!(!report.passed);

    let attempts = fixture.attempts().await;
    assert_eq!(attempts.len(), 1);
    let record = &attempts[0].record;
    assert_eq!(record.subject_id.as_str(), "ds");
    assert_eq!(record.subject_name, "Data Structures");
    assert_eq!(record.score, 1);
    assert_eq!(record.total_questions, 2);
    assert!(!record.passed);
    assert_eq!(record.time_taken_secs, 5);
    assert_eq!(record.attempted_at, fixed_now());
    assert_eq!(session.last_attempt_id(), Some(attempts[0].id));
}

#[tokio::test]
async fn submission_is_logged_once_per_attempt() {
    let fixture = Fixture::new().await;
    let mut session = fixture.session();
    ready(&mut session, "os").await;
    session.start_test().await;
    session.submit().await;

    session.refresh().await;
    session.refresh().await;
    session.submit().await;
    assert_eq!(fixture.attempts().await.len(), 1);

    session.restart().await;
    assert_eq!(session.state().phase(), SessionPhase::Ready);
    session.start_test().await;
    session.answer(QuestionId::new(3), 3).await;
    session.submit().await;

    let attempts = fixture.attempts().await;
    assert_eq!(attempts.len(), 2);
    assert_eq!(session.state().score(), 1);
}

#[tokio::test(start_paused = true)]
async fn expiry_forces_submission_with_current_answers() {
    let fixture = Fixture::new().await;
    let mut session = fixture.session();
    ready(&mut session, "quick").await;
    session.start_test().await;
    session.answer(QuestionId::new(1), 0).await;

    // Two ticks, then the expiry notification.
    pump(&mut session, 3).await;

    assert!(session.state().test_submitted());
    assert_eq!(session.state().score(), 1);
    assert_eq!(session.state().time_left_secs(), 1);
    assert!(!session.timer_active());
    let attempts = fixture.attempts().await;
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].record.passed);
    assert_eq!(attempts[0].record.time_taken_secs, 2);
    assert!(fixture.snapshots().load().is_none());
}

#[tokio::test(start_paused = true)]
async fn expiry_queued_before_restart_does_not_touch_the_new_run() {
    let fixture = Fixture::new().await;
    let mut session = fixture.session();
    ready(&mut session, "quick").await;
    session.start_test().await;
    pump(&mut session, 2).await;
    assert_eq!(session.state().time_left_secs(), 1);

    // Let the expiry land in the queue, then finish and retake by hand.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    tokio::task::yield_now().await;
    session.submit().await;
    session.restart().await;
    session.start_test().await;

    pump(&mut session, 1).await;
    assert!(!session.state().test_submitted());
    assert_eq!(session.state().time_left_secs(), 3);
    assert_eq!(fixture.attempts().await.len(), 1);

    // The new run still counts down.
    pump(&mut session, 1).await;
    assert_eq!(session.state().time_left_secs(), 2);
    assert!(session.timer_active());
}

#[tokio::test]
async fn later_attempts_are_stamped_later_and_listed_first() {
    let fixture = Fixture::new().await;
    let log: Arc<dyn AttemptLog> = Arc::new(fixture.repo.clone());
    let mut clock = Clock::fixed(fixed_now());

    let mut morning = fixture.session_at(clock, Arc::clone(&log));
    ready(&mut morning, "ds").await;
    morning.start_test().await;
    morning.submit().await;

    clock.advance_secs(3600);
    let mut evening = fixture.session_at(clock, Arc::clone(&log));
    ready(&mut evening, "ds").await;
    evening.start_test().await;
    evening.answer(QuestionId::new(1), 1).await;
    evening.answer(QuestionId::new(2), 2).await;
    evening.submit().await;

    let history = AttemptHistoryService::new(log);
    let recent = history.list_recent(10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].record.attempted_at, clock.now());
    assert_eq!(recent[0].record.score, 2);
    assert_eq!(recent[1].record.attempted_at, fixed_now());
    assert!(recent[0].record.attempted_at > recent[1].record.attempted_at);

    let stats = history.subject_stats().await.unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].last_attempted_at, clock.now());
    assert!((stats[0].last_percentage - 100.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn switching_subjects_keeps_only_latest_questions() {
    let fixture = Fixture::new().await;
    let mut session = fixture.session();
    session.mount().await.unwrap();

    session
        .select_subject_by_id(&SubjectId::from("ds"))
        .await
        .unwrap();
    session
        .select_subject_by_id(&SubjectId::from("os"))
        .await
        .unwrap();
    session.wait_for_questions().await;

    let set = session.state().question_set().unwrap();
    assert_eq!(set.title(), "Operating Systems");
    assert_eq!(set.len(), 3);
    assert_eq!(session.state().selected_subject().unwrap().id().as_str(), "os");
}

#[tokio::test(start_paused = true)]
async fn leaving_during_fetch_drops_the_result() {
    let fixture = Fixture::new().await;
    let mut session = fixture.session();
    session.mount().await.unwrap();
    session
        .select_subject_by_id(&SubjectId::from("ds"))
        .await
        .unwrap();

    session.back_to_home().await;

    assert!(!session.is_fetching());
    if let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_millis(50), session.next_event()).await
    {
        session.handle_event(event).await;
    }
    assert_eq!(session.state().phase(), SessionPhase::NoSubject);
    assert!(session.state().question_set().is_none());
}

#[tokio::test]
async fn load_failure_surfaces_message() {
    let fixture = Fixture::new().await;
    let empty = Subject::with_defaults(SubjectId::from("empty"), "Empty", 60).unwrap();
    fixture.repo.upsert_subject(&empty).await.unwrap();
    let mut session = fixture.session();

    ready(&mut session, "empty").await;

    assert_eq!(session.state().phase(), SessionPhase::Error);
    assert_eq!(
        session.state().error(),
        Some("No questions found for this subject")
    );
}

#[tokio::test]
async fn snapshot_is_cleared_on_submit_and_on_home() {
    let fixture = Fixture::new().await;
    let snapshots = fixture.snapshots();
    let mut session = fixture.session();

    ready(&mut session, "ds").await;
    session.start_test().await;
    assert!(snapshots.load().is_some());
    session.submit().await;
    assert!(snapshots.load().is_none());

    session.restart().await;
    session.start_test().await;
    assert!(snapshots.load().is_some());
    session.back_to_home().await;
    assert!(snapshots.load().is_none());
}

#[tokio::test]
async fn mount_resumes_saved_session() {
    let fixture = Fixture::new().await;
    fixture
        .kv
        .set(
            SESSION_SNAPSHOT_KEY,
            r#"{"subjectId":"ds","subjectName":"Data Structures","currentQuestion":1,
                "answers":{"1":1,"99":2},"timeLeft":120,"testStarted":true}"#,
        )
        .unwrap();
    let mut session = fixture.session();

    assert!(session.mount().await.unwrap());
    session.wait_for_questions().await;

    let state = session.state();
    assert_eq!(state.phase(), SessionPhase::InProgress);
    assert_eq!(state.current_question_index(), 1);
    assert_eq!(state.time_left_secs(), 120);
    assert_eq!(state.answers().len(), 1);
    assert_eq!(state.answers().get(QuestionId::new(1)), Some(1));
    assert!(session.timer_active());

    // A second mount does not restore again.
    assert!(!session.mount().await.unwrap());
}

#[tokio::test]
async fn resume_clamps_out_of_range_position() {
    let fixture = Fixture::new().await;
    fixture
        .kv
        .set(
            SESSION_SNAPSHOT_KEY,
            r#"{"subjectId":"ds","subjectName":"Data Structures","currentQuestion":7,
                "answers":{},"timeLeft":9000,"testStarted":true}"#,
        )
        .unwrap();
    let mut session = fixture.session();

    assert!(session.mount().await.unwrap());
    session.wait_for_questions().await;

    assert_eq!(session.state().current_question_index(), 1);
    assert_eq!(session.state().time_left_secs(), 600);
}

#[tokio::test]
async fn mount_ignores_unusable_snapshots() {
    for raw in [
        r#"{"subjectId":"gone","subjectName":"Gone","currentQuestion":0,"answers":{},"timeLeft":10,"testStarted":true}"#,
        r#"{"subjectId":"ds","subjectName":"Data Structures","currentQuestion":0,"answers":{},"timeLeft":10,"testStarted":false}"#,
        "{ not json",
    ] {
        let fixture = Fixture::new().await;
        fixture.kv.set(SESSION_SNAPSHOT_KEY, raw).unwrap();
        let mut session = fixture.session();

        assert!(!session.mount().await.unwrap(), "resumed from {raw}");
        assert!(session.state().selected_subject().is_none());
        // Mount alone never clears the slot.
        assert!(fixture.kv.get(SESSION_SNAPSHOT_KEY).unwrap().is_some());
    }
}

struct FailingLog;

#[async_trait]
impl AttemptLog for FailingLog {
    async fn append_attempt(&self, _record: &AttemptRecord) -> Result<AttemptId, StorageError> {
        Err(StorageError::Connection("log offline".into()))
    }

    async fn list_attempts(&self, _limit: u32) -> Result<Vec<AttemptRow>, StorageError> {
        Ok(Vec::new())
    }

    async fn delete_attempt(&self, _id: AttemptId) -> Result<(), StorageError> {
        Err(StorageError::NotFound)
    }

    async fn delete_subject_attempts(&self, _subject_id: &SubjectId) -> Result<u64, StorageError> {
        Ok(0)
    }
}

#[tokio::test]
async fn attempt_log_failure_does_not_block_results() {
    let fixture = Fixture::new().await;
    let mut session = fixture.session_with_log(Arc::new(FailingLog));
    ready(&mut session, "ds").await;
    session.start_test().await;
    session.answer(QuestionId::new(1), 1).await;

    session.submit().await;

    assert_eq!(session.state().phase(), SessionPhase::Submitted);
    assert_eq!(session.report().unwrap().score, 1);
    assert_eq!(session.last_attempt_id(), None);
}
