use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use quiz_core::Clock;
use quiz_core::model::{
    AttemptId, AttemptRecord, PersistedSnapshot, QuestionId, QuestionSet, Subject, SubjectId,
};
use quiz_core::scoring::{ScoreReport, score_answers};
use quiz_core::session::{SessionAction, SessionPatch, SessionState};
use storage::repository::{AttemptLog, QuestionStore, Storage, SubjectCatalog};
use storage::snapshot::SnapshotStore;

use super::loader::QuestionLoader;
use super::progress::SessionProgress;
use crate::error::SessionError;
use crate::timer::{Timer, TimerRun};

/// Identifies one question fetch; results carrying an older token are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchToken(u64);

/// Asynchronous notifications fed back into the orchestrator.
#[derive(Debug)]
pub enum SessionEvent {
    QuestionsLoaded {
        token: FetchToken,
        result: Result<QuestionSet, String>,
    },
    TimerTick(TimerRun),
    TimerExpired(TimerRun),
}

struct InFlightFetch {
    token: FetchToken,
    task: JoinHandle<()>,
}

/// Flags captured before a transition so effects can react to edges.
#[derive(Clone, Copy)]
struct Edges {
    had_subject: bool,
    was_submitted: bool,
}

impl Edges {
    fn of(state: &SessionState) -> Self {
        Self {
            had_subject: state.selected_subject().is_some(),
            was_submitted: state.test_submitted(),
        }
    }
}

/// Drives one quiz session: owns the reducer state and performs the side
/// effects that follow each transition (countdown, question fetches, local
/// snapshot, attempt log).
///
/// Every operation dispatches through the reducer first and reconciles the
/// effects against the resulting state afterwards, so handlers always see
/// current values.
pub struct SessionOrchestrator {
    clock: Clock,
    subjects: Arc<dyn SubjectCatalog>,
    loader: QuestionLoader,
    attempts: Arc<dyn AttemptLog>,
    snapshots: SnapshotStore,

    state: SessionState,
    catalog: Vec<Subject>,

    timer: Timer,
    remaining: watch::Sender<u32>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,

    fetch: Option<InFlightFetch>,
    next_token: u64,

    restore_attempted: bool,
    pending_restore: Option<PersistedSnapshot>,

    initial_duration_secs: u32,
    attempt_logged: bool,
    last_attempt: Option<AttemptId>,
}

impl SessionOrchestrator {
    #[must_use]
    pub fn new(
        clock: Clock,
        subjects: Arc<dyn SubjectCatalog>,
        questions: Arc<dyn QuestionStore>,
        attempts: Arc<dyn AttemptLog>,
        snapshots: SnapshotStore,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (remaining, remaining_rx) = watch::channel(0);
        let tick_tx = events_tx.clone();
        let expire_tx = events_tx.clone();
        let timer = Timer::new(
            remaining_rx,
            move |run| {
                let _ = tick_tx.send(SessionEvent::TimerTick(run));
            },
            move |run| {
                let _ = expire_tx.send(SessionEvent::TimerExpired(run));
            },
        );

        Self {
            clock,
            subjects,
            loader: QuestionLoader::new(questions),
            attempts,
            snapshots,
            state: SessionState::new(),
            catalog: Vec::new(),
            timer,
            remaining,
            events_tx,
            events_rx,
            fetch: None,
            next_token: 0,
            restore_attempted: false,
            pending_restore: None,
            initial_duration_secs: 0,
            attempt_logged: false,
            last_attempt: None,
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage, snapshots: SnapshotStore) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.subjects),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.attempts),
            snapshots,
        )
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn catalog(&self) -> &[Subject] {
        &self.catalog
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress::from_state(&self.state)
    }

    /// Result breakdown of the submitted session, if any.
    #[must_use]
    pub fn report(&self) -> Option<ScoreReport> {
        if !self.state.test_submitted() {
            return None;
        }
        let set = self.state.question_set()?;
        Some(ScoreReport::with_score(
            set,
            self.state.answers(),
            self.state.score(),
        ))
    }

    /// Id of the attempt appended for the latest submission, when the append succeeded.
    #[must_use]
    pub fn last_attempt_id(&self) -> Option<AttemptId> {
        self.last_attempt
    }

    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.fetch.is_some()
    }

    /// Whether the countdown task is currently scheduled.
    #[must_use]
    pub fn timer_active(&self) -> bool {
        self.timer.is_active()
    }

    /// Load the catalog and, the first time a non-empty catalog is available,
    /// resume the saved session if one exists. Returns whether a resume began.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the catalog cannot be read; the
    /// resume is then retried on the next successful call.
    pub async fn mount(&mut self) -> Result<bool, SessionError> {
        self.load_catalog().await?;
        Ok(self.resume_saved_session().await)
    }

    /// Refresh the subject catalog.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the catalog cannot be read.
    pub async fn load_catalog(&mut self) -> Result<&[Subject], SessionError> {
        self.catalog = self.subjects.list_subjects().await?;
        debug!(count = self.catalog.len(), "loaded subject catalog");
        Ok(&self.catalog)
    }

    async fn resume_saved_session(&mut self) -> bool {
        if self.restore_attempted || self.catalog.is_empty() {
            return false;
        }
        self.restore_attempted = true;

        let Some(snapshot) = self.snapshots.load() else {
            return false;
        };
        if !snapshot.test_started {
            debug!("saved session was never started, ignoring");
            return false;
        }
        let Some(subject) = self
            .catalog
            .iter()
            .find(|subject| subject.id() == &snapshot.subject_id)
            .cloned()
        else {
            debug!(subject = %snapshot.subject_id, "saved session refers to an unknown subject");
            return false;
        };

        info!(subject = %subject.id(), "resuming saved session");
        self.begin_subject(subject).await;
        self.pending_restore = Some(snapshot);
        true
    }

    /// Select a subject and start fetching its questions. Any earlier fetch is
    /// cancelled and its result will be ignored.
    pub async fn select_subject(&mut self, subject: Subject) {
        self.pending_restore = None;
        self.begin_subject(subject).await;
    }

    /// Select a catalog subject by id.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownSubject` if the catalog has no such subject.
    pub async fn select_subject_by_id(&mut self, id: &SubjectId) -> Result<(), SessionError> {
        let subject = self
            .catalog
            .iter()
            .find(|subject| subject.id() == id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownSubject(id.clone()))?;
        self.select_subject(subject).await;
        Ok(())
    }

    pub async fn start_test(&mut self) {
        self.dispatch(SessionAction::StartTest).await;
    }

    pub async fn answer(&mut self, question: QuestionId, option: u8) {
        self.dispatch(SessionAction::Answer { question, option })
            .await;
    }

    /// Answer the question currently on display.
    pub async fn answer_current(&mut self, option: u8) {
        let Some(question) = self.state.current_question().map(|q| q.id()) else {
            return;
        };
        self.answer(question, option).await;
    }

    pub async fn go_to_question(&mut self, index: usize) {
        self.dispatch(SessionAction::GoToQuestion(index)).await;
    }

    pub async fn next_question(&mut self) {
        self.dispatch(SessionAction::NextQuestion).await;
    }

    pub async fn prev_question(&mut self) {
        self.dispatch(SessionAction::PrevQuestion).await;
    }

    /// Score the current answers and submit. Used both for manual submission
    /// and when the countdown expires; does nothing unless a test is running.
    pub async fn submit(&mut self) {
        if !self.state.is_running() {
            return;
        }
        let Some(set) = self.state.question_set() else {
            return;
        };
        let score = score_answers(set, self.state.answers());
        info!(score, total = set.len(), "submitting test");
        self.dispatch(SessionAction::Submit { score }).await;
    }

    pub async fn restart(&mut self) {
        self.dispatch(SessionAction::Restart).await;
    }

    /// Return to subject selection, dropping any in-flight fetch.
    pub async fn back_to_home(&mut self) {
        self.cancel_fetch();
        self.pending_restore = None;
        self.dispatch(SessionAction::BackToHome).await;
    }

    /// Re-run effect reconciliation against the current state without a
    /// transition. Idempotent: never appends a second attempt for the same
    /// submission.
    pub async fn refresh(&mut self) {
        let edges = Edges::of(&self.state);
        self.sync_effects(edges).await;
    }

    /// Wait for the next asynchronous notification.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::QuestionsLoaded { token, result } => {
                self.finish_fetch(token, result).await;
            }
            SessionEvent::TimerTick(run) => {
                if self.accepts_timer(run) {
                    self.dispatch(SessionAction::Tick).await;
                }
            }
            SessionEvent::TimerExpired(run) => {
                if self.accepts_timer(run) {
                    info!("time is up");
                    self.submit().await;
                }
            }
        }
    }

    /// Timer notifications count only while running and only from the cycle
    /// started for the current run; anything queued by a stopped cycle is stale.
    fn accepts_timer(&self, run: TimerRun) -> bool {
        if self.state.is_running() && self.timer.current_run() == Some(run) {
            return true;
        }
        debug!(?run, "discarding stale timer notification");
        false
    }

    /// Process events until the current question fetch has settled.
    pub async fn wait_for_questions(&mut self) {
        while self.fetch.is_some() {
            match self.next_event().await {
                Some(event) => self.handle_event(event).await,
                None => break,
            }
        }
    }

    async fn begin_subject(&mut self, subject: Subject) {
        info!(subject = %subject.id(), "subject selected");
        self.dispatch(SessionAction::SelectSubject(subject.clone()))
            .await;
        self.start_fetch(subject);
    }

    fn start_fetch(&mut self, subject: Subject) {
        self.cancel_fetch();
        self.next_token += 1;
        let token = FetchToken(self.next_token);
        let loader = self.loader.clone();
        let events = self.events_tx.clone();
        let task = tokio::spawn(async move {
            let result = loader.load(&subject).await.map_err(|e| e.to_string());
            let _ = events.send(SessionEvent::QuestionsLoaded { token, result });
        });
        self.fetch = Some(InFlightFetch { token, task });
    }

    fn cancel_fetch(&mut self) {
        if let Some(fetch) = self.fetch.take() {
            fetch.task.abort();
        }
    }

    async fn finish_fetch(&mut self, token: FetchToken, result: Result<QuestionSet, String>) {
        if self.fetch.as_ref().map(|fetch| fetch.token) != Some(token) {
            debug!(?token, "discarding stale question fetch");
            return;
        }
        self.fetch = None;

        match result {
            Ok(set) => {
                self.dispatch(SessionAction::LoadSuccess(set)).await;
                if let Some(snapshot) = self.pending_restore.take() {
                    self.restore(snapshot).await;
                }
            }
            Err(message) => {
                warn!(error = %message, "failed to load questions");
                self.pending_restore = None;
                self.dispatch(SessionAction::LoadError(message)).await;
            }
        }
    }

    async fn restore(&mut self, snapshot: PersistedSnapshot) {
        let Some(set) = self.state.question_set() else {
            return;
        };
        let mut answers = snapshot.answers;
        answers.retain_known(set);
        let patch = SessionPatch {
            test_started: Some(snapshot.test_started),
            current_question_index: Some(snapshot.current_question_index.min(set.last_index())),
            answers: Some(answers),
            time_left_secs: Some(snapshot.time_left_secs.min(set.duration_secs())),
        };
        self.dispatch(SessionAction::Restore(patch)).await;
    }

    async fn dispatch(&mut self, action: SessionAction) {
        let edges = Edges::of(&self.state);
        self.state.apply(action);
        self.sync_effects(edges).await;
    }

    async fn sync_effects(&mut self, before: Edges) {
        self.remaining.send_replace(self.state.time_left_secs());
        if self.state.is_running() {
            if let Some(set) = self.state.question_set() {
                self.initial_duration_secs = set.duration_secs();
            }
        }
        self.persist(before);
        self.timer.set_running(self.state.is_running());
        self.log_attempt_once().await;
    }

    fn persist(&self, before: Edges) {
        let submitted_now = self.state.test_submitted() && !before.was_submitted;
        let left_subject = before.had_subject && self.state.selected_subject().is_none();
        if submitted_now || left_subject {
            self.snapshots.clear();
            return;
        }
        if !self.state.is_running() {
            return;
        }
        if let Some(snapshot) = snapshot_of(&self.state) {
            self.snapshots.save(&snapshot);
        }
    }

    async fn log_attempt_once(&mut self) {
        if !self.state.test_submitted() {
            self.attempt_logged = false;
            return;
        }
        if self.attempt_logged {
            return;
        }
        self.attempt_logged = true;
        self.last_attempt = None;

        let Some(record) = self.attempt_record() else {
            return;
        };
        match self.attempts.append_attempt(&record).await {
            Ok(id) => {
                info!(attempt = %id, percentage = record.percentage, passed = record.passed, "attempt recorded");
                self.last_attempt = Some(id);
            }
            Err(e) => {
                warn!(error = %e, subject = %record.subject_id, "failed to record attempt");
            }
        }
    }

    fn attempt_record(&self) -> Option<AttemptRecord> {
        let subject = self.state.selected_subject()?;
        let set = self.state.question_set()?;
        let report = ScoreReport::with_score(set, self.state.answers(), self.state.score());
        Some(AttemptRecord::from_submission(
            subject.id().clone(),
            subject.name(),
            &report,
            self.initial_duration_secs,
            self.state.time_left_secs(),
            self.clock.now(),
        ))
    }
}

impl Drop for SessionOrchestrator {
    fn drop(&mut self) {
        self.cancel_fetch();
    }
}

fn snapshot_of(state: &SessionState) -> Option<PersistedSnapshot> {
    let subject = state.selected_subject()?;
    Some(PersistedSnapshot {
        subject_id: subject.id().clone(),
        subject_name: subject.name().to_string(),
        current_question_index: state.current_question_index(),
        answers: state.answers().clone(),
        time_left_secs: state.time_left_secs(),
        test_started: state.test_started(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Question, SubjectId};
    use quiz_core::time::fixed_now;
    use storage::kv::InMemoryKeyValueStore;
    use storage::repository::InMemoryRepository;

    async fn fixture() -> (SessionOrchestrator, SnapshotStore) {
        let repo = InMemoryRepository::new();
        let subject = Subject::with_defaults(SubjectId::from("ds"), "Data Structures", 60).unwrap();
        repo.upsert_subject(&subject).await.unwrap();
        for id in 1..=3 {
            let question = Question::new(
                QuestionId::new(id),
                format!("Q{id}"),
                vec!["a".into(), "b".into(), "c".into(), "d".into()],
                0,
                None,
            )
            .unwrap();
            repo.upsert_question(subject.id(), &question).await.unwrap();
        }
        let repo = Arc::new(repo);
        let snapshots = SnapshotStore::new(Arc::new(InMemoryKeyValueStore::new()));
        let orchestrator = SessionOrchestrator::new(
            Clock::fixed(fixed_now()),
            repo.clone(),
            repo.clone(),
            repo,
            snapshots.clone(),
        );
        (orchestrator, snapshots)
    }

    #[tokio::test]
    async fn answer_current_targets_displayed_question() {
        let (mut session, _) = fixture().await;
        session.mount().await.unwrap();
        session
            .select_subject_by_id(&SubjectId::from("ds"))
            .await
            .unwrap();
        session.wait_for_questions().await;
        session.start_test().await;
        session.next_question().await;

        session.answer_current(2).await;

        assert_eq!(session.state().answers().get(QuestionId::new(2)), Some(2));
        assert_eq!(session.state().answers().len(), 1);
    }

    #[tokio::test]
    async fn unknown_subject_id_is_rejected() {
        let (mut session, _) = fixture().await;
        session.mount().await.unwrap();

        let err = session
            .select_subject_by_id(&SubjectId::from("nope"))
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::UnknownSubject(_)));
        assert!(session.state().selected_subject().is_none());
    }

    #[tokio::test]
    async fn snapshot_tracks_running_state() {
        let (mut session, snapshots) = fixture().await;
        session.mount().await.unwrap();
        session
            .select_subject_by_id(&SubjectId::from("ds"))
            .await
            .unwrap();
        session.wait_for_questions().await;
        assert!(snapshots.load().is_none());

        session.start_test().await;
        session.answer(QuestionId::new(1), 3).await;
        session.go_to_question(2).await;

        let saved = snapshots.load().unwrap();
        assert!(saved.test_started);
        assert_eq!(saved.current_question_index, 2);
        assert_eq!(saved.answers.get(QuestionId::new(1)), Some(3));
        assert_eq!(saved.time_left_secs, 60);
        assert_eq!(saved.subject_name, "Data Structures");
    }

    #[tokio::test]
    async fn report_is_only_available_after_submission() {
        let (mut session, _) = fixture().await;
        session.mount().await.unwrap();
        session
            .select_subject_by_id(&SubjectId::from("ds"))
            .await
            .unwrap();
        session.wait_for_questions().await;
        session.start_test().await;
        assert!(session.report().is_none());

        session.answer(QuestionId::new(1), 0).await;
        session.submit().await;

        let report = session.report().unwrap();
        assert_eq!(report.score, 1);
        assert_eq!(report.total, 3);
        assert_eq!(report.unanswered, 2);
        assert!(!session.timer_active());
    }
}
