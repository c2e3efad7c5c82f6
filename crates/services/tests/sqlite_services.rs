use quiz_core::model::{Question, QuestionId, Subject, SubjectId};
use quiz_core::time::fixed_now;
use services::history::DEFAULT_HISTORY_LIMIT;
use services::{AdminConfig, AppServices, Clock};
use storage::repository::{QuestionStore, SubjectCatalog};

#[tokio::test]
async fn sqlite_backed_session_lands_in_history() {
    let dir = tempfile::tempdir().unwrap();
    let state_dir = dir.path().join("state");
    let services = AppServices::new_sqlite(
        "sqlite:file:services_flow?mode=memory&cache=shared",
        &state_dir,
        Clock::fixed(fixed_now()),
        AdminConfig::with_password("pw"),
    )
    .await
    .unwrap();

    let subject = Subject::with_defaults(SubjectId::from("net"), "Networking", 120).unwrap();
    services.storage().subjects.upsert_subject(&subject).await.unwrap();
    for id in 1..=4 {
        let question = Question::new(
            QuestionId::new(id),
            format!("Networking question {id}"),
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            2,
            Some("layers".into()),
        )
        .unwrap();
        services
            .storage()
            .questions
            .upsert_question(subject.id(), &question)
            .await
            .unwrap();
    }

    let mut session = services.session();
    assert!(!session.mount().await.unwrap());
    session.select_subject_by_id(subject.id()).await.unwrap();
    session.wait_for_questions().await;
    session.start_test().await;
    for id in 1..=4 {
        session.answer(QuestionId::new(id), 2).await;
    }
    assert!(state_dir.join("online-test-app-state.json").exists());
    session.submit().await;
    assert!(!state_dir.join("online-test-app-state.json").exists());

    let history = services.history();
    let rows = history.list_recent(DEFAULT_HISTORY_LIMIT).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].record.score, 4);
    assert!(rows[0].record.passed);

    let stats = history.global_stats().await.unwrap();
    assert_eq!(stats.attempts, 1);
    assert!((stats.pass_rate - 100.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn hidden_subjects_are_filtered_from_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let services = AppServices::new_sqlite(
        "sqlite:file:services_visibility?mode=memory&cache=shared",
        dir.path(),
        Clock::fixed(fixed_now()),
        AdminConfig::with_password("pw"),
    )
    .await
    .unwrap();
    for (id, active) in [("a", true), ("b", true), ("c", false)] {
        let subject = Subject::new(SubjectId::from(id), id, 60, 90, active, 0).unwrap();
        services.storage().subjects.upsert_subject(&subject).await.unwrap();
    }

    let admin = services.admin();
    assert!(admin.login("pw").unwrap());
    admin.set_visibility(&SubjectId::from("b"), false).unwrap();

    let mut session = services.session();
    session.mount().await.unwrap();
    let visible: Vec<String> = admin
        .visible_subjects(session.catalog())
        .iter()
        .map(|s| s.id().as_str().to_string())
        .collect();
    assert_eq!(visible, vec!["a".to_string()]);
    assert!(dir.path().join("admin-test-visibility.json").exists());
}
