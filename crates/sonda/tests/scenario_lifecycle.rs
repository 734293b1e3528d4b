//! Full create/edit/delete lifecycles against the simulated Atlas app.
//!
//! Every view of the app renders after a delay, rows are rebuilt on each
//! change and deletion goes through a confirm dialog, so these scenarios
//! only pass when every step waits on an observable condition.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::{flaky_launcher, launcher, test_config, AppOptions, AtlasApp};
use sonda::{
    run_scoped, Pacing, Phase, RecordKind, Scenario, SondaError, Stage, Suite, TestRecord,
};

fn phase_of(err: &SondaError) -> Option<Phase> {
    match err {
        SondaError::Scenario { phase, .. } => Some(*phase),
        _ => None,
    }
}

// =============================================================================
// PASSING LIFECYCLES
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_student_lifecycle_passes() {
    let app = AtlasApp::new(AppOptions::default());
    let launcher = launcher(&app);
    let mut scenario = Scenario::new(RecordKind::Student);

    let scoped = run_scoped(&launcher, &test_config(), &mut scenario).await;

    scoped.outcome.unwrap();
    assert!(scoped.diagnostics.is_none());
    scoped.release.unwrap();
    assert_eq!(scenario.stage(), Stage::End);
    assert_eq!(scenario.transcript().len(), 11);
    assert!(scenario.record().is_updated());

    let drivers = launcher.launched();
    assert_eq!(drivers.len(), 1);
    assert!(drivers[0].is_closed());
    assert!(drivers[0].was_called("accept:confirm"));

    let store = app.store();
    let store = store.lock().unwrap();
    assert_eq!(store.names(RecordKind::Student), vec!["Maria Souza", "Pedro Lima"]);
    assert_eq!(store.names(RecordKind::Author).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_author_lifecycle_passes() {
    let app = AtlasApp::new(AppOptions::default());
    let launcher = launcher(&app);
    let mut scenario = Scenario::new(RecordKind::Author);

    let scoped = run_scoped(&launcher, &test_config(), &mut scenario).await;

    scoped.outcome.unwrap();
    assert_eq!(scenario.stage(), Stage::End);
    let stages: Vec<Stage> = scenario.transcript().iter().map(|t| t.to).collect();
    assert_eq!(stages[0], Stage::Listing);
    assert_eq!(stages[5], Stage::EditOpen);
    assert_eq!(stages[10], Stage::End);
    assert!(!app
        .store()
        .lock()
        .unwrap()
        .names(RecordKind::Author)
        .iter()
        .any(|n| n.contains("Selenium")));
}

#[tokio::test(start_paused = true)]
async fn test_transcript_times_are_monotonic() {
    let app = AtlasApp::new(AppOptions::default());
    let mut scenario = Scenario::new(RecordKind::Student);

    let scoped = run_scoped(&launcher(&app), &test_config(), &mut scenario).await;

    scoped.outcome.unwrap();
    let times: Vec<u64> = scenario.transcript().iter().map(|t| t.at_ms).collect();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
    // The app needs at least one render per view change
    assert!(times[0] >= 250);
}

#[tokio::test(start_paused = true)]
async fn test_presentation_pacing_types_per_character() {
    let app = AtlasApp::new(AppOptions::default());
    let launcher = launcher(&app);
    let config = test_config().with_pacing(Pacing::presentation());
    let mut scenario = Scenario::new(RecordKind::Student);

    let scoped = run_scoped(&launcher, &config, &mut scenario).await;

    scoped.outcome.unwrap();
    let history = launcher.launched()[0].history();
    let typed: Vec<&String> = history.iter().filter(|c| c.starts_with("type:")).collect();
    assert!(typed.iter().any(|c| c.ends_with(":2000-01-15")));
    assert!(!typed.iter().any(|c| c.ends_with(":João Teste Selenium")));
    assert!(typed.len() > "João Teste Selenium".chars().count());
}

#[tokio::test(start_paused = true)]
async fn test_single_stale_click_is_absorbed() {
    let app = AtlasApp::new(AppOptions::default());
    let launcher = flaky_launcher(&app, 1);
    let mut scenario = Scenario::new(RecordKind::Author);

    let scoped = run_scoped(&launcher, &test_config(), &mut scenario).await;

    scoped.outcome.unwrap();
    assert!(launcher.launched()[0].was_called("stale:"));
}

#[tokio::test(start_paused = true)]
async fn test_suite_runs_every_kind_in_its_own_session() {
    let app = AtlasApp::new(AppOptions::default());
    let launcher = launcher(&app);
    let suite = Suite::new(test_config());

    let report = suite.run(&launcher).await.unwrap();

    assert!(report.passed);
    assert_eq!(report.passed_count(), 2);
    assert_eq!(report.results[0].kind, RecordKind::Student);
    assert_eq!(report.results[1].kind, RecordKind::Author);
    assert!(report.results.iter().all(|r| r.last_stage == Stage::End));

    let drivers = launcher.launched();
    assert_eq!(drivers.len(), 2);
    assert!(drivers.iter().all(|d| d.is_closed()));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    report.write_json(&path).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["passed"], true);
    assert_eq!(json["results"][0]["transcript"].as_array().unwrap().len(), 11);
}

// =============================================================================
// FAILING LIFECYCLES
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_missing_confirm_dialog_fails_delete_phase() {
    let app = AtlasApp::new(AppOptions {
        confirm_delete: false,
        ..AppOptions::default()
    });
    let launcher = launcher(&app);
    let mut scenario = Scenario::new(RecordKind::Student);

    let scoped = run_scoped(&launcher, &test_config(), &mut scenario).await;

    let err = scoped.outcome.unwrap_err();
    assert_eq!(phase_of(&err), Some(Phase::Delete));
    assert!(matches!(err.root_cause(), SondaError::Dialog { .. }));
    assert_eq!(err.root_cause().category(), "DialogError");
    assert_eq!(scenario.stage(), Stage::VerifiedUpdated);

    let diagnostics = scoped.diagnostics.unwrap();
    assert!(diagnostics.url.is_some());
    assert_eq!(diagnostics.error_chain.len(), 2);
    assert!(diagnostics.error_chain[0].contains("during delete"));
    scoped.release.unwrap();
    assert!(launcher.launched()[0].is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_lost_edit_fails_edit_phase() {
    let app = AtlasApp::new(AppOptions {
        persist_edits: false,
        ..AppOptions::default()
    });
    let mut scenario = Scenario::new(RecordKind::Student);

    let scoped = run_scoped(&launcher(&app), &test_config(), &mut scenario).await;

    let err = scoped.outcome.unwrap_err();
    assert_eq!(phase_of(&err), Some(Phase::Edit));
    match err.root_cause() {
        SondaError::Assertion { actual, .. } => {
            assert!(actual.contains("João Teste Selenium"));
            assert!(!actual.contains("João Atualizado Selenium"));
        }
        other => panic!("expected assertion failure, got {other:?}"),
    }
    assert_eq!(scenario.stage(), Stage::EditSubmitted);
}

async fn run_duplicating_edit(kind: RecordKind) {
    let app = AtlasApp::new(AppOptions {
        duplicate_edits: true,
        ..AppOptions::default()
    });
    let launcher = launcher(&app);
    let mut scenario = Scenario::new(kind);

    let scoped = run_scoped(&launcher, &test_config(), &mut scenario).await;

    let err = scoped.outcome.unwrap_err();
    assert_eq!(phase_of(&err), Some(Phase::Edit), "{kind}: {err}");
    match err.root_cause() {
        SondaError::Assertion { message, actual, .. } => {
            let (before, after) = scenario.record().superseded_values().remove(0);
            assert!(message.contains(&before), "{kind}: {message}");
            assert!(actual.contains(&after));
        }
        other => panic!("{kind}: expected assertion failure, got {other:?}"),
    }
    assert_eq!(scenario.stage(), Stage::EditSubmitted);
    assert!(!launcher.launched()[0].was_called("accept:"));
}

#[tokio::test(start_paused = true)]
async fn test_duplicated_student_row_fails_edit_phase() {
    run_duplicating_edit(RecordKind::Student).await;
}

#[tokio::test(start_paused = true)]
async fn test_duplicated_author_row_fails_edit_phase() {
    // The new author name starts with the old one
    run_duplicating_edit(RecordKind::Author).await;
}

#[tokio::test(start_paused = true)]
async fn test_error_feedback_fails_without_waiting_for_later_text() {
    let app = AtlasApp::new(AppOptions {
        late_success_ms: Some(1_500),
        ..AppOptions::default()
    });
    let mut scenario = Scenario::new(RecordKind::Student);
    let started = tokio::time::Instant::now();

    let scoped = run_scoped(&launcher(&app), &test_config(), &mut scenario).await;
    let elapsed = started.elapsed();

    let err = scoped.outcome.unwrap_err();
    assert_eq!(phase_of(&err), Some(Phase::Create));
    match err.root_cause() {
        SondaError::Assertion { actual, .. } => {
            assert!(actual.contains("Erro"));
            assert!(!actual.contains("sucesso"));
        }
        other => panic!("expected assertion failure, got {other:?}"),
    }
    assert_eq!(scenario.stage(), Stage::Submitted);
    let submitted_at = scenario.transcript().last().unwrap().at_ms;
    assert!(elapsed.as_millis() < u128::from(submitted_at + 1_500));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_form_fails_create_phase() {
    let app = AtlasApp::new(AppOptions::default());
    let record = TestRecord::fixture(RecordKind::Author).with_value("autorNacionalidade", "");
    let mut scenario = Scenario::with_record(record);

    let scoped = run_scoped(&launcher(&app), &test_config(), &mut scenario).await;

    let err = scoped.outcome.unwrap_err();
    assert_eq!(phase_of(&err), Some(Phase::Create));
    assert_eq!(err.root_cause().category(), "AssertionFailure");
    assert!(err.to_string().contains("obrigatórios"));
    assert_eq!(scenario.stage(), Stage::Submitted);
    assert!(app.store().lock().unwrap().names(RecordKind::Author).len() == 2);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_stale_click_is_interaction_error() {
    let app = AtlasApp::new(AppOptions::default());
    let launcher = flaky_launcher(&app, 2);
    let mut scenario = Scenario::new(RecordKind::Student);

    let scoped = run_scoped(&launcher, &test_config(), &mut scenario).await;

    let err = scoped.outcome.unwrap_err();
    assert_eq!(phase_of(&err), Some(Phase::Create));
    assert!(matches!(err.root_cause(), SondaError::Interaction { .. }));
    assert_eq!(err.root_cause().category(), "InteractionError");
    assert_eq!(scenario.stage(), Stage::Listing);
}

#[tokio::test(start_paused = true)]
async fn test_slow_app_times_out() {
    let app = AtlasApp::new(AppOptions {
        latency_ms: 5_000,
        ..AppOptions::default()
    });
    let mut scenario = Scenario::new(RecordKind::Student);

    let scoped = run_scoped(&launcher(&app), &test_config(), &mut scenario).await;

    let err = scoped.outcome.unwrap_err();
    match err.root_cause() {
        SondaError::Timeout {
            waited_for,
            elapsed_ms,
            timeout_ms,
        } => {
            assert!(waited_for.contains("stat-total-alunos"));
            assert!(*elapsed_ms >= 2_000);
            assert_eq!(*timeout_ms, 2_000);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(scenario.stage(), Stage::Start);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_runs_only_once() {
    let app = AtlasApp::new(AppOptions::default());
    let launcher = launcher(&app);
    let mut scenario = Scenario::new(RecordKind::Author);

    run_scoped(&launcher, &test_config(), &mut scenario)
        .await
        .outcome
        .unwrap();
    let again = run_scoped(&launcher, &test_config(), &mut scenario).await;

    assert!(matches!(again.outcome, Err(SondaError::InvalidState { .. })));
    assert!(launcher.launched().iter().all(|d| d.is_closed()));
}

#[tokio::test(start_paused = true)]
async fn test_failures_do_not_stop_the_suite() {
    let app = AtlasApp::new(AppOptions {
        confirm_delete: false,
        ..AppOptions::default()
    });
    let report = Suite::new(test_config())
        .run(&launcher(&app))
        .await
        .unwrap();

    assert!(!report.passed);
    assert_eq!(report.failed_count(), 2);
    for result in &report.results {
        assert_eq!(result.category.as_deref(), Some("DialogError"));
        assert_eq!(result.last_stage, Stage::VerifiedUpdated);
        assert_eq!(result.transcript.len(), 8);
    }
}
