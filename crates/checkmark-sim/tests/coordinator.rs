//! Screen-level flows through the coordinator: activation, intents, account
//! handling, and the single error stream.

use std::time::Duration;

use checkmark_core::account::AccountForm;
use checkmark_core::backend::{AuthProvider, CollectionPath, UserId};
use checkmark_core::model::section::find;
use checkmark_core::model::Section;
use checkmark_core::sync::{Sections, StartOutcome, StateView};
use checkmark_core::{ErrorCode, ErrorStream, Intent, SyncError};
use checkmark_sim::{FaultConfig, Harness, MemoryAuth, SessionConfig, run_session, session};

const USER: &str = "user-1";

fn signed_in() -> Harness {
    Harness::new(FaultConfig::default(), MemoryAuth::signed_in(USER))
}

async fn settle(view: &mut StateView, predicate: impl FnMut(&[Section]) -> bool) -> Sections {
    tokio::time::timeout(Duration::from_secs(5), view.wait_for(predicate))
        .await
        .expect("state did not settle")
        .expect("state slot closed")
}

async fn next_error(errors: &mut ErrorStream) -> SyncError {
    tokio::time::timeout(Duration::from_secs(5), errors.next())
        .await
        .expect("no error reported")
        .expect("error stream closed")
}

async fn wait_for_listeners(harness: &Harness, expected: usize) {
    for _ in 0..100 {
        if harness.store.listener_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(harness.store.listener_count(), expected);
}

#[tokio::test]
async fn activation_starts_and_deactivation_stops_the_subscription() {
    let harness = signed_in();
    let coordinator = &harness.coordinator;

    assert_eq!(coordinator.activate().await.unwrap(), StartOutcome::Started);
    assert_eq!(
        coordinator.activate().await.unwrap(),
        StartOutcome::AlreadyListening
    );
    assert_eq!(harness.store.listener_count(), 1);
    assert_eq!(coordinator.sections().peek().len(), 1);

    coordinator.deactivate();
    coordinator.deactivate();

    assert!(!coordinator.adapter().is_listening());
    wait_for_listeners(&harness, 0).await;
}

#[tokio::test]
async fn activation_without_user_does_nothing() {
    let harness = Harness::new(FaultConfig::default(), MemoryAuth::new());

    assert_eq!(
        harness.coordinator.activate().await.unwrap(),
        StartOutcome::NoUser
    );
    assert!(harness.coordinator.sections().peek().is_empty());
}

#[tokio::test]
async fn intents_flow_through_to_the_rendered_state() {
    let harness = signed_in();
    let coordinator = &harness.coordinator;
    coordinator.activate().await.unwrap();
    let mut view = coordinator.sections();

    coordinator
        .dispatch(Intent::Add {
            title: "Buy milk".into(),
            description: String::new(),
        })
        .await
        .unwrap();
    let state = settle(&mut view, |s| s.first().is_some_and(|s| !s.items.is_empty())).await;
    let item = state[0].items[0].clone();
    assert!(!item.is_checked);

    coordinator
        .dispatch(Intent::Toggle(item.clone()))
        .await
        .unwrap();
    let state = settle(&mut view, |s| find(s, &item.id).is_some_and(|i| i.is_checked)).await;
    let toggled = find(&state, &item.id).unwrap().clone();

    let rename = coordinator.dispatch(Intent::Rename {
        id: item.id.clone(),
        title: "Buy oat milk".into(),
    });
    let describe = coordinator.dispatch(Intent::Describe {
        id: item.id.clone(),
        description: "two litres".into(),
    });
    rename.await.unwrap();
    describe.await.unwrap();
    let state = settle(&mut view, |s| {
        find(s, &item.id).is_some_and(|i| i.title == "Buy oat milk" && i.description == "two litres")
    })
    .await;
    assert!(find(&state, &item.id).unwrap().is_checked);

    coordinator
        .dispatch(Intent::Toggle(toggled))
        .await
        .unwrap();
    settle(&mut view, |s| find(s, &item.id).is_some_and(|i| !i.is_checked)).await;

    coordinator
        .dispatch(Intent::Delete(item.id.clone()))
        .await
        .unwrap();
    let state = settle(&mut view, |s| find(s, &item.id).is_none()).await;
    assert_eq!(state.len(), 1);
    assert!(state[0].items.is_empty());
}

#[tokio::test]
async fn failed_intent_lands_on_the_error_stream() {
    let harness = signed_in();
    let coordinator = &harness.coordinator;
    let mut errors = coordinator.take_errors().unwrap();
    assert!(coordinator.take_errors().is_none(), "stream is handed out once");
    coordinator.activate().await.unwrap();
    harness.store.fail_next_writes(1);

    coordinator
        .dispatch(Intent::Add {
            title: "doomed".into(),
            description: String::new(),
        })
        .await
        .unwrap();

    assert_eq!(next_error(&mut errors).await.code(), ErrorCode::TransportFailed);
    assert!(coordinator.adapter().is_listening());
    assert!(coordinator.sections().peek()[0].items.is_empty());
}

#[tokio::test]
async fn intents_without_a_user_report_not_authenticated() {
    let harness = Harness::new(FaultConfig::default(), MemoryAuth::new());
    let mut errors = harness.coordinator.take_errors().unwrap();

    harness
        .coordinator
        .dispatch(Intent::Delete(checkmark_core::model::ItemId::new("x")))
        .await
        .unwrap();

    assert_eq!(next_error(&mut errors).await, SyncError::NotAuthenticated);
}

#[tokio::test]
async fn subscription_failure_is_relayed_to_the_error_stream() {
    let harness = signed_in();
    let coordinator = &harness.coordinator;
    let mut errors = coordinator.take_errors().unwrap();
    coordinator.activate().await.unwrap();
    let path = CollectionPath::for_user(&UserId::new(USER));

    harness.store.break_listeners(&path, "permission denied");

    assert_eq!(next_error(&mut errors).await.code(), ErrorCode::ListenerFailed);
    assert!(coordinator.sections().peek().is_empty());
}

#[tokio::test]
async fn failed_activation_is_returned_and_relayed() {
    let harness = signed_in();
    let coordinator = &harness.coordinator;
    let mut errors = coordinator.take_errors().unwrap();
    harness.store.refuse_next_listen("unavailable");

    let err = coordinator.activate().await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::ListenerFailed);
    assert_eq!(next_error(&mut errors).await, err);
}

#[tokio::test]
async fn logout_stops_listening_and_clears_the_list() {
    let harness = signed_in();
    let coordinator = &harness.coordinator;
    coordinator.activate().await.unwrap();
    coordinator
        .dispatch(Intent::Add {
            title: "private".into(),
            description: String::new(),
        })
        .await
        .unwrap();
    let mut view = coordinator.sections();
    settle(&mut view, |s| s.first().is_some_and(|s| !s.items.is_empty())).await;

    coordinator.logout().await.unwrap();

    assert_eq!(harness.auth.current_user_id(), None);
    assert!(!coordinator.adapter().is_listening());
    assert!(view.peek().is_empty());
    wait_for_listeners(&harness, 0).await;
    assert_eq!(
        coordinator.activate().await.unwrap(),
        StartOutcome::NoUser
    );
}

#[tokio::test]
async fn account_form_is_validated_before_submission() {
    let harness = Harness::new(FaultConfig::default(), MemoryAuth::new());
    let coordinator = &harness.coordinator;
    let mut errors = coordinator.take_errors().unwrap();

    let short = AccountForm::new("someone@example.com", "abc");
    assert!(!coordinator.can_create_account(&short));
    assert_eq!(
        coordinator.create_account(&short).await.unwrap_err().code(),
        ErrorCode::InvalidCredentials
    );
    assert_eq!(next_error(&mut errors).await.code(), ErrorCode::InvalidCredentials);

    let form = AccountForm::new("someone@example.com", "hunter22");
    assert!(coordinator.can_create_account(&form));
    let user = coordinator.create_account(&form).await.unwrap();
    assert_eq!(harness.auth.current_user_id(), Some(user));
}

#[tokio::test]
async fn duplicate_account_and_wrong_password_are_reported() {
    let harness = Harness::new(FaultConfig::default(), MemoryAuth::new());
    let coordinator = &harness.coordinator;
    let mut errors = coordinator.take_errors().unwrap();
    let form = AccountForm::new("someone@example.com", "hunter22");
    let user = coordinator.create_account(&form).await.unwrap();
    coordinator.logout().await.unwrap();

    let dup = coordinator.create_account(&form).await.unwrap_err();
    assert_eq!(dup.code(), ErrorCode::AccountExists);
    assert_eq!(next_error(&mut errors).await, dup);

    let wrong = AccountForm::new("someone@example.com", "letmein!");
    let err = coordinator.sign_in(&wrong).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidCredentials);
    assert_eq!(next_error(&mut errors).await, err);

    assert_eq!(coordinator.sign_in(&form).await.unwrap(), user);
}

#[tokio::test]
async fn session_converges_without_faults() {
    let report = run_session(&SessionConfig::default()).await.unwrap();

    assert!(report.converged);
    assert_eq!(report.failed_intents, 0);
    assert_eq!(report.visible_items, report.stored_items);
    // Items 0, 3, 6, 9 are deleted and 2, 4, 8, 10 toggled.
    assert_eq!(report.stored_items, 8);
    assert_eq!(report.checked_items, 4);
    assert_eq!(report.listeners_after_teardown, 0);
}

#[tokio::test]
async fn session_converges_despite_write_failures() {
    let config = SessionConfig {
        seed: 42,
        items: 20,
        write_failure_percent: 25,
        ..SessionConfig::default()
    };

    let report = run_session(&config).await.unwrap();

    assert!(report.converged);
    assert_eq!(report.visible_items, report.stored_items);
    assert!(report.stored_items <= config.items);
}

#[test]
fn visible_items_flattens_every_section() {
    assert!(session::visible_items(&[Section::new("", Vec::new())]).is_empty());
}
