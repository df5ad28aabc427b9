//! Contract Test: Settings Sync
//!
//! Constraints verified:
//! - Edits made before the first load completes win over server values
//! - Rollback is idempotent and restores only what it names
//! - Change detection compares the requested key set
//! - Owned-subset comparison ignores settings owned by others
//! - A save response is canonical for the keys it contains
//! - Keys a save response omits are preserved, not deleted
//! - Concurrent saves are not serialized; the last response wins
//! - A key present on one side only is a change, even when it is null
//! - A save never moves the load state machine
//!
//! If this test fails, users lose edits or see phantom "unsaved changes".

mod common;

use common::*;
use serde_json::json;
use std::sync::Arc;
use synckit_core::config::SavePayload;
use synckit_core::events::StoreEvent;
use synckit_core::settings::{LoadPhase, SavePhase};
use synckit_core::{SaveOutcome, SettingsStore};

async fn loaded_store(transport: MockTransport) -> (SettingsStore, Arc<MockTransport>) {
    let transport = Arc::new(transport.with_get(&settings_path(), Ok(server_settings())));
    let store = SettingsStore::builder(settings_config(), transport.clone())
        .build()
        .expect("store construction succeeds");
    store.load().await.expect("load succeeds");
    (store, transport)
}

#[tokio::test]
async fn pre_load_edits_take_precedence() {
    let transport = Arc::new(MockTransport::new());
    let store = SettingsStore::builder(settings_config(), transport).build().unwrap();

    store.set(json!({ "a": "clientside" })).unwrap();
    store.receive_loaded(object(json!({ "a": "serverside", "b": "serverside" })));

    assert_eq!(
        store.get_all(),
        Some(object(json!({ "a": "clientside", "b": "serverside" })))
    );
    assert_eq!(
        store.saved_settings(),
        Some(object(json!({ "a": "serverside", "b": "serverside" })))
    );
}

#[tokio::test]
async fn edits_while_loading_survive_the_load() {
    let (transport, gate) = MockTransport::new()
        .with_get(&settings_path(), Ok(server_settings()))
        .gate_gets();
    let transport = Arc::new(transport);
    let store = SettingsStore::builder(settings_config(), transport.clone()).build().unwrap();

    assert_eq!(store.get_all(), None);
    wait_until(|| transport.get_call_count() == 1).await;
    assert_eq!(store.load_phase(), LoadPhase::Loading);

    store.set(json!({ "isSkyBlue": "clientside" })).unwrap();
    gate.add_permits(1);
    store.load().await.unwrap();

    assert_eq!(store.load_phase(), LoadPhase::Loaded);
    assert_eq!(store.get("isSkyBlue"), json!("clientside"));
    assert_eq!(store.get("isGroundGreen"), json!("serverside"));
    assert!(store.have_changed(None));
}

#[tokio::test]
async fn save_round_trip_replaces_local_state() {
    let (store, transport) =
        loaded_store(MockTransport::new().with_save_response(Ok(json!({ "isSkyBlue": "yes" }))))
            .await;

    store.set(json!({ "isSkyBlue": "clientside" })).unwrap();
    assert!(store.have_changed(None));

    let outcome = store.save(None).await.unwrap();

    assert_eq!(outcome, SaveOutcome::Saved(object(json!({ "isSkyBlue": "yes" }))));
    assert_eq!(store.get("isSkyBlue"), json!("yes"));
    assert!(!store.have_changed(None));
    assert_eq!(store.save_phase(), SavePhase::Idle);
    assert_eq!(
        transport.sent_payloads(),
        vec![json!({ "isSkyBlue": "clientside", "isGroundGreen": "serverside" })]
    );
}

#[tokio::test]
async fn save_response_omitting_keys_preserves_them() {
    // Unspecified keys in a save response are kept as they were
    let (store, _transport) = loaded_store(
        MockTransport::new().with_save_response(Ok(json!({ "isSkyBlue": "yes" }))),
    )
    .await;

    store.save(Some(json!({ "isSkyBlue": "clientside" }))).await.unwrap();

    assert_eq!(store.get("isGroundGreen"), json!("serverside"));
    assert_eq!(
        store.saved_settings(),
        Some(object(json!({ "isSkyBlue": "yes", "isGroundGreen": "serverside" })))
    );
}

#[tokio::test]
async fn explicit_save_payload_overrides_working_copy() {
    let (store, transport) = loaded_store(MockTransport::new()).await;
    store.set(json!({ "isSkyBlue": "clientside", "isGroundGreen": "clientside" })).unwrap();

    store.save(Some(json!({ "isSkyBlue": "partial" }))).await.unwrap();

    assert_eq!(transport.sent_payloads(), vec![json!({ "isSkyBlue": "partial" })]);
    // The echoed key is now persisted, the other edit is still pending
    assert!(!store.have_changed(Some(&["isSkyBlue"])));
    assert!(store.have_changed(Some(&["isGroundGreen"])));
}

#[tokio::test]
async fn changed_only_save_payload() {
    let transport = Arc::new(MockTransport::new().with_get(&settings_path(), Ok(server_settings())));
    let config = settings_config().with_save_payload(SavePayload::Changed);
    let store = SettingsStore::builder(config, transport.clone()).build().unwrap();
    store.load().await.unwrap();

    store.set(json!({ "isGroundGreen": "clientside" })).unwrap();
    store.save(None).await.unwrap();

    assert_eq!(transport.sent_payloads(), vec![json!({ "isGroundGreen": "clientside" })]);
    assert!(!store.have_changed(None));
}

#[tokio::test]
async fn rollback_one_restores_only_named_key() {
    let (store, _transport) = loaded_store(MockTransport::new()).await;

    store.set(json!({ "isSkyBlue": "clientside" })).unwrap();
    store.set(json!({ "isGroundGreen": "clientside" })).unwrap();
    store.rollback_one("isGroundGreen").unwrap();

    assert_eq!(store.get("isGroundGreen"), json!("serverside"));
    assert_eq!(store.get("isSkyBlue"), json!("clientside"));
    assert!(store.have_changed(None));
}

#[tokio::test]
async fn rollback_all_is_idempotent() {
    let (store, _transport) = loaded_store(MockTransport::new()).await;
    store.set(json!({ "isSkyBlue": "clientside", "extra": 1 })).unwrap();

    store.rollback_all();
    let once = store.state();
    store.rollback_all();

    assert_eq!(store.state(), once);
    assert_eq!(store.get_all(), Some(object(server_settings())));
    assert!(!store.have_changed(None));
}

#[tokio::test]
async fn change_detection_key_sets() {
    let (store, _transport) = loaded_store(MockTransport::new()).await;
    store.set(json!({ "isSkyBlue": "clientside" })).unwrap();

    assert!(!store.have_changed(Some(&[])));
    assert_eq!(
        store.have_changed(None),
        store.have_changed(Some(&["isSkyBlue", "isGroundGreen"]))
    );
    assert!(!store.have_changed(Some(&["isGroundGreen"])));
    assert!(store.check_changed(Some(&["isSkyBlue"])).unwrap());
}

#[tokio::test]
async fn owned_subset_isolation() {
    let transport = Arc::new(
        MockTransport::new().with_get(&settings_path(), Ok(json!({ "x": 1, "y": 1 }))),
    );
    let config = settings_config().with_owned_settings_slugs(["x"]);
    let store = SettingsStore::builder(config, transport).build().unwrap();
    store.load().await.unwrap();

    store.set(json!({ "y": 2 })).unwrap();
    assert!(store.have_changed(None));
    assert!(!store.have_owned_changed());

    store.set(json!({ "x": 2 })).unwrap();
    assert!(store.have_owned_changed());
}

#[tokio::test]
async fn empty_owned_subset_never_changes() {
    let (store, _transport) = loaded_store(MockTransport::new()).await;
    store.set(json!({ "isSkyBlue": "clientside" })).unwrap();

    assert!(!store.have_owned_changed());
    assert!(!store.check_owned_changed().unwrap());
}

#[tokio::test]
async fn concurrent_saves_last_response_wins() {
    let (transport, gate) = MockTransport::new().gate_sets();
    let (store, transport) = loaded_store(transport).await;

    let first = tokio::spawn({
        let store = store.clone();
        async move { store.save(Some(json!({ "isSkyBlue": "first" }))).await }
    });
    let second = tokio::spawn({
        let store = store.clone();
        async move { store.save(Some(json!({ "isSkyBlue": "second" }))).await }
    });

    wait_until(|| transport.set_call_count() == 2).await;
    assert!(store.is_saving());

    gate.add_permits(1);
    assert!(first.await.unwrap().unwrap().is_saved());
    assert_eq!(store.get("isSkyBlue"), json!("first"));
    assert!(store.is_saving(), "second save still in flight");

    gate.add_permits(1);
    assert!(second.await.unwrap().unwrap().is_saved());
    assert_eq!(store.get("isSkyBlue"), json!("second"));
    assert!(!store.is_saving());
}

#[tokio::test]
async fn store_reports_lifecycle_events() {
    let transport = Arc::new(MockTransport::new().with_get(&settings_path(), Ok(server_settings())));
    let (store, events) = SettingsStore::new(settings_config(), transport).unwrap();

    store.load().await.unwrap();
    store.set(json!({ "isSkyBlue": "clientside" })).unwrap();
    store.save(None).await.unwrap();
    drop(store);

    let events = collect_events(events, 4).await;
    assert!(matches!(events[0], StoreEvent::LoadStarted { .. }));
    assert!(matches!(
        events[1],
        StoreEvent::LoadSucceeded { from_snapshot: false, .. }
    ));
    assert_eq!(
        events[2],
        StoreEvent::SaveStarted {
            store: "modules/test-module".to_string()
        }
    );
    assert_eq!(
        events[3],
        StoreEvent::SaveSucceeded {
            store: "modules/test-module".to_string()
        }
    );
}

#[tokio::test]
async fn null_edit_of_absent_key_is_a_change() {
    let transport = Arc::new(MockTransport::new().with_get(&settings_path(), Ok(json!({ "x": 1 }))));
    let store = SettingsStore::builder(settings_config(), transport).build().unwrap();
    store.load().await.unwrap();

    store.set(json!({ "z": null })).unwrap();

    assert!(store.have_changed(None));
    assert!(store.have_changed(Some(&["z"])));
    assert!(!store.have_changed(Some(&["x"])));
}

#[tokio::test]
async fn save_before_load_leaves_load_unstarted() {
    let transport = Arc::new(MockTransport::new().with_get(&settings_path(), Ok(server_settings())));
    let store = SettingsStore::builder(settings_config(), transport.clone()).build().unwrap();

    let outcome = store.save(Some(json!({ "a": 5 }))).await.unwrap();

    assert!(outcome.is_saved());
    assert_eq!(store.load_phase(), LoadPhase::Unloaded);
    assert!(!store.is_loaded());
    assert!(!store.can_submit_changes());
    assert_eq!(transport.get_call_count(), 0);

    // The load still runs and merges around the saved key
    store.load().await.unwrap();
    assert_eq!(store.load_phase(), LoadPhase::Loaded);
    assert!(store.is_loaded());
    assert_eq!(transport.get_call_count(), 1);
    assert_eq!(store.get("a"), json!(5));
    assert_eq!(store.get("isSkyBlue"), json!("serverside"));
}
