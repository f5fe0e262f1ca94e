mod support;

use std::collections::HashMap;

use spanloom::error::{HookError, LoomError};
use spanloom::hooks::{
    FilterExpr, FiringStatus, HookDispatcher, HookEvent, HookRegistration,
};
use support::temp_store;

fn registration(event: HookEvent, handler_ref: &str, blocking: bool) -> HookRegistration {
    HookRegistration {
        event,
        handler_ref: handler_ref.into(),
        blocking,
        timeout_ms: 5_000,
        filters: Vec::new(),
    }
}

// `true` and `false` are real binaries; the command handler feeds them the
// JSON context on stdin and they ignore it.
#[tokio::test]
async fn command_handler_maps_exit_codes() {
    let dispatcher = HookDispatcher::new(vec![
        registration(HookEvent::PreTask, "true", false),
        registration(HookEvent::PreTask, "false", false),
    ]);

    let firings = dispatcher
        .dispatch(HookEvent::PreTask, &HashMap::new())
        .await
        .unwrap();
    assert_eq!(firings.len(), 2);
    assert_eq!(firings[0].status, FiringStatus::Completed);
    assert_eq!(firings[1].status, FiringStatus::Errored);
}

#[tokio::test]
async fn blocking_command_failure_aborts() {
    let dispatcher = HookDispatcher::new(vec![
        registration(HookEvent::PreTask, "false", true),
        registration(HookEvent::PreTask, "true", false),
    ]);

    let err = dispatcher
        .dispatch(HookEvent::PreTask, &HashMap::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LoomError::Hook(HookError::BlockingFailure { .. })
    ));
}

#[tokio::test]
async fn events_are_routed_independently() {
    let dispatcher = HookDispatcher::new(vec![
        registration(HookEvent::SessionStart, "true", false),
        registration(HookEvent::PostTask, "true", false),
    ]);

    let firings = dispatcher
        .dispatch(HookEvent::PostTask, &HashMap::new())
        .await
        .unwrap();
    assert_eq!(firings.len(), 1);

    let firings = dispatcher
        .dispatch(HookEvent::PreTask, &HashMap::new())
        .await
        .unwrap();
    assert!(firings.is_empty());
}

#[tokio::test]
async fn attribute_filters_gate_dispatch() {
    let mut gated = registration(HookEvent::PostTask, "true", false);
    gated.filters = vec![
        FilterExpr::Equals {
            key: "agent".into(),
            value: "builder".into(),
        },
        FilterExpr::Contains {
            key: "task".into(),
            value: "compile".into(),
        },
    ];
    let dispatcher = HookDispatcher::new(vec![gated]);

    let matching: HashMap<String, String> = [
        ("agent".to_string(), "builder".to_string()),
        ("task".to_string(), "compile the workspace".to_string()),
    ]
    .into_iter()
    .collect();
    assert_eq!(
        dispatcher
            .dispatch(HookEvent::PostTask, &matching)
            .await
            .unwrap()
            .len(),
        1
    );

    let wrong_agent: HashMap<String, String> = [
        ("agent".to_string(), "tester".to_string()),
        ("task".to_string(), "compile the workspace".to_string()),
    ]
    .into_iter()
    .collect();
    assert!(dispatcher
        .dispatch(HookEvent::PostTask, &wrong_agent)
        .await
        .unwrap()
        .is_empty());
}

#[test]
fn registrations_round_trip_through_the_store() {
    let (_tmp, store) = temp_store();

    let mut gated = registration(HookEvent::SessionEnd, "scripts/teardown.sh", true);
    gated.timeout_ms = 250;
    gated.filters = vec![FilterExpr::AnyOf {
        key: "project".into(),
        values: vec!["api".into(), "web".into()],
    }];
    let registrations = vec![registration(HookEvent::SessionStart, "true", false), gated];

    store.replace_hook_registrations(&registrations).unwrap();
    let loaded = store.load_hook_registrations().unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[1].handler_ref, "scripts/teardown.sh");
    assert_eq!(loaded[1].timeout_ms, 250);
    assert!(loaded[1].blocking);

    // A later snapshot fully replaces the earlier one.
    store
        .replace_hook_registrations(&registrations[..1])
        .unwrap();
    assert_eq!(store.load_hook_registrations().unwrap().len(), 1);
}
