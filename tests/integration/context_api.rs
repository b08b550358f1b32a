//! Integration tests for the service and view API

use runcontext::error::ContextError;
use runcontext::execution::{
    CallScope, ContextOptions, ExecutionContextService, DEFAULT_LANE,
};
use serde_json::json;

use crate::integration::test_utils::{simple_registration, Simple, SimpleLog};

fn service_with_simple() -> (ExecutionContextService, SimpleLog) {
    let service = ExecutionContextService::new();
    let log = SimpleLog::default();
    service.register(simple_registration(&log)).unwrap();
    (service, log)
}

#[test]
fn test_current_lane_is_default_lane() {
    let (service, _log) = service_with_simple();
    assert_eq!(service.for_current_lane(), service.for_lane(DEFAULT_LANE));
}

#[test]
fn test_fork_as_unique_gets_new_name() {
    let (service, _log) = service_with_simple();
    let default_view = service.for_lane(DEFAULT_LANE);
    let forked = service.fork_lane_unique(DEFAULT_LANE).unwrap();
    assert_ne!(forked, default_view);
    assert_eq!(forked.lane(), "default.0");
}

#[test]
fn test_registering_twice_fails() {
    let (service, log) = service_with_simple();
    let err = service.register(simple_registration(&log)).unwrap_err();
    assert!(matches!(err, ContextError::AlreadyRegistered { ref kind, .. } if kind == "simple"));
    assert!(err.is_usage_error());
}

#[test]
fn test_child_created_when_options_given() {
    let (service, log) = service_with_simple();
    service
        .for_current_lane()
        .run(&ContextOptions::new().enter("simple"), || Ok(()))
        .unwrap();
    // The root plus one child
    assert_eq!(log.created(), 2);
    assert_eq!(log.before(0), 0);
    assert_eq!(log.before(1), 1);
    assert_eq!(log.after(1), 1);
}

#[test]
fn test_root_inherited_when_options_not_given() {
    let (service, log) = service_with_simple();
    let view = service.for_current_lane();
    view.run(&ContextOptions::new(), || {
        view.run(&ContextOptions::new(), || Ok(()))?;
        Ok(())
    })
    .unwrap();

    assert_eq!(log.created(), 1);
    assert_eq!(log.before(0), 2);
    assert_eq!(log.after(0), 2);
    assert_eq!(view.depth(), 0);
}

#[test]
fn test_target_sees_child_then_root_again() {
    let (service, _log) = service_with_simple();
    let view = service.for_lane("worker");
    let index_of = |view: &runcontext::View| {
        view.active_segment_as::<Simple, _>("simple", |s| s.index)
            .unwrap()
            .unwrap()
    };

    let root = index_of(&view);
    let inside = view
        .run(&ContextOptions::new().enter("simple"), || Ok(index_of(&view)))
        .unwrap();
    assert_ne!(root, inside);
    assert_eq!(index_of(&view), root);
    assert!(!service.lane_names().contains(&"worker".to_string()));
}

#[test]
fn test_root_shared_across_lanes() {
    let (service, log) = service_with_simple();
    let a = service.for_lane("a").active_segment("simple").unwrap();
    let b = service.for_lane("b").active_segment("simple").unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));
    assert_eq!(log.created(), 1);
}

#[test]
fn test_unregistered_kind_in_options_fails_without_leaking_frame() {
    let (service, _log) = service_with_simple();
    let view = service.for_current_lane();
    let mut ran = false;
    let err = view
        .run(&ContextOptions::new().enter("missing"), || {
            ran = true;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, ContextError::NotRegistered(ref k) if k == "missing"));
    assert!(!ran);
    assert_eq!(view.depth(), 0);
}

#[test]
fn test_duplicate_kind_in_one_call_fails() {
    let (service, _log) = service_with_simple();
    let options = ContextOptions::new()
        .with("simple", json!({}))
        .with("simple", json!({}));
    let err = service
        .for_current_lane()
        .run(&options, || Ok(()))
        .unwrap_err();
    assert!(matches!(err, ContextError::DuplicateSegment(ref k) if k == "simple"));
}

#[test]
fn test_call_scope_reaches_target_errors() {
    let (service, _log) = service_with_simple();
    let scope = CallScope::operation("save")
        .with_receiver("Repo")
        .with_argument(json!(42));
    let err = service
        .for_current_lane()
        .run_in_context(&ContextOptions::new(), scope, || -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        })
        .unwrap_err();
    assert_eq!(err.target_error().unwrap().to_string(), "disk full");
}

#[test]
fn test_thread_binding_selects_lane() {
    let (service, log) = service_with_simple();
    let service = std::sync::Arc::new(service);
    let worker = service.clone();
    std::thread::spawn(move || {
        let _binding = ExecutionContextService::bind_current_thread("jobs");
        let view = worker.for_current_lane();
        assert_eq!(view.lane(), "jobs");
        view.run(&ContextOptions::new().enter("simple"), || {
            assert_eq!(worker.lane_depth("jobs"), 1);
            Ok(())
        })
        .unwrap();
    })
    .join()
    .unwrap();

    assert_eq!(service.current_lane_name(), DEFAULT_LANE);
    assert_eq!(log.created(), 2);
}
