//! Integration tests for the retry policy segment

use runcontext::error::ContextError;
use runcontext::execution::{ContextOptions, ExecutionContextService};
use runcontext::policy::{retry, security};
use serde_json::json;

fn service() -> ExecutionContextService {
    let service = ExecutionContextService::new();
    service.register(retry::registration()).unwrap();
    service
}

fn retry_options(max_attempts: u32) -> ContextOptions {
    ContextOptions::new().with(retry::KIND, json!({ "max_attempts": max_attempts }))
}

/// Target that fails until its `succeed_on`-th call.
fn flaky(succeed_on: u32, calls: &mut u32) -> anyhow::Result<&'static str> {
    *calls += 1;
    if *calls < succeed_on {
        anyhow::bail!("attempt {} failed", calls);
    }
    Ok("done")
}

#[test]
fn test_succeeds_on_nth_attempt() {
    let service = service();
    let view = service.for_current_lane();
    for n in 1..=4 {
        let mut calls = 0;
        let value = view
            .run(&retry_options(4), || flaky(n, &mut calls))
            .unwrap();
        assert_eq!(value, "done");
        assert_eq!(calls, n);
        assert_eq!(view.depth(), 0);
    }
}

#[test]
fn test_failure_beyond_cap_propagates() {
    let service = service();
    let mut calls = 0;
    let err = service
        .for_current_lane()
        .run(&retry_options(3), || flaky(4, &mut calls))
        .unwrap_err();
    assert_eq!(calls, 3);
    assert_eq!(
        err.target_error().unwrap().to_string(),
        "attempt 3 failed"
    );
}

#[test]
fn test_root_does_not_retry() {
    let service = service();
    let mut calls = 0;
    let result = service
        .for_current_lane()
        .run(&ContextOptions::new(), || flaky(2, &mut calls));
    assert!(result.is_err());
    assert_eq!(calls, 1);
}

#[test]
fn test_nested_call_inherits_cap() {
    let service = service();
    let view = service.for_current_lane();
    let mut calls = 0;
    let value = view
        .run(&retry_options(3), || {
            // The outer call's retry would also re-run this nested call, so
            // the nested one must succeed on its own budget.
            let inner = view.run(&ContextOptions::new().enter(retry::KIND), || {
                flaky(3, &mut calls)
            })?;
            Ok(inner)
        })
        .unwrap();
    assert_eq!(value, "done");
    assert_eq!(calls, 3);
}

#[test]
fn test_refusal_is_not_retried() {
    let service = ExecutionContextService::new();
    service.register(security::registration()).unwrap();
    service.register(retry::registration()).unwrap();
    let options = retry_options(5).with(
        security::KIND,
        json!({"forbidden": ["IO"], "uses": ["IO"]}),
    );

    let mut calls = 0;
    let err = service
        .for_current_lane()
        .run(&options, || flaky(1, &mut calls))
        .unwrap_err();
    assert!(matches!(err, ContextError::Refused { .. }));
    assert_eq!(calls, 0);
}

#[test]
fn test_invalid_retry_options_rejected() {
    let service = service();
    let options = ContextOptions::new().with(retry::KIND, json!({"max_attempts": "many"}));
    let err = service
        .for_current_lane()
        .run(&options, || Ok(()))
        .unwrap_err();
    assert!(matches!(err, ContextError::InvalidOptions { ref kind, .. } if kind == "retry"));
}
