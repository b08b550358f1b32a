//! Integration tests for invocation chain ordering

use parking_lot::Mutex;
use runcontext::error::ContextError;
use runcontext::execution::{
    registration_fn, CallScope, ContextOptions, ContextSegment, ExecutionContextService,
    Invocation, PostExecute, PostExecuteHook, PreExecute, PreExecuteHook, SegmentRef,
};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

use crate::integration::test_utils::journaled_registration;

#[test]
fn test_last_registered_kind_is_outermost() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let service = ExecutionContextService::new();
    service.register(journaled_registration("a", &journal)).unwrap();
    service.register(journaled_registration("b", &journal)).unwrap();

    let target_journal = journal.clone();
    service
        .for_current_lane()
        .run(&ContextOptions::new().enter("a").enter("b"), || {
            target_journal.lock().push("target".to_string());
            Ok(())
        })
        .unwrap();

    assert_eq!(
        *journal.lock(),
        vec!["b:in", "a:in", "target", "a:out", "b:out"]
    );
}

#[test]
fn test_inherited_kinds_also_intercept() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let service = ExecutionContextService::new();
    service.register(journaled_registration("a", &journal)).unwrap();
    service.register(journaled_registration("b", &journal)).unwrap();

    // Only "a" is entered; "b" still wraps the call through its root.
    service
        .for_current_lane()
        .run(&ContextOptions::new().enter("a"), || Ok(()))
        .unwrap();
    assert_eq!(*journal.lock(), vec!["b:in", "a:in", "a:out", "b:out"]);
}

#[test]
fn test_options_order_does_not_change_chain_order() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let service = ExecutionContextService::new();
    service.register(journaled_registration("a", &journal)).unwrap();
    service.register(journaled_registration("b", &journal)).unwrap();

    service
        .for_current_lane()
        .run(&ContextOptions::new().enter("b").enter("a"), || Ok(()))
        .unwrap();
    assert_eq!(*journal.lock(), vec!["b:in", "a:in", "a:out", "b:out"]);
}

/// Rejects calls to operations named "drop".
struct DenyDrop;

impl PreExecuteHook for DenyDrop {
    fn create_child(&self, _options: &Value) -> Result<Self, ContextError> {
        Ok(DenyDrop)
    }

    fn before_invocation(&self, scope: &CallScope) -> Result<(), ContextError> {
        if scope.operation.as_deref() == Some("drop") {
            return Err(ContextError::Refused {
                kind: "guard".to_string(),
                reason: "drop is not allowed".to_string(),
            });
        }
        Ok(())
    }
}

/// Turns any target failure into success.
struct Swallow;

impl PostExecuteHook for Swallow {
    fn create_child(&self, _options: &Value) -> Result<Self, ContextError> {
        Ok(Swallow)
    }

    fn after_invocation(
        &self,
        _scope: &CallScope,
        outcome: Result<(), ContextError>,
    ) -> Result<(), ContextError> {
        match outcome {
            Err(ContextError::Target(_)) => Ok(()),
            other => other,
        }
    }
}

#[test]
fn test_pre_execute_refuses_before_target() {
    let service = ExecutionContextService::new();
    service
        .register_fn("guard", || Arc::new(PreExecute(DenyDrop)))
        .unwrap();

    let mut calls = 0;
    let view = service.for_current_lane();
    let err = view
        .run_in_context(&ContextOptions::new(), CallScope::operation("drop"), || {
            calls += 1;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, ContextError::Refused { .. }));
    assert_eq!(calls, 0);

    view.run_in_context(&ContextOptions::new(), CallScope::operation("select"), || {
        calls += 1;
        Ok(())
    })
    .unwrap();
    assert_eq!(calls, 1);
}

#[test]
fn test_post_execute_swallowed_failure_leaves_no_result() {
    let service = ExecutionContextService::new();
    service
        .register_fn("swallow", || Arc::new(PostExecute(Swallow)))
        .unwrap();

    let result: Result<u32, _> = service
        .for_current_lane()
        .run(&ContextOptions::new(), || anyhow::bail!("lost"));
    assert!(matches!(result, Err(ContextError::NotInvoked)));

    let value = service
        .for_current_lane()
        .run(&ContextOptions::new(), || Ok(5))
        .unwrap();
    assert_eq!(value, 5);
}

/// Never invokes the inner node.
struct ShortCircuit;

impl ContextSegment for ShortCircuit {
    fn create_child(&self, _options: &Value) -> Result<SegmentRef, ContextError> {
        Ok(Arc::new(ShortCircuit))
    }

    fn on_context(&self, _invocation: &Invocation<'_>) -> Result<(), ContextError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn test_short_circuit_reports_not_invoked_and_pops_frame() {
    let service = ExecutionContextService::new();
    service
        .register(registration_fn("skip", || Arc::new(ShortCircuit)))
        .unwrap();
    let view = service.for_lane("short");
    let result = view.run(&ContextOptions::new().enter("skip"), || Ok(1));
    assert!(matches!(result, Err(ContextError::NotInvoked)));
    assert_eq!(view.depth(), 0);
}
