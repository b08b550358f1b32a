//! Integration test for file logging.
//!
//! Only this test installs the global subscriber; a second install must fail
//! without panicking.

use runcontext::error::ContextError;
use runcontext::execution::{ExecutionContextService, DEFAULT_LANE};
use runcontext::logging::{init_logging, LoggingConfig};
use std::fs;
use tempfile::TempDir;

use crate::integration::test_utils::with_isolated_env;

#[test]
fn test_file_logging_records_library_events() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs").join("runcontext.log");
    let config = LoggingConfig {
        level: "warn".to_string(),
        output: "file".to_string(),
        file: log_path.clone(),
        modules: [("runcontext".to_string(), "debug".to_string())]
            .into_iter()
            .collect(),
        ..LoggingConfig::default()
    };

    with_isolated_env(&temp_dir, || {
        init_logging(Some(&config)).unwrap();
        let again = init_logging(Some(&config)).unwrap_err();
        assert!(matches!(again, ContextError::Config(_)));
    });

    let service = ExecutionContextService::new();
    service.fork_lane_as(DEFAULT_LANE, "logged-fork").unwrap();

    let content = fs::read_to_string(&log_path).unwrap();
    assert!(
        content.contains("Forked lane") && content.contains("logged-fork"),
        "log file should record the fork; got: {}",
        content
    );
}
