//! Integration tests for segmented execution context propagation

mod composition_order;
mod context_api;
mod lane_ownership;
mod logging_file;
mod retry_policy;
