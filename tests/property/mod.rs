//! Property-based tests for stack discipline and composition
