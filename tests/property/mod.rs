//! Property-based tests for the courier engine.
