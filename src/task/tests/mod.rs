//! Unit tests for the task pipeline.

mod orchestrator_tests;
