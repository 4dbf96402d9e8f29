//! Fixtures shared by the test suites of the workspace.

pub mod recording_store;
pub mod todo_model;
