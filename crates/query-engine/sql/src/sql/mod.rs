//! Types and functions for building, rewriting and rendering SQL.

pub mod ast;
pub mod convert;
pub mod error;
pub mod execution_plan;
pub mod helpers;
pub mod rewrite;
pub mod string;
