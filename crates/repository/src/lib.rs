//! Read and write resources stored in a PostgreSQL database.
//!
//! Reads compile a query request into a count statement and a data statement and run
//! them one after the other. Writes compare a resource before and after a request,
//! plan the statements that apply the difference, and run them in one transaction.

pub mod compile;
pub mod error;
pub mod mutation;
pub mod query;
pub mod state;
