//! Translate resource queries and change-sets into SQL statements to be run against the database.

pub mod error;
pub mod helpers;
pub mod mutation;
pub mod query;

pub use error::Error;
