//! Describe the statements to run for a request, and what each of them must return.

use super::ast::{Select, Statement};
use super::convert::{select_to_sql, statement_to_sql};
use super::string::SQL;

/// The statements answering a read request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub resource_type: String,
    /// Counts all matching resources, ignoring pagination. Absent when the total
    /// count is not requested.
    pub count: Option<Select>,
    /// Fetches the requested page of resources.
    pub data: Select,
}

impl QueryPlan {
    pub fn count_sql(&self) -> Option<SQL> {
        self.count.as_ref().map(select_to_sql)
    }

    pub fn data_sql(&self) -> SQL {
        select_to_sql(&self.data)
    }
}

/// The number of rows a mutation statement must affect for the mutation to succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCountExpectation {
    /// Exactly this many rows.
    Exactly(u64),
    /// Zero or one row.
    AtMostOne,
    /// An INSERT returning the identifier of the single row it created.
    ReturnsId,
}

impl RowCountExpectation {
    pub fn is_met_by(self, affected: u64) -> bool {
        match self {
            RowCountExpectation::Exactly(expected) => affected == expected,
            RowCountExpectation::AtMostOne => affected <= 1,
            RowCountExpectation::ReturnsId => affected == 1,
        }
    }
}

/// One statement of a mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationStep {
    pub statement: Statement,
    pub expectation: RowCountExpectation,
}

impl MutationStep {
    pub fn sql(&self) -> SQL {
        statement_to_sql(&self.statement)
    }
}
