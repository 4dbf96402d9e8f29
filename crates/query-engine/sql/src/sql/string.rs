//! Type definitions of a low-level SQL string representation.

use indexmap::IndexMap;

use super::ast::{Parameter, ParameterValue};

/// Rendered SQL text and the parameters it references.
#[derive(Debug, Clone, PartialEq)]
pub struct SQL {
    pub sql: String,
    /// Parameter name to value, in the order the names first occur in the text.
    pub params: IndexMap<String, ParameterValue>,
    indent: usize,
}

impl Default for SQL {
    fn default() -> Self {
        Self::new()
    }
}

const INDENT: &str = "    ";

impl SQL {
    pub fn new() -> SQL {
        SQL {
            sql: String::new(),
            params: IndexMap::new(),
            indent: 0,
        }
    }

    pub fn append_syntax(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    /// Append a double-quoted identifier.
    pub fn append_identifier(&mut self, identifier: &str) {
        self.sql.push('"');
        self.sql.push_str(&identifier.replace('"', "\"\""));
        self.sql.push('"');
    }

    /// Append a single-quoted string literal.
    pub fn append_string_literal(&mut self, text: &str) {
        self.sql.push('\'');
        self.sql.push_str(&text.replace('\'', "''"));
        self.sql.push('\'');
    }

    /// Append a reference to a parameter, registering its value on first use.
    pub fn append_param(&mut self, param: &Parameter) {
        self.sql.push_str(&param.name.0);
        self.params
            .entry(param.name.0.clone())
            .or_insert_with(|| param.value.clone());
    }

    /// Start a new line at the current indentation.
    pub fn new_line(&mut self) {
        self.sql.push('\n');
        for _ in 0..self.indent {
            self.sql.push_str(INDENT);
        }
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn unindent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }
}
