//! What changed about a resource, in the terms the mutation planner needs.

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use query_engine_sql::sql;

use super::super::error::Error;

/// The identifier of a resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    Int(i64),
    String(String),
}

impl ResourceId {
    pub fn to_parameter_value(&self) -> sql::ast::ParameterValue {
        match self {
            ResourceId::Int(id) => sql::ast::ParameterValue::Int(*id),
            ResourceId::String(id) => sql::ast::ParameterValue::String(id.clone()),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResourceId::Int(id) => write!(f, "{id}"),
            ResourceId::String(id) => write!(f, "{id}"),
        }
    }
}

/// A one-to-one relationship whose foreign key is on our side, set to a resource.
/// Another resource may still point to `new` and must let go of it first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneToOneChange {
    pub relationship: String,
    pub old: Option<ResourceId>,
    pub new: ResourceId,
}

/// A to-one relationship whose foreign key is in the table of the related resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToOneChange {
    pub relationship: String,
    pub old: Option<ResourceId>,
    pub new: Option<ResourceId>,
}

/// A to-many relationship. The foreign key is always in the table of the related resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToManyChange {
    pub relationship: String,
    pub old: BTreeSet<ResourceId>,
    pub new: BTreeSet<ResourceId>,
}

impl ToManyChange {
    /// Resources no longer related.
    pub fn removed(&self) -> Vec<&ResourceId> {
        self.old.difference(&self.new).collect()
    }

    /// Resources newly related.
    pub fn added(&self) -> Vec<&ResourceId> {
        self.new.difference(&self.old).collect()
    }
}

/// The changes to apply to one resource.
pub trait ChangeSet {
    fn resource_type(&self) -> &str;

    /// Absent for a resource to be created whose identifier the database assigns.
    fn resource_id(&self) -> Option<&ResourceId>;

    /// Column name to new value for the columns of the resource's own table, in
    /// table order. Foreign keys on our side of a to-one relationship are included.
    fn changed_columns(&self) -> &IndexMap<String, sql::ast::ParameterValue>;

    fn changed_one_to_one_to_not_null(&self) -> &[OneToOneChange];

    fn changed_to_one_with_foreign_key_at_right_side(&self) -> &[ToOneChange];

    fn changed_to_many(&self) -> &[ToManyChange];

    /// Fails when a relationship that cannot be empty is being cleared.
    fn assert_required_relationships_not_cleared(&self) -> Result<(), Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_many_changes_know_what_was_added_and_removed() {
        let change = ToManyChange {
            relationship: "tags".to_string(),
            old: BTreeSet::from([ResourceId::Int(1), ResourceId::Int(2)]),
            new: BTreeSet::from([ResourceId::Int(2), ResourceId::Int(3)]),
        };

        assert_eq!(change.removed(), vec![&ResourceId::Int(1)]);
        assert_eq!(change.added(), vec![&ResourceId::Int(3)]);
    }

    #[test]
    fn identifiers_deserialize_from_numbers_and_strings() {
        let ids: Vec<ResourceId> = serde_json::from_str(r#"[7, "abc"]"#).unwrap();

        assert_eq!(
            ids,
            vec![ResourceId::Int(7), ResourceId::String("abc".to_string())]
        );
    }
}
