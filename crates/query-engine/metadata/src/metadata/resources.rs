//! The resource graph: resource types, their attributes and relationships,
//! and how each of them is backed by a table.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::database::ColumnsInfo;

/// Mapping from a public resource type name to its information.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ResourceTypes(pub BTreeMap<String, ResourceTypeInfo>);

impl ResourceTypes {
    pub fn empty() -> Self {
        ResourceTypes(BTreeMap::new())
    }
}

fn default_id_column() -> String {
    "Id".to_string()
}

/// Information about a resource type and the table it is stored in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTypeInfo {
    pub table_name: String,
    /// The column holding the resource identifier.
    #[serde(default = "default_id_column")]
    pub id_column: String,
    pub columns: ColumnsInfo,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeInfo>,
    #[serde(default)]
    pub relationships: BTreeMap<String, RelationshipInfo>,
}

/// A resource attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttributeInfo {
    /// The column backing this attribute. Calculated attributes have no column;
    /// their value is derived from other columns of the same resource.
    #[serde(default)]
    pub column: Option<String>,
    /// When set, query constants are member names of this enum type and are
    /// translated to their underlying value.
    #[serde(default)]
    pub enum_type: Option<String>,
}

impl AttributeInfo {
    /// Calculated attributes are read-only and have no column of their own.
    pub fn is_calculated(&self) -> bool {
        self.column.is_none()
    }
}

/// How many resources a relationship points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    One,
    Many,
}

/// The side of a relationship. The left side is the resource type declaring the
/// relationship, the right side is its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum RelationshipSide {
    Left,
    Right,
}

/// Where the foreign key backing a relationship lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyInfo {
    pub owned_by: RelationshipSide,
    /// The foreign key column in the table of the owning side.
    pub column: String,
}

/// A relationship from one resource type to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipInfo {
    /// The name of the target resource type.
    pub target: String,
    pub cardinality: Cardinality,
    pub foreign_key: ForeignKeyInfo,
    /// The relationship on the target resource type that navigates back.
    #[serde(default)]
    pub inverse: Option<String>,
}

impl RelationshipInfo {
    pub fn is_to_one(&self) -> bool {
        self.cardinality == Cardinality::One
    }

    pub fn is_to_many(&self) -> bool {
        self.cardinality == Cardinality::Many
    }
}
