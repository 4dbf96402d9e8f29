//! Maps resource types and relationships to their tables, columns and foreign keys.

use indexmap::IndexMap;

use super::resources::{RelationshipInfo, RelationshipSide, ResourceTypeInfo};
use super::{Metadata, Nullable};

/// Errors when the data model cannot answer a lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Resource type '{0}' not found.")]
    ResourceTypeNotFound(String),
    #[error("Relationship '{relationship}' not found on resource type '{resource_type}'.")]
    RelationshipNotFound {
        resource_type: String,
        relationship: String,
    },
    #[error("Foreign key column '{column}' not found in table '{table}'.")]
    ForeignKeyColumnNotFound { column: String, table: String },
}

/// The foreign key backing a relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// The side whose table holds the foreign key column.
    pub owned_by: RelationshipSide,
    pub column_name: String,
    pub is_nullable: bool,
}

/// The resource field a column is mapped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceField {
    /// The resource identifier.
    Id,
    Attribute(String),
    /// A foreign key column, named by the resource type declaring the relationship
    /// and the relationship itself.
    Relationship {
        resource_type: String,
        relationship: String,
    },
}

/// Column name to the field it is mapped to. Columns that do not back any field of
/// the resource map to `None`.
pub type ColumnMappings = IndexMap<String, Option<ResourceField>>;

/// The service translating resource graph names into table, column and foreign key names.
/// Implementations must be safe for concurrent reads.
pub trait DataModelService: Send + Sync {
    /// The table a resource type is stored in.
    fn table_name_for(&self, resource_type: &str) -> Result<String, Error>;

    /// The column holding the identifier of a resource type.
    fn id_column_for(&self, resource_type: &str) -> Result<String, Error>;

    /// The resource type a relationship points to.
    fn relationship_target(&self, resource_type: &str, relationship: &str)
        -> Result<String, Error>;

    /// The foreign key backing a relationship declared on a resource type.
    fn foreign_key_for(&self, resource_type: &str, relationship: &str)
        -> Result<ForeignKey, Error>;

    /// All columns of the table of a resource type. The identifier column comes first,
    /// the remaining columns follow in alphabetical order.
    fn column_mappings_for(&self, resource_type: &str) -> Result<ColumnMappings, Error>;
}

impl Metadata {
    /// Find a resource type by its public name.
    pub fn lookup_resource_type(&self, resource_type: &str) -> Result<&ResourceTypeInfo, Error> {
        self.resource_types
            .0
            .get(resource_type)
            .ok_or_else(|| Error::ResourceTypeNotFound(resource_type.to_string()))
    }

    /// Find a relationship declared on a resource type.
    pub fn lookup_relationship(
        &self,
        resource_type: &str,
        relationship: &str,
    ) -> Result<&RelationshipInfo, Error> {
        self.lookup_resource_type(resource_type)?
            .relationships
            .get(relationship)
            .ok_or_else(|| Error::RelationshipNotFound {
                resource_type: resource_type.to_string(),
                relationship: relationship.to_string(),
            })
    }
}

impl DataModelService for Metadata {
    fn table_name_for(&self, resource_type: &str) -> Result<String, Error> {
        Ok(self.lookup_resource_type(resource_type)?.table_name.clone())
    }

    fn id_column_for(&self, resource_type: &str) -> Result<String, Error> {
        Ok(self.lookup_resource_type(resource_type)?.id_column.clone())
    }

    fn relationship_target(
        &self,
        resource_type: &str,
        relationship: &str,
    ) -> Result<String, Error> {
        Ok(self
            .lookup_relationship(resource_type, relationship)?
            .target
            .clone())
    }

    fn foreign_key_for(
        &self,
        resource_type: &str,
        relationship: &str,
    ) -> Result<ForeignKey, Error> {
        let left = self.lookup_resource_type(resource_type)?;
        let relationship_info = self.lookup_relationship(resource_type, relationship)?;

        let owner = match relationship_info.foreign_key.owned_by {
            RelationshipSide::Left => left,
            RelationshipSide::Right => self.lookup_resource_type(&relationship_info.target)?,
        };

        let column_name = relationship_info.foreign_key.column.clone();
        let column = owner.columns.0.get(&column_name).ok_or_else(|| {
            Error::ForeignKeyColumnNotFound {
                column: column_name.clone(),
                table: owner.table_name.clone(),
            }
        })?;

        Ok(ForeignKey {
            owned_by: relationship_info.foreign_key.owned_by,
            column_name,
            is_nullable: column.nullable == Nullable::Nullable,
        })
    }

    fn column_mappings_for(&self, resource_type: &str) -> Result<ColumnMappings, Error> {
        let info = self.lookup_resource_type(resource_type)?;

        let mut mappings = ColumnMappings::new();
        mappings.insert(info.id_column.clone(), Some(ResourceField::Id));

        for column_name in info.columns.0.keys() {
            if *column_name == info.id_column {
                continue;
            }
            let field = self.field_for_column(resource_type, info, column_name);
            mappings.insert(column_name.clone(), field);
        }

        Ok(mappings)
    }
}

impl Metadata {
    /// Find the field a column backs. A foreign key column may be declared by a
    /// relationship of this resource type, or only by the inverse side.
    fn field_for_column(
        &self,
        resource_type: &str,
        info: &ResourceTypeInfo,
        column_name: &str,
    ) -> Option<ResourceField> {
        if let Some((name, _)) = info
            .attributes
            .iter()
            .find(|(_, attribute)| attribute.column.as_deref() == Some(column_name))
        {
            return Some(ResourceField::Attribute(name.clone()));
        }

        let owned_by_this_side = info.relationships.iter().find(|(_, relationship)| {
            relationship.foreign_key.owned_by == RelationshipSide::Left
                && relationship.foreign_key.column == column_name
        });
        if let Some((name, _)) = owned_by_this_side {
            return Some(ResourceField::Relationship {
                resource_type: resource_type.to_string(),
                relationship: name.clone(),
            });
        }

        self.resource_types
            .0
            .iter()
            .flat_map(|(other_type, other_info)| {
                other_info
                    .relationships
                    .iter()
                    .map(move |(name, relationship)| (other_type, name, relationship))
            })
            .find(|(_, _, relationship)| {
                relationship.target == resource_type
                    && relationship.foreign_key.owned_by == RelationshipSide::Right
                    && relationship.foreign_key.column == column_name
            })
            .map(|(other_type, name, _)| ResourceField::Relationship {
                resource_type: other_type.clone(),
                relationship: name.clone(),
            })
    }
}
