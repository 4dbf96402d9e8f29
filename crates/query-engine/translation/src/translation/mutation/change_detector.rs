//! Compare a resource before and after a request to find what changed.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use query_engine_metadata::metadata::{
    self, DataModelService, RelationshipSide, ResourceField, ResourceTypeInfo,
};
use query_engine_sql::sql;

use super::super::error::Error;
use super::super::query::values;
use super::change_set::{ChangeSet, OneToOneChange, ResourceId, ToManyChange, ToOneChange};

/// The state of a resource: its attributes and the resources it is related to.
///
/// Fields absent from the snapshot after a request are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub to_one: BTreeMap<String, Option<ResourceId>>,
    #[serde(default)]
    pub to_many: BTreeMap<String, BTreeSet<ResourceId>>,
}

/// The changes between two snapshots of a resource. Without a snapshot before the
/// request, the resource is being created.
#[derive(Debug, Clone)]
pub struct ResourceChangeDetector {
    resource_type: String,
    resource_id: Option<ResourceId>,
    changed_columns: IndexMap<String, sql::ast::ParameterValue>,
    one_to_one: Vec<OneToOneChange>,
    to_one_at_right_side: Vec<ToOneChange>,
    to_many: Vec<ToManyChange>,
    cleared_required: Vec<String>,
}

impl ResourceChangeDetector {
    pub fn new(
        metadata: &metadata::Metadata,
        resource_type: &str,
        before: Option<&ResourceSnapshot>,
        after: &ResourceSnapshot,
    ) -> Result<ResourceChangeDetector, Error> {
        let info = metadata.lookup_resource_type(resource_type)?;
        validate_names(metadata, resource_type, info, after)?;

        let resource_id = after
            .id
            .clone()
            .or_else(|| before.and_then(|before| before.id.clone()));

        let mut detector = ResourceChangeDetector {
            resource_type: resource_type.to_string(),
            resource_id,
            changed_columns: IndexMap::new(),
            one_to_one: vec![],
            to_one_at_right_side: vec![],
            to_many: vec![],
            cleared_required: vec![],
        };

        detector.detect_columns(metadata, info, before, after)?;
        detector.detect_relationships(metadata, info, before, after)?;
        Ok(detector)
    }

    /// Columns of our own table, in table order: a client-supplied identifier on
    /// create, changed attributes, and changed foreign keys on our side.
    fn detect_columns(
        &mut self,
        metadata: &metadata::Metadata,
        info: &ResourceTypeInfo,
        before: Option<&ResourceSnapshot>,
        after: &ResourceSnapshot,
    ) -> Result<(), Error> {
        for (column, field) in metadata.column_mappings_for(&self.resource_type)? {
            let value = match field {
                Some(ResourceField::Id) => match (&after.id, before) {
                    (Some(id), None) => Some(id.to_parameter_value()),
                    _ => None,
                },
                Some(ResourceField::Attribute(attribute)) => {
                    match after.attributes.get(&attribute) {
                        Some(new)
                            if before.and_then(|before| before.attributes.get(&attribute))
                                != Some(new) =>
                        {
                            let column_info = info.columns.0.get(&column).ok_or_else(|| {
                                Error::FieldUnavailable {
                                    resource_type: self.resource_type.clone(),
                                    field: attribute.clone(),
                                }
                            })?;
                            let enum_type = info
                                .attributes
                                .get(&attribute)
                                .and_then(|attribute| attribute.enum_type.as_deref());
                            Some(values::translate_json_value(
                                &metadata.enum_types,
                                new,
                                column_info.r#type,
                                enum_type,
                            )?)
                        }
                        _ => None,
                    }
                }
                Some(ResourceField::Relationship {
                    resource_type,
                    relationship,
                }) if resource_type == self.resource_type => {
                    changed_to_one(before, after, &relationship).map(|(_, new)| {
                        new.map_or(sql::ast::ParameterValue::Null, |id| {
                            id.to_parameter_value()
                        })
                    })
                }
                Some(ResourceField::Relationship { .. }) | None => None,
            };
            if let Some(value) = value {
                self.changed_columns.insert(column, value);
            }
        }
        Ok(())
    }

    fn detect_relationships(
        &mut self,
        metadata: &metadata::Metadata,
        info: &ResourceTypeInfo,
        before: Option<&ResourceSnapshot>,
        after: &ResourceSnapshot,
    ) -> Result<(), Error> {
        for (name, relationship) in &info.relationships {
            if relationship.is_to_many() {
                if let Some(new) = after.to_many.get(name) {
                    let old = before
                        .and_then(|before| before.to_many.get(name))
                        .cloned()
                        .unwrap_or_default();
                    if old != *new {
                        self.to_many.push(ToManyChange {
                            relationship: name.clone(),
                            old,
                            new: new.clone(),
                        });
                    }
                }
                continue;
            }

            let Some((old, new)) = changed_to_one(before, after, name) else {
                continue;
            };
            let foreign_key = metadata.foreign_key_for(&self.resource_type, name)?;
            match foreign_key.owned_by {
                RelationshipSide::Left => {
                    if new.is_none() && !foreign_key.is_nullable {
                        self.cleared_required.push(name.clone());
                    }
                    let inverse_is_to_one = match &relationship.inverse {
                        Some(inverse) => metadata
                            .lookup_relationship(&relationship.target, inverse)?
                            .is_to_one(),
                        None => false,
                    };
                    if let (true, Some(new)) = (inverse_is_to_one, new) {
                        self.one_to_one.push(OneToOneChange {
                            relationship: name.clone(),
                            old,
                            new,
                        });
                    }
                }
                RelationshipSide::Right => self.to_one_at_right_side.push(ToOneChange {
                    relationship: name.clone(),
                    old,
                    new,
                }),
            }
        }
        Ok(())
    }
}

/// The old and new value of a to-one relationship, when the request changes it.
fn changed_to_one(
    before: Option<&ResourceSnapshot>,
    after: &ResourceSnapshot,
    relationship: &str,
) -> Option<(Option<ResourceId>, Option<ResourceId>)> {
    let new = after.to_one.get(relationship)?.clone();
    let old = before
        .and_then(|before| before.to_one.get(relationship))
        .cloned()
        .flatten();
    (old != new).then_some((old, new))
}

fn validate_names(
    metadata: &metadata::Metadata,
    resource_type: &str,
    info: &ResourceTypeInfo,
    after: &ResourceSnapshot,
) -> Result<(), Error> {
    for attribute in after.attributes.keys() {
        let attribute_info =
            info.attributes
                .get(attribute)
                .ok_or_else(|| Error::AttributeNotFound {
                    resource_type: resource_type.to_string(),
                    attribute: attribute.clone(),
                })?;
        if attribute_info.is_calculated() {
            return Err(Error::FieldUnavailable {
                resource_type: resource_type.to_string(),
                field: attribute.clone(),
            });
        }
    }
    for relationship in after.to_one.keys() {
        if !metadata
            .lookup_relationship(resource_type, relationship)?
            .is_to_one()
        {
            return Err(Error::ExpectedToOneRelationship {
                resource_type: resource_type.to_string(),
                relationship: relationship.clone(),
            });
        }
    }
    for relationship in after.to_many.keys() {
        if !metadata
            .lookup_relationship(resource_type, relationship)?
            .is_to_many()
        {
            return Err(Error::ExpectedToManyRelationship {
                resource_type: resource_type.to_string(),
                relationship: relationship.clone(),
            });
        }
    }
    Ok(())
}

impl ChangeSet for ResourceChangeDetector {
    fn resource_type(&self) -> &str {
        &self.resource_type
    }

    fn resource_id(&self) -> Option<&ResourceId> {
        self.resource_id.as_ref()
    }

    fn changed_columns(&self) -> &IndexMap<String, sql::ast::ParameterValue> {
        &self.changed_columns
    }

    fn changed_one_to_one_to_not_null(&self) -> &[OneToOneChange] {
        &self.one_to_one
    }

    fn changed_to_one_with_foreign_key_at_right_side(&self) -> &[ToOneChange] {
        &self.to_one_at_right_side
    }

    fn changed_to_many(&self) -> &[ToManyChange] {
        &self.to_many
    }

    fn assert_required_relationships_not_cleared(&self) -> Result<(), Error> {
        match self.cleared_required.first() {
            Some(relationship) => Err(Error::RequiredRelationshipCleared {
                resource_type: self.resource_type.clone(),
                relationship: relationship.clone(),
            }),
            None => Ok(()),
        }
    }
}
