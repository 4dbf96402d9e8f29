//! Metadata information regarding the resource graph and the database tables backing it.

pub mod data_model;
pub mod database;
pub mod resources;

// re-export without modules
pub use data_model::{ColumnMappings, DataModelService, ForeignKey, ResourceField};
pub use database::*;
pub use resources::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Metadata information.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub resource_types: ResourceTypes,
    #[serde(default)]
    pub enum_types: EnumTypes,
}

impl Metadata {
    pub fn empty() -> Self {
        Metadata {
            resource_types: ResourceTypes::empty(),
            enum_types: EnumTypes::default(),
        }
    }
}
