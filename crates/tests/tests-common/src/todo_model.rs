//! A small to-do application: items owned by and assigned to people, tagged with
//! tags that may have a color, and people with an optional login account.

use std::collections::BTreeMap;

use query_engine_metadata::metadata::{
    AttributeInfo, Cardinality, ColumnInfo, ColumnsInfo, EnumType, EnumTypes, ForeignKeyInfo,
    Metadata, Nullable, RelationshipInfo, RelationshipSide, ResourceTypeInfo, ResourceTypes,
    ScalarType,
};

fn column(name: &str, r#type: ScalarType, nullable: Nullable) -> (String, ColumnInfo) {
    (name.to_string(), ColumnInfo { r#type, nullable })
}

fn attribute(name: &str, column: &str) -> (String, AttributeInfo) {
    (
        name.to_string(),
        AttributeInfo {
            column: Some(column.to_string()),
            enum_type: None,
        },
    )
}

fn relationship(
    name: &str,
    target: &str,
    cardinality: Cardinality,
    owned_by: RelationshipSide,
    foreign_key: &str,
    inverse: &str,
) -> (String, RelationshipInfo) {
    (
        name.to_string(),
        RelationshipInfo {
            target: target.to_string(),
            cardinality,
            foreign_key: ForeignKeyInfo {
                owned_by,
                column: foreign_key.to_string(),
            },
            inverse: Some(inverse.to_string()),
        },
    )
}

fn todo_items() -> ResourceTypeInfo {
    ResourceTypeInfo {
        table_name: "TodoItems".to_string(),
        id_column: "Id".to_string(),
        columns: ColumnsInfo(BTreeMap::from([
            column("Id", ScalarType::Bigint, Nullable::NonNullable),
            column(
                "CreatedAt",
                ScalarType::TimestampWithTimeZone,
                Nullable::NonNullable,
            ),
            column("Description", ScalarType::Text, Nullable::NonNullable),
            column("DurationInHours", ScalarType::Bigint, Nullable::Nullable),
            column(
                "LastModifiedAt",
                ScalarType::TimestampWithTimeZone,
                Nullable::Nullable,
            ),
            column("Priority", ScalarType::Integer, Nullable::NonNullable),
            column("OwnerId", ScalarType::Bigint, Nullable::NonNullable),
            column("AssigneeId", ScalarType::Bigint, Nullable::Nullable),
        ])),
        attributes: BTreeMap::from([
            attribute("description", "Description"),
            (
                "priority".to_string(),
                AttributeInfo {
                    column: Some("Priority".to_string()),
                    enum_type: Some("TodoItemPriority".to_string()),
                },
            ),
            attribute("durationInHours", "DurationInHours"),
            attribute("createdAt", "CreatedAt"),
            attribute("lastModifiedAt", "LastModifiedAt"),
        ]),
        relationships: BTreeMap::from([
            relationship(
                "owner",
                "people",
                Cardinality::One,
                RelationshipSide::Left,
                "OwnerId",
                "ownedTodoItems",
            ),
            relationship(
                "assignee",
                "people",
                Cardinality::One,
                RelationshipSide::Left,
                "AssigneeId",
                "assignedTodoItems",
            ),
            relationship(
                "tags",
                "tags",
                Cardinality::Many,
                RelationshipSide::Right,
                "TodoItemId",
                "todoItem",
            ),
        ]),
    }
}

fn people() -> ResourceTypeInfo {
    ResourceTypeInfo {
        table_name: "People".to_string(),
        id_column: "Id".to_string(),
        columns: ColumnsInfo(BTreeMap::from([
            column("Id", ScalarType::Bigint, Nullable::NonNullable),
            column("FirstName", ScalarType::Text, Nullable::Nullable),
            column("LastName", ScalarType::Text, Nullable::NonNullable),
            column("AccountId", ScalarType::Bigint, Nullable::Nullable),
        ])),
        attributes: BTreeMap::from([
            attribute("firstName", "FirstName"),
            attribute("lastName", "LastName"),
            (
                "displayName".to_string(),
                AttributeInfo {
                    column: None,
                    enum_type: None,
                },
            ),
        ]),
        relationships: BTreeMap::from([
            relationship(
                "ownedTodoItems",
                "todoItems",
                Cardinality::Many,
                RelationshipSide::Right,
                "OwnerId",
                "owner",
            ),
            relationship(
                "assignedTodoItems",
                "todoItems",
                Cardinality::Many,
                RelationshipSide::Right,
                "AssigneeId",
                "assignee",
            ),
            relationship(
                "account",
                "accounts",
                Cardinality::One,
                RelationshipSide::Left,
                "AccountId",
                "person",
            ),
        ]),
    }
}

fn tags() -> ResourceTypeInfo {
    ResourceTypeInfo {
        table_name: "Tags".to_string(),
        id_column: "Id".to_string(),
        columns: ColumnsInfo(BTreeMap::from([
            column("Id", ScalarType::Bigint, Nullable::NonNullable),
            column("Name", ScalarType::Text, Nullable::NonNullable),
            column("TodoItemId", ScalarType::Bigint, Nullable::Nullable),
        ])),
        attributes: BTreeMap::from([attribute("name", "Name")]),
        relationships: BTreeMap::from([
            relationship(
                "todoItem",
                "todoItems",
                Cardinality::One,
                RelationshipSide::Left,
                "TodoItemId",
                "tags",
            ),
            relationship(
                "color",
                "rgbColors",
                Cardinality::One,
                RelationshipSide::Right,
                "TagId",
                "tag",
            ),
        ]),
    }
}

fn rgb_colors() -> ResourceTypeInfo {
    ResourceTypeInfo {
        table_name: "RgbColors".to_string(),
        id_column: "Id".to_string(),
        columns: ColumnsInfo(BTreeMap::from([
            column("Id", ScalarType::Bigint, Nullable::NonNullable),
            column("TagId", ScalarType::Bigint, Nullable::NonNullable),
        ])),
        attributes: BTreeMap::new(),
        relationships: BTreeMap::from([relationship(
            "tag",
            "tags",
            Cardinality::One,
            RelationshipSide::Left,
            "TagId",
            "color",
        )]),
    }
}

fn accounts() -> ResourceTypeInfo {
    ResourceTypeInfo {
        table_name: "LoginAccounts".to_string(),
        id_column: "Id".to_string(),
        columns: ColumnsInfo(BTreeMap::from([
            column("Id", ScalarType::Bigint, Nullable::NonNullable),
            column("UserName", ScalarType::Text, Nullable::NonNullable),
        ])),
        attributes: BTreeMap::from([attribute("userName", "UserName")]),
        relationships: BTreeMap::from([relationship(
            "person",
            "people",
            Cardinality::One,
            RelationshipSide::Right,
            "AccountId",
            "account",
        )]),
    }
}

/// The metadata of the to-do application.
pub fn metadata() -> Metadata {
    Metadata {
        resource_types: ResourceTypes(BTreeMap::from([
            ("todoItems".to_string(), todo_items()),
            ("people".to_string(), people()),
            ("tags".to_string(), tags()),
            ("rgbColors".to_string(), rgb_colors()),
            ("accounts".to_string(), accounts()),
        ])),
        enum_types: EnumTypes(BTreeMap::from([(
            "TodoItemPriority".to_string(),
            EnumType(BTreeMap::from([
                ("High".to_string(), 0),
                ("Medium".to_string(), 1),
                ("Low".to_string(), 2),
            ])),
        )])),
    }
}
