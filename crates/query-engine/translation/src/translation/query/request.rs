//! The query expression tree a read request is made of.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use query_engine_sql::sql::ast::TextMatchKind;

/// A read request for resources of one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub resource_type: String,
    #[serde(flatten)]
    pub layer: QueryLayer,
}

/// What to fetch for one resource type: the primary resources of a request, or the
/// resources reached through a relationship.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterExpression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<SortElement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    /// Absent means all attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<Selection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<IncludeElement>,
}

/// The attributes and relationships to return.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub relationships: IndexMap<String, QueryLayer>,
}

/// A relationship to include, with the relationships to include from there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludeElement {
    pub relationship: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<IncludeElement>,
}

/// A path from a resource to one of its fields: zero or more to-one relationships
/// followed by an attribute name, or `id`.
pub type FieldChain = Vec<String>;

/// A path from a resource to a relationship: zero or more to-one relationships
/// followed by the relationship itself.
pub type RelationshipChain = Vec<String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FilterExpression {
    Comparison {
        operator: ComparisonOperator,
        left: QueryExpression,
        right: QueryExpression,
    },
    And {
        terms: Vec<FilterExpression>,
    },
    Or {
        terms: Vec<FilterExpression>,
    },
    Not {
        expression: Box<FilterExpression>,
    },
    #[serde(rename_all = "camelCase")]
    TextMatch {
        field: FieldChain,
        text: String,
        match_kind: TextMatchKind,
    },
    /// The field equals one of the values.
    Any {
        field: FieldChain,
        values: Vec<serde_json::Value>,
    },
    /// At least one related resource exists, optionally matching a filter.
    Has {
        relationship: RelationshipChain,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<Box<FilterExpression>>,
    },
    /// Narrowing to a derived resource type.
    #[serde(rename_all = "camelCase")]
    IsType {
        #[serde(default)]
        relationship: RelationshipChain,
        derived_type: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonOperator {
    Equals,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QueryExpression {
    Field { path: FieldChain },
    Constant { value: serde_json::Value },
    Null,
    /// The number of resources a to-many relationship points to.
    Count { relationship: RelationshipChain },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortElement {
    pub target: SortTarget,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SortTarget {
    Field { path: FieldChain },
    Count { relationship: RelationshipChain },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// A page of results. Pages are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default = "first_page")]
    pub page_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

fn first_page() -> u32 {
    1
}

impl QueryLayer {
    /// The relationships to fetch from this layer: the selected ones first, then the
    /// included ones. An included relationship that is also selected has its nested
    /// includes merged into the selected layer.
    pub fn relationships(&self) -> IndexMap<String, QueryLayer> {
        let mut relationships = self
            .selection
            .as_ref()
            .map(|selection| selection.relationships.clone())
            .unwrap_or_default();

        for element in &self.include {
            let layer = relationships
                .entry(element.relationship.clone())
                .or_default();
            for child in &element.children {
                if !layer.include.contains(child) {
                    layer.include.push(child.clone());
                }
            }
        }

        relationships
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_deserialize_from_camel_case_json() {
        let request: QueryRequest = serde_json::from_value(serde_json::json!({
            "resourceType": "todoItems",
            "filter": {
                "type": "and",
                "terms": [
                    {
                        "type": "comparison",
                        "operator": "equals",
                        "left": { "type": "field", "path": ["priority"] },
                        "right": { "type": "constant", "value": "Medium" }
                    },
                    {
                        "type": "textMatch",
                        "field": ["owner", "lastName"],
                        "text": "Smith",
                        "matchKind": "startsWith"
                    }
                ]
            },
            "sort": [{ "target": { "type": "count", "relationship": ["tags"] }, "direction": "descending" }],
            "pagination": { "pageNumber": 2 },
            "include": [{ "relationship": "owner" }]
        }))
        .unwrap();

        assert_eq!(request.resource_type, "todoItems");
        assert_eq!(
            request.layer.pagination,
            Some(Pagination {
                page_number: 2,
                page_size: None
            })
        );
        assert_eq!(
            request.layer.sort,
            Some(vec![SortElement {
                target: SortTarget::Count {
                    relationship: vec!["tags".to_string()]
                },
                direction: SortDirection::Descending,
            }])
        );
        assert!(matches!(
            request.layer.filter,
            Some(FilterExpression::And { ref terms }) if terms.len() == 2
        ));
    }

    #[test]
    fn includes_merge_into_selected_relationships() {
        let layer = QueryLayer {
            selection: Some(Selection {
                attributes: vec![],
                relationships: IndexMap::from([("owner".to_string(), QueryLayer::default())]),
            }),
            include: vec![
                IncludeElement {
                    relationship: "tags".to_string(),
                    children: vec![],
                },
                IncludeElement {
                    relationship: "owner".to_string(),
                    children: vec![IncludeElement {
                        relationship: "account".to_string(),
                        children: vec![],
                    }],
                },
            ],
            ..QueryLayer::default()
        };

        let relationships = layer.relationships();

        assert_eq!(
            relationships.keys().collect::<Vec<_>>(),
            vec!["owner", "tags"]
        );
        assert_eq!(relationships["owner"].include.len(), 1);
    }
}
