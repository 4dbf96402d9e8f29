//! Translate a read request into the statements answering it.

pub mod fields;
pub mod filtering;
pub mod pagination;
pub mod push_down;
pub mod relationships;
pub mod request;
pub mod root;
pub mod sorting;
pub mod values;

use query_engine_sql::sql;

use super::error::Error;
use super::helpers::{Env, State, ID_FIELD};
use request::{Pagination, QueryRequest, SortDirection, SortElement, SortTarget};

/// Translate a read request into an execution plan.
///
/// Requests without a sort order are sorted by identifier, requests without pagination
/// get the first page of the default size. The count statement is only planned when
/// the configuration asks for total resource counts.
pub fn translate(env: &Env, request: &QueryRequest) -> Result<sql::execution_plan::QueryPlan, Error> {
    let layer = &request.layer;
    let sort = layer.sort.clone().unwrap_or_else(default_sort);
    let page = layer.pagination.unwrap_or(Pagination {
        page_number: 1,
        page_size: None,
    });

    let count = if env.settings().include_total_resource_count {
        Some(root::translate_query(
            env,
            &mut State::new(),
            &request.resource_type,
            layer.filter.as_ref(),
            root::SelectionShape::Count,
        )?)
    } else {
        None
    };

    let mut state = State::new();
    let table = env.make_table(&request.resource_type, state.make_table_alias())?;
    let data = root::translate_page(env, &mut state, table, layer, &sort, page)?;

    tracing::info!("SQL AST: {:?}", data);

    Ok(sql::execution_plan::QueryPlan {
        resource_type: request.resource_type.clone(),
        count,
        data,
    })
}

fn default_sort() -> Vec<SortElement> {
    vec![SortElement {
        target: SortTarget::Field {
            path: vec![ID_FIELD.to_string()],
        },
        direction: SortDirection::Ascending,
    }]
}
