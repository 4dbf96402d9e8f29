//! Translate a page request into LIMIT and OFFSET.

use query_engine_sql::sql;

use super::super::error::Error;
use super::super::helpers::{Env, State};
use super::request::Pagination;

/// Pages are numbered from 1. Without a page size the configured default is used, and
/// a page size may not exceed the configured maximum.
pub fn translate_pagination(
    env: &Env,
    state: &mut State,
    pagination: Pagination,
) -> Result<sql::ast::Limit, Error> {
    if pagination.page_number == 0 {
        return Err(Error::InvalidPageNumber(pagination.page_number));
    }

    let settings = env.settings();
    let page_size = pagination
        .page_size
        .unwrap_or(settings.default_page_size);
    let maximum = settings.max_page_size.unwrap_or(u32::MAX);
    if page_size == 0 || page_size > maximum {
        return Err(Error::InvalidPageSize {
            requested: page_size,
            maximum,
        });
    }

    let limit = state.make_parameter(sql::ast::ParameterValue::Int(i64::from(page_size)));
    let offset = if pagination.page_number > 1 {
        let offset = i64::from(pagination.page_number - 1) * i64::from(page_size);
        Some(state.make_parameter(sql::ast::ParameterValue::Int(offset)))
    } else {
        None
    };

    Ok(sql::ast::Limit { limit, offset })
}
