use std::collections::HashMap;

use tracing::debug;

use crate::customers::repo_types::{Customer, CustomerFilter};
use crate::error::{ApiError, ApiResult};
use crate::pagination::Page;
use crate::state::AppState;
use crate::users::services::require_admin;

/// Filtered customer listing for administrators.
pub async fn list(
    st: &AppState,
    username: &str,
    params: &HashMap<String, String>,
) -> ApiResult<Page<Customer>> {
    require_admin(st, username).await?;
    let filter = CustomerFilter::from_params(params, st.config.page_size)?;
    let data = st.customers.find_all_with_filter(&filter).await?;
    let total = st.customers.count().await?;
    debug!(page = filter.page, rows = data.len(), total, "customers listed");
    Ok(Page { data, total })
}

pub async fn get(st: &AppState, username: &str, id: i64) -> ApiResult<Customer> {
    require_admin(st, username).await?;
    st.customers
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Không tìm thấy khách hàng".into()))
}
