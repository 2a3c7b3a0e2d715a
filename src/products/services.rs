use std::collections::HashMap;

use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::products::dto::ProductRequest;
use crate::products::repo_types::{Product, ProductData, ProductFilter};
use crate::state::AppState;
use crate::users::services::require_admin;

pub const PRODUCT_NOT_FOUND: &str = "Không tìm thấy sản phẩm";

pub async fn list(st: &AppState, params: &HashMap<String, String>) -> ApiResult<Vec<Product>> {
    let filter = ProductFilter::from_params(params, st.config.page_size)?;
    Ok(st.products.find_all_with_filter(&filter).await?)
}

pub async fn get(st: &AppState, id: i64) -> ApiResult<Product> {
    st.products
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(PRODUCT_NOT_FOUND.into()))
}

/// Validates the request and checks that the name is free (ignoring `current`)
/// and that every referenced unit, category and tag exists.
async fn checked_data(
    st: &AppState,
    req: ProductRequest,
    current: Option<i64>,
) -> ApiResult<ProductData> {
    let mut v = req.validate();
    if let Some(name) = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        if let Some(other) = st.products.find_by_name(name).await? {
            if Some(other.base.id) != current {
                v.add("name", "Tên sản phẩm đã tồn tại");
            }
        }
    }
    ApiError::check(v.into_vec())?;
    let data = req
        .into_data()
        .ok_or_else(|| ApiError::IllegalArgument("Dữ liệu sản phẩm không hợp lệ".into()))?;

    if st.products.find_unit(data.unit_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Không tìm thấy đơn vị tính {}", data.unit_id)));
    }
    if let Some(category_id) = data.category_id {
        if st.products.find_category(category_id).await?.is_none() {
            return Err(ApiError::NotFound(format!("Không tìm thấy danh mục {category_id}")));
        }
    }
    if !data.tag_ids.is_empty() {
        let found = st.products.find_tags(&data.tag_ids).await?;
        if let Some(missing) = data
            .tag_ids
            .iter()
            .find(|id| !found.iter().any(|t| t.base.id == **id))
        {
            return Err(ApiError::NotFound(format!("Không tìm thấy nhãn {missing}")));
        }
    }
    Ok(data)
}

pub async fn create(st: &AppState, username: &str, req: ProductRequest) -> ApiResult<Product> {
    require_admin(st, username).await?;
    let data = checked_data(st, req, None).await?;
    let product = st.products.save(data).await?;
    info!(product_id = product.base.id, name = %product.name, "product created");
    Ok(product)
}

/// Full replacement of the product columns; the tag set is replaced too.
pub async fn update(
    st: &AppState,
    username: &str,
    id: i64,
    req: ProductRequest,
) -> ApiResult<Product> {
    require_admin(st, username).await?;
    get(st, id).await?;
    let data = checked_data(st, req, Some(id)).await?;
    let product = st.products.update(id, data).await?;
    info!(product_id = id, "product updated");
    Ok(product)
}

/// Removes the product and its tag links. Tags themselves are kept; order lines
/// referencing the product go with it.
pub async fn delete(st: &AppState, username: &str, id: i64) -> ApiResult<()> {
    require_admin(st, username).await?;
    get(st, id).await?;
    st.products.delete(id).await?;
    info!(product_id = id, "product deleted");
    Ok(())
}
