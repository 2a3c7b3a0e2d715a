use time::OffsetDateTime;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::orders::dto::{OrderView, PlaceOrderRequest};
use crate::orders::repo_types::{NewOrder, NewOrderLine, Order, OrderStatus};
use crate::pagination::Pagination;
use crate::state::AppState;
use crate::users::repo_types::User;
use crate::users::services::{find_user, ACCESS_DENIED};
use crate::validation::Violations;

pub const ORDER_NOT_FOUND: &str = "Không tìm thấy đơn hàng";

async fn view(st: &AppState, order: Order) -> ApiResult<OrderView> {
    let details = st.orders.find_details(order.base.id).await?;
    let invoice = st.orders.find_invoice(order.base.id).await?;
    Ok(OrderView {
        order,
        details,
        invoice,
    })
}

/// Loads an order the caller may act on: their own, or any order for an admin.
async fn load_owned(st: &AppState, user: &User, order_number: &str) -> ApiResult<Order> {
    let order = st
        .orders
        .find_by_order_number(order_number)
        .await?
        .ok_or_else(|| ApiError::NotFound(ORDER_NOT_FOUND.into()))?;
    if order.user_id != user.id() && !user.is_admin() {
        warn!(user_id = user.id(), order_number, "order access denied");
        return Err(ApiError::AccessDenied(ACCESS_DENIED.into()));
    }
    Ok(order)
}

/// Places an order with prices snapshotted from the products. Details and the
/// invoice are written together with the order.
pub async fn place(st: &AppState, username: &str, req: PlaceOrderRequest) -> ApiResult<OrderView> {
    let user = find_user(st, username).await?;

    let mut v = Violations::new();
    if req.details.is_empty() {
        v.add("details", "Đơn hàng phải có ít nhất một sản phẩm");
    }
    for (i, line) in req.details.iter().enumerate() {
        if line.quantity <= 0 {
            v.add(&format!("details[{i}].quantity"), "Số lượng phải lớn hơn 0");
        }
    }
    if let Some(d) = req.expected_delivery {
        if d < OffsetDateTime::now_utc().date() {
            v.add("expected_delivery", "Ngày giao hàng không được ở quá khứ");
        }
    }
    ApiError::check(v.into_vec())?;

    let mut new = NewOrder::new(
        user.id(),
        req.order_type.unwrap_or_default(),
        req.expected_delivery,
    );
    for line in req.details {
        let product = st
            .products
            .find_by_id(line.product_id)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("Không tìm thấy sản phẩm {}", line.product_id))
            })?;
        new.lines.push(NewOrderLine {
            product_id: product.base.id,
            quantity: line.quantity,
            unit_price: product.price,
        });
    }

    let total = new.total();
    let order = st.orders.create(new).await?;
    info!(user_id = user.id(), order_number = %order.order_number, %total, "order placed");
    view(st, order).await
}

pub async fn list(st: &AppState, username: &str, p: &Pagination) -> ApiResult<Vec<Order>> {
    let user = find_user(st, username).await?;
    let (limit, offset) = p.clamped();
    Ok(st.orders.list_by_user(user.id(), limit, offset).await?)
}

pub async fn get(st: &AppState, username: &str, order_number: &str) -> ApiResult<OrderView> {
    let user = find_user(st, username).await?;
    let order = load_owned(st, &user, order_number).await?;
    view(st, order).await
}

pub async fn update_status(
    st: &AppState,
    username: &str,
    order_number: &str,
    next: OrderStatus,
) -> ApiResult<OrderView> {
    let user = find_user(st, username).await?;
    let order = load_owned(st, &user, order_number).await?;
    let current = order.order_status;
    let refused = || {
        ApiError::IllegalState(format!(
            "Không thể chuyển trạng thái từ {} sang {}",
            current.as_str(),
            next.as_str()
        ))
    };
    if !current.can_transition_to(next) {
        return Err(refused());
    }
    // another request may have moved the order since it was read
    let order = st
        .orders
        .update_status(order.base.id, current, next)
        .await?
        .ok_or_else(refused)?;
    info!(order_number = %order.order_number, status = next.as_str(), "order status changed");
    view(st, order).await
}

pub async fn delete(st: &AppState, username: &str, order_number: &str) -> ApiResult<()> {
    let user = find_user(st, username).await?;
    let order = load_owned(st, &user, order_number).await?;
    st.orders.delete(order.base.id).await?;
    info!(order_number = %order.order_number, user_id = user.id(), "order deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use time::macros::date;

    use super::*;
    use crate::auth::services::register;
    use crate::products::repo_types::{Product, ProductData};
    use crate::testing::{FakeStorage, MemoryStore};
    use crate::users::repo_types::UserRole;

    async fn setup() -> (AppState, Arc<MemoryStore>, Product) {
        let store = Arc::new(MemoryStore::default());
        let st = AppState::with_store(store.clone(), Arc::new(FakeStorage::default()));
        for name in ["alice", "bob", "root"] {
            let req = serde_json::from_str(&format!(
                r#"{{"username":"{name}","password":"p@ss1234","email":"{name}@x.com"}}"#
            ))
            .unwrap();
            register(&st, req).await.unwrap();
        }
        store.set_role("root", UserRole::Admin);

        let unit = store.add_unit("kg");
        let product = st
            .products
            .save(ProductData {
                name: "Rice".into(),
                description: None,
                price: Decimal::new(2550, 2),
                image: None,
                expiry_date: date!(2030 - 06 - 01),
                unit_id: unit,
                category_id: None,
                tag_ids: vec![],
            })
            .await
            .unwrap();
        (st, store, product)
    }

    fn order_req(json: &str) -> PlaceOrderRequest {
        serde_json::from_str(json).unwrap()
    }

    async fn place_one(st: &AppState, username: &str, product_id: i64) -> OrderView {
        place(
            st,
            username,
            order_req(&format!(r#"{{"details":[{{"product_id":{product_id},"quantity":2}}]}}"#)),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn place_snapshots_price_and_creates_invoice() {
        let (st, _, product) = setup().await;
        let view = place_one(&st, "alice", product.base.id).await;
        assert_eq!(view.order.order_status, OrderStatus::Pending);
        assert_eq!(view.details.len(), 1);
        assert_eq!(view.details[0].unit_price, product.price);
        let invoice = view.invoice.unwrap();
        assert_eq!(invoice.total_amount, Decimal::new(5100, 2));
        assert!(!invoice.paid);
    }

    #[tokio::test]
    async fn place_rejects_bad_lines_and_past_dates() {
        let (st, _, product) = setup().await;
        let err = place(
            &st,
            "alice",
            order_req(&format!(
                r#"{{"expected_delivery":"01-01-2000","details":[{{"product_id":{},"quantity":0}}]}}"#,
                product.base.id
            )),
        )
        .await
        .unwrap_err();
        match err {
            ApiError::Validation(errors) => {
                let fields: Vec<_> = errors.into_iter().filter_map(|e| e.field).collect();
                assert_eq!(fields, vec!["details[0].quantity", "expected_delivery"]);
            }
            other => panic!("unexpected {other:?}"),
        }

        let err = place(&st, "alice", order_req("{}")).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn place_with_unknown_product_is_not_found() {
        let (st, store, _) = setup().await;
        let err = place(
            &st,
            "alice",
            order_req(r#"{"details":[{"product_id":9999,"quantity":1}]}"#),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(store.invoice_count(), 0);
    }

    #[tokio::test]
    async fn only_owner_or_admin_sees_an_order() {
        let (st, _, product) = setup().await;
        let number = place_one(&st, "alice", product.base.id).await.order.order_number;

        assert!(get(&st, "alice", &number).await.is_ok());
        assert!(get(&st, "root", &number).await.is_ok());
        assert!(matches!(
            get(&st, "bob", &number).await.unwrap_err(),
            ApiError::AccessDenied(_)
        ));
        assert!(matches!(
            get(&st, "alice", "missing").await.unwrap_err(),
            ApiError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn status_follows_transition_table() {
        let (st, _, product) = setup().await;
        let number = place_one(&st, "alice", product.base.id).await.order.order_number;

        let err = update_status(&st, "alice", &number, OrderStatus::Delivered)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::IllegalState(_)));

        for next in [OrderStatus::Confirmed, OrderStatus::Shipped, OrderStatus::Delivered] {
            let view = update_status(&st, "alice", &number, next).await.unwrap();
            assert_eq!(view.order.order_status, next);
        }
        assert!(update_status(&st, "alice", &number, OrderStatus::Cancelled)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn status_write_requires_the_status_that_was_read() {
        let (st, _, product) = setup().await;
        let placed = place_one(&st, "alice", product.base.id).await.order;

        let moved = st
            .orders
            .update_status(placed.base.id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(moved.map(|o| o.order_status), Some(OrderStatus::Cancelled));

        // a second writer still holding PENDING loses
        let stale = st
            .orders
            .update_status(placed.base.id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert!(stale.is_none());
        let stored = st.orders.find_by_order_number(&placed.order_number).await.unwrap().unwrap();
        assert_eq!(stored.order_status, OrderStatus::Cancelled);

        let err = update_status(&st, "alice", &placed.order_number, OrderStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::IllegalState(_)));
    }

    #[tokio::test]
    async fn list_is_scoped_and_delete_cascades() {
        let (st, store, product) = setup().await;
        let first = place_one(&st, "alice", product.base.id).await.order.order_number;
        place_one(&st, "alice", product.base.id).await;
        place_one(&st, "bob", product.base.id).await;

        let mine = list(&st, "alice", &Pagination { limit: 20, offset: 0 }).await.unwrap();
        assert_eq!(mine.len(), 2);
        let one = list(&st, "alice", &Pagination { limit: 1, offset: 1 }).await.unwrap();
        assert_eq!(one.len(), 1);

        assert!(matches!(
            delete(&st, "bob", &first).await.unwrap_err(),
            ApiError::AccessDenied(_)
        ));
        delete(&st, "alice", &first).await.unwrap();
        assert_eq!(store.detail_count(), 2);
        assert_eq!(store.invoice_count(), 2);
        assert!(st.products.find_by_id(product.base.id).await.unwrap().is_some());
    }
}
