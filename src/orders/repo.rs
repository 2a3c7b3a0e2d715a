use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::orders::repo_types::{Invoice, NewOrder, Order, OrderDetails, OrderStatus};

const ORDER_COLUMNS: &str = "id, active, created_at, updated_at, order_number, order_type, \
                             order_status, expected_delivery, user_id, delivery_schedule_id";
const DETAILS_COLUMNS: &str =
    "id, active, created_at, updated_at, order_id, product_id, quantity, unit_price";
const INVOICE_COLUMNS: &str =
    "id, active, created_at, updated_at, order_id, user_id, total_amount, paid";

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts the order, its details and its invoice in one transaction.
    async fn create(&self, order: NewOrder) -> anyhow::Result<Order>;
    async fn find_by_order_number(&self, order_number: &str) -> anyhow::Result<Option<Order>>;
    async fn find_details(&self, order_id: i64) -> anyhow::Result<Vec<OrderDetails>>;
    async fn find_invoice(&self, order_id: i64) -> anyhow::Result<Option<Invoice>>;
    async fn list_by_user(&self, user_id: i64, limit: i64, offset: i64) -> anyhow::Result<Vec<Order>>;
    /// Moves the order from `from` to `to`. `None` when the order is no longer in `from`.
    async fn update_status(
        &self,
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
    ) -> anyhow::Result<Option<Order>>;
    /// Removes the order together with its details and invoice.
    async fn delete(&self, order_id: i64) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create(&self, new: NewOrder) -> anyhow::Result<Order> {
        let total = new.total();
        let mut tx = self.pool.begin().await.context("begin tx")?;

        let sql = format!(
            r#"
            INSERT INTO orders (order_number, order_type, expected_delivery, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(&new.order_number)
            .bind(new.order_type)
            .bind(new.expected_delivery)
            .bind(new.user_id)
            .fetch_one(&mut *tx)
            .await
            .context("insert order")?;

        for line in &new.lines {
            sqlx::query(
                r#"
                INSERT INTO order_details (order_id, product_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(order.base.id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .execute(&mut *tx)
            .await
            .context("insert order details")?;
        }

        sqlx::query("INSERT INTO invoice (order_id, user_id, total_amount) VALUES ($1, $2, $3)")
            .bind(order.base.id)
            .bind(new.user_id)
            .bind(total)
            .execute(&mut *tx)
            .await
            .context("insert invoice")?;

        tx.commit().await.context("commit tx")?;
        Ok(order)
    }

    async fn find_by_order_number(&self, order_number: &str) -> anyhow::Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await
            .context("find order by number")?;
        Ok(order)
    }

    async fn find_details(&self, order_id: i64) -> anyhow::Result<Vec<OrderDetails>> {
        let sql = format!("SELECT {DETAILS_COLUMNS} FROM order_details WHERE order_id = $1 ORDER BY id");
        let rows = sqlx::query_as::<_, OrderDetails>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await
            .context("list order details")?;
        Ok(rows)
    }

    async fn find_invoice(&self, order_id: i64) -> anyhow::Result<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoice WHERE order_id = $1");
        let row = sqlx::query_as::<_, Invoice>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .context("find invoice")?;
        Ok(row)
    }

    async fn list_by_user(&self, user_id: i64, limit: i64, offset: i64) -> anyhow::Result<Vec<Order>> {
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS}
              FROM orders
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query_as::<_, Order>(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("list orders by user")?;
        Ok(rows)
    }

    async fn update_status(
        &self,
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
    ) -> anyhow::Result<Option<Order>> {
        let sql = format!(
            r#"
            UPDATE orders SET order_status = $2, updated_at = now()
             WHERE id = $1 AND order_status = $3
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .bind(to)
            .bind(from)
            .fetch_optional(&self.pool)
            .await
            .context("update order status")?;
        Ok(order)
    }

    async fn delete(&self, order_id: i64) -> anyhow::Result<()> {
        let res = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id)
            .execute(&self.pool)
            .await
            .context("delete order")?;
        if res.rows_affected() == 0 {
            return Err(anyhow::Error::from(sqlx::Error::RowNotFound).context("delete order"));
        }
        Ok(())
    }
}
