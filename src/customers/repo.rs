use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::customers::repo_types::{Customer, CustomerFilter};
use crate::db::contains_pattern;

const CUSTOMER_COLUMNS: &str =
    "id, active, created_at, updated_at, first_name, last_name, address, phone, user_id";

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Customer>>;
    async fn find_by_user(&self, user_id: i64) -> anyhow::Result<Option<Customer>>;
    async fn count(&self) -> anyhow::Result<i64>;
    async fn find_all_with_filter(&self, filter: &CustomerFilter) -> anyhow::Result<Vec<Customer>>;
}

#[derive(Clone)]
pub struct PgCustomerRepository {
    pool: PgPool,
}

impl PgCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerRepository for PgCustomerRepository {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customer WHERE id = $1");
        let row = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("find customer by id")?;
        Ok(row)
    }

    async fn find_by_user(&self, user_id: i64) -> anyhow::Result<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customer WHERE user_id = $1");
        let row = sqlx::query_as::<_, Customer>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("find customer by user")?;
        Ok(row)
    }

    async fn count(&self) -> anyhow::Result<i64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM customer")
            .fetch_one(&self.pool)
            .await
            .context("count customers")?;
        Ok(n)
    }

    async fn find_all_with_filter(&self, f: &CustomerFilter) -> anyhow::Result<Vec<Customer>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer WHERE active = TRUE"
        ));
        if let Some(v) = &f.first_name {
            qb.push(" AND first_name ILIKE ")
                .push_bind(contains_pattern(v))
                .push(r" ESCAPE '\'");
        }
        if let Some(v) = &f.last_name {
            qb.push(" AND last_name ILIKE ")
                .push_bind(contains_pattern(v))
                .push(r" ESCAPE '\'");
        }
        if let Some(v) = &f.address {
            qb.push(" AND address ILIKE ")
                .push_bind(contains_pattern(v))
                .push(r" ESCAPE '\'");
        }
        if let Some(v) = &f.phone {
            qb.push(" AND phone = ").push_bind(v.clone());
        }
        qb.push(" ORDER BY id LIMIT ")
            .push_bind(f.page_size)
            .push(" OFFSET ")
            .push_bind(f.offset());

        let rows = qb
            .build_query_as::<Customer>()
            .fetch_all(&self.pool)
            .await
            .context("list customers")?;
        Ok(rows)
    }
}
