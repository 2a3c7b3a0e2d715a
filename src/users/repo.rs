use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::customers::repo_types::CustomerProfile;
use crate::users::repo_types::{NewUser, User};

const USER_COLUMNS: &str = "id, active, created_at, updated_at, username, email, password_hash, \
                            avatar, user_role, confirmed, last_login";

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    /// Inserts the user and, when given, its customer profile in one transaction.
    async fn create(&self, user: NewUser, profile: Option<CustomerProfile>) -> anyhow::Result<User>;
    /// Writes the mutable columns (email, password hash, avatar) and, when given,
    /// upserts the customer row with the present profile fields, in one transaction.
    async fn update(&self, user: &User, profile: Option<CustomerProfile>) -> anyhow::Result<User>;
    async fn update_last_login(&self, username: &str, at: OffsetDateTime) -> anyhow::Result<()>;
    /// Returns false when the user was already confirmed.
    async fn confirm(&self, id: i64) -> anyhow::Result<bool>;
    /// Removes the user; orders, order details, invoices and the customer row go with it.
    async fn delete(&self, id: i64) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("find user by username")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("find user by email")?;
        Ok(user)
    }

    async fn create(&self, new: NewUser, profile: Option<CustomerProfile>) -> anyhow::Result<User> {
        let mut tx = self.pool.begin().await.context("begin tx")?;

        let sql = format!(
            r#"
            INSERT INTO users (username, email, password_hash, user_role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&new.username)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(new.user_role)
            .fetch_one(&mut *tx)
            .await
            .context("insert user")?;

        if let Some(p) = profile {
            sqlx::query(
                r#"
                INSERT INTO customer (first_name, last_name, address, phone, user_id)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(p.first_name)
            .bind(p.last_name)
            .bind(p.address)
            .bind(p.phone)
            .bind(user.id())
            .execute(&mut *tx)
            .await
            .context("insert customer")?;
        }

        tx.commit().await.context("commit tx")?;
        Ok(user)
    }

    async fn update(&self, user: &User, profile: Option<CustomerProfile>) -> anyhow::Result<User> {
        let mut tx = self.pool.begin().await.context("begin tx")?;

        let sql = format!(
            r#"
            UPDATE users
               SET email = $2, password_hash = $3, avatar = $4, updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, User>(&sql)
            .bind(user.id())
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.avatar)
            .fetch_one(&mut *tx)
            .await
            .context("update user")?;

        if let Some(p) = profile {
            // absent fields keep their stored value
            sqlx::query(
                r#"
                INSERT INTO customer (first_name, last_name, address, phone, user_id)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (user_id) DO UPDATE
                   SET first_name = COALESCE(EXCLUDED.first_name, customer.first_name),
                       last_name  = COALESCE(EXCLUDED.last_name, customer.last_name),
                       address    = COALESCE(EXCLUDED.address, customer.address),
                       phone      = COALESCE(EXCLUDED.phone, customer.phone),
                       updated_at = now()
                "#,
            )
            .bind(p.first_name)
            .bind(p.last_name)
            .bind(p.address)
            .bind(p.phone)
            .bind(user.id())
            .execute(&mut *tx)
            .await
            .context("upsert customer")?;
        }

        tx.commit().await.context("commit tx")?;
        Ok(updated)
    }

    async fn update_last_login(&self, username: &str, at: OffsetDateTime) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET last_login = $2 WHERE username = $1")
            .bind(username)
            .bind(at)
            .execute(&self.pool)
            .await
            .context("update last_login")?;
        Ok(())
    }

    async fn confirm(&self, id: i64) -> anyhow::Result<bool> {
        let res = sqlx::query(
            "UPDATE users SET confirmed = TRUE, updated_at = now() WHERE id = $1 AND confirmed = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("confirm user")?;
        Ok(res.rows_affected() == 1)
    }

    async fn delete(&self, id: i64) -> anyhow::Result<()> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete user")?;
        if res.rows_affected() == 0 {
            return Err(anyhow::Error::from(sqlx::Error::RowNotFound).context("delete user"));
        }
        Ok(())
    }
}
