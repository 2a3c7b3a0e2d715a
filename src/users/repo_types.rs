use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::entity::BaseEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Customer,
    Supplier,
    Distributor,
    Manufacturer,
    Shipper,
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Customer
    }
}

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    #[sqlx(flatten)]
    pub base: BaseEntity,
    pub username: String,
    pub email: String,
    pub password_hash: String, // argon2, never leaves the service layer
    pub avatar: Option<String>, // object storage key
    pub user_role: UserRole,
    pub confirmed: bool,
    pub last_login: Option<OffsetDateTime>,
}

impl User {
    pub fn id(&self) -> i64 {
        self.base.id
    }

    pub fn is_admin(&self) -> bool {
        self.user_role == UserRole::Admin
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub user_role: UserRole,
}
