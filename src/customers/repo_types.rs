use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::entity::BaseEntity;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Customer {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: BaseEntity,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub user_id: i64,
}

/// Mutable customer fields, as entered at registration or profile update.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CustomerProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl CustomerProfile {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.address.is_none()
            && self.phone.is_none()
    }
}

/// Listing filter built from free-form query parameters. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerFilter {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub page: i64,
    pub page_size: i64,
}

impl CustomerFilter {
    pub fn from_params(params: &HashMap<String, String>, page_size: i64) -> ApiResult<Self> {
        let text = |key: &str| {
            params
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let page = match text("page") {
            Some(p) => p
                .parse::<i64>()
                .ok()
                .filter(|p| *p >= 1 && (p - 1).checked_mul(page_size).is_some())
                .ok_or_else(|| ApiError::IllegalArgument(format!("Trang không hợp lệ: {p}")))?,
            None => 1,
        };
        Ok(Self {
            first_name: text("first_name"),
            last_name: text("last_name"),
            phone: text("phone"),
            address: text("address"),
            page,
            page_size,
        })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}
