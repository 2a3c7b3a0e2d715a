use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use time::Date;

use crate::entity::{dmy_date, BaseEntity};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Tag {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: BaseEntity,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Unit {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: BaseEntity,
    pub name: String,
    pub abbreviation: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: BaseEntity,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: BaseEntity,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub image: Option<String>,
    #[serde(with = "dmy_date")]
    pub expiry_date: Date,
    pub unit_id: i64,
    pub category_id: Option<i64>,
    #[sqlx(skip)]
    pub tags: Vec<Tag>,
}

/// Join row used to attach tags to a page of products.
#[derive(Debug, FromRow)]
pub struct ProductTagRow {
    pub product_id: i64,
    #[sqlx(flatten)]
    pub tag: Tag,
}

/// Validated product columns, used for both insert and full update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductData {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub image: Option<String>,
    pub expiry_date: Date,
    pub unit_id: i64,
    pub category_id: Option<i64>,
    pub tag_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductFilter {
    pub name: Option<String>,
    pub category_id: Option<i64>,
    pub from_price: Option<Decimal>,
    pub to_price: Option<Decimal>,
    pub page: i64,
    pub page_size: i64,
}

impl ProductFilter {
    pub fn from_params(params: &HashMap<String, String>, page_size: i64) -> ApiResult<Self> {
        fn parse<T: std::str::FromStr>(
            params: &HashMap<String, String>,
            key: &str,
        ) -> ApiResult<Option<T>> {
            match params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
                Some(v) => v
                    .parse::<T>()
                    .map(Some)
                    .map_err(|_| ApiError::IllegalArgument(format!("Giá trị không hợp lệ cho {key}: {v}"))),
                None => Ok(None),
            }
        }

        let page: i64 = parse(params, "page")?.unwrap_or(1);
        if page < 1 || (page - 1).checked_mul(page_size).is_none() {
            return Err(ApiError::IllegalArgument(format!("Trang không hợp lệ: {page}")));
        }
        Ok(Self {
            name: parse::<String>(params, "name")?,
            category_id: parse(params, "category_id")?,
            from_price: parse(params, "from_price")?,
            to_price: parse(params, "to_price")?,
            page,
            page_size,
        })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}
