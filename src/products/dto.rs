use rust_decimal::Decimal;
use serde::Deserialize;
use time::Date;

use crate::entity::dmy_date;
use crate::products::repo_types::ProductData;
use crate::validation::Violations;

pub const NAME_MAX: usize = 255;
pub const IMAGE_MAX: usize = 300;

/// Body of product create and update. Every field is optional on the wire so
/// that validation can report all missing ones together.
#[derive(Debug, Default, Deserialize)]
pub struct ProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image: Option<String>,
    #[serde(default, with = "dmy_date::option")]
    pub expiry_date: Option<Date>,
    pub unit_id: Option<i64>,
    pub category_id: Option<i64>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

impl ProductRequest {
    pub fn validate(&self) -> Violations {
        let mut v = Violations::new();
        match self.name.as_deref().map(str::trim) {
            None | Some("") => v.add("name", "Tên sản phẩm không được để trống"),
            Some(n) if n.chars().count() > NAME_MAX => {
                v.add("name", "Tên sản phẩm tối đa 255 ký tự")
            }
            _ => {}
        }
        if let Some(price) = self.price {
            v.money("price", price);
        }
        v.max_len("image", self.image.as_deref().map(str::trim), IMAGE_MAX);
        if self.expiry_date.is_none() {
            v.add("expiry_date", "Hạn sử dụng không được để trống");
        }
        if self.unit_id.is_none() {
            v.add("unit_id", "Đơn vị tính không được để trống");
        }
        v
    }

    /// Converts a request that passed `validate`. Missing price becomes zero.
    pub fn into_data(self) -> Option<ProductData> {
        let mut tag_ids = self.tag_ids;
        tag_ids.sort_unstable();
        tag_ids.dedup();
        Some(ProductData {
            name: self.name?.trim().to_string(),
            description: self.description.filter(|d| !d.trim().is_empty()),
            price: self.price.unwrap_or(Decimal::ZERO),
            image: self.image.filter(|i| !i.trim().is_empty()),
            expiry_date: self.expiry_date?,
            unit_id: self.unit_id?,
            category_id: self.category_id,
            tag_ids,
        })
    }
}
