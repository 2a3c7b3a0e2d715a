use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;

use crate::customers::repo_types::CustomerProfile;
use crate::error::MessageResponse;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.]+$").unwrap();
}

pub const USERNAME_MAX: usize = 50;
pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 100;
pub const PHONE_MAX: usize = 15;
pub const EMAIL_MAX: usize = 255;
pub const PERSON_NAME_MAX: usize = 100;
pub const ADDRESS_MAX: usize = 255;
/// `DECIMAL(11, 2)` columns.
pub const MONEY_SCALE: u32 = 2;
pub const MONEY_INTEGER_DIGITS: u32 = 9;

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Collects field errors in the order they are found.
#[derive(Debug, Default)]
pub struct Violations(Vec<MessageResponse>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.0.push(MessageResponse::field(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|m| m.field.as_deref() == Some(field))
    }

    pub fn username(&mut self, username: &str) {
        if username.trim().is_empty() {
            self.add("username", "Tên đăng nhập không được để trống");
        } else if username.chars().count() > USERNAME_MAX {
            self.add("username", "Tên đăng nhập tối đa 50 ký tự");
        } else if !USERNAME_RE.is_match(username) {
            self.add("username", "Tên đăng nhập chỉ gồm chữ, số, dấu chấm và gạch dưới");
        }
    }

    pub fn password(&mut self, password: &str) {
        let len = password.chars().count();
        if password.trim().is_empty() {
            self.add("password", "Mật khẩu không được để trống");
        } else if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
            self.add("password", "Mật khẩu phải từ 8 đến 100 ký tự");
        }
    }

    pub fn email(&mut self, email: &str) {
        if email.trim().is_empty() {
            self.add("email", "Email không được để trống");
        } else if email.chars().count() > EMAIL_MAX {
            self.add("email", "Email tối đa 255 ký tự");
        } else if !is_valid_email(email) {
            self.add("email", "Email không hợp lệ");
        }
    }

    /// Flags `value` when it is longer than `max` characters.
    pub fn max_len(&mut self, field: &str, value: Option<&str>, max: usize) {
        if value.is_some_and(|v| v.chars().count() > max) {
            self.add(field, &format!("Tối đa {max} ký tự"));
        }
    }

    pub fn profile(&mut self, p: &CustomerProfile) {
        self.max_len("first_name", p.first_name.as_deref(), PERSON_NAME_MAX);
        self.max_len("last_name", p.last_name.as_deref(), PERSON_NAME_MAX);
        self.max_len("address", p.address.as_deref(), ADDRESS_MAX);
        self.phone(p.phone.as_deref());
    }

    /// Non-negative amount that fits a `DECIMAL(11, 2)` column.
    pub fn money(&mut self, field: &str, amount: Decimal) {
        let amount = amount.normalize();
        let limit = Decimal::from(10_i64.pow(MONEY_INTEGER_DIGITS));
        if amount < Decimal::ZERO {
            self.add(field, "Giá không được âm");
        } else if amount >= limit {
            self.add(field, "Giá phải nhỏ hơn 1.000.000.000");
        } else if amount.scale() > MONEY_SCALE {
            self.add(field, "Giá tối đa 2 chữ số thập phân");
        }
    }

    pub fn phone(&mut self, phone: Option<&str>) {
        if let Some(p) = phone.filter(|p| !p.is_empty()) {
            if p.len() > PHONE_MAX || !p.chars().all(|c| c.is_ascii_digit() || c == '+') {
                self.add("phone", "Số điện thoại không hợp lệ");
            }
        }
    }

    pub fn into_vec(self) -> Vec<MessageResponse> {
        self.0
    }
}
