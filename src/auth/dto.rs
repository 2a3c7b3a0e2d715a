use serde::Deserialize;

use crate::customers::repo_types::CustomerProfile;
use crate::users::repo_types::UserRole;
use crate::validation::Violations;

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Violations {
        let mut v = Violations::new();
        if self.username.trim().is_empty() {
            v.add("username", "Tên đăng nhập không được để trống");
        }
        if self.password.is_empty() {
            v.add("password", "Mật khẩu không được để trống");
        }
        v
    }
}

/// Request body for user registration. Missing fields deserialize as blank so
/// that validation can report all of them at once.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub user_role: Option<UserRole>,
    #[serde(flatten)]
    pub profile: CustomerProfile,
}

impl RegisterRequest {
    pub fn normalize(&mut self) {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_lowercase();
    }

    pub fn validate(&self) -> Violations {
        let mut v = Violations::new();
        v.username(&self.username);
        v.password(&self.password);
        v.email(&self.email);
        v.profile(&self.profile);
        if self.user_role == Some(UserRole::Admin) {
            v.add("user_role", "Không thể đăng ký tài khoản quản trị");
        }
        v
    }
}
