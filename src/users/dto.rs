use bytes::Bytes;
use serde::Serialize;
use time::OffsetDateTime;

use crate::customers::repo_types::{Customer, CustomerProfile};
use crate::users::repo_types::UserRole;

/// Public part of the user returned to the client. Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>, // presigned url
    pub user_role: UserRole,
    pub confirmed: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
}

pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: String,
    pub body: Bytes,
}

/// Multipart form of `POST /users/profile/update`. Absent or blank fields are left unchanged.
#[derive(Default)]
pub struct UpdateProfileForm {
    pub email: Option<String>,
    pub password: Option<String>,
    pub profile: CustomerProfile,
    pub file: Option<UploadedFile>,
}
