use axum::extract::FromRef;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::auth::dto::{LoginRequest, RegisterRequest};
use crate::auth::jwt::JwtKeys;
use crate::auth::password::{hash_password, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::users::dto::UserSummary;
use crate::users::repo_types::{NewUser, UserRole};
use crate::users::services::summarize;

/// Same text for unknown user and wrong password.
pub const INVALID_CREDENTIALS: &str = "Tài khoản hoặc mật khẩu không đúng";
pub const CONFIRM_FAILED: &str = "Xác nhận tài khoản không thành công";

/// Checks the credentials, signs a token and records the login time.
pub async fn authenticate(st: &AppState, req: LoginRequest) -> ApiResult<String> {
    ApiError::check(req.validate().into_vec())?;
    let username = req.username.trim();

    let user = st.users.find_by_username(username).await?;
    let verified = match &user {
        Some(u) => verify_password(&req.password, &u.password_hash),
        None => false,
    };
    let user = match user {
        Some(u) if verified => u,
        _ => {
            warn!(username = %username, "login rejected");
            return Err(ApiError::IllegalArgument(INVALID_CREDENTIALS.into()));
        }
    };

    let token = JwtKeys::from_ref(st).sign(&user.username)?;
    st.users
        .update_last_login(&user.username, OffsetDateTime::now_utc())
        .await?;

    info!(user_id = user.id(), username = %user.username, "user logged in");
    Ok(token)
}

/// Creates an unconfirmed account; customers also get their customer row.
pub async fn register(st: &AppState, mut req: RegisterRequest) -> ApiResult<UserSummary> {
    req.normalize();
    let mut v = req.validate();
    if !v.has("username") && st.users.find_by_username(&req.username).await?.is_some() {
        v.add("username", "Tên đăng nhập đã tồn tại");
    }
    if !v.has("email") && st.users.find_by_email(&req.email).await?.is_some() {
        v.add("email", "Email đã được sử dụng");
    }
    if !v.is_empty() {
        warn!(username = %req.username, "registration rejected");
    }
    ApiError::check(v.into_vec())?;

    let password_hash = hash_password(&req.password)?;
    let user_role = req.user_role.unwrap_or_default();
    let profile = (user_role == UserRole::Customer).then_some(req.profile);

    let user = st
        .users
        .create(
            NewUser {
                username: req.username,
                email: req.email,
                password_hash,
                user_role,
            },
            profile,
        )
        .await?;

    info!(user_id = user.id(), username = %user.username, "user registered");
    summarize(st, user).await
}

/// Flips the account to confirmed. False when the user is unknown or already confirmed.
pub async fn confirm(st: &AppState, username: &str) -> ApiResult<bool> {
    let Some(user) = st.users.find_by_username(username).await? else {
        return Ok(false);
    };
    let confirmed = st.users.confirm(user.id()).await?;
    if confirmed {
        info!(user_id = user.id(), "user confirmed");
    }
    Ok(confirmed)
}
