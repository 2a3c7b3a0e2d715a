use anyhow::Context;
use tracing::{debug, info, warn};

use crate::auth::password::hash_password;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::storage::{avatar_key, ext_from_mime, AVATAR_URL_TTL_SECS};
use crate::users::dto::{UpdateProfileForm, UserSummary};
use crate::users::repo_types::User;
use crate::validation::Violations;

pub const USER_NOT_FOUND: &str = "Không tìm thấy người dùng";
pub const ACCESS_DENIED: &str = "Không có quyền truy cập";

pub async fn find_user(st: &AppState, username: &str) -> ApiResult<User> {
    st.users
        .find_by_username(username)
        .await?
        .ok_or_else(|| ApiError::NotFound(USER_NOT_FOUND.into()))
}

pub async fn require_admin(st: &AppState, username: &str) -> ApiResult<User> {
    let user = find_user(st, username).await?;
    if !user.is_admin() {
        warn!(username = %username, "admin route denied");
        return Err(ApiError::AccessDenied(ACCESS_DENIED.into()));
    }
    Ok(user)
}

/// Shapes a user for the client: avatar becomes a presigned url, customer data is attached.
pub async fn summarize(st: &AppState, user: User) -> ApiResult<UserSummary> {
    let avatar = match &user.avatar {
        Some(key) => match st.storage.presign_get(key, AVATAR_URL_TTL_SECS).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, key = %key, "presign avatar failed");
                None
            }
        },
        None => None,
    };
    let customer = st.customers.find_by_user(user.id()).await?;

    Ok(UserSummary {
        id: user.id(),
        username: user.username,
        email: user.email,
        avatar,
        user_role: user.user_role,
        confirmed: user.confirmed,
        last_login: user.last_login,
        created_at: user.base.created_at,
        customer,
    })
}

pub async fn get_profile(st: &AppState, username: &str) -> ApiResult<UserSummary> {
    let user = find_user(st, username).await?;
    summarize(st, user).await
}

pub async fn update_profile(
    st: &AppState,
    username: &str,
    form: UpdateProfileForm,
) -> ApiResult<UserSummary> {
    let mut user = find_user(st, username).await?;

    let mut v = Violations::new();
    let email = form.email.map(|e| e.trim().to_lowercase());
    if let Some(e) = &email {
        v.email(e);
        if !v.has("email") && *e != user.email {
            if let Some(other) = st.users.find_by_email(e).await? {
                if other.id() != user.id() {
                    v.add("email", "Email đã được sử dụng");
                }
            }
        }
    }
    if let Some(p) = &form.password {
        v.password(p);
    }
    v.profile(&form.profile);
    let mut upload = None;
    if let Some(file) = form.file {
        match ext_from_mime(&file.content_type) {
            _ if file.body.is_empty() => v.add("file", "Tệp tải lên rỗng"),
            Some(ext) => upload = Some((file, ext)),
            None => v.add("file", "Chỉ chấp nhận ảnh jpeg, png, webp hoặc heic"),
        }
    }
    ApiError::check(v.into_vec())?;

    if let Some(e) = email {
        user.email = e;
    }
    if let Some(p) = &form.password {
        user.password_hash = hash_password(p)?;
    }
    let mut uploaded = None;
    if let Some((file, ext)) = upload {
        let key = avatar_key(user.id(), ext);
        st.storage
            .put_object(&key, file.body, &file.content_type)
            .await
            .with_context(|| format!("put_object {}", key))?;
        debug!(key = %key, file_name = ?file.file_name, "avatar uploaded");
        uploaded = Some(key);
    }
    let replaced_avatar = match &uploaded {
        Some(key) => user.avatar.replace(key.clone()),
        None => None,
    };

    let profile = Some(form.profile).filter(|p| !p.is_empty());
    let user = match st.users.update(&user, profile).await {
        Ok(user) => user,
        Err(e) => {
            // the new object is unreferenced once the row write fails
            if let Some(key) = &uploaded {
                if let Err(del) = st.storage.delete_object(key).await {
                    warn!(error = %del, key = %key, "delete orphaned avatar failed");
                }
            }
            return Err(e.into());
        }
    };

    if let Some(old) = replaced_avatar {
        if let Err(e) = st.storage.delete_object(&old).await {
            warn!(error = %e, key = %old, "delete old avatar failed");
        }
    }

    info!(user_id = user.id(), username = %user.username, "profile updated");
    summarize(st, user).await
}

/// Deletes the caller's account; the store cascades to orders, details, invoices and
/// the customer row. The avatar object is removed best-effort.
pub async fn delete_profile(st: &AppState, username: &str) -> ApiResult<()> {
    let user = find_user(st, username).await?;
    st.users.delete(user.id()).await?;

    if let Some(key) = &user.avatar {
        if let Err(e) = st.storage.delete_object(key).await {
            warn!(error = %e, key = %key, "delete avatar failed");
        }
    }
    info!(user_id = user.id(), username = %user.username, "user deleted");
    Ok(())
}
