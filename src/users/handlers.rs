use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{debug, instrument};

use crate::{
    auth::extractors::AuthUser,
    customers::repo_types::CustomerProfile,
    error::ApiResult,
    state::AppState,
    users::{
        dto::{UpdateProfileForm, UploadedFile, UserSummary},
        services,
    },
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/users/profile", get(get_profile))
        .route("/users/profile/delete", delete(delete_profile))
}

pub fn write_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/users/profile/update", post(update_profile)) // multipart
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
) -> ApiResult<Json<UserSummary>> {
    Ok(Json(services::get_profile(&state, &username).await?))
}

/// POST /users/profile/update (multipart)
/// Text fields: email, password, first_name, last_name, address, phone. File field: file.
#[instrument(skip(state, mp))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    mut mp: Multipart,
) -> ApiResult<Json<UserSummary>> {
    let form = read_form(&mut mp).await?;
    Ok(Json(services::update_profile(&state, &username, form).await?))
}

#[instrument(skip(state))]
pub async fn delete_profile(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
) -> ApiResult<StatusCode> {
    services::delete_profile(&state, &username).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn read_form(mp: &mut Multipart) -> ApiResult<UpdateProfileForm> {
    let mut form = UpdateProfileForm::default();
    let mut profile = CustomerProfile::default();

    while let Some(field) = mp.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field
                .content_type()
                .map(str::to_string)
                .unwrap_or_else(|| "application/octet-stream".into());
            let body = field.bytes().await?;
            // browsers send an empty part when no file was picked
            if body.is_empty() && file_name.as_deref().map_or(true, str::is_empty) {
                continue;
            }
            form.file = Some(UploadedFile {
                file_name,
                content_type,
                body,
            });
            continue;
        }

        let text = field.text().await?;
        if name == "password" {
            // hashed as typed, like at registration
            form.password = Some(text).filter(|v| !v.is_empty());
            continue;
        }
        let value = Some(text.trim().to_string()).filter(|v| !v.is_empty());
        match name.as_str() {
            "email" => form.email = value,
            "first_name" => profile.first_name = value,
            "last_name" => profile.last_name = value,
            "address" => profile.address = value,
            "phone" => profile.phone = value,
            other => debug!(field = %other, "ignoring unknown form field"),
        }
    }

    form.profile = profile;
    Ok(form)
}
