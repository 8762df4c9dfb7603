use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::infra::http::error::ApiError;
use crate::infra::http::middleware::CurrentUser;
use crate::infra::http::models::{LinkDto, LoginSettingsDto, LoginSettingsForm};
use crate::infra::http::state::AppState;

#[derive(Debug, Serialize)]
pub struct ServiceDescriptionDto {
    pub name: &'static str,
    pub version: &'static str,
    pub links: Vec<LinkDto>,
}

pub async fn describe() -> impl IntoResponse {
    Json(ServiceDescriptionDto {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        links: vec![
            LinkDto {
                rel: "post-collection",
                href: "/v1/posts/".to_string(),
            },
            LinkDto {
                rel: "auth",
                href: "/v1/user/authenticate/".to_string(),
            },
            LinkDto {
                rel: "user",
                href: "/v1/user/".to_string(),
            },
        ],
    })
}

pub async fn admin_settings(State(state): State<AppState>) -> Json<LoginSettingsDto> {
    Json(LoginSettingsDto::from(state.settings.load()))
}

pub async fn update_admin_settings(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(form): Json<LoginSettingsForm>,
) -> Result<StatusCode, ApiError> {
    state.settings.update(&admin, form.into())?;
    Ok(StatusCode::NO_CONTENT)
}
