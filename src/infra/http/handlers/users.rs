use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use time::OffsetDateTime;

use crate::application::users::{LoginCommand, RegisterCommand};
use crate::cache::CachedBody;
use crate::infra::http::error::ApiError;
use crate::infra::http::middleware::{ClientAddress, CurrentUser};
use crate::infra::http::models::{
    LoginForm, ProfileDto, ProfileForm, RegisterForm, TokenDto,
};
use crate::infra::http::state::AppState;

use super::reuse_cached;

pub async fn authenticate(
    State(state): State<AppState>,
    Extension(ClientAddress(address)): Extension<ClientAddress>,
    Json(form): Json<LoginForm>,
) -> Result<Json<TokenDto>, ApiError> {
    let issued = state
        .users
        .login(
            LoginCommand {
                username: form.username,
                password: form.password,
            },
            &address,
            OffsetDateTime::now_utc(),
        )
        .await?;
    Ok(Json(TokenDto {
        token: issued.token,
    }))
}

pub async fn register(
    State(state): State<AppState>,
    Extension(ClientAddress(address)): Extension<ClientAddress>,
    Json(form): Json<RegisterForm>,
) -> Result<Response, ApiError> {
    let issued = state
        .users
        .register(
            RegisterCommand {
                username: form.username,
                email: form.email,
                full_name: form.full_name,
                password: form.password,
            },
            &address,
            OffsetDateTime::now_utc(),
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(TokenDto {
            token: issued.token,
        }),
    )
        .into_response())
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    cached: Option<Extension<CachedBody>>,
) -> Result<Response, ApiError> {
    if cached.is_some() {
        return Ok(reuse_cached());
    }

    let profile = state.users.profile(&user).await?;
    Ok(Json(ProfileDto::from(&profile)).into_response())
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(form): Json<ProfileForm>,
) -> Result<StatusCode, ApiError> {
    state.users.update_profile(user.id, form.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}
