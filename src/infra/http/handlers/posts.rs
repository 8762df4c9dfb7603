use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header::LOCATION};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::application::repos::ListWindow;
use crate::cache::CachedBody;
use crate::infra::http::error::ApiError;
use crate::infra::http::middleware::{ClientAddress, CurrentUser};
use crate::infra::http::models::{
    CommentDto, CommentForm, PostCollectionDto, PostDto, PostForm, post_href,
};
use crate::infra::http::state::AppState;

use super::{parse_id, reuse_cached};

const POST_NOT_FOUND: &str = "Post not found";

#[derive(Debug, Deserialize)]
pub struct PostListQuery {
    pub start: Option<usize>,
    pub count: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PostSearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn list_posts(
    State(state): State<AppState>,
    cached: Option<Extension<CachedBody>>,
    Query(query): Query<PostListQuery>,
) -> Result<Response, ApiError> {
    if cached.is_some() {
        return Ok(reuse_cached());
    }

    let posts = state
        .posts
        .list(ListWindow {
            start: query.start,
            count: query.count,
        })
        .await?;
    Ok(Json(PostCollectionDto::from_records(&posts)).into_response())
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(form): Json<PostForm>,
) -> Result<Response, ApiError> {
    let post = state
        .posts
        .create(&user, form.into(), OffsetDateTime::now_utc())
        .await?;

    let mut response = (StatusCode::CREATED, Json(PostDto::from(&post))).into_response();
    if let Ok(location) = HeaderValue::from_str(&post_href(post.id)) {
        response.headers_mut().insert(LOCATION, location);
    }
    Ok(response)
}

pub async fn search_posts(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    cached: Option<Extension<CachedBody>>,
    Query(query): Query<PostSearchQuery>,
) -> Result<Response, ApiError> {
    if cached.is_some() {
        return Ok(reuse_cached());
    }

    let posts = state.posts.search(&user, &query.q).await?;
    Ok(Json(PostCollectionDto::from_records(&posts)).into_response())
}

pub async fn get_post(
    State(state): State<AppState>,
    cached: Option<Extension<CachedBody>>,
    Path(post_id): Path<String>,
) -> Result<Response, ApiError> {
    if cached.is_some() {
        return Ok(reuse_cached());
    }

    let id = parse_id(&post_id, POST_NOT_FOUND)?;
    let post = state.posts.get(id).await?;
    Ok(Json(PostDto::from(&post)).into_response())
}

pub async fn update_post(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(post_id): Path<String>,
    Json(form): Json<PostForm>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&post_id, POST_NOT_FOUND)?;
    state
        .posts
        .update(&user, id, form.into(), OffsetDateTime::now_utc())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_post(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(post_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&post_id, POST_NOT_FOUND)?;
    state.posts.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn comment_post(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(post_id): Path<String>,
    Json(form): Json<CommentForm>,
) -> Result<Response, ApiError> {
    let id = parse_id(&post_id, POST_NOT_FOUND)?;
    let comment = state
        .posts
        .comment(&user, id, &form.content, OffsetDateTime::now_utc())
        .await?;
    Ok((StatusCode::CREATED, Json(CommentDto::from(&comment))).into_response())
}

pub async fn like_post(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(post_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&post_id, POST_NOT_FOUND)?;
    state.posts.like(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn view_post(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientAddress(address)): Extension<ClientAddress>,
    Path(post_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&post_id, POST_NOT_FOUND)?;
    state.posts.view(&user, id, &address).await?;
    Ok(StatusCode::NO_CONTENT)
}
