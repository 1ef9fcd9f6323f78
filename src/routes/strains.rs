use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};

use super::AppState;
use crate::auth::Claims;
use crate::error::{ApiError, Result};
use crate::models::{NewComment, NewStrain, Strain, StrainList};

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))
}

/// GET /strains - The whole catalog
pub(super) async fn list_strains_handler(State(state): State<AppState>) -> Result<Json<StrainList>> {
    let strains = state.store.list_strains()?;
    tracing::debug!("Listing {} strains", strains.len());
    Ok(Json(StrainList { strains }))
}

/// POST /strains - Add a strain to the catalog
pub(super) async fn create_strain_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: std::result::Result<Json<NewStrain>, JsonRejection>,
) -> Result<(StatusCode, Json<Strain>)> {
    let new = body(payload)?;
    new.validate()?;

    let strain = state
        .store
        .create_strain(&new)?
        .ok_or_else(|| ApiError::invalid("Strain already exists", "name"))?;

    tracing::info!(
        "{} created strain {} ({})",
        claims.user.user_name,
        strain.name,
        strain.id
    );
    Ok((StatusCode::CREATED, Json(strain)))
}

/// POST /strains/:id - Comment on a strain as the caller
///
/// Responds with the strain including the new comment.
pub(super) async fn add_comment_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(strain_id): Path<String>,
    payload: std::result::Result<Json<NewComment>, JsonRejection>,
) -> Result<(StatusCode, Json<Strain>)> {
    let new = body(payload)?;
    let content = new.comment.content.trim();
    if content.is_empty() {
        return Err(ApiError::invalid("Missing field", "content"));
    }

    if state.store.get_strain(&strain_id)?.is_none() {
        return Err(ApiError::NotFound("Strain not found".to_string()));
    }

    let author = &claims.user.user_name;
    let comment = state.store.add_comment(&strain_id, content, author)?;
    tracing::debug!("{} commented on {} ({})", author, strain_id, comment.id);

    let strain = state
        .store
        .get_strain(&strain_id)?
        .ok_or_else(|| ApiError::NotFound("Strain not found".to_string()))?;
    Ok((StatusCode::CREATED, Json(strain)))
}

/// DELETE /strains/:id/:comment_id - Remove one of the caller's comments
pub(super) async fn remove_comment_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((strain_id, comment_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    let strain = state
        .store
        .get_strain(&strain_id)?
        .ok_or_else(|| ApiError::NotFound("Strain not found".to_string()))?;

    let comment = strain
        .comment(&comment_id)
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;

    if comment.author != claims.user.user_name {
        tracing::warn!(
            "{} tried to delete comment {} by {}",
            claims.user.user_name,
            comment_id,
            comment.author
        );
        return Err(ApiError::Forbidden(
            "Only the author can delete a comment".to_string(),
        ));
    }

    state.store.delete_comment(&strain_id, &comment_id)?;
    Ok(StatusCode::NO_CONTENT)
}
