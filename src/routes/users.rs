use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::Value;

use super::{blocking, AppState};
use crate::auth::Claims;
use crate::error::{ApiError, Result};
use crate::models::{NewUser, StrainList, User};

const REQUIRED_FIELDS: [&str; 2] = ["userName", "password"];
const STRING_FIELDS: [&str; 4] = ["userName", "password", "firstName", "lastName"];
const TRIMMED_FIELDS: [&str; 2] = ["userName", "password"];

/// (field, min chars, max chars)
const FIELD_SIZES: [(&str, usize, usize); 2] = [("userName", 1, usize::MAX), ("password", 10, 72)];

/// Validate a raw registration body, field by field, in a fixed order
pub fn validate_registration(body: &Value) -> Result<NewUser> {
    let Some(fields) = body.as_object() else {
        return Err(ApiError::BadRequest("Expected a JSON object".to_string()));
    };

    if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !fields.contains_key(**f)) {
        return Err(ApiError::invalid("Missing field", *missing));
    }

    if let Some(wrong) = STRING_FIELDS
        .iter()
        .find(|f| fields.get(**f).is_some_and(|v| !v.is_string()))
    {
        return Err(ApiError::invalid(
            "Incorrect field type: expected string",
            *wrong,
        ));
    }

    let text = |field: &str| {
        fields
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    if let Some(untrimmed) = TRIMMED_FIELDS.iter().find(|f| {
        let value = text(f);
        value.trim() != value
    }) {
        return Err(ApiError::invalid(
            "Cannot start or end with whitespace",
            *untrimmed,
        ));
    }

    for (field, min, max) in FIELD_SIZES {
        let len = text(field).chars().count();
        if len < min {
            return Err(ApiError::invalid(
                format!("Must be at least {} characters long", min),
                field,
            ));
        }
        if len > max {
            return Err(ApiError::invalid(
                format!("Must be at most {} characters long", max),
                field,
            ));
        }
    }

    Ok(NewUser {
        user_name: text("userName"),
        password: text("password"),
        first_name: text("firstName").trim().to_string(),
        last_name: text("lastName").trim().to_string(),
    })
}

/// POST /users - Register a new account
pub(super) async fn register_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<User>)> {
    let Json(body) =
        payload.map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?;
    let new_user = validate_registration(&body)?;

    if state.store.find_user(&new_user.user_name)?.is_some() {
        return Err(ApiError::invalid("Username already taken", "userName"));
    }

    let passwords = state.passwords.clone();
    let password = new_user.password;
    let password_hash = blocking(move || passwords.hash(&password)).await??;

    let user = User {
        user_name: new_user.user_name,
        first_name: new_user.first_name,
        last_name: new_user.last_name,
    };

    // A concurrent registration may have claimed the name since the check above
    let created = state
        .store
        .create_user(&user, &password_hash)?
        .ok_or_else(|| ApiError::invalid("Username already taken", "userName"))?;

    tracing::info!("Registered user {}", created.user_name);
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /users/strains - The caller's cabinet
pub(super) async fn cabinet_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<StrainList>> {
    let strains = state.store.cabinet_strains(&claims.user.user_name)?;
    Ok(Json(StrainList { strains }))
}

/// PUT /users/strains/:id - Add a strain to the caller's cabinet
pub(super) async fn add_to_cabinet_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(strain_id): Path<String>,
) -> Result<StatusCode> {
    if state.store.get_strain(&strain_id)?.is_none() {
        return Err(ApiError::NotFound("Strain not found".to_string()));
    }

    let added = state
        .store
        .add_to_cabinet(&claims.user.user_name, &strain_id)?;
    tracing::debug!(
        "Cabinet add {} for {} (new: {})",
        strain_id,
        claims.user.user_name,
        added
    );

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /users/strains/:id - Remove a strain from the caller's cabinet
pub(super) async fn remove_from_cabinet_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(strain_id): Path<String>,
) -> Result<StatusCode> {
    let removed = state
        .store
        .remove_from_cabinet(&claims.user.user_name, &strain_id)?;
    tracing::debug!(
        "Cabinet remove {} for {} (present: {})",
        strain_id,
        claims.user.user_name,
        removed
    );

    Ok(StatusCode::NO_CONTENT)
}
