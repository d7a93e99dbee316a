use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::HeaderMap,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;

use shared_database::{collections, AppContext, Filter};
use shared_models::auth::{Role, TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::extractor::bearer_token;
use shared_utils::jwt::validate_token as decode_token;

pub async fn validate_token(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = bearer_token(&headers)?;
    let user = decode_token(token, &ctx.config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

/// Never fails on a bad token; reports `valid: false` instead.
pub async fn verify_token(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let token = bearer_token(&headers)?;
    let valid = decode_token(token, &ctx.config.supabase_jwt_secret).is_ok();

    Ok(Json(json!({ "valid": valid })))
}

/// The caller's identity plus the doctor or patient profile linked to the
/// account, if one has been registered.
#[axum::debug_handler]
pub async fn get_me(
    State(ctx): State<Arc<AppContext>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    debug!("Getting profile for user: {}", user.id);

    let role = user.app_role();
    let collection = match role {
        Role::Doctor => Some(collections::DOCTORS),
        Role::Patient => Some(collections::PATIENTS),
        Role::Admin => None,
    };

    let profile = match collection {
        Some(collection) => ctx
            .store
            .find(collection, &[Filter::eq("user_id", user.id.as_str())], Some(auth.token()))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .into_iter()
            .next(),
        None => None,
    };

    Ok(Json(json!({
        "success": true,
        "data": {
            "user_id": user.id,
            "email": user.email,
            "role": role,
            "profile": profile
        }
    })))
}
