use axum::{Extension, Json, response::IntoResponse};

use crate::context::CurrentUser;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn me(Extension(user): Extension<CurrentUser>) -> impl IntoResponse {
    Json(serde_json::json!({
        "user_id": user.user_id().to_string(),
        "email": user.email(),
        "roles": user.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "permissions": user.permissions().iter().map(|p| p.as_str()).collect::<Vec<_>>(),
    }))
}
