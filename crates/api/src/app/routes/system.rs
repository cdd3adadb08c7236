use axum::{Extension, Json, http::StatusCode, response::IntoResponse};

pub async fn health() -> axum::response::Response {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response()
}

pub async fn whoami(
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> axum::response::Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "user_id": principal.user_id().to_string(),
            "role": principal.role().as_str(),
        })),
    )
        .into_response()
}
