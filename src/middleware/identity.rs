use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use uuid::Uuid;

/// Identity the fronting gateway already verified. The engine performs no
/// credential checks of its own; it only refuses requests the gateway forgot
/// to annotate.
#[derive(Debug, Clone)]
pub struct StudentIdentity {
    pub student_id: Uuid,
    pub role: String,
}

pub async fn require_identity(mut req: Request<Body>, next: Next) -> Response {
    let Some(student_id) = req
        .headers()
        .get("x-student-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
    else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "missing_identity", "message": "X-Student-Id header is required"})),
        )
            .into_response();
    };
    let role = req
        .headers()
        .get("x-role")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("student")
        .to_string();

    req.extensions_mut()
        .insert(StudentIdentity { student_id, role });
    next.run(req).await
}
