use axum::{Json, http::StatusCode, response::IntoResponse};
use gpu_attest_models::about::AboutResponse;

pub(crate) async fn handler() -> impl IntoResponse {
    let about = AboutResponse {
        version: env!("CARGO_PKG_VERSION").into(),
        git_hash: env!("BUILD_GIT_COMMIT_HASH").into(),
        built_at: env!("BUILD_TIMESTAMP").into(),
    };
    (StatusCode::OK, Json(about))
}
