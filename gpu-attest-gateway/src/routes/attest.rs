use crate::{
    nonce::{NONCE_SIZE, Nonce},
    response::{AttestationOutcome, PrettyJson},
    routes::SharedState,
};
use axum::{
    body::{Body, to_bytes},
    extract::Query,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use gpu_attest_models::attest::AttestResponse;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, error, info, warn};

const MAX_BODY_SIZE: usize = 1024 * 1024;

/// A reason to reject a request before the verifier is invoked.
#[derive(Debug, PartialEq)]
enum Rejection {
    BodyRead,
    MethodNotAllowed,
    InvalidNonce,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        match self {
            Self::BodyRead => (StatusCode::BAD_REQUEST, "Failed to read request body").into_response(),
            Self::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response(),
            Self::InvalidNonce => {
                (StatusCode::BAD_REQUEST, "Invalid args: nonce must be a 32-byte hex string").into_response()
            }
        }
    }
}

pub(crate) async fn handler(state: SharedState, method: Method, uri: Uri, body: Body) -> Response {
    let start = Instant::now();
    debug!("Incoming GPU attestation request: {method} {uri}");

    let nonce = match extract_nonce(&method, &uri, body).await.and_then(|nonce| validate_nonce(&nonce)) {
        Ok(nonce) => nonce,
        Err(rejection) => return rejection.into_response(),
    };

    let run = state.verifier.invoke(nonce).await;
    if let Some(e) = &run.error {
        error!("Error executing cc_admin: {e}");
    }
    let outcome = AttestationOutcome::from_run(run, &state.success_marker);
    let response: PrettyJson<AttestResponse> = outcome.into();
    let status = response.0;
    let duration = start.elapsed();
    if status.is_server_error() {
        error!(?duration, status_code = status.as_u16(), "Completed /gpu_attest");
    } else {
        info!(?duration, status_code = status.as_u16(), "Completed /gpu_attest");
    }
    response.into_response()
}

/// Pull the raw nonce out of the query string for GETs or the JSON body for POSTs.
///
/// A missing nonce, or a body that isn't the expected JSON, yields an empty nonce.
async fn extract_nonce(method: &Method, uri: &Uri, body: Body) -> Result<String, Rejection> {
    match *method {
        Method::GET => {
            let params = match Query::<Vec<(String, String)>>::try_from_uri(uri) {
                Ok(Query(params)) => params,
                Err(e) => {
                    debug!("Ignoring unparseable query string: {e}");
                    Vec::new()
                }
            };
            info!(params = ?params, "GET request query");
            let nonce = params.into_iter().find(|(key, _)| key == "nonce").map(|(_, value)| value);
            Ok(nonce.unwrap_or_default())
        }
        Method::POST => {
            let body = match to_bytes(body, MAX_BODY_SIZE).await {
                Ok(body) => body,
                Err(e) => {
                    error!("Failed to read request body: {e}");
                    return Err(Rejection::BodyRead);
                }
            };
            info!(body = %String::from_utf8_lossy(&body), "POST request body");
            Ok(body_nonce(&body))
        }
        _ => {
            warn!("Method not allowed: {method}");
            Err(Rejection::MethodNotAllowed)
        }
    }
}

/// Read the nonce out of a JSON request body.
///
/// The `nonce` key is matched case insensitively and, if it's repeated, the last string value wins. A body that
/// isn't a JSON object or carries a nonce that isn't a string yields an empty nonce.
fn body_nonce(body: &[u8]) -> String {
    let fields = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => {
            debug!("Request body is not a JSON object, ignoring it");
            return String::new();
        }
        Err(e) => {
            debug!("Request body is not valid JSON, ignoring it: {e}");
            return String::new();
        }
    };
    let mut nonce = String::new();
    for (key, value) in fields {
        if !key.eq_ignore_ascii_case("nonce") {
            continue;
        }
        match value {
            Value::String(value) => nonce = value,
            Value::Null => (),
            other => {
                debug!("Ignoring request body with a non string nonce: {other}");
                return String::new();
            }
        }
    }
    nonce
}

fn validate_nonce(nonce: &str) -> Result<Option<Nonce>, Rejection> {
    match Nonce::parse_optional(nonce) {
        Ok(None) => {
            info!("No nonce provided in request");
            Ok(None)
        }
        Ok(Some(nonce)) => {
            info!(%nonce, "Nonce found in request");
            Ok(Some(nonce))
        }
        Err(_) => {
            error!(nonce, "Invalid nonce provided; must be a hex string representing {NONCE_SIZE} bytes");
            Err(Rejection::InvalidNonce)
        }
    }
}
