use crate::{
    classify::classify,
    verifier::{InvokeError, ToolRun},
};
use axum::{
    body::Body,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use gpu_attest_models::attest::AttestResponse;
use serde_json::Value;
use tracing::error;

/// The result of attesting, ready to be turned into a response.
#[derive(Debug)]
pub struct AttestationOutcome {
    /// The verifier's combined output.
    pub output: String,

    /// Set if the verifier failed to run or exited abnormally.
    pub process_error: Option<InvokeError>,

    /// Whether the output contains the success marker.
    pub success: bool,

    /// The entity attestation token found in the output, if any.
    pub token: Option<Value>,
}

impl AttestationOutcome {
    /// Build the outcome for a verifier run.
    pub fn from_run(run: ToolRun, success_marker: &str) -> Self {
        let ToolRun { output, error } = run;
        let classification = classify(&output, success_marker);
        Self { output, process_error: error, success: classification.success, token: classification.token }
    }

    /// The status code for this outcome. Process failures take precedence over the output's contents.
    pub fn status(&self) -> StatusCode {
        if self.process_error.is_some() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else if self.success {
            StatusCode::OK
        } else {
            StatusCode::BAD_REQUEST
        }
    }

    /// Build the status code and response envelope for this outcome.
    pub fn into_envelope(self) -> (StatusCode, AttestResponse) {
        let status = self.status();
        let token = match self.process_error {
            Some(_) => None,
            None => self.token,
        };
        (status, AttestResponse { attestation_output: self.output, entity_attestation_token: token })
    }
}

/// A JSON response pretty printed using two space indentation.
pub struct PrettyJson<T>(pub StatusCode, pub T);

impl IntoResponse for PrettyJson<AttestResponse> {
    fn into_response(self) -> Response {
        let PrettyJson(status, envelope) = self;
        let body = match serde_json::to_string_pretty(&envelope) {
            Ok(mut body) => {
                body.push('\n');
                Body::from(body)
            }
            Err(e) => {
                error!("Error encoding JSON response: {e}");
                Body::empty()
            }
        };
        (status, [(CONTENT_TYPE, "application/json")], body).into_response()
    }
}

impl From<AttestationOutcome> for PrettyJson<AttestResponse> {
    fn from(outcome: AttestationOutcome) -> Self {
        let (status, envelope) = outcome.into_envelope();
        Self(status, envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    const SUCCESS: &str = "GPU Attestation is Successful";
    const TOKEN_OUTPUT: &str = "GPU Attestation is Successful\nEntity Attestation Token:\n{\"k\":\"v\"}\n";

    fn run(output: &str, error: Option<InvokeError>) -> ToolRun {
        ToolRun { output: output.into(), error }
    }

    #[rstest]
    #[case::success(run(TOKEN_OUTPUT, None), StatusCode::OK, Some(json!({"k": "v"})))]
    #[case::no_marker(run("Entity Attestation Token:\n[1]", None), StatusCode::BAD_REQUEST, Some(json!([1])))]
    #[case::no_marker_no_token(run("failed", None), StatusCode::BAD_REQUEST, None)]
    #[case::exit_failure(
        run(TOKEN_OUTPUT, Some(InvokeError::Exit { code: Some(1) })),
        StatusCode::INTERNAL_SERVER_ERROR,
        None
    )]
    #[case::signal(run("", Some(InvokeError::Exit { code: None })), StatusCode::INTERNAL_SERVER_ERROR, None)]
    #[case::launch_failure(
        run("", Some(InvokeError::Launch(std::io::ErrorKind::NotFound.into()))),
        StatusCode::INTERNAL_SERVER_ERROR,
        None
    )]
    fn status_mapping(#[case] run: ToolRun, #[case] status: StatusCode, #[case] token: Option<Value>) {
        let output = run.output.clone();
        let (actual_status, envelope) = AttestationOutcome::from_run(run, SUCCESS).into_envelope();
        assert_eq!(actual_status, status);
        assert_eq!(envelope, AttestResponse { attestation_output: output, entity_attestation_token: token });
    }

    #[tokio::test]
    async fn pretty_printed_body() {
        let outcome = AttestationOutcome::from_run(run("boom", None), SUCCESS);
        let response = PrettyJson::from(outcome).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let expected = "{\n  \"attestation_output\": \"boom\",\n  \"entity_attestation_token\": null\n}\n";
        assert_eq!(body, expected);
    }
}
