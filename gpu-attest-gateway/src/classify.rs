use serde_json::Value;

/// The line after which the verifier prints the entity attestation token.
pub const TOKEN_MARKER: &str = "Entity Attestation Token:";

/// What the verifier's output says about the attestation.
#[derive(Debug, PartialEq)]
pub struct Classification {
    /// Whether the success marker was found anywhere in the output.
    pub success: bool,

    /// The entity attestation token, if one was printed and it is valid JSON.
    pub token: Option<Value>,
}

/// Classify the combined output of a verifier run.
pub fn classify(output: &str, success_marker: &str) -> Classification {
    let success = output.contains(success_marker);
    let token = extract_token(output);
    Classification { success, token }
}

/// Extract the JSON document that follows the first line containing [`TOKEN_MARKER`].
///
/// Everything after that line is treated as the document. Only the first marker is considered.
pub fn extract_token(output: &str) -> Option<Value> {
    let mut offset = 0;
    for line in output.split_inclusive('\n') {
        offset += line.len();
        if line.contains(TOKEN_MARKER) {
            let candidate = output[offset..].trim();
            return serde_json::from_str(candidate).ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    const SUCCESS: &str = "GPU Attestation is Successful";

    const SAMPLE_OUTPUT: &str = r#"Number of GPUs available : 1
Fetching GPU 0 information from GPU driver.
	Driver version fetched : 550.90.07
	VBIOS version fetched : 96.00.9f.00.04
All GPU Evidences fetched successfully
-----------------------------------
Verifying GPU: GPU-1c3a4b9e
	Driver version fetched from the attestation report : 550.90.07
	GPU Attestation is Successful.
	GPU 0 verified successfully.
GPU Attested Successfully

Entity Attestation Token:
[
  [
    "JWT",
    "eyJhbGciOiJIUzI1NiJ9.e30.c2lnbmF0dXJl"
  ],
  {
    "GPU-0": "eyJhbGciOiJIUzI1NiJ9.e30.c2lnbmF0dXJl"
  }
]
"#;

    #[test]
    fn full_output() {
        let classification = classify(SAMPLE_OUTPUT, SUCCESS);
        let jwt = "eyJhbGciOiJIUzI1NiJ9.e30.c2lnbmF0dXJl";
        let expected = json!([["JWT", jwt], {"GPU-0": jwt}]);
        assert_eq!(classification, Classification { success: true, token: Some(expected) });
    }

    #[test]
    fn classification_is_stable() {
        assert_eq!(classify(SAMPLE_OUTPUT, SUCCESS), classify(SAMPLE_OUTPUT, SUCCESS));
    }

    #[rstest]
    #[case::simple_object("Entity Attestation Token:\n{\"k\":\"v\"}", Some(json!({"k": "v"})))]
    #[case::marker_mid_line("prefix Entity Attestation Token: suffix\n  {\"k\":1}  \n", Some(json!({"k": 1})))]
    #[case::scalar("Entity Attestation Token:\n42", Some(json!(42)))]
    #[case::not_json("Entity Attestation Token:\nnot a token", None)]
    #[case::trailing_garbage("Entity Attestation Token:\n{\"k\":\"v\"}\ndone", None)]
    #[case::marker_on_last_line("foo\nEntity Attestation Token:", None)]
    #[case::no_marker("{\"k\":\"v\"}", None)]
    #[case::empty("", None)]
    #[case::same_line_json_ignored("Entity Attestation Token: {\"k\":\"v\"}", None)]
    #[case::first_marker_only("Entity Attestation Token:\nbad\nEntity Attestation Token:\n{}", None)]
    #[case::crlf("Entity Attestation Token:\r\n{\"k\":\"v\"}\r\n", Some(json!({"k": "v"})))]
    fn token_extraction(#[case] output: &str, #[case] expected: Option<Value>) {
        assert_eq!(extract_token(output), expected);
    }

    #[rstest]
    #[case::present("xx GPU Attestation is Successful yy", true)]
    #[case::case_sensitive("gpu attestation is successful", false)]
    #[case::spans_lines("GPU Attestation\nis Successful", false)]
    #[case::absent("GPU Attestation failed", false)]
    fn success_marker(#[case] output: &str, #[case] success: bool) {
        assert_eq!(classify(output, SUCCESS).success, success);
    }

    #[test]
    fn token_independent_of_success() {
        let classification = classify("Entity Attestation Token:\n{\"k\":\"v\"}", SUCCESS);
        assert!(!classification.success);
        assert_eq!(classification.token, Some(json!({"k": "v"})));
    }
}
