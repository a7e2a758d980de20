use serde::{Deserialize, Serialize};

pub mod attest {
    use super::*;

    /// A request to attest the local GPUs.
    #[derive(Clone, Debug, Default, Deserialize, Serialize)]
    pub struct AttestRequest {
        /// The hex encoded 32 byte nonce to bind into the attestation, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub nonce: Option<String>,
    }

    /// The response to an attestation request.
    #[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
    pub struct AttestResponse {
        /// The verifier's combined stdout and stderr.
        pub attestation_output: String,

        /// The entity attestation token printed by the verifier.
        ///
        /// This is passed through as-is; its schema belongs to the verifier.
        pub entity_attestation_token: Option<serde_json::Value>,
    }
}

pub mod about {
    use super::*;

    /// Information about the running gateway.
    #[derive(Clone, Debug, Deserialize, Serialize)]
    pub struct AboutResponse {
        /// The crate version.
        pub version: String,

        /// The git commit this was built from.
        pub git_hash: String,

        /// The unix timestamp at which this was built.
        pub built_at: String,
    }
}

#[cfg(test)]
mod tests {
    use super::attest::*;
    use serde_json::json;

    #[test]
    fn response_always_has_both_keys() {
        let response = AttestResponse { attestation_output: "out".into(), entity_attestation_token: None };
        let value = serde_json::to_value(&response).expect("serialization failed");
        assert_eq!(value, json!({"attestation_output": "out", "entity_attestation_token": null}));
    }

    #[test]
    fn request_without_nonce() {
        let request: AttestRequest = serde_json::from_str("{}").expect("invalid request");
        assert_eq!(request.nonce, None);
    }
}
