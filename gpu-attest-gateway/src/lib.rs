//! An HTTP gateway that attests the local GPUs by running the NVIDIA local GPU verifier.
//!
//! The same router is served over TCP and a unix socket, and verifier runs are serialized through a
//! single [`verifier::AdmissionGate`] shared by both.

pub mod classify;
pub mod config;
pub mod logging;
pub mod nonce;
pub mod request_id;
pub mod response;
pub mod routes;
pub mod server;
pub mod verifier;
