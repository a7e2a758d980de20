use anyhow::Context;
use serde::Deserialize;
use std::{
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    path::PathBuf,
    time::Duration,
};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub verifier: VerifierConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load the config from the environment and an optional file, applying any overrides on top.
    ///
    /// Values in the file take precedence over `APP__` environment variables.
    pub fn load(path: Option<&str>, overrides: ConfigOverrides) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder().add_source(config::Environment::with_prefix("APP").separator("__"));
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path))
        }
        let ConfigOverrides { log_path, port, socket_path, verifier_root, success_marker } = overrides;
        builder = builder
            .set_override_option("log.path", log_path)?
            .set_override_option("server.port", port.map(i64::from))?
            .set_override_option("server.socket_path", socket_path)?
            .set_override_option("verifier.root", verifier_root)?
            .set_override_option("verifier.success_marker", success_marker)?;
        let settings = builder.build().context("parsing config")?;
        settings.try_deserialize().context("deserializing config")
    }
}

/// Values provided on the command line, which take precedence over any other source.
#[derive(Default)]
pub struct ConfigOverrides {
    pub log_path: Option<String>,
    pub port: Option<u16>,
    pub socket_path: Option<String>,
    pub verifier_root: Option<String>,
    pub success_marker: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    /// The TCP port to listen on, on all interfaces.
    #[serde(default = "default_port")]
    pub port: u16,

    /// The path to the unix socket to listen on.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// The maximum time to wait for a request body.
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub read_timeout: Duration,

    /// The maximum time to produce a response once a request is received.
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub write_timeout: Duration,
}

impl ServerConfig {
    pub fn bind_endpoint(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.port))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            socket_path: default_socket_path(),
            read_timeout: default_timeout(),
            write_timeout: default_timeout(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct VerifierConfig {
    /// The directory where the local GPU verifier is installed.
    #[serde(default = "default_verifier_root")]
    pub root: PathBuf,

    /// The text that the verifier prints when attestation succeeds.
    #[serde(default = "default_success_marker")]
    pub success_marker: String,

    /// Whether to run the verifier through `sudo`.
    #[serde(default = "default_elevate")]
    pub elevate: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self { root: default_verifier_root(), success_marker: default_success_marker(), elevate: default_elevate() }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LogConfig {
    /// Whether to write logs to a file in addition to stderr.
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,

    /// The file logs are written to.
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
}

impl LogConfig {
    pub fn file_path(&self) -> Option<&PathBuf> {
        self.enabled.then_some(&self.path)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { enabled: default_log_enabled(), path: default_log_path() }
    }
}

fn default_port() -> u16 {
    8123
}

fn default_socket_path() -> PathBuf {
    "/var/run/gpu-attestation/gpu-attestation.sock".into()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_verifier_root() -> PathBuf {
    "/usr/local/lib/local_gpu_verifier".into()
}

fn default_success_marker() -> String {
    "GPU Attestation is Successful".into()
}

fn default_elevate() -> bool {
    true
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_path() -> PathBuf {
    "/usr/local/bin/local_gpu_verifier_http_service/attestation_service.log".into()
}
