use crate::nonce::Nonce;
use async_trait::async_trait;
use std::{io, path::PathBuf, process::Stdio, sync::Arc};
use tokio::{
    process::Command,
    sync::{OwnedSemaphorePermit, Semaphore},
};
use tracing::{Instrument, Span, debug, error, info};

/// The output of a single verifier run.
#[derive(Debug)]
pub struct ToolRun {
    /// The verifier's stdout followed by its stderr.
    pub output: String,

    /// Set if the verifier could not be launched or did not exit cleanly.
    pub error: Option<InvokeError>,
}

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("failed to launch verifier: {0}")]
    Launch(#[from] io::Error),

    #[error("verifier exited with {}", display_code(.code))]
    Exit { code: Option<i32> },

    #[error("verifier run aborted: {0}")]
    Aborted(String),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "a signal".into(),
    }
}

/// An interface to the external tool that performs the attestation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttestationTool: Send + Sync + 'static {
    /// Run the tool once, optionally binding the given nonce into the attestation.
    async fn run(&self, nonce: Option<Nonce>) -> ToolRun;
}

/// Runs the NVIDIA local GPU verifier out of its python virtual environment.
pub struct CommandAttestationTool {
    root: PathBuf,
    elevate: bool,
}

impl CommandAttestationTool {
    /// Construct a tool for the verifier installed at `root`, optionally running it through `sudo`.
    pub fn new(root: PathBuf, elevate: bool) -> Self {
        Self { root, elevate }
    }

    fn command(&self, nonce: Option<&Nonce>) -> Command {
        let python_path = self.root.join("prodtest").join("bin").join("python3");
        let mut command = match self.elevate {
            true => {
                let mut command = Command::new("sudo");
                command.arg(python_path);
                command
            }
            false => Command::new(python_path),
        };
        command.args(["-m", "verifier.cc_admin"]);
        // The nonce has already been validated by this point.
        if let Some(nonce) = nonce {
            command.arg("--nonce").arg(nonce.as_str());
        }
        command.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        command
    }
}

#[async_trait]
impl AttestationTool for CommandAttestationTool {
    async fn run(&self, nonce: Option<Nonce>) -> ToolRun {
        let mut command = self.command(nonce.as_ref());
        debug!("Running verifier: {:?}", command.as_std());
        let output = match command.output().await {
            Ok(output) => output,
            Err(e) => return ToolRun { output: String::new(), error: Some(InvokeError::Launch(e)) },
        };
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        info!(output = combined.as_str(), "GPU attestation command output");

        let error = match output.status.success() {
            true => None,
            false => Some(InvokeError::Exit { code: output.status.code() }),
        };
        ToolRun { output: combined, error }
    }
}

/// The single-slot gate that serializes verifier runs.
#[derive(Clone)]
pub struct AdmissionGate(Arc<Semaphore>);

impl AdmissionGate {
    pub fn new() -> Self {
        Self(Arc::new(Semaphore::new(1)))
    }

    /// Whether no run currently holds the gate.
    pub fn is_open(&self) -> bool {
        self.0.available_permits() == 1
    }

    async fn enter(&self) -> Result<OwnedSemaphorePermit, InvokeError> {
        self.0.clone().acquire_owned().await.map_err(|_| InvokeError::Aborted("admission gate closed".into()))
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Invokes the attestation tool, allowing at most one run at a time across all callers sharing the gate.
pub struct VerifierInvoker {
    tool: Arc<dyn AttestationTool>,
    gate: AdmissionGate,
}

impl VerifierInvoker {
    pub fn new(tool: Arc<dyn AttestationTool>, gate: AdmissionGate) -> Self {
        Self { tool, gate }
    }

    /// Run the tool once the gate is free.
    ///
    /// The run happens on its own task so that dropping the caller, e.g. because the client went away
    /// or a request deadline expired, never interrupts a started run or releases the gate early.
    pub async fn invoke(&self, nonce: Option<Nonce>) -> ToolRun {
        let tool = self.tool.clone();
        let gate = self.gate.clone();
        let task = async move {
            let permit = match gate.enter().await {
                Ok(permit) => permit,
                Err(e) => return ToolRun { output: String::new(), error: Some(e) },
            };
            debug!("Acquired admission gate");
            let run = tool.run(nonce).await;
            drop(permit);
            debug!("Released admission gate");
            run
        };
        match tokio::spawn(task.instrument(Span::current())).await {
            Ok(run) => run,
            Err(e) => {
                error!("Verifier task failed: {e}");
                ToolRun { output: String::new(), error: Some(InvokeError::Aborted(e.to_string())) }
            }
        }
    }
}
