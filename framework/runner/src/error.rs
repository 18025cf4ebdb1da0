use std::path::PathBuf;

use jawa_plan::PlanError;

/// Remediation shown when the engine binary can't be started.
pub const LAUNCH_REMEDIATION: &str = "Install Apache JMeter and make sure 'jmeter' is on your PATH, or set 'JAWA_JMETER_PATH' to the JMeter launcher script.";

#[derive(thiserror::Error, Debug)]
pub enum LifecycleError {
    #[error("Test plan not found at {}", path.display())]
    PlanNotFound { path: PathBuf },
    #[error("A run is already in progress: {run_id}")]
    ConcurrentRun { run_id: String },
    #[error("Failed to launch JMeter: {reason}. {remediation}")]
    ProcessLaunch { reason: String, remediation: String },
    #[error("Invalid run request: {0}")]
    InvalidRequest(String),
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl LifecycleError {
    /// Stable identifier for the kind of failure.
    pub fn reason_code(&self) -> &'static str {
        match self {
            LifecycleError::PlanNotFound { .. } => "not_found",
            LifecycleError::ConcurrentRun { .. } => "concurrent_run",
            LifecycleError::ProcessLaunch { .. } => "process_launch",
            LifecycleError::InvalidRequest(_) => "invalid_request",
            LifecycleError::Io { .. } => "io",
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        LifecycleError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn launch(reason: impl Into<String>) -> Self {
        LifecycleError::ProcessLaunch {
            reason: reason.into(),
            remediation: LAUNCH_REMEDIATION.to_string(),
        }
    }
}

impl From<PlanError> for LifecycleError {
    fn from(value: PlanError) -> Self {
        match value {
            PlanError::NotFound { path } => LifecycleError::PlanNotFound { path },
            PlanError::Read { path, source } => {
                LifecycleError::io(format!("Failed to read plan {}", path.display()), source)
            }
            PlanError::Write { path, source } => LifecycleError::io(
                format!("Failed to write patched plan {}", path.display()),
                source,
            ),
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
