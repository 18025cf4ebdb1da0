use jawa_summary_model::Termination;
use serde::{Deserialize, Serialize};

use crate::error::{LifecycleError, LifecycleResult};

/// Heap size handed to the JVM when the request doesn't choose one.
pub const DEFAULT_HEAP: &str = "3g";

/// Everything needed to start a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Identifiers of the scenario groups to enable.
    pub scenario_set: Vec<String>,
    /// Name of a directory under `prop/` whose property files are loaded.
    pub environment: String,
    pub users: u64,
    pub ramp_up_secs: u64,
    pub termination: Termination,
    /// Remote engine hosts. Empty runs locally.
    pub remote_hosts: Vec<String>,
    /// Extra properties passed to the plan, in order.
    pub overrides: Vec<(String, String)>,
    pub heap: String,
}

impl RunRequest {
    pub fn new(scenario_set: Vec<String>, environment: impl Into<String>) -> Self {
        Self {
            scenario_set,
            environment: environment.into(),
            users: 1,
            ramp_up_secs: 1,
            termination: Termination::Iterations(1),
            remote_hosts: Vec::new(),
            overrides: Vec::new(),
            heap: DEFAULT_HEAP.to_string(),
        }
    }

    pub fn with_users(mut self, users: u64) -> Self {
        self.users = users;
        self
    }

    pub fn with_ramp_up_secs(mut self, ramp_up_secs: u64) -> Self {
        self.ramp_up_secs = ramp_up_secs;
        self
    }

    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    pub fn with_remote_hosts(mut self, remote_hosts: Vec<String>) -> Self {
        self.remote_hosts = remote_hosts;
        self
    }

    pub fn with_overrides(mut self, overrides: Vec<(String, String)>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_heap(mut self, heap: impl Into<String>) -> Self {
        self.heap = heap.into();
        self
    }

    pub fn validate(&self) -> LifecycleResult<()> {
        if self.scenario_set.iter().all(|s| s.trim().is_empty()) {
            return Err(LifecycleError::InvalidRequest(
                "select at least one scenario group".to_string(),
            ));
        }
        if self.environment.trim().is_empty() {
            return Err(LifecycleError::InvalidRequest(
                "an environment is required".to_string(),
            ));
        }
        if self.users == 0 {
            return Err(LifecycleError::InvalidRequest(
                "at least one user is required".to_string(),
            ));
        }
        if self.heap.trim().is_empty() {
            return Err(LifecycleError::InvalidRequest(
                "heap size must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a `key=value` override. The value may itself contain `=`.
pub fn parse_override(raw: &str) -> anyhow::Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => anyhow::bail!("Expected an override of the form 'key=value', got '{raw}'"),
    }
}
