//! Run JMeter test plans and watch them while they execute.
//!
//! A [prelude::TelemetryFacade] owns the project's single [prelude::RunLifecycle]. Callers start a
//! run through it and then poll [prelude::TelemetryFacade::snapshot] on an interval. Every poll
//! re-reads the run's results and log files from scratch.

mod command;
mod error;
mod jmeter_binary;
mod layout;
mod lifecycle;
mod monitor;
mod process;
mod progress;
mod request;
mod shutdown;
mod telemetry;

pub mod prelude {
    pub use crate::command::{EngineCommand, UNBOUNDED_LIFETIME_SECS, UNBOUNDED_LOOP_COUNT};
    pub use crate::error::{LifecycleError, LifecycleResult, LAUNCH_REMEDIATION};
    pub use crate::jmeter_binary::{jmeter_path, JAWA_JMETER_PATH_ENV};
    pub use crate::layout::{ProjectLayout, RUN_TOKEN_FORMAT};
    pub use crate::lifecycle::{RunLifecycle, RunState};
    pub use crate::monitor::{start_monitor, HIGH_CPU_USAGE_PERCENT};
    pub use crate::process::{EngineLauncher, EngineProcess, JMeterLauncher, ProcessStatus};
    pub use crate::progress::start_progress;
    pub use crate::request::{parse_override, RunRequest, DEFAULT_HEAP};
    pub use crate::shutdown::{start_shutdown_listener, ShutdownHandle, ShutdownListener};
    pub use crate::telemetry::TelemetryFacade;
}
