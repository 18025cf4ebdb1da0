use std::collections::HashMap;

use chrono::{DateTime, Utc};
use jawa_plan::{inspect_active_samplers, patch_plan};
use jawa_summary_model::{ResultsSummary, RunArtifacts, RunStatus, RunSummary};

use crate::command::EngineCommand;
use crate::error::{LifecycleError, LifecycleResult};
use crate::layout::ProjectLayout;
use crate::process::{EngineLauncher, EngineProcess, ProcessStatus};
use crate::request::RunRequest;

/// The active, or most recent, run.
#[derive(Debug)]
pub struct RunState {
    pub run_id: String,
    pub status: RunStatus,
    pub request: RunRequest,
    pub artifacts: RunArtifacts,
    pub started_at: DateTime<Utc>,
    /// Labels of the samplers under the selected scenario groups, known before any result
    /// arrives.
    pub expected_labels: Vec<String>,
    pub exit_code: Option<i32>,
    /// The most recent parse that produced any rows.
    pub last_good_snapshot: Option<ResultsSummary>,
    process: Option<Box<dyn EngineProcess>>,
    stop_requested: bool,
}

impl RunState {
    /// Labels to show before any result has been recorded.
    ///
    /// Falls back to the selected scenario groups when the plan has no samplers.
    pub fn placeholder_labels(&self) -> &[String] {
        if self.expected_labels.is_empty() {
            &self.request.scenario_set
        } else {
            &self.expected_labels
        }
    }

    /// Whether the engine process has been observed to exit.
    pub fn process_exited(&self) -> bool {
        self.process.is_none()
    }

    /// Process id of the engine, while it is known to be running.
    pub fn engine_pid(&self) -> Option<u32> {
        self.process.as_ref().map(|p| p.id())
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    fn poll_process(&mut self) {
        let Some(process) = self.process.as_mut() else {
            return;
        };
        match process.status() {
            Ok(ProcessStatus::Running) => {}
            Ok(ProcessStatus::Exited { code }) => {
                log::info!(
                    "Engine for run {} exited with code {}",
                    self.run_id,
                    code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string())
                );
                self.exit_code = code;
                self.process = None;
            }
            Err(e) => {
                log::warn!("Failed to check engine process for run {}: {e}", self.run_id);
            }
        }
    }

    /// Kill the engine and wait for it, if it is still running.
    fn kill_process(&mut self) {
        let Some(mut process) = self.process.take() else {
            return;
        };
        if let Err(e) = process.kill() {
            log::warn!("Failed to kill engine for run {}: {e}", self.run_id);
        }
        // Reap it
        match process.status() {
            Ok(ProcessStatus::Exited { code }) => self.exit_code = code,
            Ok(ProcessStatus::Running) => {
                log::warn!("Engine for run {} is still running after kill", self.run_id)
            }
            Err(e) => log::debug!("Failed to reap engine for run {}: {e}", self.run_id),
        }
    }

    fn derive_status(&self) -> RunStatus {
        if self.process.is_some() && !self.stop_requested {
            RunStatus::Running
        } else if self.last_good_snapshot.is_some() {
            RunStatus::Completed
        } else {
            RunStatus::Processing
        }
    }
}

/// State machine of the one run a project can have in flight.
///
/// ```text
/// Ready -> Running -> Processing -> Completed
///             \-----------------------^
/// ```
///
/// [RunLifecycle::reset] returns to `Ready` from any state.
pub struct RunLifecycle {
    layout: ProjectLayout,
    launcher: Box<dyn EngineLauncher>,
    state: Option<RunState>,
}

impl RunLifecycle {
    pub fn new(layout: ProjectLayout, launcher: Box<dyn EngineLauncher>) -> Self {
        Self {
            layout,
            launcher,
            state: None,
        }
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn state(&self) -> Option<&RunState> {
        self.state.as_ref()
    }

    pub fn status(&self) -> RunStatus {
        self.state
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(RunStatus::Ready)
    }

    /// Patch the plan, launch the engine and move to `Running`.
    ///
    /// Nothing is touched when a run is already in progress. An engine that is still finalizing
    /// a stopped run is killed before the new one launches.
    ///
    /// The patched plan is written next to the source plan before launching and is not rolled
    /// back: if the engine can't be launched, the lifecycle keeps its previous state but the
    /// patched plan holds the new selection.
    pub fn start(&mut self, request: RunRequest) -> LifecycleResult<&RunState> {
        self.refresh();
        if let Some(state) = self.state.as_ref().filter(|s| s.status == RunStatus::Running) {
            return Err(LifecycleError::ConcurrentRun {
                run_id: state.run_id.clone(),
            });
        }
        request.validate()?;

        let plan_path = self.layout.plan_path();
        if !plan_path.is_file() {
            return Err(LifecycleError::PlanNotFound { path: plan_path });
        }

        let patched_plan_path = patch_plan(&plan_path, &request.scenario_set, None)?;
        let expected_labels = match inspect_active_samplers(&patched_plan_path) {
            Ok(samplers) => samplers.into_iter().map(|s| s.name).collect(),
            Err(e) => {
                log::warn!("Failed to list samplers of the patched plan: {e}");
                Vec::new()
            }
        };

        let started_at = Utc::now();
        let run_id = self.layout.unique_run_id(started_at);
        let artifacts = self.layout.artifacts(&run_id, patched_plan_path);
        self.layout
            .create_output_dirs()
            .map_err(|e| LifecycleError::io("Failed to create output directories", e))?;

        let command = EngineCommand::for_run(&request, &self.layout, &artifacts, &run_id)
            .map_err(|e| LifecycleError::io("Failed to list property files", e))?;

        if let Some(previous) = self.state.as_mut().filter(|s| !s.process_exited()) {
            log::warn!(
                "Run {} was still finalizing when run {run_id} started, killing its engine",
                previous.run_id
            );
            previous.kill_process();
        }

        let process = self.launcher.launch(&command)?;

        log::info!(
            "Started run {run_id} with scenario groups [{}] against '{}'",
            request.scenario_set.join(", "),
            request.environment
        );
        Ok(&*self.state.insert(RunState {
            run_id,
            status: RunStatus::Running,
            request,
            artifacts,
            started_at,
            expected_labels,
            exit_code: None,
            last_good_snapshot: None,
            process: Some(process),
            stop_requested: false,
        }))
    }

    /// Remember `summary` as the last good snapshot if it has any rows.
    pub fn record_parse(&mut self, summary: &ResultsSummary) {
        if let Some(state) = self.state.as_mut() {
            if !summary.is_empty() {
                state.last_good_snapshot = Some(summary.clone());
            }
        }
    }

    /// Re-derive the status from the engine process and the parses recorded so far.
    pub fn refresh(&mut self) -> RunStatus {
        let Some(state) = self.state.as_mut() else {
            return RunStatus::Ready;
        };
        state.poll_process();

        let status = state.derive_status();
        if status != state.status {
            log::info!("Run {} is now {status}", state.run_id);
            state.status = status;
        }
        status
    }

    /// Ask the engine to stop without waiting for it.
    ///
    /// Safe to call repeatedly, after the engine exited, or with no run at all.
    pub fn stop(&mut self) {
        let Some(state) = self.state.as_mut() else {
            log::debug!("No run to stop");
            return;
        };

        if let Some(process) = state.process.as_mut() {
            if !state.stop_requested {
                log::info!("Stopping run {}", state.run_id);
            }
            if let Err(e) = process.terminate() {
                log::warn!("Failed to stop engine for run {}: {e}", state.run_id);
            }
        }
        state.stop_requested = true;
        state.status = state.derive_status();
    }

    /// Kill any engine still running and forget the run.
    pub fn reset(&mut self) {
        let Some(mut state) = self.state.take() else {
            return;
        };
        state.kill_process();
        log::info!("Reset run {}", state.run_id);
    }

    /// A history record of the current run.
    pub fn run_summary(&self) -> Option<RunSummary> {
        let state = self.state.as_ref()?;
        Some(RunSummary {
            run_id: state.run_id.clone(),
            plan_name: self
                .layout
                .plan_path()
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            started_at: state.started_at.timestamp(),
            environment: state.request.environment.clone(),
            users: state.request.users,
            ramp_up_secs: state.request.ramp_up_secs,
            termination: state.request.termination,
            scenario_set: state.request.scenario_set.clone(),
            remote_hosts: state.request.remote_hosts.clone(),
            overrides: state
                .request
                .overrides
                .iter()
                .cloned()
                .collect::<HashMap<_, _>>(),
            results_path: state.artifacts.results_path.clone(),
            log_path: state.artifacts.log_path.clone(),
            report_path: state.artifacts.report_path.clone(),
            exit_code: state.exit_code,
            jawa_version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}

impl Drop for RunLifecycle {
    fn drop(&mut self) {
        if self.state.as_ref().is_some_and(|s| !s.process_exited()) {
            log::debug!("Dropping run lifecycle, stopping the engine");
            self.stop();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::process::fake::FakeLauncher;
    use jawa_summary_model::{LabelAggregate, Termination};
    use pretty_assertions::assert_eq;

    pub(crate) const PLAN: &str = r#"<jmeterTestPlan>
  <hashTree>
    <ThreadGroup guiclass="ThreadGroupGui" testclass="ThreadGroup" testname="Checkout" enabled="false">
    </ThreadGroup>
    <hashTree>
      <HTTPSamplerProxy guiclass="HttpTestSampleGui" testclass="HTTPSamplerProxy" testname="Login" enabled="true"/>
      <HTTPSamplerProxy guiclass="HttpTestSampleGui" testclass="HTTPSamplerProxy" testname="Pay" enabled="true"/>
    </hashTree>
    <ThreadGroup guiclass="ThreadGroupGui" testclass="ThreadGroup" testname="Signup" enabled="true">
    </ThreadGroup>
    <hashTree>
      <HTTPSamplerProxy guiclass="HttpTestSampleGui" testclass="HTTPSamplerProxy" testname="Register" enabled="true"/>
    </hashTree>
  </hashTree>
</jmeterTestPlan>
"#;

    pub(crate) fn project(plan: &str) -> (tempfile::TempDir, ProjectLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        std::fs::create_dir_all(layout.plan_path().parent().unwrap()).unwrap();
        std::fs::write(layout.plan_path(), plan).unwrap();
        (dir, layout)
    }

    pub(crate) fn request() -> RunRequest {
        RunRequest::new(vec!["Checkout".to_string()], "dev")
            .with_users(2)
            .with_termination(Termination::Iterations(1))
    }

    pub(crate) fn some_rows() -> ResultsSummary {
        ResultsSummary {
            aggregates: vec![LabelAggregate {
                request_count: 1,
                ..LabelAggregate::placeholder("Login")
            }],
            total_requests: 1,
            ..Default::default()
        }
    }

    #[test]
    fn start_patches_plan_and_launches() {
        let (_dir, layout) = project(PLAN);
        let launcher = FakeLauncher::default();
        let mut lifecycle = RunLifecycle::new(layout.clone(), Box::new(launcher.clone()));
        assert_eq!(RunStatus::Ready, lifecycle.status());

        let state = lifecycle.start(request()).unwrap();
        assert_eq!(RunStatus::Running, state.status);
        assert_eq!(vec!["Login".to_string(), "Pay".to_string()], state.expected_labels);
        assert_eq!(layout.plan_path().with_file_name("main-mod.jmx"), state.artifacts.patched_plan_path);
        assert_eq!(layout.results_path(&state.run_id), state.artifacts.results_path);

        assert!(layout.results_dir().is_dir());
        assert!(layout.logs_dir().is_dir());
        assert_eq!(1, launcher.engine.lock().launched.len());

        // The source plan is untouched
        assert_eq!(PLAN, std::fs::read_to_string(layout.plan_path()).unwrap());
    }

    #[test]
    fn concurrent_start_is_rejected_without_side_effects() {
        let (_dir, layout) = project(PLAN);
        let launcher = FakeLauncher::default();
        let mut lifecycle = RunLifecycle::new(layout.clone(), Box::new(launcher.clone()));
        let run_id = lifecycle.start(request()).unwrap().run_id.clone();
        let patched = std::fs::read_to_string(layout.plan_path().with_file_name("main-mod.jmx")).unwrap();

        let other = RunRequest::new(vec!["Signup".to_string()], "dev");
        let err = lifecycle.start(other).unwrap_err();

        assert_eq!("concurrent_run", err.reason_code());
        assert_eq!(run_id, lifecycle.state().unwrap().run_id);
        assert_eq!(RunStatus::Running, lifecycle.status());
        assert_eq!(1, launcher.engine.lock().launched.len());
        assert_eq!(
            patched,
            std::fs::read_to_string(layout.plan_path().with_file_name("main-mod.jmx")).unwrap()
        );
    }

    #[test]
    fn missing_plan_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut lifecycle = RunLifecycle::new(
            ProjectLayout::new(dir.path()),
            Box::new(FakeLauncher::default()),
        );
        let err = lifecycle.start(request()).unwrap_err();
        assert_eq!("not_found", err.reason_code());
        assert_eq!(RunStatus::Ready, lifecycle.status());
    }

    #[test]
    fn launch_failure_stays_ready() {
        let (_dir, layout) = project(PLAN);
        let launcher = FakeLauncher::default();
        launcher.engine.lock().fail_launch = true;
        let mut lifecycle = RunLifecycle::new(layout, Box::new(launcher));

        let err = lifecycle.start(request()).unwrap_err();
        assert_eq!("process_launch", err.reason_code());
        assert!(matches!(err, LifecycleError::ProcessLaunch { ref remediation, .. } if remediation.contains("JAWA_JMETER_PATH")));
        assert_eq!(RunStatus::Ready, lifecycle.status());
        assert!(lifecycle.state().is_none());
    }

    #[test]
    fn launch_failure_leaves_the_patched_plan_written() {
        let (_dir, layout) = project(PLAN);
        let launcher = FakeLauncher::default();
        launcher.engine.lock().fail_launch = true;
        let mut lifecycle = RunLifecycle::new(layout.clone(), Box::new(launcher));

        lifecycle.start(request()).unwrap_err();

        let patched = std::fs::read_to_string(layout.plan_path().with_file_name("main-mod.jmx")).unwrap();
        assert!(patched.contains(r#"testname="Checkout" enabled="true""#));
        assert!(patched.contains(r#"testname="Signup" enabled="false""#));
        assert_eq!(PLAN, std::fs::read_to_string(layout.plan_path()).unwrap());
    }

    #[test]
    fn labels_come_from_selected_groups_only() {
        let (_dir, layout) = project(PLAN);
        let mut lifecycle = RunLifecycle::new(layout, Box::new(FakeLauncher::default()));

        let state = lifecycle
            .start(RunRequest::new(vec!["Signup".to_string()], "dev"))
            .unwrap();
        assert_eq!(vec!["Register".to_string()], state.expected_labels);
        assert_eq!(&["Register".to_string()], state.placeholder_labels());
    }

    #[test]
    fn stop_without_data_processes_then_completes() {
        let (_dir, layout) = project(PLAN);
        let launcher = FakeLauncher::default();
        let mut lifecycle = RunLifecycle::new(layout, Box::new(launcher.clone()));
        lifecycle.start(request()).unwrap();

        lifecycle.stop();
        assert_eq!(RunStatus::Processing, lifecycle.status());
        assert_eq!(1, launcher.engine.lock().terminated);

        // The engine is still flushing, but a stop was requested
        assert_eq!(RunStatus::Processing, lifecycle.refresh());

        lifecycle.stop();
        assert_eq!(RunStatus::Processing, lifecycle.status());

        launcher.exit(Some(143));
        lifecycle.record_parse(&some_rows());
        assert_eq!(RunStatus::Completed, lifecycle.refresh());
        assert_eq!(Some(143), lifecycle.state().unwrap().exit_code);

        // Nothing left to signal
        lifecycle.stop();
        assert_eq!(2, launcher.engine.lock().terminated);
        assert_eq!(RunStatus::Completed, lifecycle.status());
    }

    #[test]
    fn exit_with_data_completes_even_with_failure_code() {
        let (_dir, layout) = project(PLAN);
        let launcher = FakeLauncher::default();
        let mut lifecycle = RunLifecycle::new(layout, Box::new(launcher.clone()));
        lifecycle.start(request()).unwrap();

        lifecycle.record_parse(&some_rows());
        assert_eq!(RunStatus::Running, lifecycle.refresh());

        launcher.exit(Some(1));
        assert_eq!(RunStatus::Completed, lifecycle.refresh());
        assert_eq!(Some(1), lifecycle.state().unwrap().exit_code);
    }

    #[test]
    fn exit_without_data_stays_processing() {
        let (_dir, layout) = project(PLAN);
        let launcher = FakeLauncher::default();
        let mut lifecycle = RunLifecycle::new(layout, Box::new(launcher.clone()));
        lifecycle.start(request()).unwrap();

        launcher.exit(Some(0));
        lifecycle.record_parse(&ResultsSummary::default());
        assert_eq!(RunStatus::Processing, lifecycle.refresh());
        assert!(lifecycle.state().unwrap().process_exited());
        assert!(lifecycle.state().unwrap().last_good_snapshot.is_none());
    }

    #[test]
    fn empty_parse_keeps_cache() {
        let (_dir, layout) = project(PLAN);
        let mut lifecycle = RunLifecycle::new(layout, Box::new(FakeLauncher::default()));
        lifecycle.start(request()).unwrap();

        lifecycle.record_parse(&some_rows());
        lifecycle.record_parse(&ResultsSummary::default());
        assert_eq!(Some(some_rows()), lifecycle.state().unwrap().last_good_snapshot);
    }

    #[test]
    fn reset_kills_and_forgets() {
        let (_dir, layout) = project(PLAN);
        let launcher = FakeLauncher::default();
        let mut lifecycle = RunLifecycle::new(layout, Box::new(launcher.clone()));
        lifecycle.start(request()).unwrap();
        lifecycle.record_parse(&some_rows());

        lifecycle.reset();
        assert_eq!(RunStatus::Ready, lifecycle.status());
        assert!(lifecycle.state().is_none());
        assert_eq!(1, launcher.engine.lock().killed);

        // Idempotent
        lifecycle.reset();
        lifecycle.stop();
        assert_eq!(RunStatus::Ready, lifecycle.status());
        assert_eq!(RunStatus::Ready, lifecycle.refresh());
    }

    #[test]
    fn new_run_may_start_after_completion() {
        let (_dir, layout) = project(PLAN);
        let launcher = FakeLauncher::default();
        let mut lifecycle = RunLifecycle::new(layout, Box::new(launcher.clone()));
        lifecycle.start(request()).unwrap();
        lifecycle.record_parse(&some_rows());
        launcher.exit(Some(0));
        assert_eq!(RunStatus::Completed, lifecycle.refresh());

        let state = lifecycle
            .start(RunRequest::new(vec!["Signup".to_string()], "dev"))
            .unwrap();
        assert_eq!(RunStatus::Running, state.status);
        assert!(state.last_good_snapshot.is_none());
        assert_eq!(vec!["Register".to_string()], state.expected_labels);
        assert_eq!(2, launcher.engine.lock().launched.len());
        assert_eq!(0, launcher.engine.lock().killed);
    }

    #[test]
    fn start_while_finalizing_kills_the_previous_engine() {
        let (_dir, layout) = project(PLAN);
        let launcher = FakeLauncher::default();
        let mut lifecycle = RunLifecycle::new(layout, Box::new(launcher.clone()));
        let first = lifecycle.start(request()).unwrap().run_id.clone();

        lifecycle.stop();
        assert_eq!(RunStatus::Processing, lifecycle.refresh());
        assert!(!lifecycle.state().unwrap().process_exited());

        let state = lifecycle
            .start(RunRequest::new(vec!["Signup".to_string()], "dev"))
            .unwrap();
        assert_ne!(first, state.run_id);
        assert_eq!(RunStatus::Running, state.status);
        assert!(!state.process_exited());

        let engine = launcher.engine.lock();
        assert_eq!(1, engine.killed);
        assert_eq!(2, engine.launched.len());
        assert_eq!(Some(ProcessStatus::Running), engine.status);
    }

    #[test]
    fn plan_without_samplers_falls_back_to_scenario_groups() {
        let (_dir, layout) = project(
            r#"<ThreadGroup testclass="ThreadGroup" testname="Checkout" enabled="false"/>"#,
        );
        let mut lifecycle = RunLifecycle::new(layout, Box::new(FakeLauncher::default()));

        let state = lifecycle.start(request()).unwrap();
        assert!(state.expected_labels.is_empty());
        assert_eq!(&["Checkout".to_string()], state.placeholder_labels());
    }

    #[test]
    fn run_summary_records_the_request() {
        let (_dir, layout) = project(PLAN);
        let launcher = FakeLauncher::default();
        let mut lifecycle = RunLifecycle::new(layout, Box::new(launcher.clone()));
        assert!(lifecycle.run_summary().is_none());

        let request = request().with_overrides(vec![("baseUrl".to_string(), "https://shop".to_string())]);
        lifecycle.start(request).unwrap();
        launcher.exit(Some(0));
        lifecycle.refresh();

        let summary = lifecycle.run_summary().unwrap();
        assert_eq!("main.jmx", summary.plan_name);
        assert_eq!(vec!["Checkout".to_string()], summary.scenario_set);
        assert_eq!(Some(&"https://shop".to_string()), summary.overrides.get("baseUrl"));
        assert_eq!(Some(0), summary.exit_code);
    }
}
