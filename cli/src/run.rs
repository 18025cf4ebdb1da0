use std::time::{Duration, Instant};

use anyhow::Context;
use jawa_runner::prelude::*;
use jawa_summary_model::{append_run_summary, run_summary_path, RunStatus, Termination};

use crate::cli::RunArgs;
use crate::render::print_snapshot;

/// Start a run, print a snapshot on every tick until it settles, then record it in the run history.
///
/// Ctrl-C stops the engine and keeps polling so that whatever it flushed is still reported.
pub async fn run(layout: ProjectLayout, args: RunArgs) -> anyhow::Result<()> {
    let request = args.to_request();
    let termination = request.termination;

    let launcher = JMeterLauncher::new().with_inherited_output(args.show_engine_output);
    let mut facade = TelemetryFacade::new(RunLifecycle::new(layout, Box::new(launcher)));

    let state = facade.start(request).context("Failed to start run")?;
    println!(
        "Run {} started\n  results: {}\n  log:     {}\n  report:  {}",
        state.run_id,
        state.artifacts.results_path.display(),
        state.artifacts.log_path.display(),
        state.artifacts.report_path.display()
    );
    let engine_pid = state.engine_pid();

    let shutdown_handle = start_shutdown_listener();
    if let Some(pid) = engine_pid {
        start_monitor(pid, shutdown_handle.new_listener())?;
    }
    if let Termination::Duration(secs @ 1..) = termination {
        if !args.no_progress && !args.json {
            start_progress(Duration::from_secs(secs), shutdown_handle.new_listener())?;
        }
    }

    let mut shutdown_listener = shutdown_handle.new_listener();
    let mut interval = tokio::time::interval(Duration::from_secs(args.interval.max(1)));
    let mut finalizing = Finalizing::new(Duration::from_secs(args.finalize_timeout));
    let mut stopping = false;

    let snapshot = loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown_listener.wait_for_shutdown(), if !stopping => {
                facade.stop();
                stopping = true;
                finalizing.stopped(Instant::now());
            }
        }

        let snapshot = facade.snapshot();
        print_snapshot(&snapshot, args.json)?;

        let exited = facade
            .lifecycle()
            .state()
            .is_some_and(|s| s.process_exited());
        if finalizing.is_settled(snapshot.status, exited, Instant::now()) {
            break snapshot;
        }
    };

    // Ends the progress and monitor threads
    shutdown_handle.shutdown();

    if let Some(run_summary) = facade.lifecycle().run_summary() {
        let path = run_summary_path();
        append_run_summary(&run_summary, &path)
            .with_context(|| format!("Failed to record run in {}", path.display()))?;
        log::info!("Recorded run {} in {}", run_summary.run_id, path.display());
    }

    let artifacts = snapshot.artifacts.as_ref();
    if snapshot.status != RunStatus::Completed {
        anyhow::bail!(
            "Run produced no results, check the JMeter log at {}",
            artifacts
                .map(|a| a.log_path.display().to_string())
                .unwrap_or_default()
        );
    }
    if let Some(report) = artifacts.map(|a| &a.report_path).filter(|p| p.exists()) {
        println!("HTML report: {}", report.display());
    }
    match snapshot.exit_code {
        Some(0) => Ok(()),
        Some(code) => anyhow::bail!("JMeter exited with code {code}"),
        None if stopping => {
            log::info!("Run stopped before it finished");
            Ok(())
        }
        None => anyhow::bail!("JMeter was terminated by a signal"),
    }
}

/// Decides when polling can end.
///
/// A stopped run turns `Completed` as soon as it has cached rows, but the engine keeps flushing
/// results until it exits, so polling goes on until it does or the timeout passes.
#[derive(Debug)]
struct Finalizing {
    timeout: Duration,
    stopped_at: Option<Instant>,
    exited_at: Option<Instant>,
}

impl Finalizing {
    fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            stopped_at: None,
            exited_at: None,
        }
    }

    fn stopped(&mut self, now: Instant) {
        self.stopped_at.get_or_insert(now);
    }

    fn is_settled(&mut self, status: RunStatus, exited: bool, now: Instant) -> bool {
        if exited {
            let since = *self.exited_at.get_or_insert(now);
            if status == RunStatus::Completed {
                return true;
            }
            if now.saturating_duration_since(since) >= self.timeout {
                log::warn!(
                    "JMeter exited but no results arrived within {}s",
                    self.timeout.as_secs()
                );
                return true;
            }
            return false;
        }

        if status != RunStatus::Completed {
            return false;
        }
        match self.stopped_at {
            Some(at) if now.saturating_duration_since(at) >= self.timeout => {
                log::warn!(
                    "JMeter did not exit within {}s of being stopped",
                    self.timeout.as_secs()
                );
                true
            }
            Some(_) => false,
            None => true,
        }
    }
}
