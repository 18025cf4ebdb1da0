use std::path::PathBuf;

use jawa_summary_model::{RunArtifacts, Termination};

use crate::layout::ProjectLayout;
use crate::request::RunRequest;

/// Loop count for time bounded runs, large enough that the duration ends the run first.
pub const UNBOUNDED_LOOP_COUNT: u64 = 9999;
/// Thread lifetime for iteration bounded runs, large enough that the loop count ends the run first.
pub const UNBOUNDED_LIFETIME_SECS: u64 = 999999;

/// Arguments, environment and working directory for one engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub working_dir: PathBuf,
}

impl EngineCommand {
    /// Build the non-GUI invocation for `request`, writing to `artifacts`.
    pub fn for_run(
        request: &RunRequest,
        layout: &ProjectLayout,
        artifacts: &RunArtifacts,
        run_id: &str,
    ) -> std::io::Result<Self> {
        let (loop_count, lifetime_secs) = match request.termination {
            Termination::Iterations(n) => (n, UNBOUNDED_LIFETIME_SECS),
            Termination::Duration(0) => (UNBOUNDED_LOOP_COUNT, UNBOUNDED_LIFETIME_SECS),
            Termination::Duration(secs) => (UNBOUNDED_LOOP_COUNT, secs),
        };

        let mut args = vec![
            "-n".to_string(),
            "-t".to_string(),
            path_arg(&artifacts.patched_plan_path),
            "-l".to_string(),
            path_arg(&artifacts.results_path),
            "-j".to_string(),
            path_arg(&artifacts.log_path),
            "-e".to_string(),
            "-o".to_string(),
            path_arg(&artifacts.report_path),
            "-f".to_string(),
            format!("-JresultTimestamp={run_id}"),
            format!("-JtargetEnv={}", request.environment),
            format!("-JthreadTargetNumber={}", request.users),
            format!("-JthreadRampUpPeriod={}", request.ramp_up_secs),
            format!("-JthreadLoopCount={loop_count}"),
            format!("-JthreadLifetimeDuration={lifetime_secs}"),
        ];

        for file in layout.property_files(&request.environment)? {
            args.push("-q".to_string());
            args.push(path_arg(&file));
        }

        let remote_hosts = request
            .remote_hosts
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .collect::<Vec<_>>();
        if !remote_hosts.is_empty() {
            args.push("-R".to_string());
            args.push(remote_hosts.join(","));
        }

        for (key, value) in &request.overrides {
            if key.is_empty() || value.is_empty() {
                log::debug!("Skipping empty override '{key}={value}'");
                continue;
            }
            args.push(format!("-J{key}={value}"));
        }

        let heap = request.heap.trim();
        let mut env = vec![(
            "HEAP".to_string(),
            format!("-Xms{heap} -Xmx{heap} -XX:MaxMetaspaceSize=512m -Xss1m -XX:+UseG1GC"),
        )];
        if !remote_hosts.is_empty() {
            env.push((
                "JVM_ARGS".to_string(),
                "-Dserver.rmi.ssl.disable=true".to_string(),
            ));
        }

        Ok(Self {
            args,
            env,
            working_dir: layout.root().to_path_buf(),
        })
    }

    /// The invocation as a shell-like line, for logs.
    pub fn display(&self, program: &str) -> String {
        std::iter::once(program)
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn path_arg(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}
