use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use jawa_runner::prelude::{parse_override, RunRequest, DEFAULT_HEAP};
use jawa_summary_model::Termination;

#[derive(Parser, Debug)]
#[command(name = "jawa", version, about, long_about = None)]
pub struct JawaCli {
    /// Root directory of the load test project, containing `plan/main.jmx` and `prop/`
    #[clap(long, global = true, default_value = ".")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the scenario groups of the plan
    Groups,
    /// List the enabled samplers of the plan
    Samplers,
    /// List the environments that have property files
    Environments,
    /// Write a copy of the plan with only the given scenario groups enabled
    Patch {
        /// Scenario group to enable. Repeat to enable several.
        #[clap(long = "group", short, required = true)]
        groups: Vec<String>,

        /// Where to write the patched plan. Defaults to `main-mod.jmx` next to the plan.
        #[clap(long)]
        output: Option<PathBuf>,
    },
    /// Run the plan and show live statistics until it finishes
    Run(RunArgs),
    /// Print statistics for a results file
    Stats {
        file: PathBuf,

        /// Print JSON instead of a table
        #[clap(long, default_value = "false")]
        json: bool,
    },
    /// Print the grouped errors of a JMeter log file
    Exceptions {
        file: PathBuf,

        /// Print JSON instead of a table
        #[clap(long, default_value = "false")]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario group to enable. Repeat to enable several.
    #[clap(long = "group", short, required = true)]
    pub groups: Vec<String>,

    /// Environment whose property files under `prop/` are loaded
    #[clap(long = "env", short, default_value = "dev")]
    pub environment: String,

    /// The number of simulated users per scenario group
    #[clap(long, short, default_value_t = 1)]
    pub users: u64,

    /// Seconds over which the users are started
    #[clap(long, default_value_t = 1)]
    pub ramp_up: u64,

    /// Number of times each user runs its scenario. Defaults to 1 when no duration is given.
    #[clap(long, conflicts_with = "duration")]
    pub iterations: Option<u64>,

    /// The number of seconds to run for. 0 runs until stopped.
    #[clap(long)]
    pub duration: Option<u64>,

    /// Remote JMeter hosts to distribute the run to, comma separated or repeated
    #[clap(long = "remote", value_delimiter = ',')]
    pub remote_hosts: Vec<String>,

    /// Property to pass to the plan in the format `key=value`, for example `-J baseUrl=https://shop`.
    ///
    /// You can specify multiple properties by using the flag multiple times.
    #[clap(long = "prop", short = 'J', value_parser = parse_override)]
    pub overrides: Vec<(String, String)>,

    /// JVM heap size for the engine
    #[clap(long, default_value = DEFAULT_HEAP)]
    pub heap: String,

    /// Seconds between refreshes of the live statistics
    #[clap(long, default_value_t = 2)]
    pub interval: u64,

    /// Seconds to wait for results once the engine has exited before giving up
    #[clap(long, default_value_t = 30)]
    pub finalize_timeout: u64,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// Let JMeter write its own console output
    #[clap(long, default_value = "false")]
    pub show_engine_output: bool,

    /// Print each snapshot as a JSON line instead of tables
    #[clap(long, default_value = "false")]
    pub json: bool,
}

impl RunArgs {
    pub fn termination(&self) -> Termination {
        match (self.iterations, self.duration) {
            (_, Some(secs)) => Termination::Duration(secs),
            (Some(n), None) => Termination::Iterations(n),
            (None, None) => Termination::Iterations(1),
        }
    }

    pub fn to_request(&self) -> RunRequest {
        RunRequest::new(self.groups.clone(), self.environment.clone())
            .with_users(self.users)
            .with_ramp_up_secs(self.ramp_up)
            .with_termination(self.termination())
            .with_remote_hosts(self.remote_hosts.clone())
            .with_overrides(self.overrides.clone())
            .with_heap(self.heap.clone())
    }
}
