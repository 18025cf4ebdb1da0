use anyhow::Context;
use clap::Parser;
use jawa_plan::{inspect_groups, inspect_samplers, patch_plan};
use jawa_runner::prelude::ProjectLayout;
use jawa_summariser::{aggregates_table, exceptions_table, parse_exceptions, parse_results};

mod cli;
mod render;
mod run;

use cli::{Command, JawaCli};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = JawaCli::parse();
    let layout = ProjectLayout::new(&cli.root);

    match cli.command {
        Command::Groups => {
            let groups = inspect_groups(&layout.plan_path())?;
            println!("{}", render::groups_table(&groups));
        }
        Command::Samplers => {
            for sampler in inspect_samplers(&layout.plan_path())? {
                println!("{}", sampler.name);
            }
        }
        Command::Environments => {
            let environments = layout.environments().with_context(|| {
                format!("Failed to list environments in {}", layout.prop_root().display())
            })?;
            for environment in environments {
                println!("{environment}");
            }
        }
        Command::Patch { groups, output } => {
            let written = patch_plan(&layout.plan_path(), &groups, output.as_deref())?;
            println!("{}", written.display());
        }
        Command::Run(args) => run::run(layout, args).await?,
        Command::Stats { file, json } => {
            let summary = parse_results(&file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", aggregates_table(&summary.aggregates));
                println!(
                    "{} requests, {:.2} req/s, {:.2}% failed over {:.0}s",
                    summary.total_requests,
                    summary.overall_throughput_per_sec,
                    summary.failure_rate_percent(),
                    summary.observed_duration_sec
                );
            }
        }
        Command::Exceptions { file, json } => {
            let exceptions = parse_exceptions(&file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&exceptions)?);
            } else {
                println!("{}", exceptions_table(&exceptions));
            }
        }
    }

    Ok(())
}
