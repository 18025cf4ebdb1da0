use anyhow::Context;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::shutdown::ShutdownListener;

/// Share of the host's total CPU above which the engine is reported as saturating it.
pub const HIGH_CPU_USAGE_PERCENT: f32 = 80.0;

/// Monitor the resource usage of the engine process and report high usage.
///
/// This won't stop the run, it just logs a warning so the user knows the load generator itself may
/// be the bottleneck. Usage is sampled every [sysinfo::MINIMUM_CPU_UPDATE_INTERVAL] until the
/// process goes away or a shutdown is requested.
pub fn start_monitor(engine_pid: u32, mut shutdown_listener: ShutdownListener) -> anyhow::Result<()> {
    std::thread::Builder::new()
        .name("monitor".to_string())
        .spawn(move || {
            let pid = Pid::from_u32(engine_pid);
            let mut sys = System::new();

            sys.refresh_cpu_all();
            let cpu_count = sys.cpus().len().max(1);

            loop {
                if shutdown_listener.should_shutdown() {
                    log::trace!("Monitor thread shutting down");
                    break;
                }

                sys.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[pid]),
                    true,
                    ProcessRefreshKind::nothing().with_cpu(),
                );
                let Some(process) = sys.process(pid) else {
                    log::debug!("Engine process {pid} is gone, stopping the monitor");
                    break;
                };

                let usage = process.cpu_usage() / cpu_count as f32;
                if usage > HIGH_CPU_USAGE_PERCENT {
                    log::warn!(
                        "High CPU usage detected. JMeter is using {usage:.2}% of the CPU, with {cpu_count} available cores"
                    );
                }

                std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            }
        })
        .context("Failed to start monitor thread")?;

    Ok(())
}
