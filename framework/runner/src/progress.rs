use std::cmp::min;
use std::fmt::Write;
use std::time::{Duration, Instant};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressState, ProgressStyle};

use crate::shutdown::ShutdownListener;

/// Displays a progress bar while a time bounded run executes, so the user can see how long is left.
pub fn start_progress(
    planned_runtime: Duration,
    mut shutdown_listener: ShutdownListener,
) -> anyhow::Result<()> {
    let planned_secs = planned_runtime.as_secs();
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{wide_bar:.cyan/blue}] [{elapsed_precise} / {planned_runtime}]",
    )
    .context("Failed to set progress style")?
    .with_key(
        "planned_runtime",
        move |_state: &ProgressState, w: &mut dyn Write| {
            let _ = write!(
                w,
                "{:02}:{:02}:{:02}",
                planned_secs / 3600,
                (planned_secs % 3600) / 60,
                planned_secs % 60
            );
        },
    )
    .progress_chars("#>-");

    std::thread::Builder::new()
        .name("progress".to_string())
        .spawn(move || {
            let start_time = Instant::now();
            let pb = ProgressBar::new(planned_secs).with_style(style);

            loop {
                if shutdown_listener.should_shutdown() {
                    log::trace!("Progress thread shutting down");
                    pb.finish_and_clear();
                    break;
                }

                pb.set_position(min(start_time.elapsed().as_secs(), planned_secs));
                std::thread::sleep(Duration::from_secs(1));
            }
        })
        .context("Failed to start progress thread")?;

    Ok(())
}
