//! Command-line front end: loads a query group file, builds the groups and
//! hands them to the engine's supervisor.

pub mod options;
pub mod setup;

use anyhow::{Context, Result};
use config::Config;
use engine::{CancelCause, RunReport, Supervisor};
pub use options::Options;
pub use setup::build_groups;
use tracing::{info, warn};

pub async fn run(options: &Options) -> Result<RunReport> {
    let config = Config::from_file(&options.config)
        .with_context(|| format!("invalid configuration {}", options.config.display()))?;
    info!("Loaded {} query groups", config.len());

    let mut supervisor = Supervisor::new(options.run_options());
    for group in build_groups(&config, options) {
        supervisor.add_group(group);
    }

    let handle = supervisor.cancel_handle();
    let run = supervisor.run();
    tokio::pin!(run);

    // Ctrl-C is only listened for while the run is in progress.
    tokio::select! {
        report = &mut run => return Ok(report),
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                info!("Interrupted");
                handle.cancel(CancelCause::Explicit);
            }
            Err(e) => warn!("Unable to listen for Ctrl-C: {e}"),
        },
    }
    Ok(run.await)
}
