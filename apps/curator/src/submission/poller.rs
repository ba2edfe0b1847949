use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tracing::{debug, error, info, warn};

use crate::submission::ingest::{CycleReport, Ingestor};
use crate::transport::Transport;

/// Runs poll cycles back to back with `interval` between the end of one cycle
/// and the start of the next, until `shutdown` resolves. Returns the number of
/// cycles run.
///
/// Shutdown is only observed between cycles; a cycle always runs to completion.
pub async fn run_until<T, F>(ingestor: &mut Ingestor<T>, interval: Duration, shutdown: F) -> u64
where
    T: Transport,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut cycles = 0u64;

    loop {
        cycles += 1;
        match ingestor.run_cycle().await {
            Ok(report) => log_report(&report),
            Err(e) => warn!(
                "Poll cycle failed, retrying in {}s: {e}",
                interval.as_secs()
            ),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping after {cycles} cycles");
                return cycles;
            }
        }
    }
}

fn log_report(report: &CycleReport) {
    if report.handled + report.failed == 0 {
        debug!(cursor = report.cursor, "No new updates");
    } else {
        info!(
            fetched = report.fetched,
            handled = report.handled,
            skipped = report.skipped,
            failed = report.failed,
            cursor = report.cursor,
            "Poll cycle complete"
        );
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
