mod telemetry;

use std::sync::Arc;

use futures::future::join_all;
use telemetry::init_subscriber;
use tokio::{runtime::Builder, signal, sync::watch};
use tracing::{error, info};
use yadavar_engine::{notify::Notifier, reconcile, scheduler};
use yadavar_infra::setup_context;
use yadavar_utils::config::APP_CONFIG;

fn main() -> anyhow::Result<()> {
    // Initialize the subscriber for logging & tracing
    init_subscriber()?;

    // Read the environment variable (default to "multi_thread" if not set)
    let runtime_mode = &APP_CONFIG.tokio_runtime;

    let runtime = if runtime_mode == "current_thread" {
        info!("Using single-threaded Tokio runtime.");
        Builder::new_current_thread().enable_all().build()?
    } else if runtime_mode == "multi_thread" {
        info!("Using multi-threaded Tokio runtime.");
        Builder::new_multi_thread().enable_all().build()?
    } else {
        error!(
            "Invalid value for `tokio_runtime` in the configuration: {} - defaulting to `multi_thread`",
            runtime_mode
        );
        Builder::new_multi_thread().enable_all().build()?
    };

    runtime.block_on(async_main())?;

    Ok(())
}

async fn async_main() -> anyhow::Result<()> {
    let context = setup_context().await?;

    // Roll every overdue row forward before the first tick; the scheduler
    // starts from a consistent schedule.
    let reconciled = reconcile::reconcile_overdue(&context).await?;
    if reconciled > 0 {
        info!("[startup] rolled {reconciled} overdue reminders forward");
    }

    let notifier = Arc::new(Notifier::from_config(
        &context.config,
        context.transport.clone(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut jobs = scheduler::start_jobs(context.clone(), notifier, shutdown_rx);

    // Listen for SIGINT (Ctrl+C) to shutdown the service.
    // In-flight dispatches get a short grace period before being abandoned;
    // the store is flushed last.
    if let Err(e) = signal::ctrl_c().await {
        error!("[main] Failed to listen for SIGINT: {}", e);
    }
    info!("[shutdown] Received SIGINT, stopping scheduler...");
    let _ = shutdown_tx.send(true);

    if tokio::time::timeout(context.config.shutdown_grace, join_all(jobs.iter_mut()))
        .await
        .is_err()
    {
        error!("[shutdown] grace period elapsed, abandoning in-flight dispatches");
        for job in &jobs {
            job.abort();
        }
    }

    context.repos.close().await;
    info!("[shutdown] shutdown complete");

    Ok(())
}
