//! fencing-agent - node self-fencing daemon

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fencing_agent::{
    AgentConfig, FencingSupervisor, KubeNodeMarker, SupervisorError, client, daemon,
    health_server, observability,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AgentConfig::try_parse() {
        Ok(config) => config,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Err(e) = observability::init_logging(&config.log_level, config.log_format) {
        eprintln!("fencing-agent: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => {
            info!("Fencing agent stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = ?e, "Fencing agent failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AgentConfig) -> Result<()> {
    debug!(?config, "Loaded configuration");
    config.validate().context("Invalid configuration")?;

    let client = client::build_client(config.kubernetes_api_timeout)
        .await
        .context("Failed to create Kubernetes client")?;
    let marker = Arc::new(KubeNodeMarker::new(
        client,
        &config.node_name,
        config.marker_label(),
        config.kubernetes_api_timeout,
    ));
    let driver = config.build_driver()?;
    let supervisor = FencingSupervisor::new(driver, marker, config.supervisor_settings());

    let cancel = CancellationToken::new();
    daemon::spawn_signal_handler(cancel.clone())?;

    let probes = tokio::spawn({
        let addr = config.health_probe_bind_address;
        let status = supervisor.subscribe();
        let cancel = cancel.child_token();
        async move {
            if let Err(e) = health_server::serve(addr, status, cancel).await {
                error!(error = ?e, "Health probe server failed");
            }
        }
    });

    info!(
        node = %config.node_name,
        driver = ?config.watchdog_driver,
        tick_interval = ?config.tick_interval(),
        "Fencing agent started"
    );

    let outcome = supervisor.run(cancel.clone()).await;
    cancel.cancel();

    if let Err(e) = probes.await {
        error!(error = %e, "Health probe server task panicked");
    }

    match outcome {
        Ok(()) => Ok(()),
        Err(SupervisorError::Shutdown(e)) => {
            error!(error = %e, "Shutdown incomplete");
            Ok(())
        }
        Err(e @ SupervisorError::Startup(_)) => Err(e.into()),
    }
}
