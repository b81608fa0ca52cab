use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tracing::{info, warn};

use walletscan::{
    api::{self, generate_token, AppState},
    cli::{self, Cli, Command},
    JobManager,
};
use walletscan_common::{init_logging, ScannerConfig};
use walletscan_wallet::BalanceResolver;

/// Thời gian chờ job đang chạy khi tắt
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Không thể lắng nghe Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Nhận tín hiệu tắt");
}

fn install_metrics(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install Prometheus exporter")?;
    info!("Prometheus exporter listening on {}", addr);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ScannerConfig::load().context("failed to load configuration")?;

    // Giữ guard tới cuối main để file log được flush
    let _log_guard = init_logging(config.log_dir.as_deref()).context("failed to init logging")?;

    if let Some(port) = config.metrics_port {
        install_metrics(port)?;
    }

    let resolver = BalanceResolver::from_config(&config).context("failed to build resolver")?;
    let jobs = JobManager::new(Arc::new(resolver), config.max_workers);

    match cli.command {
        Command::Serve(args) => {
            let host = args.host.unwrap_or_else(|| config.api.host.clone());
            let port = args.port.unwrap_or(config.api.port);
            let addr: SocketAddr = format!("{}:{}", host, port)
                .parse()
                .with_context(|| format!("invalid listen address {}:{}", host, port))?;

            let token = config.api.token.clone().unwrap_or_else(generate_token);
            let state = AppState::new(token, jobs.clone());
            api::serve(addr, state, shutdown_signal()).await?;

            if !jobs.shutdown(SHUTDOWN_GRACE).await {
                warn!("Một số job chưa hoàn tất khi tắt");
            }
        }
        Command::Check(args) => {
            let addresses = cli::read_addresses(args.file.as_deref(), &args.addresses)?;
            cli::run_check(&jobs, addresses, args.include_empty, args.output.as_deref()).await?;
            jobs.shutdown(SHUTDOWN_GRACE).await;
        }
    }

    Ok(())
}
