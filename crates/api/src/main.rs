use std::sync::Arc;

use anyhow::Context;

use sovereign_api::app::{AppServices, build_app};
use sovereign_infra::{PayrollWorkerConfig, PipelineConfig, PipelineParts};

const BIND_ADDR_VAR: &str = "BIND_ADDR";
/// Loopback only: caller identity comes from trusted headers, so the server
/// must sit behind a proxy that sets them. Set `BIND_ADDR` to expose it.
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

fn bind_addr(configured: Option<String>) -> String {
    configured
        .filter(|addr| !addr.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sovereign_observability::init();

    let config = PipelineConfig::from_env().context("invalid configuration")?;
    let parts = PipelineParts::from_config(&config)
        .await
        .context("failed to initialise the intent pipeline")?;

    let worker = parts.payroll_worker().spawn(PayrollWorkerConfig::default());
    let app = build_app(Arc::new(AppServices::new(parts, config.request_timeout)));

    let addr = bind_addr(std::env::var(BIND_ADDR_VAR).ok());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::warn!(%error, "failed to listen for shutdown signal");
            }
        })
        .await?;

    let stats = worker.shutdown().await;
    tracing::info!(processed = stats.jobs_processed, "shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_loopback_unless_configured() {
        assert_eq!(bind_addr(None), "127.0.0.1:8080");
        assert_eq!(bind_addr(Some("  ".into())), "127.0.0.1:8080");
        assert_eq!(bind_addr(Some("0.0.0.0:9000".into())), "0.0.0.0:9000");
    }
}
