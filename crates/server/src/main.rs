use tracing::info;

use vv_common::VvConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = VvConfig::from_env()?;

    info!(
        "Starting V&V API {} on http://{} (data: {}, frontend: {})",
        vv_common::VERSION,
        config.bind_addr,
        config.data_dir.display(),
        config.frontend_url
    );

    vv_server::serve(config).await
}
