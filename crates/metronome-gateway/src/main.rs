use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use tracing::info;

use metronome_gateway::{app, config};
use metronome_scheduler::{LogRuns, Recover, Scheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "metronome_gateway=info,metronome_scheduler=info".into()),
        )
        .init();

    // load config: explicit path via METRONOME_CONFIG > ./metronome.toml
    let config_path = std::env::var("METRONOME_CONFIG").ok();
    let config = config::GatewayConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        config::GatewayConfig::default()
    });

    let tz: chrono_tz::Tz = config
        .timezone
        .parse()
        .map_err(|_| anyhow!("unknown time zone {:?}", config.timezone))?;

    let mut builder = Scheduler::builder()
        .location(tz)
        .middleware(Recover)
        .middleware(LogRuns);
    if config.seconds_field {
        builder = builder.with_seconds();
    }
    let scheduler = builder.build();

    // Demo job: ticks every second, fails every third run.
    let runs = Arc::new(AtomicU64::new(0));
    scheduler.add_fn("test", "@every 1s", move |_cx| {
        let runs = runs.clone();
        async move {
            let n = runs.fetch_add(1, Ordering::Relaxed) + 1;
            if n % 3 == 0 {
                return Err(anyhow!("test fail"));
            }
            info!("do test done");
            Ok(())
        }
    })?;

    scheduler.start();

    let state = Arc::new(app::AppState::new(scheduler.clone()));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    info!(%addr, "start http");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
