//! Server binary: one loopback stateful model behind the REST surface.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use statestream::config::{ServerConfig, StatefulModelConfig};
use statestream::inference::StatefulModelInstance;
use statestream::runtime::LoopbackModel;
use statestream::server::{router, ServerState};

#[derive(Debug, Parser)]
#[command(name = "statestream-server", about = "Stateful inference server")]
struct Args {
    /// Bind address for the REST surface
    #[arg(long, env = "STATESTREAM_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Bind port for the REST surface
    #[arg(long, env = "STATESTREAM_PORT", default_value_t = 9178)]
    port: u16,

    /// Idle sequence reaper period in minutes
    #[arg(long, env = "STATESTREAM_SEQUENCE_CLEANER_INTERVAL", default_value_t = 5)]
    sequence_cleaner_interval: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "STATESTREAM_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Name of the demo stateful model
    #[arg(long, env = "STATESTREAM_MODEL_NAME", default_value = "loopback")]
    model_name: String,

    /// Element count of the demo model's data input
    #[arg(long, default_value_t = 10)]
    state_width: usize,

    /// Execution slot pool size; 0 selects the runtime's recommended count
    #[arg(long, default_value_t = 0)]
    nireq: usize,

    /// Upper bound on concurrently live sequences
    #[arg(long, default_value_t = 500)]
    max_sequence_number: u32,

    /// Disable background cleanup of idle sequences
    #[arg(long, default_value_t = false)]
    no_idle_sequence_cleanup: bool,
}

fn log_config(server: &ServerConfig, model: &StatefulModelConfig) {
    debug!("host: {}", server.host);
    debug!("port: {}", server.port);
    debug!("sequence_cleaner_interval: {}", server.sequence_cleaner_interval);
    debug!("log_level: {}", server.log_level);
    debug!("model_name: {}", model.name);
    debug!("nireq: {}", model.nireq);
    debug!("max_sequence_number: {}", model.max_sequence_number);
    debug!("idle_sequence_cleanup: {}", model.idle_sequence_cleanup);
    debug!("low_latency_transformation: {}", model.low_latency_transformation);
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install shutdown signal handler: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_level.clone())),
        )
        .init();

    let server_config = ServerConfig {
        host: args.host,
        port: args.port,
        sequence_cleaner_interval: args.sequence_cleaner_interval,
        log_level: args.log_level,
    };
    let model_config = StatefulModelConfig {
        name: args.model_name,
        version: 1,
        nireq: args.nireq,
        max_sequence_number: args.max_sequence_number,
        idle_sequence_cleanup: !args.no_idle_sequence_cleanup,
        low_latency_transformation: true,
    };
    log_config(&server_config, &model_config);

    let state = ServerState::new(&server_config);

    let model = Arc::new(LoopbackModel::new(
        args.state_width,
        &["memory"],
        model_config.low_latency_transformation,
    ));
    let instance =
        StatefulModelInstance::load(model_config, model, Arc::clone(state.reaper())).await?;
    state.add_model(instance).await;

    let addr = format!("{}:{}", server_config.host, server_config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    state.shutdown().await;
    Ok(())
}
