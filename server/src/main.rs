use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use drawboard_server::store::DiagramStore;
use drawboard_server::transport::broker::{BrokerClient, ConnectionInfo};
use drawboard_server::transport::direct::PeerRegistry;
use drawboard_server::{router, AppState, Transport};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TransportKind {
    /// Terminate client websockets in this process.
    Direct,
    /// Sit behind a websocket broker and answer its webhooks.
    Webhook,
}

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,
    #[arg(long)]
    public_dir: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = TransportKind::Direct)]
    transport: TransportKind,
    #[arg(long, default_value = "draw")]
    hub: String,
    #[arg(long, env = "BROKER_CONNECTION_STRING")]
    connection_string: Option<String>,
}

fn build_transport(args: &Args) -> Result<Transport, String> {
    match args.transport {
        TransportKind::Direct => Ok(Transport::Direct(Arc::new(PeerRegistry::new()))),
        TransportKind::Webhook => {
            let raw = args
                .connection_string
                .as_deref()
                .ok_or("--connection-string is required with --transport webhook")?;
            let info = raw
                .parse::<ConnectionInfo>()
                .map_err(|error| error.to_string())?;
            Ok(Transport::Broker(Arc::new(BrokerClient::new(
                info,
                args.hub.clone(),
            ))))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("drawboard_server=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let transport = match build_transport(&args) {
        Ok(transport) => transport,
        Err(message) => {
            error!("{message}");
            return ExitCode::FAILURE;
        }
    };
    let public_dir = args
        .public_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../public"));

    let state = AppState::new(Arc::new(DiagramStore::new()), transport);
    let app = router(state, Some(public_dir));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%addr, error = %err, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    info!(transport = ?args.transport, "drawboard running at http://localhost:{}", args.port);

    if let Err(err) = axum::serve(listener, app).await {
        error!(error = %err, "server stopped");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
