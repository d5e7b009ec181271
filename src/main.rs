use anyhow::Result;
use clap::Parser;
use tracing::info;

use ipush_gateway::{config, GatewayServer};

/// 命令行参数 / Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "ipush-gateway WebSocket push session server", long_about = None)]
struct Args {
    /// 指定配置文件路径（TOML/JSON/YAML自动识别）
    /// Specify config file path (auto-detect TOML/JSON/YAML)
    #[arg(short = 'c', long = "config", default_value = "config/default")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = config::load(&args.config)?;
    let server = GatewayServer::new(cfg);

    for namespace in server.config.namespaces.clone() {
        if server.register_namespace(&namespace) {
            info!("🔌 Lifecycle handler bound to namespace {}", namespace);
        }
    }

    let host = server.config.host.clone();
    let port = server.config.port;
    server.run(&host, port).await
}
