use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use console::style;

use chatrelay_server::{server, types::ServerOptions};

#[derive(Parser, Debug)]
#[clap(author, version, about = "ChatRelay - single-room chat relay server", long_about = None)]
struct Opts {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1", env = "CHATRELAY_HOST")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value = "5000", env = "CHATRELAY_PORT")]
    port: u16,

    /// Maximum number of retained messages
    #[arg(long, default_value = "1000")]
    capacity: usize,

    /// Seconds of stream inactivity between heartbeats
    #[arg(long, default_value = "15")]
    heartbeat: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!();
    println!("{}{}", style("Chat").white(), style("Relay").green());
    println!(
        "{}",
        style(format!("Serving on http://{}:{}", opts.host, opts.port)).dim()
    );
    println!();

    let options = ServerOptions {
        host: opts.host,
        port: opts.port,
        capacity: opts.capacity,
        heartbeat_interval: Duration::from_secs(opts.heartbeat),
    };

    server::start_server(options)
        .await
        .context("server exited with an error")?;

    Ok(())
}
