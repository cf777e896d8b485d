use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use args::Args;
use axum::{Extension, Router, routing::get};
use clap::Parser;
use config::Config;
use server::{ServeConfig, Session};

mod args;
mod logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = args.config()?;

    logger::init(&args);

    if let Err(e) = server::serve(serve_config(&args, config)).await {
        log::error!("Server failed to start: {e}");
        std::process::exit(1);
    }

    Ok(())
}

fn serve_config(args: &Args, config: Config) -> ServeConfig {
    let listen_address = args
        .listen_address
        .or(config.server.listen_address)
        .unwrap_or(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 8000)));

    let mut serve_config = ServeConfig::new(listen_address, config);
    serve_config.routes = Router::new().route("/", get(index));

    serve_config
}

async fn index(Extension(session): Extension<Session>) -> String {
    match session.principal().await {
        Some(principal) => format!("Signed in as {principal}"),
        None => "Not signed in".to_string(),
    }
}
