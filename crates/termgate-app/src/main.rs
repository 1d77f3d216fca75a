use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use termgate::{Cli, WebServer, WebServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let root_dir = match cli.root_dir {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };
    let root_dir = root_dir
        .canonicalize()
        .with_context(|| format!("Sandbox root {} is not accessible", root_dir.display()))?;

    let bind_addr: SocketAddr = format!("{}:{}", cli.bind, cli.port)
        .parse()
        .context("Invalid bind address")?;

    let server = WebServer::new(WebServerConfig {
        bind_addr,
        root_dir,
        default_shell: cli.shell,
    });
    server.start().await
}
