use clap::Parser;

/// CLI arguments for termgate
#[derive(Parser)]
#[command(name = "termgate")]
#[command(about = "Token-gated PTY session server with long-poll output streaming")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Server port
    #[arg(long, default_value = "8080", env = "TERMGATE_PORT")]
    pub port: u16,

    /// Server bind address
    #[arg(long, default_value = "127.0.0.1", env = "TERMGATE_BIND")]
    pub bind: String,

    /// Root directory bounding all session working directories
    /// (defaults to the current directory)
    #[arg(long, value_name = "PATH", env = "TERMGATE_ROOT")]
    pub root_dir: Option<String>,

    /// Default shell for new sessions (falls back to $SHELL)
    #[arg(long, value_name = "PATH", env = "TERMGATE_SHELL")]
    pub shell: Option<String>,
}
