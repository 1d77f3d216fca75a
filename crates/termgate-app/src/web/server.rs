use anyhow::Result;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use termgate_terminal::{ManagerConfig, TerminalManager};

use crate::web::routes::{self, AppState};

/// Web server configuration
pub struct WebServerConfig {
    pub bind_addr: SocketAddr,
    pub root_dir: PathBuf,
    pub default_shell: Option<String>,
}

/// Web server instance
pub struct WebServer {
    config: WebServerConfig,
    terminal: Arc<TerminalManager>,
}

impl WebServer {
    /// Create a new web server owning its own terminal manager.
    pub fn new(config: WebServerConfig) -> Self {
        let mut manager_config = ManagerConfig::new(config.root_dir.clone());
        manager_config.default_shell = config.default_shell.clone();

        Self {
            config,
            terminal: Arc::new(TerminalManager::new(manager_config)),
        }
    }

    /// Start the web server
    pub async fn start(self) -> Result<()> {
        let app_state = AppState {
            terminal: self.terminal.clone(),
        };

        let mut app = routes::create_router(app_state);

        // Add CORS layer for browser-based terminal frontends
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);

        println!(
            "🖥  Terminal server starting on http://{}",
            self.config.bind_addr
        );
        println!("   Sandbox root: {}", self.config.root_dir.display());
        println!(
            "   API endpoints: http://{}/api/sessions",
            self.config.bind_addr
        );

        let listener = tokio::net::TcpListener::bind(&self.config.bind_addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Get the terminal manager (for embedding or tests)
    pub fn terminal(&self) -> Arc<TerminalManager> {
        self.terminal.clone()
    }
}
