// Web frontend module
pub mod protocol;
pub mod routes;
pub mod server;

pub use protocol::SESSION_TOKEN_HEADER;
pub use routes::{create_router, AppState};
pub use server::{WebServer, WebServerConfig};
