// termgate server library
//
// HTTP surface for the terminal session core: session creation, token-gated
// long-poll streaming, keyboard input, resize, and close.

pub mod cli;
pub mod web;

pub use cli::Cli;
pub use web::{WebServer, WebServerConfig};
