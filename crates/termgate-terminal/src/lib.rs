// Terminal session core
//
// This crate provides server-side PTY session support: it spawns a shell
// attached to a pseudo-terminal, buffers its output as a sequenced event
// stream, and lets callers replay and follow that stream with plain
// request/response reads (long-poll), keyboard input, and resize signals.

mod manager;
mod pty_handler;
mod sandbox;
mod session;

// Re-export public API
pub use manager::{CreateSessionOptions, CreatedSession, ManagerConfig, TerminalManager};
pub use sandbox::sanitize_cwd;
pub use session::{PtyEvent, PtySession, SessionId, StreamChunk};

use std::time::Duration;

// Constants
pub const MAX_EVENTS: usize = 8000;
pub const SESSION_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_COLS: u16 = 120;
pub const DEFAULT_ROWS: u16 = 34;
pub const MIN_CREATE_COLS: u16 = 40;
pub const MIN_CREATE_ROWS: u16 = 10;
pub const MIN_RESIZE_COLS: u16 = 20;
pub const MIN_RESIZE_ROWS: u16 = 5;
