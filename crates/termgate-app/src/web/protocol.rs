use serde::{Deserialize, Serialize};
use termgate_terminal::{PtyEvent, SessionId};

/// Request header carrying the per-session access token.
pub const SESSION_TOKEN_HEADER: &str = "x-terminal-token";

/// Upper bound on how long a single long-poll request may suspend.
pub const MAX_WAIT_MS: u64 = 30_000;

/// Response for a successful session create. The only message that ever
/// carries the access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
    pub access_token: String,
    pub next_seq: u64,
    pub events: Vec<PtyEvent>,
    pub cwd: String,
    pub shell: String,
}

/// Query parameters for the stream endpoint. `wait_ms = 0` (or absent)
/// reads immediately; anything larger long-polls.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamParams {
    #[serde(default)]
    pub since: u64,
    #[serde(default)]
    pub wait_ms: u64,
}

impl StreamParams {
    /// Effective long-poll wait: the requested `wait_ms` capped at
    /// `MAX_WAIT_MS`, so one abandoned client cannot park a request
    /// arbitrarily long.
    pub fn wait(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.wait_ms.min(MAX_WAIT_MS))
    }
}

/// Body for the input endpoint: raw keystrokes, escape sequences included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRequest {
    pub data: String,
}

/// Body for the resize endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResizeRequest {
    pub cols: u16,
    pub rows: u16,
}

/// Boolean outcome for input/resize/close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
}
