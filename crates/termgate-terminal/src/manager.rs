use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::pty_handler::{PtyHandler, PtyMessage};
use crate::sandbox::sanitize_cwd;
use crate::session::{PtyEvent, PtySession, SessionId, StreamChunk};
use crate::{
    DEFAULT_COLS, DEFAULT_ROWS, MAX_EVENTS, MIN_CREATE_COLS, MIN_CREATE_ROWS, SESSION_TTL,
};

/// Configuration for a terminal manager instance.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Directory bounding every session's working directory.
    pub root_dir: PathBuf,
    /// Shell used when a create request names none; falls back to `$SHELL`
    /// and then the platform default.
    pub default_shell: Option<String>,
    /// Per-session event retention cap.
    pub max_events: usize,
    /// Idle time after which a session is killed and evicted.
    pub session_ttl: Duration,
}

impl ManagerConfig {
    pub fn new(root_dir: PathBuf) -> Self {
        Self {
            root_dir,
            default_shell: None,
            max_events: MAX_EVENTS,
            session_ttl: SESSION_TTL,
        }
    }
}

/// Options accepted by `create_session`; everything is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSessionOptions {
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub shell: Option<String>,
    #[serde(default)]
    pub cols: Option<u16>,
    #[serde(default)]
    pub rows: Option<u16>,
}

/// Initial state handed back from `create_session`. This is the only place
/// the access token is ever surfaced.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedSession {
    pub session_id: SessionId,
    pub access_token: String,
    pub next_seq: u64,
    pub events: Vec<PtyEvent>,
    pub cwd: PathBuf,
    pub shell: String,
}

/// Owns every live terminal session. Constructed explicitly by the serving
/// component (one per server, one per test) rather than living in a global.
///
/// The session map is the only state shared across sessions; everything
/// else hangs off the individual `PtySession`, so operations on different
/// sessions only ever contend on the brief map lookups here.
pub struct TerminalManager {
    sessions: Mutex<HashMap<SessionId, Arc<PtySession>>>,
    config: ManagerConfig,
}

impl TerminalManager {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Create a new session: sweep expired sessions, resolve the shell and
    /// sandboxed cwd, spawn the PTY, wire its output pump, and register it.
    ///
    /// A spawn failure fails this call only - nothing is registered.
    /// Must run inside a tokio runtime (the output pump is a spawned task).
    pub fn create_session(&self, options: CreateSessionOptions) -> Result<CreatedSession> {
        self.cleanup_expired();

        let shell = options
            .shell
            .filter(|s| !s.is_empty())
            .or_else(|| self.config.default_shell.clone())
            .unwrap_or_else(default_shell);
        let cwd = sanitize_cwd(&self.config.root_dir, options.cwd.as_deref());
        let (cols, rows) = create_geometry(options.cols, options.rows);

        let (handler, mut rx) = PtyHandler::spawn(&shell, &cwd, cols, rows)?;
        let session = Arc::new(PtySession::new(
            shell.clone(),
            cwd.clone(),
            handler,
            self.config.max_events,
        ));
        session.append(format!(
            "\r\n[system] PTY session started: {}\r\n",
            session.id()
        ));

        // Consumer task: the single place that feeds this session's event
        // log from the pump thread, so output ordering matches what the OS
        // delivered and exit is observed after the final chunk.
        let consumer = Arc::clone(&session);
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match msg {
                    PtyMessage::Output(data) => consumer.append(data),
                    PtyMessage::Exit(exit_code) => {
                        // Exit event first, then close; readers woken by the
                        // close always see the full history.
                        consumer.append(format!("\r\n[system] PTY exited ({exit_code})\r\n"));
                        consumer.mark_closed();
                        break;
                    }
                }
            }
        });

        let chunk = session.read_since(0);
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id(), Arc::clone(&session));

        Ok(CreatedSession {
            session_id: session.id(),
            access_token: session.access_token().to_string(),
            next_seq: chunk.next_seq,
            events: chunk.events,
            cwd,
            shell,
        })
    }

    /// Look up a session by ID.
    pub fn get_session(&self, session_id: SessionId) -> Option<Arc<PtySession>> {
        self.sessions.lock().unwrap().get(&session_id).cloned()
    }

    /// True iff the session exists and `token` matches its access token.
    /// An empty token never authorizes anything.
    pub fn authorize(&self, session_id: SessionId, token: &str) -> bool {
        self.get_session(session_id)
            .map(|session| session.token_matches(token))
            .unwrap_or(false)
    }

    /// Immediate filtered read of buffered output.
    pub fn read_stream(&self, session_id: SessionId, since: u64) -> Option<StreamChunk> {
        Some(self.get_session(session_id)?.read_since(since))
    }

    /// Long-poll read: suspends (without holding any lock) until output
    /// arrives, the session closes, or `wait` elapses.
    pub async fn read_stream_long_poll(
        &self,
        session_id: SessionId,
        since: u64,
        wait: Duration,
    ) -> Option<StreamChunk> {
        let session = self.get_session(session_id)?;
        Some(session.read_long_poll(since, wait).await)
    }

    /// Send keystrokes to a session's process.
    pub fn write_input(&self, session_id: SessionId, data: &str) -> bool {
        self.get_session(session_id)
            .map(|session| session.write_input(data))
            .unwrap_or(false)
    }

    /// Resize a session's terminal.
    pub fn resize(&self, session_id: SessionId, cols: u16, rows: u16) -> bool {
        self.get_session(session_id)
            .map(|session| session.resize(cols, rows))
            .unwrap_or(false)
    }

    /// Kill a session's process and remove it from the registry. Pending
    /// long polls are woken so they return instead of idling out.
    pub fn close_session(&self, session_id: SessionId) -> bool {
        let removed = self.sessions.lock().unwrap().remove(&session_id);
        match removed {
            Some(session) => {
                session.kill();
                session.mark_closed();
                true
            }
            None => false,
        }
    }

    /// Kill and evict every session idle past the configured TTL. Runs
    /// opportunistically at the top of each create call.
    pub fn cleanup_expired(&self) {
        let expired: Vec<Arc<PtySession>> = {
            let mut sessions = self.sessions.lock().unwrap();
            let expired_ids: Vec<SessionId> = sessions
                .iter()
                .filter(|(_, session)| session.idle_for() > self.config.session_ttl)
                .map(|(id, _)| *id)
                .collect();
            expired_ids
                .iter()
                .filter_map(|id| sessions.remove(id))
                .collect()
        };

        for session in expired {
            session.kill();
            session.mark_closed();
        }
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

impl Drop for TerminalManager {
    fn drop(&mut self) {
        // Kill all sessions on drop
        if let Ok(mut sessions) = self.sessions.lock() {
            for (_, session) in sessions.drain() {
                session.kill();
            }
        }
    }
}

fn default_shell() -> String {
    if cfg!(windows) {
        "cmd.exe".to_string()
    } else {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
    }
}

/// Initial terminal geometry: missing or zero dimensions take the defaults,
/// and anything smaller than the create floors is raised to them.
fn create_geometry(cols: Option<u16>, rows: Option<u16>) -> (u16, u16) {
    let cols = cols
        .filter(|c| *c > 0)
        .unwrap_or(DEFAULT_COLS)
        .max(MIN_CREATE_COLS);
    let rows = rows
        .filter(|r| *r > 0)
        .unwrap_or(DEFAULT_ROWS)
        .max(MIN_CREATE_ROWS);
    (cols, rows)
}
