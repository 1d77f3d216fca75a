use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::pty_handler::PtyHandler;

/// Session ID type
pub type SessionId = Uuid;

/// One chunk of terminal output, tagged with its position in the session's
/// output history. `seq` is strictly increasing per session, starting at 1,
/// and is never reused or renumbered - clients ask for "everything with
/// `seq > since`" regardless of how much the buffer has been trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtyEvent {
    pub seq: u64,
    pub data: String,
}

/// Result of a stream read: the filtered events plus enough state for the
/// client to issue its next `since` and know whether more will ever come.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub events: Vec<PtyEvent>,
    pub next_seq: u64,
    pub closed: bool,
}

/// Sequenced, boundedly-retained event log. Trimming drops the oldest
/// entries but never touches the numbering of what remains.
#[derive(Debug)]
pub(crate) struct EventLog {
    events: VecDeque<PtyEvent>,
    next_seq: u64,
    closed: bool,
    updated_at: Instant,
    max_events: usize,
}

impl EventLog {
    pub(crate) fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::new(),
            next_seq: 1,
            closed: false,
            updated_at: Instant::now(),
            max_events,
        }
    }

    pub(crate) fn append(&mut self, data: String) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push_back(PtyEvent { seq, data });
        while self.events.len() > self.max_events {
            self.events.pop_front();
        }
        self.updated_at = Instant::now();
        seq
    }

    pub(crate) fn read_since(&self, since: u64) -> Vec<PtyEvent> {
        self.events
            .iter()
            .filter(|event| event.seq > since)
            .cloned()
            .collect()
    }

    pub(crate) fn chunk(&self, since: u64) -> StreamChunk {
        StreamChunk {
            events: self.read_since(since),
            next_seq: self.next_seq,
            closed: self.closed,
        }
    }

}

/// A single live terminal session: one PTY-backed child process, its event
/// log, and the wake channel for pending long-poll readers.
///
/// All mutable state sits behind this session's own locks; different
/// sessions never contend with each other. The locks are only ever held for
/// short synchronous sections - long-poll suspension happens outside them.
pub struct PtySession {
    id: SessionId,
    access_token: String,
    cwd: PathBuf,
    shell: String,
    created_at: DateTime<Utc>,
    log: Mutex<EventLog>,
    output_notify: Notify,
    handler: Mutex<PtyHandler>,
}

impl PtySession {
    pub(crate) fn new(shell: String, cwd: PathBuf, handler: PtyHandler, max_events: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            access_token: Uuid::new_v4().to_string(),
            cwd,
            shell,
            created_at: Utc::now(),
            log: Mutex::new(EventLog::new(max_events)),
            output_notify: Notify::new(),
            handler: Mutex::new(handler),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn access_token(&self) -> &str {
        &self.access_token
    }

    /// True iff `token` is non-empty and exactly equals this session's
    /// access token.
    pub fn token_matches(&self, token: &str) -> bool {
        !token.is_empty() && token == self.access_token
    }

    /// Append one output chunk: assign the next seq, trim past the cap,
    /// refresh the activity clock, then wake every pending reader. Readers
    /// woken here always observe the post-trim state.
    pub(crate) fn append(&self, data: String) {
        self.log.lock().unwrap().append(data);
        self.output_notify.notify_waiters();
    }

    /// Mark the underlying process as exited and wake pending readers so
    /// they can report `closed` instead of waiting out their timeout.
    /// Already-buffered events remain readable.
    pub(crate) fn mark_closed(&self) {
        self.log.lock().unwrap().closed = true;
        self.output_notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.log.lock().unwrap().closed
    }

    /// Non-destructive filtered read; refreshes the idle clock as a side
    /// effect of the session being actively watched.
    pub fn read_since(&self, since: u64) -> StreamChunk {
        let mut log = self.log.lock().unwrap();
        log.updated_at = Instant::now();
        log.chunk(since)
    }

    /// Block until new output exists past `since`, the session closes, or
    /// `wait` elapses - whichever comes first. A timeout yields a
    /// well-formed (possibly empty) chunk, never an error.
    ///
    /// Concurrent callers each park independently and are all woken by a
    /// single append; each recomputes its own `since`-filtered view, so no
    /// event is ever "consumed" by one reader at another's expense.
    pub async fn read_long_poll(&self, since: u64, wait: Duration) -> StreamChunk {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            // Register for the wake before checking, so an append racing
            // with the check cannot slip through unseen.
            let notified = self.output_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let chunk = self.read_since(since);
            if !chunk.events.is_empty() || chunk.closed || wait.is_zero() {
                return chunk;
            }

            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    return self.read_since(since);
                }
                _ = &mut notified => {}
            }
        }
    }

    /// Forward raw keystrokes to the process. Returns false once the
    /// process has exited or if the PTY rejects the write.
    pub fn write_input(&self, data: &str) -> bool {
        if self.is_closed() {
            return false;
        }
        if self.handler.lock().unwrap().write(data).is_err() {
            return false;
        }
        self.touch();
        true
    }

    /// Apply a new terminal geometry, clamped to sane floors. Returns false
    /// once the process has exited.
    pub fn resize(&self, cols: u16, rows: u16) -> bool {
        if self.is_closed() {
            return false;
        }
        let (cols, rows) = resize_geometry(cols, rows);
        if self.handler.lock().unwrap().resize(cols, rows).is_err() {
            return false;
        }
        self.touch();
        true
    }

    /// Request process termination; errors are swallowed, repeat calls are
    /// harmless. Actual exit is observed asynchronously by the pump.
    pub fn kill(&self) {
        self.handler.lock().unwrap().kill();
    }

    pub(crate) fn idle_for(&self) -> Duration {
        self.log.lock().unwrap().updated_at.elapsed()
    }

    fn touch(&self) {
        self.log.lock().unwrap().updated_at = Instant::now();
    }
}

/// Resize floors sit below the create floors; zero and near-zero
/// geometries are raised to 20x5.
fn resize_geometry(cols: u16, rows: u16) -> (u16, u16) {
    (
        cols.max(crate::MIN_RESIZE_COLS),
        rows.max(crate::MIN_RESIZE_ROWS),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_strictly_increasing_seqs_from_one() {
        let mut log = EventLog::new(100);
        for expected in 1..=20u64 {
            let seq = log.append(format!("chunk {expected}"));
            assert_eq!(seq, expected);
        }
        assert_eq!(log.next_seq, 21);
    }

    #[test]
    fn retention_is_bounded_and_keeps_the_newest_events() {
        let mut log = EventLog::new(5);
        for i in 1..=12u64 {
            log.append(format!("e{i}"));
        }
        assert_eq!(log.events.len(), 5);
        let seqs: Vec<u64> = log.read_since(0).iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![8, 9, 10, 11, 12]);
        // Trimming never renumbers what it keeps
        assert_eq!(log.next_seq, 13);
    }

    #[test]
    fn read_since_filters_and_is_idempotent() {
        let mut log = EventLog::new(100);
        for i in 1..=6u64 {
            log.append(format!("e{i}"));
        }
        let first = log.read_since(4);
        let second = log.read_since(4);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].seq, 5);
        assert_eq!(first[1].seq, 6);
    }

    #[test]
    fn stale_since_below_oldest_retained_returns_everything_retained() {
        let mut log = EventLog::new(3);
        for i in 1..=10u64 {
            log.append(format!("e{i}"));
        }
        // Events 1..=7 are gone; a reader stuck at since=2 just gets the
        // retained tail, not an error.
        let events = log.read_since(2);
        let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![8, 9, 10]);
    }

    #[test]
    fn resize_geometry_raises_tiny_requests_to_the_floors() {
        assert_eq!(resize_geometry(1, 1), (20, 5));
        assert_eq!(resize_geometry(0, 0), (20, 5));
        assert_eq!(resize_geometry(19, 4), (20, 5));
    }

    #[test]
    fn resize_geometry_passes_small_but_sane_requests_through() {
        assert_eq!(resize_geometry(20, 5), (20, 5));
        assert_eq!(resize_geometry(100, 40), (100, 40));
    }

    #[test]
    fn chunk_reports_next_seq_and_closed() {
        let mut log = EventLog::new(10);
        log.append("hello".to_string());
        let chunk = log.chunk(0);
        assert_eq!(chunk.next_seq, 2);
        assert!(!chunk.closed);

        log.closed = true;
        let chunk = log.chunk(1);
        assert!(chunk.events.is_empty());
        assert!(chunk.closed);
    }
}
