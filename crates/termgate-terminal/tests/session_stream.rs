use std::time::Duration;

use tempfile::TempDir;
use termgate_terminal::{CreateSessionOptions, CreatedSession, ManagerConfig, TerminalManager};

fn test_manager(root: &TempDir) -> TerminalManager {
    let mut config = ManagerConfig::new(root.path().to_path_buf());
    config.default_shell = Some("/bin/sh".to_string());
    TerminalManager::new(config)
}

fn create(manager: &TerminalManager) -> CreatedSession {
    manager
        .create_session(CreateSessionOptions {
            cols: Some(80),
            rows: Some(24),
            ..Default::default()
        })
        .expect("session should spawn")
}

/// Poll until `predicate` matches some buffered output, with an overall
/// deadline. Returns the concatenated output seen so far.
async fn wait_for_output<F>(
    manager: &TerminalManager,
    session_id: termgate_terminal::SessionId,
    predicate: F,
) -> String
where
    F: Fn(&str) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    let mut since = 0;
    let mut seen = String::new();
    while tokio::time::Instant::now() < deadline {
        let chunk = manager
            .read_stream_long_poll(session_id, since, Duration::from_millis(500))
            .await
            .expect("session should exist");
        since = chunk.next_seq - 1;
        for event in &chunk.events {
            seen.push_str(&event.data);
        }
        if predicate(&seen) {
            return seen;
        }
        if chunk.closed {
            break;
        }
    }
    panic!("expected output never arrived; saw: {seen:?}");
}

#[tokio::test]
async fn create_returns_token_start_event_and_sandboxed_cwd() {
    let root = TempDir::new().unwrap();
    let manager = test_manager(&root);

    let created = create(&manager);
    assert!(!created.access_token.is_empty());
    assert_eq!(created.cwd, root.path());
    assert_eq!(created.shell, "/bin/sh");
    assert_eq!(created.next_seq, 2);
    assert_eq!(created.events.len(), 1);
    assert_eq!(created.events[0].seq, 1);
    assert!(created.events[0]
        .data
        .contains(&format!("PTY session started: {}", created.session_id)));

    // The registered session reflects the same resolved state.
    assert_eq!(manager.config().root_dir, root.path());
    let session = manager.get_session(created.session_id).unwrap();
    assert_eq!(session.shell(), "/bin/sh");
    assert_eq!(session.cwd(), root.path());
    assert!(session.created_at() <= chrono::Utc::now());
}

#[tokio::test]
async fn tiny_geometry_requests_are_floored_and_still_usable() {
    let root = TempDir::new().unwrap();
    let manager = test_manager(&root);

    // Floors apply at create time, so the spawn itself must succeed.
    let created = manager
        .create_session(CreateSessionOptions {
            cols: Some(10),
            rows: Some(2),
            ..Default::default()
        })
        .expect("floored geometry should still spawn");

    // And at resize time: a 1x1 request is raised, not rejected.
    assert!(manager.resize(created.session_id, 1, 1));
    assert!(manager.write_input(created.session_id, "echo floored\n"));
    let seen =
        wait_for_output(&manager, created.session_id, |out| out.contains("floored")).await;
    assert!(seen.contains("floored"));
}

#[tokio::test]
async fn echo_round_trip_resolves_before_the_long_poll_timeout() {
    let root = TempDir::new().unwrap();
    let manager = test_manager(&root);
    let created = create(&manager);

    assert!(manager.write_input(created.session_id, "echo hi\n"));
    let seen = wait_for_output(&manager, created.session_id, |out| out.contains("hi")).await;
    assert!(seen.contains("hi"));
}

#[tokio::test]
async fn long_poll_wakes_promptly_when_output_arrives() {
    let root = TempDir::new().unwrap();
    let manager = std::sync::Arc::new(test_manager(&root));
    let created = create(&manager);

    // Let the prompt and login-shell chatter settle first.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let chunk = manager.read_stream(created.session_id, 0).unwrap();
    let since = chunk.next_seq - 1;

    let writer = std::sync::Arc::clone(&manager);
    let session_id = created.session_id;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        writer.write_input(session_id, "echo wake\n");
    });

    let start = tokio::time::Instant::now();
    let chunk = manager
        .read_stream_long_poll(created.session_id, since, Duration::from_secs(5))
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(!chunk.events.is_empty());
    assert!(
        elapsed < Duration::from_secs(3),
        "long poll should resolve on wake, not timeout (took {elapsed:?})"
    );
}

#[tokio::test]
async fn long_poll_times_out_with_an_empty_chunk() {
    let root = TempDir::new().unwrap();
    let manager = test_manager(&root);
    let created = create(&manager);

    tokio::time::sleep(Duration::from_millis(700)).await;
    let chunk = manager.read_stream(created.session_id, 0).unwrap();
    let since = chunk.next_seq - 1;

    let start = tokio::time::Instant::now();
    let chunk = manager
        .read_stream_long_poll(created.session_id, since, Duration::from_millis(400))
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(chunk.events.is_empty());
    assert!(!chunk.closed);
    assert!(
        elapsed >= Duration::from_millis(350),
        "timed-out poll returned too early ({elapsed:?})"
    );
}

#[tokio::test]
async fn escaping_cwd_is_silently_coerced_to_the_root() {
    let root = TempDir::new().unwrap();
    let manager = test_manager(&root);

    let created = manager
        .create_session(CreateSessionOptions {
            cwd: Some("../../etc".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(created.cwd, root.path());
}

#[tokio::test]
async fn operations_require_the_exact_access_token() {
    let root = TempDir::new().unwrap();
    let manager = test_manager(&root);
    let created = create(&manager);

    assert!(manager.authorize(created.session_id, &created.access_token));
    assert!(!manager.authorize(created.session_id, "wrong-token"));
    assert!(!manager.authorize(created.session_id, ""));
    assert!(!manager.authorize(uuid::Uuid::new_v4(), &created.access_token));
}

#[tokio::test]
async fn close_kills_the_session_and_rejects_further_io() {
    let root = TempDir::new().unwrap();
    let manager = test_manager(&root);
    let created = create(&manager);

    assert!(manager.close_session(created.session_id));
    assert!(!manager.write_input(created.session_id, "echo nope\n"));
    assert!(!manager.resize(created.session_id, 100, 30));
    assert!(!manager.close_session(created.session_id));
    assert!(manager.get_session(created.session_id).is_none());
}

#[tokio::test]
async fn idle_sessions_are_swept_after_the_ttl() {
    let root = TempDir::new().unwrap();
    let mut config = ManagerConfig::new(root.path().to_path_buf());
    config.default_shell = Some("/bin/sh".to_string());
    config.session_ttl = Duration::from_millis(50);
    let manager = TerminalManager::new(config);

    let stale = create(&manager);
    assert_eq!(manager.session_count(), 1);
    tokio::time::sleep(Duration::from_millis(700)).await;

    // Creation runs the sweep opportunistically.
    let fresh = create(&manager);
    assert_eq!(manager.session_count(), 1);
    assert!(manager.get_session(stale.session_id).is_none());
    assert!(manager.get_session(fresh.session_id).is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn process_exit_closes_the_session_but_history_stays_readable() {
    let root = TempDir::new().unwrap();
    let manager = test_manager(&root);
    let created = create(&manager);

    assert!(manager.write_input(created.session_id, "exit\n"));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let chunk = manager
            .read_stream_long_poll(created.session_id, 0, Duration::from_millis(500))
            .await
            .unwrap();
        if chunk.closed {
            let all: String = chunk.events.iter().map(|e| e.data.as_str()).collect();
            assert!(all.contains("[system] PTY exited"));
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "session never reported closed"
        );
    }

    // Closed but not evicted: buffered events remain readable, writes fail.
    assert!(manager.get_session(created.session_id).is_some());
    assert!(!manager.write_input(created.session_id, "echo nope\n"));
    let chunk = manager.read_stream(created.session_id, 0).unwrap();
    assert!(!chunk.events.is_empty());
}
