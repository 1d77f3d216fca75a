use std::io::{Read, Write};
use std::path::Path;
use std::thread;

use anyhow::{Context, Result};
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;

/// Notification pushed by the PTY pump thread to the owning session's
/// consumer task. Chunk boundaries carry no meaning; the OS splits output
/// wherever it likes.
#[derive(Debug)]
pub(crate) enum PtyMessage {
    Output(String),
    Exit(i32),
}

/// Handles PTY process management for exactly one child process.
pub(crate) struct PtyHandler {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
}

impl PtyHandler {
    /// Spawn `shell` as a login shell attached to a fresh PTY of the given
    /// geometry, inheriting the server's environment.
    ///
    /// Output chunks and the final exit code arrive on the returned channel,
    /// pumped by a dedicated reader thread. `Exit` is sent exactly once,
    /// after the reader drains to EOF, so it always trails the last chunk.
    pub fn spawn(
        shell: &str,
        working_dir: &Path,
        cols: u16,
        rows: u16,
    ) -> Result<(Self, mpsc::UnboundedReceiver<PtyMessage>)> {
        let pty_system = native_pty_system();

        let pty_pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("Failed to open PTY")?;

        let master = pty_pair.master;
        let slave = pty_pair.slave;

        let mut cmd = CommandBuilder::new(shell);
        cmd.arg("-l");
        cmd.cwd(working_dir);
        cmd.env("TERM", "xterm-color");

        let mut child = slave
            .spawn_command(cmd)
            .context("Failed to spawn shell in PTY")?;
        drop(slave);

        let killer = child.clone_killer();
        let mut reader = master
            .try_clone_reader()
            .context("Failed to clone PTY reader")?;
        let writer = master.take_writer().context("Failed to take PTY writer")?;

        let (tx, rx) = mpsc::unbounded_channel();

        // Pump thread: owns the reader and the child. Reads until EOF (the
        // child exited or was killed), then reaps the exit code. Blocking
        // reads stay off the async runtime entirely.
        thread::spawn(move || {
            let mut buffer = vec![0u8; 4096];
            loop {
                match reader.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(n) => {
                        let data = String::from_utf8_lossy(&buffer[..n]).to_string();
                        if tx.send(PtyMessage::Output(data)).is_err() {
                            // Consumer gone - stop pumping, still reap below
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }

            let exit_code = child
                .wait()
                .map(|status| status.exit_code() as i32)
                .unwrap_or(-1);
            let _ = tx.send(PtyMessage::Exit(exit_code));
        });

        Ok((
            Self {
                master,
                writer,
                killer,
            },
            rx,
        ))
    }

    /// Write raw keystrokes to the process's input.
    pub fn write(&mut self, data: &str) -> Result<()> {
        self.writer
            .write_all(data.as_bytes())
            .context("Failed to write to PTY")?;
        self.writer.flush().context("Failed to flush PTY writer")?;
        Ok(())
    }

    /// Inform the PTY of a new terminal geometry.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("Failed to resize PTY")?;
        Ok(())
    }

    /// Request termination. Safe to call repeatedly and after the child has
    /// already exited; failures are swallowed.
    pub fn kill(&mut self) {
        let _ = self.killer.kill();
    }
}
