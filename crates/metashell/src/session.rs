//! `Session` — composes a `PtyEndpoint`, `ChildProcess`, and `IoBridge` into
//! the unit of work the interpreter drives.

use crate::bridge::IoBridge;
use crate::child::ChildProcess;
use crate::pty::PtyEndpoint;
use metashell_core::{MetaShellConfig, MetaShellError, Result};
use std::io;

/// A running (or not-yet-started) shell behind a PTY.
pub struct Session {
    label: String,
    command_line: String,
    cols: u16,
    rows: u16,
    endpoint: Option<PtyEndpoint>,
    child: Option<ChildProcess>,
    bridge: Option<IoBridge>,
    settle_ms: u64,
}

impl Session {
    /// Build an unstarted session for `command_line` at `cols`x`rows`.
    pub fn new(
        label: impl Into<String>,
        command_line: impl Into<String>,
        cols: u16,
        rows: u16,
    ) -> Self {
        Self {
            label: label.into(),
            command_line: command_line.into(),
            cols,
            rows,
            endpoint: None,
            child: None,
            bridge: None,
            settle_ms: 50,
        }
    }

    /// Apply the configured settle delay, overriding the `Session::new` default.
    pub fn with_pacing(mut self, config: &MetaShellConfig) -> Self {
        self.settle_ms = config.pacing.settle_ms;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Open the PTY, spawn the child, and start the I/O bridge.
    pub fn start(&mut self) -> Result<()> {
        let (endpoint, slave) = PtyEndpoint::open(self.cols, self.rows)?;
        let child = ChildProcess::spawn(slave, &self.command_line, None)?;

        #[cfg(unix)]
        let poll_handle = endpoint.master_raw_fd();
        #[cfg(windows)]
        let poll_handle = ();

        let reader = endpoint.master_reader()?;
        let writer = endpoint.master_writer()?;
        let sink: Box<dyn io::Write + Send> = Box::new(io::stdout());
        let bridge = IoBridge::start(reader, writer, sink, poll_handle);

        tracing::info!(label = %self.label, command = %self.command_line, "session started");

        self.endpoint = Some(endpoint);
        self.child = Some(child);
        self.bridge = Some(bridge);
        Ok(())
    }

    /// Stop bridge → terminate child → close PTY (§9 teardown ordering).
    pub fn stop(&mut self) {
        if let Some(bridge) = self.bridge.take() {
            bridge.stop();
        }
        if let Some(child) = self.child.take() {
            if let Err(e) = child.terminate() {
                tracing::warn!(label = %self.label, error = %e, "terminate failed");
            }
            if let Err(e) = child.reap() {
                tracing::warn!(label = %self.label, error = %e, "reap failed");
            }
        }
        if let Some(endpoint) = self.endpoint.take() {
            endpoint.close();
        }
        tracing::info!(label = %self.label, "session stopped");
    }

    /// Send a dispatched command line, then pause `settle_ms` to let the
    /// child begin processing before the next loop iteration.
    pub fn send_command(&self, text: &str) -> Result<()> {
        self.bridge()?.send_line(text)?;
        std::thread::sleep(std::time::Duration::from_millis(self.settle_ms));
        Ok(())
    }

    /// Queued raw bytes (e.g. Ctrl-Z, Ctrl-L).
    pub fn send_raw(&self, bytes: &[u8]) -> Result<()> {
        self.bridge()?.send(bytes)
    }

    /// Bypass-queue bytes (e.g. Ctrl-C).
    pub fn send_urgent(&self, bytes: &[u8]) -> Result<()> {
        self.bridge()?.send_urgent(bytes)
    }

    /// Resize the underlying PTY and remember the new defaults.
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        self.cols = cols;
        self.rows = rows;
        if let Some(endpoint) = &self.endpoint {
            endpoint.resize(cols, rows)?;
        }
        Ok(())
    }

    pub fn is_alive(&self) -> bool {
        self.child.as_ref().is_some_and(ChildProcess::is_alive)
    }

    fn bridge(&self) -> Result<&IoBridge> {
        self.bridge
            .as_ref()
            .ok_or_else(|| MetaShellError::SessionNotFound(self.label.clone()))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.bridge.is_some() || self.child.is_some() || self.endpoint.is_some() {
            self.stop();
        }
    }
}
