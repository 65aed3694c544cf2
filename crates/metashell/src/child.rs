//! `ChildProcess` — spawns a shell command line into a PTY slave and tracks
//! its lifecycle.

use metashell_core::{MetaShellError, Result};
use portable_pty::{Child, CommandBuilder, SlavePty};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildState {
    Running,
    Reaped(u32),
}

/// A process running behind a PTY slave.
///
/// `spawn` consumes the slave handed back by `PtyEndpoint::open` — a
/// `ChildProcess` and its `PtyEndpoint` are always created in that order and
/// always torn down in the reverse order (§9 teardown invariant).
pub struct ChildProcess {
    child: Arc<Mutex<Box<dyn Child + Send + Sync>>>,
    state: Arc<Mutex<ChildState>>,
}

impl ChildProcess {
    /// Tokenize `command_line` with shell-word rules and spawn it attached
    /// to `slave`, running in `cwd` if given.
    pub fn spawn(
        slave: Box<dyn SlavePty + Send>,
        command_line: &str,
        cwd: Option<&str>,
    ) -> Result<Self> {
        let argv = shell_words::split(command_line)
            .map_err(|e| MetaShellError::SpawnFailed(e.to_string()))?;
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| MetaShellError::SpawnFailed("empty command line".into()))?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        if let Some(cwd) = cwd {
            cmd.cwd(cwd);
        }

        let child = slave
            .spawn_command(cmd)
            .map_err(|e| MetaShellError::SpawnFailed(e.to_string()))?;

        Ok(Self {
            child: Arc::new(Mutex::new(child)),
            state: Arc::new(Mutex::new(ChildState::Running)),
        })
    }

    /// Best-effort kill. Safe to call on an already-exited child.
    pub fn terminate(&self) -> Result<()> {
        let mut guard = self.child.lock().unwrap();
        match guard.kill() {
            Ok(()) => Ok(()),
            Err(e) if !self.is_alive() => {
                tracing::debug!("terminate on already-exited child: {e}");
                Ok(())
            }
            Err(e) => Err(MetaShellError::Io(e)),
        }
    }

    /// Block until the child exits, returning its exit code. Idempotent:
    /// calling a second time returns the code recorded the first time.
    pub fn reap(&self) -> Result<u32> {
        let mut state = self.state.lock().unwrap();
        if let ChildState::Reaped(code) = *state {
            return Ok(code);
        }
        let mut guard = self.child.lock().unwrap();
        let status = guard.wait().map_err(MetaShellError::Io)?;
        let code = status.exit_code();
        *state = ChildState::Reaped(code);
        Ok(code)
    }

    /// Non-blocking liveness check.
    pub fn is_alive(&self) -> bool {
        if matches!(*self.state.lock().unwrap(), ChildState::Reaped(_)) {
            return false;
        }
        matches!(self.child.lock().unwrap().try_wait(), Ok(None))
    }
}
