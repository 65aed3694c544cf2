//! `PtyEndpoint` — a thin, typed wrapper over a `portable-pty` master handle.
//!
//! `portable-pty` already carries the POSIX/Windows split (`openpty(3)` vs.
//! ConPTY) behind its `MasterPty`/`SlavePty` traits, so this module does not
//! duplicate that split — it adds the resize-is-safe-to-call-concurrently
//! and close-is-idempotent guarantees the spec requires on top of it.

use metashell_core::{MetaShellError, Result};
use portable_pty::{native_pty_system, MasterPty, PtySize, SlavePty};
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

/// One end of a pseudoterminal pair, bound to a spawned child.
///
/// Cloning shares the same master handle (and the same resize mutex), which
/// is what lets `resize` be called safely while the pumps are mid-I/O.
#[derive(Clone)]
pub struct PtyEndpoint {
    master: Arc<Mutex<Option<Box<dyn MasterPty + Send>>>>,
    size: Arc<Mutex<(u16, u16)>>,
}

impl PtyEndpoint {
    /// Allocate a new pseudoterminal pair at `cols`x`rows`.
    ///
    /// Returns the endpoint (master side) and the slave, which the caller
    /// must hand to `ChildProcess::spawn` exactly once.
    pub fn open(cols: u16, rows: u16) -> Result<(Self, Box<dyn SlavePty + Send>)> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| MetaShellError::PtyAllocFailed(e.to_string()))?;

        let endpoint = Self {
            master: Arc::new(Mutex::new(Some(pair.master))),
            size: Arc::new(Mutex::new((cols, rows))),
        };

        Ok((endpoint, pair.slave))
    }

    /// Update the window size. Idempotent: calling twice with the same
    /// values has the same externally visible effect as calling once.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        let guard = self.master.lock().unwrap();
        let master = guard
            .as_ref()
            .ok_or_else(|| MetaShellError::PtyAllocFailed("endpoint closed".into()))?;
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| MetaShellError::Io(std::io::Error::other(e.to_string())))?;
        *self.size.lock().unwrap() = (cols, rows);
        Ok(())
    }

    /// Current `(cols, rows)`.
    pub fn size(&self) -> (u16, u16) {
        *self.size.lock().unwrap()
    }

    /// Take the write half bound to the master side. Call once per endpoint.
    pub fn master_writer(&self) -> Result<Box<dyn Write + Send>> {
        let guard = self.master.lock().unwrap();
        let master = guard
            .as_ref()
            .ok_or_else(|| MetaShellError::PtyAllocFailed("endpoint closed".into()))?;
        master
            .take_writer()
            .map_err(|e| MetaShellError::PtyAllocFailed(e.to_string()))
    }

    /// Clone a read handle bound to the master side.
    pub fn master_reader(&self) -> Result<Box<dyn Read + Send>> {
        let guard = self.master.lock().unwrap();
        let master = guard
            .as_ref()
            .ok_or_else(|| MetaShellError::PtyAllocFailed("endpoint closed".into()))?;
        master
            .try_clone_reader()
            .map_err(|e| MetaShellError::PtyAllocFailed(e.to_string()))
    }

    /// Idempotently release the master handle. Any pending read on a
    /// previously cloned reader then observes end-of-stream.
    pub fn close(&self) {
        self.master.lock().unwrap().take();
    }

    /// The master side's raw fd, for `poll`ing readability before issuing a
    /// blocking read on a cloned reader — `portable-pty`'s reader handles
    /// have no read timeout of their own. POSIX only: `MasterPty::as_raw_fd`
    /// doesn't exist on the Windows backend.
    #[cfg(unix)]
    pub fn master_raw_fd(&self) -> Option<std::os::unix::io::RawFd> {
        self.master.lock().unwrap().as_ref().and_then(|m| m.as_raw_fd())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_is_idempotent() {
        let (endpoint, _slave) = PtyEndpoint::open(80, 24).expect("openpty should work in CI");
        endpoint.resize(100, 40).unwrap();
        endpoint.resize(100, 40).unwrap();
        assert_eq!(endpoint.size(), (100, 40));
    }

    #[test]
    fn close_then_master_reader_fails() {
        let (endpoint, _slave) = PtyEndpoint::open(80, 24).expect("openpty should work in CI");
        endpoint.close();
        assert!(endpoint.master_reader().is_err());
    }
}
