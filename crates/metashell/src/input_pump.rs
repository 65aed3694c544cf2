//! `InputPump` — serializes queued writes to the child while offering an
//! urgent bypass path for control bytes like Ctrl-C.

use metashell_core::{MetaShellError, Result};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Writer-side half of a session's I/O. Queued writes are FIFO and each is
/// delivered as one atomic byte-string; urgent writes bypass the queue
/// entirely and have no ordering relation to it.
pub struct InputPump {
    sender: crossbeam_channel::Sender<Vec<u8>>,
    urgent_writer: Arc<Mutex<Box<dyn Write + Send>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl InputPump {
    /// Spawn the queue-draining thread writing to `writer`. `writer` is also
    /// shared for the urgent path so both go to the same underlying stream.
    pub fn spawn(writer: Box<dyn Write + Send>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded::<Vec<u8>>();
        let shared = Arc::new(Mutex::new(writer));

        let thread_writer = shared.clone();
        let handle = std::thread::spawn(move || {
            while let Ok(bytes) = receiver.recv() {
                if bytes.is_empty() {
                    break;
                }
                let mut guard = thread_writer.lock().unwrap();
                if let Err(e) = guard.write_all(&bytes).and_then(|_| guard.flush()) {
                    tracing::warn!("input pump write failed: {e}");
                }
            }
        });

        Self {
            sender,
            urgent_writer: shared,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Enqueue `bytes` for ordered delivery. Returns immediately.
    pub fn send(&self, bytes: Vec<u8>) -> Result<()> {
        self.sender
            .send(bytes)
            .map_err(|e| MetaShellError::WriteFailed(e.to_string()))
    }

    /// Write `bytes` directly to the child, bypassing the queue.
    pub fn send_urgent(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = self.urgent_writer.lock().unwrap();
        guard.write_all(bytes).map_err(MetaShellError::Io)?;
        guard.flush().map_err(MetaShellError::Io)
    }

    /// Unblock and join the draining thread via a zero-length sentinel.
    pub fn stop(&self) {
        let _ = self.sender.send(Vec::new());
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc as StdArc, Mutex as StdMutex};

    #[derive(Clone, Default)]
    struct RecordingWriter(StdArc<StdMutex<Vec<u8>>>);

    impl Write for RecordingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn queued_writes_are_fifo() {
        let recorded = StdArc::new(StdMutex::new(Vec::new()));
        let writer = RecordingWriter(recorded.clone());
        let pump = InputPump::spawn(Box::new(writer));

        pump.send(b"a".to_vec()).unwrap();
        pump.send(b"b".to_vec()).unwrap();
        pump.send(b"c".to_vec()).unwrap();
        pump.stop();

        assert_eq!(&recorded.lock().unwrap()[..], b"abc");
    }
}
