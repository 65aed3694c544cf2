//! `IoBridge` — owns one `OutputPump` and one `InputPump` for a session and
//! enforces the register-then-send ordering invariant of `send_line`.

use crate::input_pump::InputPump;
use crate::output_pump::{OutputPump, PollHandle};
use metashell_core::Result;
use std::io::{Read, Write};

/// Line terminator sent after a dispatched command: `\n` on POSIX, `\r\n` on
/// Windows.
#[cfg(unix)]
const LINE_TERMINATOR: &[u8] = b"\n";
#[cfg(windows)]
const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Composes the two pumps bound to one PTY master.
pub struct IoBridge {
    output: OutputPump,
    input: InputPump,
}

impl IoBridge {
    /// Start both pumps over `reader`/`writer`, emitting surviving output
    /// bytes to `sink`. `poll_handle` is the master's raw fd (unix), used by
    /// the output pump to bound its blocking reads; see
    /// `output_pump::PollHandle`.
    pub fn start(
        reader: Box<dyn Read + Send>,
        writer: Box<dyn Write + Send>,
        sink: Box<dyn Write + Send>,
        poll_handle: PollHandle,
    ) -> Self {
        Self {
            output: OutputPump::spawn(reader, sink, poll_handle),
            input: InputPump::spawn(writer),
        }
    }

    /// Register `text`'s echo for suppression, then enqueue
    /// `text + line-terminator`. Order matters: registering first closes the
    /// race where the echo arrives before the suppression rule exists.
    pub fn send_line(&self, text: &str) -> Result<()> {
        self.output.suppress_next(text);
        let mut bytes = text.as_bytes().to_vec();
        bytes.extend_from_slice(LINE_TERMINATOR);
        self.input.send(bytes)
    }

    /// Enqueue raw bytes for ordered delivery (no suppression registration).
    pub fn send(&self, bytes: &[u8]) -> Result<()> {
        self.input.send(bytes.to_vec())
    }

    /// Write raw bytes directly, bypassing the queue.
    pub fn send_urgent(&self, bytes: &[u8]) -> Result<()> {
        self.input.send_urgent(bytes)
    }

    /// Stop the input pump, then the output pump (§9 teardown ordering).
    pub fn stop(&self) {
        self.input.stop();
        self.output.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn send_line_appends_platform_terminator() {
        // A bridge whose reader is immediately at EOF; exercises only the
        // input side and send_line's terminator choice.
        let reader: Box<dyn Read + Send> = Box::new(Cursor::new(Vec::<u8>::new()));
        let (tx, rx) = std::sync::mpsc::channel::<Vec<u8>>();
        struct ChanWriter(std::sync::mpsc::Sender<Vec<u8>>);
        impl Write for ChanWriter {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                let _ = self.0.send(buf.to_vec());
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let writer: Box<dyn Write + Send> = Box::new(ChanWriter(tx));
        let sink: Box<dyn Write + Send> = Box::new(Cursor::new(Vec::<u8>::new()));

        #[cfg(unix)]
        let poll_handle = None;
        #[cfg(windows)]
        let poll_handle = ();
        let bridge = IoBridge::start(reader, writer, sink, poll_handle);
        bridge.send_line("echo hi").unwrap();
        let got = rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap();
        assert_eq!(got, [b"echo hi", LINE_TERMINATOR].concat());
        bridge.stop();
    }
}
