//! `OutputPump` — drains the PTY master's read side to stdout, suppressing
//! echoed command lines and handling the pre-prompt "banner" phase.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

#[cfg(unix)]
const PROMPT_SIGILS: [char; 3] = ['$', '#', '>'];
#[cfg(windows)]
const PROMPT_SIGILS: [char; 1] = ['>'];

const ALWAYS_SUPPRESS: [&str; 2] = ["^c", "control-c"];

/// How often the drain thread re-checks the stop flag while the child is
/// silent. Keeps `stop()`'s join within the §5 ≤100ms bound.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Default)]
struct SuppressionState {
    suppress_queue: VecDeque<String>,
    last_suppressed: Option<String>,
}

impl SuppressionState {
    /// Returns `true` if `key` should be dropped rather than emitted.
    fn try_suppress(&mut self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        if ALWAYS_SUPPRESS.contains(&key) {
            return true;
        }
        if self.last_suppressed.as_deref() == Some(key) {
            return true;
        }
        if self.suppress_queue.front().map(String::as_str) == Some(key) {
            self.last_suppressed = self.suppress_queue.pop_front();
            return true;
        }
        self.last_suppressed = None;
        false
    }
}

/// Normalize a raw line into its suppression key: strip ANSI escapes, trim,
/// lowercase.
fn suppression_key(raw: &str) -> String {
    let stripped = strip_ansi_escapes::strip(raw.as_bytes());
    String::from_utf8_lossy(&stripped).trim().to_lowercase()
}

/// `true` if `s`, once ANSI-stripped and trimmed, ends in a shell prompt sigil.
fn looks_like_prompt(s: &[u8]) -> bool {
    let stripped = strip_ansi_escapes::strip(s);
    let text = String::from_utf8_lossy(&stripped);
    let trimmed = text.trim_end();
    trimmed
        .chars()
        .last()
        .is_some_and(|c| PROMPT_SIGILS.contains(&c))
}

/// Given `buf`, find the earliest line terminator, preferring `\r\n` over a
/// bare `\n` at the same or an earlier offset. Returns
/// `(content_end, terminator_len)`.
fn find_terminator(buf: &[u8]) -> Option<(usize, usize)> {
    for i in 0..buf.len() {
        if buf[i] == b'\n' {
            if i > 0 && buf[i - 1] == b'\r' {
                return Some((i - 1, 2));
            }
            return Some((i, 1));
        }
    }
    None
}

/// The fd to `poll` for readability before issuing a blocking read, so the
/// drain thread can re-check the stop flag on every timeout tick instead of
/// blocking indefinitely inside `reader.read()`. `portable-pty`'s
/// `MasterPty::as_raw_fd` only exists on the Unix backend — Windows has no
/// pollable handle for this, so the drain thread there still does a plain
/// blocking read and `stop()` detaches instead of joining it.
#[cfg(unix)]
pub type PollHandle = Option<std::os::unix::io::RawFd>;
#[cfg(windows)]
pub type PollHandle = ();

#[cfg(unix)]
fn wait_readable(fd: std::os::unix::io::RawFd, timeout: Duration) -> bool {
    unsafe {
        let mut fds = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = timeout.as_millis().min(i32::MAX as u128) as i32;
        let ready = libc::poll(&mut fds, 1, millis);
        ready > 0 && fds.revents & libc::POLLIN != 0
    }
}

/// Continuously reads child output and forwards the non-suppressed bytes to
/// a sink (real stdout in production, an in-memory buffer in tests).
pub struct OutputPump {
    suppression: Arc<Mutex<SuppressionState>>,
    stop: Arc<Mutex<bool>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl OutputPump {
    /// Spawn the background drain thread reading from `reader` and writing
    /// surviving bytes to `sink`. `poll_handle` is the master's raw fd (unix)
    /// used to bound how long a read can block; pass `None`/`()` for readers
    /// that won't come from a live PTY (e.g. tests).
    pub fn spawn(
        mut reader: Box<dyn Read + Send>,
        mut sink: Box<dyn Write + Send>,
        poll_handle: PollHandle,
    ) -> Self {
        let suppression = Arc::new(Mutex::new(SuppressionState::default()));
        let stop = Arc::new(Mutex::new(false));

        let thread_suppression = suppression.clone();
        let thread_stop = stop.clone();
        let handle = std::thread::spawn(move || {
            let mut banner_done = false;
            let mut residual: Vec<u8> = Vec::new();
            let mut chunk = [0u8; 4096];

            loop {
                if *thread_stop.lock().unwrap() {
                    break;
                }

                #[cfg(unix)]
                {
                    if let Some(fd) = poll_handle {
                        if !wait_readable(fd, POLL_INTERVAL) {
                            continue;
                        }
                    }
                }
                #[cfg(windows)]
                {
                    let _ = &poll_handle;
                }

                let n = match reader.read(&mut chunk) {
                    Ok(0) => {
                        let _ = sink.write_all(&residual);
                        let _ = sink.flush();
                        break;
                    }
                    Ok(n) => n,
                    Err(_) => {
                        let _ = sink.write_all(&residual);
                        let _ = sink.flush();
                        break;
                    }
                };

                if !banner_done {
                    let _ = sink.write_all(&chunk[..n]);
                    let _ = sink.flush();
                    if looks_like_prompt(&chunk[..n]) {
                        banner_done = true;
                        residual.clear();
                    }
                    continue;
                }

                residual.extend_from_slice(&chunk[..n]);

                let mut emit = Vec::new();
                loop {
                    match find_terminator(&residual) {
                        Some((content_end, term_len)) => {
                            let content: Vec<u8> = residual.drain(..content_end).collect();
                            let terminator: Vec<u8> = residual.drain(..term_len).collect();
                            let text = String::from_utf8_lossy(&content);
                            let key = suppression_key(&text);
                            let suppressed =
                                thread_suppression.lock().unwrap().try_suppress(&key);
                            if !suppressed {
                                emit.extend_from_slice(&content);
                                emit.extend_from_slice(&terminator);
                            }
                        }
                        None => {
                            if !residual.is_empty() && looks_like_prompt(&residual) {
                                emit.extend_from_slice(&residual);
                                residual.clear();
                            }
                            break;
                        }
                    }
                }
                if !emit.is_empty() {
                    let _ = sink.write_all(&emit);
                    let _ = sink.flush();
                }
            }
        });

        Self {
            suppression,
            stop,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Register `command` so its echo (and only its echo) is dropped.
    ///
    /// Must be called before the corresponding bytes are written into the
    /// child (§4.C happens-before invariant).
    pub fn suppress_next(&self, command: &str) {
        let key = suppression_key(command);
        if key.is_empty() {
            return;
        }
        self.suppression.lock().unwrap().suppress_queue.push_back(key);
    }

    /// Signal the drain thread to stop. On unix the thread re-checks the
    /// stop flag within `POLL_INTERVAL` regardless of child activity, so
    /// joining it is bounded. On Windows the thread may still be blocked in
    /// `reader.read()` with no way to interrupt it from here — `portable-pty`
    /// exposes no pollable handle there — so the thread is detached instead
    /// and exits on its own once the child produces more bytes or closes.
    pub fn stop(&self) {
        *self.stop.lock().unwrap() = true;
        let handle = self.handle.lock().unwrap().take();
        #[cfg(unix)]
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        #[cfg(windows)]
        drop(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ansi_wrapped_echo_matches_plain_key() {
        assert_eq!(suppression_key("\x1b[32mls\x1b[0m"), "ls");
    }

    #[test]
    fn prompt_sigil_detection() {
        #[cfg(unix)]
        assert!(looks_like_prompt(b"user@host:~$ "));
        assert!(looks_like_prompt(b"C:\\> "));
        assert!(!looks_like_prompt(b"hi there"));
    }

    #[test]
    fn terminator_prefers_crlf_over_lone_lf() {
        let buf = b"hello\r\nworld\n";
        let (content_end, term_len) = find_terminator(buf).unwrap();
        assert_eq!(content_end, 5);
        assert_eq!(term_len, 2);
    }

    #[test]
    fn duplicate_echo_is_tolerated() {
        let mut state = SuppressionState::default();
        state.suppress_queue.push_back("echo hi".to_string());
        assert!(state.try_suppress("echo hi"));
        assert!(state.try_suppress("echo hi"));
        assert!(!state.try_suppress("hi"));
    }

    #[test]
    fn always_suppress_set_drops_control_c_echo() {
        let mut state = SuppressionState::default();
        assert!(state.try_suppress("^c"));
        assert!(state.try_suppress("control-c"));
    }

    #[test]
    fn empty_key_passes_through() {
        let mut state = SuppressionState::default();
        assert!(!state.try_suppress(""));
    }
}
