//! `RawLineReader` — puts the controlling terminal into raw mode and runs a
//! background thread that cooks a single edit line, splitting input into
//! completed lines and urgent control bytes.

use metashell_core::{MetaShellError, Result};
use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[cfg(unix)]
const CTRL_BYTES: [u8; 4] = [0x03, 0x04, 0x1A, 0x0C];
#[cfg(windows)]
const CTRL_BYTES: [u8; 3] = [0x03, 0x1A, 0x1B];

const ESC_BURST_MAX: usize = 8;
const ESC_BURST_WINDOW: Duration = Duration::from_millis(20);

#[derive(Default)]
struct Buffers {
    edit_buffer: String,
    line_queue: VecDeque<String>,
    ctrl_queue: VecDeque<u8>,
}

struct Shared {
    buffers: Mutex<Buffers>,
    signal: Condvar,
    stop: AtomicBool,
}

impl Shared {
    /// Apply the §4.G byte-handling rules for one input byte. `ESC` on
    /// POSIX is handled by the caller via the burst-discard window and
    /// never reaches this function.
    fn feed(&self, byte: u8) {
        let mut buffers = self.buffers.lock().unwrap();
        if CTRL_BYTES.contains(&byte) {
            buffers.ctrl_queue.push_back(byte);
            self.signal.notify_all();
            return;
        }
        match byte {
            0x0D | 0x0A => {
                let line = std::mem::take(&mut buffers.edit_buffer);
                buffers.line_queue.push_back(line);
                print!("\r\n");
                let _ = std::io::stdout().flush();
                self.signal.notify_all();
            }
            0x7F | 0x08 => {
                if buffers.edit_buffer.pop().is_some() {
                    print!("\x08 \x08");
                    let _ = std::io::stdout().flush();
                }
            }
            _ if byte.is_ascii_graphic() || byte == b' ' => {
                buffers.edit_buffer.push(byte as char);
                print!("{}", byte as char);
                let _ = std::io::stdout().flush();
            }
            _ => {}
        }
    }
}

/// Reads the controlling terminal one byte at a time, cooking its own line
/// buffer so canonical mode and local echo can stay disabled.
pub struct RawLineReader {
    shared: Arc<Shared>,
    _mode: RawMode,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RawLineReader {
    /// Enter raw mode on the controlling terminal and start the background
    /// reader thread. Raw-mode restoration happens in `Drop` on `RawMode`,
    /// so it runs on every exit path including panics.
    pub fn start() -> Result<Self> {
        let mode = RawMode::enable()?;
        let shared = Arc::new(Shared {
            buffers: Mutex::new(Buffers::default()),
            signal: Condvar::new(),
            stop: AtomicBool::new(false),
        });

        let thread_shared = shared.clone();
        let handle = std::thread::spawn(move || read_loop(&thread_shared));

        Ok(Self {
            shared,
            _mode: mode,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Block until signaled or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) {
        let buffers = self.shared.buffers.lock().unwrap();
        if !buffers.line_queue.is_empty() || !buffers.ctrl_queue.is_empty() {
            return;
        }
        let _ = self.shared.signal.wait_timeout(buffers, timeout);
    }

    /// Atomically remove and return all queued lines and control bytes.
    pub fn drain(&self) -> (Vec<String>, Vec<u8>) {
        let mut buffers = self.shared.buffers.lock().unwrap();
        let lines = buffers.line_queue.drain(..).collect();
        let ctrls = buffers.ctrl_queue.drain(..).collect();
        (lines, ctrls)
    }

    /// Signal the reader thread to stop and join it.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.signal.notify_all();
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RawLineReader {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One byte off stdin, or `None` on EOF/error.
fn read_one_byte() -> Option<u8> {
    use std::io::Read;
    let mut byte = [0u8; 1];
    match std::io::stdin().read(&mut byte) {
        Ok(1) => Some(byte[0]),
        _ => None,
    }
}

#[cfg(unix)]
fn poll_stdin_byte(timeout: Duration) -> Option<u8> {
    unsafe {
        let mut fds = libc::pollfd {
            fd: libc::STDIN_FILENO,
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = timeout.as_millis().min(i32::MAX as u128) as i32;
        let ready = libc::poll(&mut fds, 1, millis);
        if ready > 0 && fds.revents & libc::POLLIN != 0 {
            read_one_byte()
        } else {
            None
        }
    }
}

#[cfg(unix)]
fn discard_escape_burst() {
    let deadline = Instant::now() + ESC_BURST_WINDOW;
    let mut consumed = 0;
    while consumed < ESC_BURST_MAX {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() || poll_stdin_byte(remaining).is_none() {
            break;
        }
        consumed += 1;
    }
}

fn read_loop(shared: &Shared) {
    loop {
        if shared.stop.load(Ordering::Acquire) {
            break;
        }
        #[cfg(unix)]
        let byte = match poll_stdin_byte(Duration::from_millis(100)) {
            Some(b) => b,
            None => continue,
        };
        #[cfg(windows)]
        let byte = match read_one_byte() {
            Some(b) => b,
            None => break,
        };

        #[cfg(unix)]
        if byte == 0x1B {
            discard_escape_burst();
            continue;
        }

        shared.feed(byte);
    }
}

#[cfg(unix)]
struct RawMode {
    saved: libc::termios,
}

#[cfg(unix)]
impl RawMode {
    fn enable() -> Result<Self> {
        use std::mem::MaybeUninit;
        unsafe {
            let mut saved = MaybeUninit::<libc::termios>::uninit();
            if libc::tcgetattr(libc::STDIN_FILENO, saved.as_mut_ptr()) != 0 {
                return Err(MetaShellError::TerminalModeFailed(
                    "tcgetattr failed".into(),
                ));
            }
            let saved = saved.assume_init();
            let mut raw = saved;
            libc::cfmakeraw(&mut raw);
            if libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &raw) != 0 {
                return Err(MetaShellError::TerminalModeFailed(
                    "tcsetattr failed".into(),
                ));
            }
            Ok(Self { saved })
        }
    }
}

#[cfg(unix)]
impl Drop for RawMode {
    fn drop(&mut self) {
        unsafe {
            libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &self.saved);
        }
    }
}

#[cfg(windows)]
struct RawMode {
    saved: u32,
    handle: windows_sys::Win32::Foundation::HANDLE,
}

#[cfg(windows)]
impl RawMode {
    fn enable() -> Result<Self> {
        use windows_sys::Win32::System::Console::{
            GetConsoleMode, GetStdHandle, SetConsoleMode, ENABLE_ECHO_INPUT,
            ENABLE_LINE_INPUT, ENABLE_PROCESSED_INPUT, ENABLE_VIRTUAL_TERMINAL_INPUT,
            STD_INPUT_HANDLE,
        };
        unsafe {
            let handle = GetStdHandle(STD_INPUT_HANDLE);
            let mut saved = 0u32;
            if GetConsoleMode(handle, &mut saved) == 0 {
                return Err(MetaShellError::TerminalModeFailed(
                    "GetConsoleMode failed".into(),
                ));
            }
            let raw = (saved & !(ENABLE_LINE_INPUT | ENABLE_ECHO_INPUT | ENABLE_PROCESSED_INPUT))
                | ENABLE_VIRTUAL_TERMINAL_INPUT;
            if SetConsoleMode(handle, raw) == 0 {
                return Err(MetaShellError::TerminalModeFailed(
                    "SetConsoleMode failed".into(),
                ));
            }
            Ok(Self { saved, handle })
        }
    }
}

#[cfg(windows)]
impl Drop for RawMode {
    fn drop(&mut self) {
        use windows_sys::Win32::System::Console::SetConsoleMode;
        unsafe {
            SetConsoleMode(self.handle, self.saved);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backspace_on_empty_buffer_is_noop() {
        let mut buffers = Buffers::default();
        assert!(buffers.edit_buffer.pop().is_none());
    }

    #[test]
    fn control_byte_set_matches_platform() {
        #[cfg(unix)]
        assert!(CTRL_BYTES.contains(&0x0C));
        #[cfg(windows)]
        assert!(CTRL_BYTES.contains(&0x1B));
    }

    #[test]
    fn line_feed_moves_edit_buffer_into_queue() {
        let shared = Shared {
            buffers: Mutex::new(Buffers::default()),
            signal: Condvar::new(),
            stop: AtomicBool::new(false),
        };
        shared.feed(b'h');
        shared.feed(b'i');
        shared.feed(0x0D);
        let mut buffers = shared.buffers.lock().unwrap();
        assert_eq!(buffers.line_queue.pop_front(), Some("hi".to_string()));
        assert!(buffers.edit_buffer.is_empty());
    }
}
