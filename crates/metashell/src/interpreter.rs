//! `Interpreter` — meta-command dispatch and the main cooperative loop that
//! drains the `RawLineReader` and drives the `SessionStack`.

use crate::rawline::RawLineReader;
use crate::session::Session;
use crate::stack::SessionStack;
use metashell_core::{MetaShellConfig, MetaShellError, Result};
use std::time::Duration;

const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Built-in tokens that, when typed as a command, push a Tracker frame —
/// the meta-shell's best guess that the user just descended into a nested
/// interactive program.
const BUILTIN_SUBSHELLS: &[&str] = &[
    "bash", "zsh", "sh", "dash", "fish", "python", "python3", "node", "sqlite3", "irb", "gdb",
    "lldb", "ftp", "sftp", "telnet", "cmd", "powershell", "pwsh", "wsl", "diskpart",
];

#[cfg(unix)]
const CTRL_D: u8 = 0x04;
#[cfg(unix)]
const CTRL_Z_OR_L: [u8; 2] = [0x1A, 0x0C];
#[cfg(windows)]
const CTRL_Z_OR_L: [u8; 1] = [0x1A];

const HELP_TEXT: &str = "\
metashell meta-commands:
  !help, help           show this text
  !shell <exe>           push a new owned shell
  !resize <cols> <rows>  resize the current session
  !restart               tear down and relaunch the root shell
  exit                   exit the current frame (or the meta-shell at depth 1)
";

/// Owns the stack and runs the dispatch loop.
pub struct Interpreter {
    stack: SessionStack,
    reader: RawLineReader,
    config: MetaShellConfig,
    running: bool,
    default_cols: u16,
    default_rows: u16,
}

impl Interpreter {
    /// Build an interpreter with `root_shell` already pushed as the bottom
    /// Owned frame, started and ready to receive input.
    pub fn new(
        root_shell: &str,
        cols: u16,
        rows: u16,
        config: MetaShellConfig,
    ) -> Result<Self> {
        let reader = RawLineReader::start()?;
        let mut stack = SessionStack::new();
        let mut root = Session::new("root", root_shell, cols, rows).with_pacing(&config);
        root.start()?;
        stack.push_owned("root", root);

        Ok(Self {
            stack,
            reader,
            config,
            running: true,
            default_cols: cols,
            default_rows: rows,
        })
    }

    /// Run until a dispatch sets `running = false` or the stack empties.
    pub fn run(&mut self) {
        while self.running {
            self.reader.wait(POLL_TIMEOUT);
            let (lines, ctrls) = self.reader.drain();

            for byte in ctrls {
                self.dispatch_ctrl(byte);
            }
            for line in lines {
                if line.trim().is_empty() {
                    continue;
                }
                self.dispatch_line(&line);
            }
        }
        self.cleanup();
    }

    fn dispatch_ctrl(&self, byte: u8) {
        let Some(session) = self.stack.current_session() else {
            return;
        };
        #[cfg(unix)]
        {
            if byte == 0x03 {
                if let Err(e) = session.send_urgent(&[byte]) {
                    tracing::warn!("ctrl-c forward failed: {e}");
                }
                return;
            }
            if byte == CTRL_D {
                if let Err(e) = session.send_urgent(&[byte]) {
                    tracing::warn!("ctrl-d forward failed: {e}");
                }
                return;
            }
        }
        #[cfg(windows)]
        {
            if byte == 0x03 {
                if let Err(e) = session.send_urgent(&[byte]) {
                    tracing::warn!("ctrl-c forward failed: {e}");
                }
                return;
            }
        }
        if CTRL_Z_OR_L.contains(&byte) {
            if let Err(e) = session.send_raw(&[byte]) {
                tracing::warn!("ctrl-z/l forward failed: {e}");
            }
        }
    }

    fn dispatch_line(&mut self, line: &str) {
        let trimmed = line.trim();

        if trimmed == "!help" || trimmed == "help" {
            print!("{HELP_TEXT}");
            return;
        }

        if let Some(rest) = trimmed.strip_prefix("!shell") {
            return self.dispatch_shell(rest.trim());
        }

        if let Some(rest) = trimmed.strip_prefix("!resize") {
            return self.dispatch_resize(rest.trim());
        }

        if trimmed == "!restart" {
            return self.dispatch_restart();
        }

        if trimmed == "exit" {
            return self.dispatch_exit();
        }

        self.dispatch_command(trimmed);
    }

    fn dispatch_shell(&mut self, arg: &str) {
        if arg.is_empty() {
            let err = MetaShellError::MalformedMetaCommand("!shell <exe>".into());
            println!("{err}");
            return;
        }
        let mut session = Session::new(arg, arg, self.default_cols, self.default_rows)
            .with_pacing(&self.config);
        match session.start() {
            Ok(()) => {
                self.stack.push_owned(arg, session);
                self.pace(self.config.pacing.subshell_ms);
            }
            Err(e) => println!("failed to start {arg}: {e}"),
        }
    }

    fn dispatch_resize(&mut self, arg: &str) {
        let parts: Vec<&str> = arg.split_whitespace().collect();
        let (Some(cols_s), Some(rows_s)) = (parts.first(), parts.get(1)) else {
            let err = MetaShellError::MalformedMetaCommand("!resize <cols> <rows>".into());
            println!("{err}");
            return;
        };
        let (Ok(cols), Ok(rows)) = (cols_s.parse::<u16>(), rows_s.parse::<u16>()) else {
            let err = MetaShellError::MalformedMetaCommand("!resize <cols> <rows>".into());
            println!("{err}");
            return;
        };
        self.default_cols = cols;
        self.default_rows = rows;
        if let Some(session) = self.stack.current_session_mut() {
            if let Err(e) = session.resize(cols, rows) {
                println!("resize failed: {e}");
            }
        }
    }

    fn dispatch_restart(&mut self) {
        self.stack.cleanup();
        let shell = self.root_shell();
        let mut session = Session::new("root", &shell, self.default_cols, self.default_rows)
            .with_pacing(&self.config);
        match session.start() {
            Ok(()) => self.stack.push_owned("root", session),
            Err(e) => tracing::error!("restart failed: {e}"),
        }
    }

    fn root_shell(&self) -> String {
        self.config
            .shell_override
            .clone()
            .unwrap_or_else(default_root_shell)
    }

    fn dispatch_exit(&mut self) {
        if let Some(session) = self.stack.current_session() {
            if let Err(e) = session.send_command("exit") {
                tracing::warn!("exit send failed: {e}");
            }
        }
        self.pace(self.config.pacing.exit_ms);
        if self.stack.depth() > 1 {
            self.stack.pop();
        } else {
            self.stack.pop();
            self.running = false;
        }
    }

    fn dispatch_command(&mut self, line: &str) {
        let Some(session) = self.stack.current_session() else {
            return;
        };
        if !session.is_alive() {
            tracing::warn!("current session has exited; popping frame");
            self.stack.pop();
            return;
        }
        if let Err(e) = session.send_command(line) {
            tracing::warn!("command send failed: {e}");
            return;
        }

        let first_token = line.split_whitespace().next().unwrap_or("");
        let basename = first_token.rsplit(['/', '\\']).next().unwrap_or(first_token);
        let normalized = basename.trim_end_matches(".exe").to_lowercase();

        let is_subshell = BUILTIN_SUBSHELLS.contains(&normalized.as_str())
            || self
                .config
                .extra_subshells
                .iter()
                .any(|s| s.eq_ignore_ascii_case(&normalized));

        if is_subshell {
            self.stack.push_tracker(normalized);
            self.pace(self.config.pacing.subshell_ms);
        } else {
            self.pace(self.config.pacing.general_ms);
        }
    }

    fn pace(&self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }

    /// Tear down every frame on the stack.
    pub fn cleanup(&mut self) {
        self.stack.cleanup();
    }
}

#[cfg(unix)]
fn default_root_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "bash".to_string())
}

#[cfg(windows)]
fn default_root_shell() -> String {
    "cmd.exe".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subshell_token_normalization_strips_path_and_extension() {
        let token = "/usr/bin/Python3";
        let basename = token.rsplit(['/', '\\']).next().unwrap();
        let normalized = basename.trim_end_matches(".exe").to_lowercase();
        assert_eq!(normalized, "python3");
        assert!(BUILTIN_SUBSHELLS.contains(&normalized.as_str()));
    }

    #[test]
    fn windows_exe_suffix_is_stripped() {
        let token = "cmd.exe";
        let normalized = token.trim_end_matches(".exe").to_lowercase();
        assert_eq!(normalized, "cmd");
        assert!(BUILTIN_SUBSHELLS.contains(&normalized.as_str()));
    }
}
