//! Startup configuration: `~/.metashell/config.toml` + `METASHELL_*` env overrides.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Initial window size used when the process starts, absent `--cols`/`--rows`.
///
/// Not part of `MetaShellConfig` on purpose: the spec pins this to a single
/// startup value that only `!resize` may change once the interpreter is
/// running, so it isn't something a config file should silently override.
pub const DEFAULT_COLS: u16 = 120;
pub const DEFAULT_ROWS: u16 = 30;

/// Stability-delay knobs applied after dispatching a command, letting an
/// asynchronously-emitting child shell settle before the next loop tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Delay after an ordinary command line (default 200ms).
    #[serde(default = "default_general_ms")]
    pub general_ms: u64,
    /// Delay after pushing a Tracker frame for a detected subshell (default 500ms).
    #[serde(default = "default_subshell_ms")]
    pub subshell_ms: u64,
    /// Delay after sending `exit` and before popping/stopping (default 300ms).
    #[serde(default = "default_exit_ms")]
    pub exit_ms: u64,
    /// Delay after `Session::send_command` to let the child begin processing
    /// (default 50ms).
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            general_ms: default_general_ms(),
            subshell_ms: default_subshell_ms(),
            exit_ms: default_exit_ms(),
            settle_ms: default_settle_ms(),
        }
    }
}

fn default_general_ms() -> u64 {
    200
}
fn default_subshell_ms() -> u64 {
    500
}
fn default_exit_ms() -> u64 {
    300
}
fn default_settle_ms() -> u64 {
    50
}

/// Top-level meta-shell configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetaShellConfig {
    /// Forces the root shell, bypassing `SHELL`/`cmd.exe` auto-detection.
    #[serde(default)]
    pub shell_override: Option<String>,

    /// Extra tokens appended to the built-in subshell-detection set.
    #[serde(default)]
    pub extra_subshells: Vec<String>,

    /// Stability delays.
    #[serde(default)]
    pub pacing: PacingConfig,

    /// `tracing_subscriber::EnvFilter` directive string.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    "metashell=info".to_string()
}

impl MetaShellConfig {
    /// Load config from a TOML file with `METASHELL_*` env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. `~/.metashell/config.toml`
    ///
    /// A missing file is not an error — `Figment` simply yields defaults for
    /// everything. A malformed file surfaces as `MetaShellError::Config`; the
    /// caller is expected to fall back to `MetaShellConfig::default()` and
    /// keep running (see SPEC_FULL §7).
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: MetaShellConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("METASHELL_").split("_"))
            .extract()
            .map_err(|e| crate::error::MetaShellError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.metashell/config.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pacing_matches_spec_constants() {
        let p = PacingConfig::default();
        assert_eq!(p.general_ms, 200);
        assert_eq!(p.subshell_ms, 500);
        assert_eq!(p.exit_ms, 300);
        assert_eq!(p.settle_ms, 50);
    }

    #[test]
    fn default_config_has_no_shell_override() {
        let c = MetaShellConfig::default();
        assert!(c.shell_override.is_none());
        assert!(c.extra_subshells.is_empty());
        assert_eq!(c.log_filter, "metashell=info");
    }

    #[test]
    fn load_with_missing_file_falls_back_to_defaults() {
        let c = MetaShellConfig::load(Some("/nonexistent/path/config.toml")).unwrap();
        assert_eq!(c.log_filter, "metashell=info");
    }
}
