use clap::Parser;
use metashell::Interpreter;
use metashell_core::{MetaShellConfig, DEFAULT_COLS, DEFAULT_ROWS};

/// An interactive meta-shell hosting a stack of PTY-mediated child shells.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Override the root shell (defaults to $SHELL on POSIX, cmd.exe on Windows).
    #[arg(long)]
    shell: Option<String>,

    /// Initial terminal width.
    #[arg(long, default_value_t = DEFAULT_COLS)]
    cols: u16,

    /// Initial terminal height.
    #[arg(long, default_value_t = DEFAULT_ROWS)]
    rows: u16,

    /// Path to a TOML config file (defaults to ~/.metashell/config.toml).
    #[arg(long)]
    config: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = MetaShellConfig::load(args.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("config load failed ({e}), using defaults");
        MetaShellConfig::default()
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .init();

    let previous_sigint = ignore_sigint();

    let shell = args
        .shell
        .or_else(|| config.shell_override.clone())
        .unwrap_or_else(default_root_shell);

    let mut interpreter = match Interpreter::new(&shell, args.cols, args.rows, config) {
        Ok(interpreter) => interpreter,
        Err(e) => {
            eprintln!("failed to start {shell}: {e}");
            restore_sigint(previous_sigint);
            std::process::exit(1);
        }
    };

    interpreter.run();
    restore_sigint(previous_sigint);
    Ok(())
}

#[cfg(unix)]
fn default_root_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "bash".to_string())
}

#[cfg(windows)]
fn default_root_shell() -> String {
    "cmd.exe".to_string()
}

/// Install `SIG_IGN` for `SIGINT` so Ctrl-C reaches the meta-shell only as a
/// keystroke on stdin (§9 "Signal handling"), returning the previous
/// disposition for `restore_sigint` to reinstate on exit.
#[cfg(unix)]
fn ignore_sigint() -> libc::sighandler_t {
    unsafe { libc::signal(libc::SIGINT, libc::SIG_IGN) }
}

#[cfg(unix)]
fn restore_sigint(previous: libc::sighandler_t) {
    unsafe {
        libc::signal(libc::SIGINT, previous);
    }
}

#[cfg(windows)]
fn ignore_sigint() -> () {
    // The pseudo-console already isolates Ctrl-C delivery to the foreground
    // process group attached to it; no additional handler is installed here.
}

#[cfg(windows)]
fn restore_sigint(_previous: ()) {}
