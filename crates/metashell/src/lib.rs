//! metashell — an interactive meta-shell: a single controlling terminal
//! hosting a stack of child shells run under a pseudoterminal.
//!
//! The pieces compose bottom-up: [`pty`] and [`child`] wrap the OS-level
//! pseudoterminal and spawned process; [`output_pump`] and [`input_pump`]
//! are the two concurrent byte pipelines per session; [`bridge`] owns one of
//! each and gives them the echo-suppression ordering guarantee; [`session`]
//! composes all of that into start/stop/send_command; [`stack`] layers
//! owned and tracked sessions; [`rawline`] cooks the controlling terminal's
//! raw input into lines and control bytes; [`interpreter`] ties the stack
//! and the raw reader together into the meta-command dispatch loop.

pub mod bridge;
pub mod child;
pub mod input_pump;
pub mod interpreter;
pub mod output_pump;
pub mod pty;
pub mod rawline;
pub mod session;
pub mod stack;

pub use interpreter::Interpreter;
pub use session::Session;
pub use stack::{SessionStack, StackFrame};
