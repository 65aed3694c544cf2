//! `SessionStack` — the Owned/Tracker frame discipline described in §3/§9.

use crate::session::Session;

/// One layer of the session stack.
pub enum StackFrame {
    /// Owns a real `Session` (new PTY + child). Teardown runs full shutdown.
    Owned { label: String, session: Session },
    /// A logical descent into a subshell running inside an existing Owned
    /// frame. Teardown performs no I/O and does not touch the session.
    Tracker { label: String, owner_index: usize },
}

impl StackFrame {
    pub fn label(&self) -> &str {
        match self {
            StackFrame::Owned { label, .. } => label,
            StackFrame::Tracker { label, .. } => label,
        }
    }
}

/// Ordered sequence of frames; the bottom frame is always `Owned`.
#[derive(Default)]
pub struct SessionStack {
    frames: Vec<StackFrame>,
}

impl SessionStack {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Number of frames currently on the stack.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Push an Owned frame that owns `session`.
    pub fn push_owned(&mut self, label: impl Into<String>, session: Session) {
        self.frames.push(StackFrame::Owned {
            label: label.into(),
            session,
        });
    }

    /// Push a Tracker frame referring to the nearest Owned ancestor.
    ///
    /// Panics if the stack is empty — the bottom-always-Owned invariant
    /// means a Tracker can never be the first frame.
    pub fn push_tracker(&mut self, label: impl Into<String>) {
        let owner_index = self.owned_ancestor_index(self.frames.len());
        self.frames.push(StackFrame::Tracker {
            label: label.into(),
            owner_index,
        });
    }

    /// The nearest Owned frame's index at or below `from` (exclusive).
    fn owned_ancestor_index(&self, from: usize) -> usize {
        for i in (0..from).rev() {
            if matches!(self.frames[i], StackFrame::Owned { .. }) {
                return i;
            }
        }
        unreachable!("bottom frame is always Owned");
    }

    /// The session the top frame resolves to (the nearest Owned ancestor's
    /// session), or `None` on an empty stack.
    pub fn current_session(&self) -> Option<&Session> {
        let top = self.frames.len().checked_sub(1)?;
        let owner = match &self.frames[top] {
            StackFrame::Owned { .. } => top,
            StackFrame::Tracker { owner_index, .. } => *owner_index,
        };
        match &self.frames[owner] {
            StackFrame::Owned { session, .. } => Some(session),
            StackFrame::Tracker { .. } => unreachable!("owner_index always points at Owned"),
        }
    }

    /// Mutable access to the session the top frame resolves to, for
    /// operations like `resize` that need `&mut Session`.
    pub fn current_session_mut(&mut self) -> Option<&mut Session> {
        let top = self.frames.len().checked_sub(1)?;
        let owner = match &self.frames[top] {
            StackFrame::Owned { .. } => top,
            StackFrame::Tracker { owner_index, .. } => *owner_index,
        };
        match &mut self.frames[owner] {
            StackFrame::Owned { session, .. } => Some(session),
            StackFrame::Tracker { .. } => unreachable!("owner_index always points at Owned"),
        }
    }

    /// Pop one frame. An Owned frame's session is stopped; a Tracker is
    /// removed silently.
    pub fn pop(&mut self) {
        if let Some(frame) = self.frames.pop() {
            if let StackFrame::Owned { mut session, .. } = frame {
                session.stop();
            }
        }
    }

    /// Pop frames until the stack is empty. Idempotent on an already-empty
    /// stack.
    pub fn cleanup(&mut self) {
        while !self.frames.is_empty() {
            self.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unstarted_session(label: &str) -> Session {
        Session::new(label, "true", 80, 24)
    }

    #[test]
    fn bottom_frame_is_always_owned() {
        let mut stack = SessionStack::new();
        stack.push_owned("bash", unstarted_session("bash"));
        assert!(matches!(stack.frames[0], StackFrame::Owned { .. }));
    }

    #[test]
    fn tracker_resolves_to_owner_session() {
        let mut stack = SessionStack::new();
        stack.push_owned("bash", unstarted_session("bash"));
        stack.push_tracker("python3");
        assert_eq!(stack.depth(), 2);
        assert!(stack.current_session().is_some());
    }

    #[test]
    fn cleanup_is_idempotent_on_empty_stack() {
        let mut stack = SessionStack::new();
        stack.cleanup();
        stack.cleanup();
        assert!(stack.is_empty());
    }

    #[test]
    fn pop_tracker_leaves_owner_on_stack() {
        let mut stack = SessionStack::new();
        stack.push_owned("bash", unstarted_session("bash"));
        stack.push_tracker("python3");
        stack.pop();
        assert_eq!(stack.depth(), 1);
        assert!(matches!(stack.frames[0], StackFrame::Owned { .. }));
    }
}
