//! Explicit state machine for modal create/edit dialogs
//!
//! A dialog moves `Closed -> Open -> Submitting -> Closed`. Anything can
//! fall into `Failed`, and a failed dialog may be reopened. Illegal moves
//! are rejected instead of silently ignored, and every accepted move is
//! kept in the history so a dialog stuck in `Submitting` shows up in the
//! failure report.

use std::fmt;
use tracing::{debug, warn};

use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    Closed,
    Open,
    Submitting,
    Failed,
}

impl fmt::Display for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DialogState::Closed => "closed",
            DialogState::Open => "open",
            DialogState::Submitting => "submitting",
            DialogState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct DialogFlow {
    name: String,
    state: DialogState,
    history: Vec<DialogState>,
    failure: Option<String>,
}

impl DialogFlow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: DialogState::Closed,
            history: vec![DialogState::Closed],
            failure: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn history(&self) -> &[DialogState] {
        &self.history
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Submitted but never confirmed closed
    pub fn is_stuck(&self) -> bool {
        self.state == DialogState::Submitting
    }

    fn allowed(from: DialogState, to: DialogState) -> bool {
        use DialogState::*;
        matches!(
            (from, to),
            (Closed, Open)
                | (Failed, Open)
                | (Open, Submitting)
                | (Open, Closed)
                | (Submitting, Closed)
                | (Open, Failed)
                | (Submitting, Failed)
        )
    }

    fn transition(&mut self, to: DialogState) -> E2eResult<()> {
        if !Self::allowed(self.state, to) {
            return Err(E2eError::InvalidTransition {
                flow: self.name.clone(),
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        debug!("{} dialog: {} -> {}", self.name, self.state, to);
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    pub fn open(&mut self) -> E2eResult<()> {
        self.failure = None;
        self.transition(DialogState::Open)
    }

    pub fn submit(&mut self) -> E2eResult<()> {
        self.transition(DialogState::Submitting)
    }

    /// The dialog closed after a successful save
    pub fn complete(&mut self) -> E2eResult<()> {
        if self.state != DialogState::Submitting {
            return Err(E2eError::InvalidTransition {
                flow: self.name.clone(),
                from: self.state.to_string(),
                to: "closed (saved)".to_string(),
            });
        }
        self.transition(DialogState::Closed)
    }

    /// Closed without saving
    pub fn cancel(&mut self) -> E2eResult<()> {
        if self.state != DialogState::Open {
            return Err(E2eError::InvalidTransition {
                flow: self.name.clone(),
                from: self.state.to_string(),
                to: "closed (cancelled)".to_string(),
            });
        }
        self.transition(DialogState::Closed)
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> E2eResult<()> {
        let reason = reason.into();
        warn!("{} dialog failed while {}: {}", self.name, self.state, reason);
        self.transition(DialogState::Failed)?;
        self.failure = Some(reason);
        Ok(())
    }

    /// Record `err` against the flow and hand it back for propagation
    pub fn fail_with(&mut self, err: E2eError) -> E2eError {
        let stuck = self.is_stuck();
        if self.fail(err.to_string()).is_err() {
            return err;
        }
        if stuck {
            E2eError::StepFailed {
                step: format!("{} dialog", self.name),
                reason: format!("stuck submitting: {}", err),
            }
        } else {
            err
        }
    }

    /// Render the history as `closed -> open -> ...`
    pub fn trace(&self) -> String {
        self.history
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut flow = DialogFlow::new("promo code");
        flow.open().unwrap();
        flow.submit().unwrap();
        assert!(flow.is_stuck());
        flow.complete().unwrap();
        assert_eq!(flow.state(), DialogState::Closed);
        assert_eq!(flow.trace(), "closed -> open -> submitting -> closed");
    }

    #[test]
    fn test_submit_requires_open() {
        let mut flow = DialogFlow::new("ticket type");
        let err = flow.submit().unwrap_err();
        assert!(matches!(err, E2eError::InvalidTransition { .. }));
        assert_eq!(flow.history(), &[DialogState::Closed]);
    }

    #[test]
    fn test_complete_requires_submitting() {
        let mut flow = DialogFlow::new("page");
        flow.open().unwrap();
        assert!(flow.complete().is_err());
        flow.cancel().unwrap();
        assert_eq!(flow.state(), DialogState::Closed);
    }

    #[test]
    fn test_stuck_submission_is_reported() {
        let mut flow = DialogFlow::new("promo code");
        flow.open().unwrap();
        flow.submit().unwrap();
        let err = flow.fail_with(E2eError::timeout("dialog to close", std::time::Duration::from_secs(15)));
        assert!(matches!(err, E2eError::StepFailed { .. }));
        assert_eq!(flow.state(), DialogState::Failed);
        assert!(flow.failure().unwrap().contains("dialog to close"));
    }

    #[test]
    fn test_failed_dialog_can_reopen() {
        let mut flow = DialogFlow::new("promo code");
        flow.open().unwrap();
        flow.fail("validation error").unwrap();
        flow.open().unwrap();
        assert_eq!(flow.failure(), None);
        assert!(flow.fail("again").is_ok());
        assert!(flow.fail("twice").is_err());
    }
}
