//! Approval before mutation.
//!
//! Each scanned table passes through a [`Gate`]:
//!
//! ```text
//! Scanned -> AutoApproved ------------------> Approved
//!         \-> AwaitingApproval -> (prompt) -> Approved | Skipped
//! ```
//!
//! The interactive side is abstracted behind [`Prompt`] so the pipeline
//! never reads the terminal directly.

use crate::FixError;

/// Yes/no question answered by the operator.
pub trait Prompt {
    fn confirm(&mut self, question: &str) -> Result<bool, FixError>;
}

/// Answers yes to everything.
pub struct AutoApprove;

impl Prompt for AutoApprove {
    fn confirm(&mut self, _question: &str) -> Result<bool, FixError> {
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Scanned,
    AutoApproved,
    AwaitingApproval,
    Approved,
    Skipped,
}

/// Per-table approval state machine.
#[derive(Debug)]
pub struct Gate {
    state: GateState,
}

impl Gate {
    pub fn new() -> Self {
        Gate {
            state: GateState::Scanned,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Leave `Scanned`, either straight to `AutoApproved` or to `AwaitingApproval`.
    pub fn open(&mut self, auto_confirm: bool) {
        if self.state == GateState::Scanned {
            self.state = if auto_confirm {
                GateState::AutoApproved
            } else {
                GateState::AwaitingApproval
            };
        }
    }

    /// Settle the gate, asking `prompt` only when awaiting approval.
    /// Returns true when the table may be updated.
    pub fn resolve(&mut self, prompt: &mut dyn Prompt, question: &str) -> Result<bool, FixError> {
        self.state = match self.state {
            GateState::AutoApproved | GateState::Approved => GateState::Approved,
            GateState::AwaitingApproval => {
                if prompt.confirm(question)? {
                    GateState::Approved
                } else {
                    GateState::Skipped
                }
            }
            GateState::Scanned | GateState::Skipped => GateState::Skipped,
        };
        Ok(self.state == GateState::Approved)
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Answer(bool, usize);

    impl Prompt for Answer {
        fn confirm(&mut self, _question: &str) -> Result<bool, FixError> {
            self.1 += 1;
            Ok(self.0)
        }
    }

    #[test]
    fn test_auto_confirm_skips_prompt() {
        let mut gate = Gate::new();
        gate.open(true);
        assert_eq!(gate.state(), GateState::AutoApproved);
        let mut prompt = Answer(false, 0);
        assert!(gate.resolve(&mut prompt, "?").unwrap());
        assert_eq!(prompt.1, 0);
        assert_eq!(gate.state(), GateState::Approved);
    }

    #[test]
    fn test_operator_approves() {
        let mut gate = Gate::new();
        gate.open(false);
        assert_eq!(gate.state(), GateState::AwaitingApproval);
        let mut prompt = Answer(true, 0);
        assert!(gate.resolve(&mut prompt, "?").unwrap());
        assert_eq!(prompt.1, 1);
    }

    #[test]
    fn test_operator_declines() {
        let mut gate = Gate::new();
        gate.open(false);
        assert!(!gate.resolve(&mut Answer(false, 0), "?").unwrap());
        assert_eq!(gate.state(), GateState::Skipped);
    }

    #[test]
    fn test_unopened_gate_never_approves() {
        let mut gate = Gate::new();
        assert!(!gate.resolve(&mut AutoApprove, "?").unwrap());
    }
}
