//! Operator confirmation checkpoints.

use tracing::{info, warn};

use crate::error::{Result, RollError};

/// Asks the operator a yes/no question.
pub trait Prompter {
    fn confirm(&mut self, message: &str) -> anyhow::Result<bool>;
}

/// Binary proceed/abort checkpoint in front of every mutating step.
pub struct HumanGate<'a> {
    prompter: &'a mut dyn Prompter,
    assume_yes: bool,
    asked: usize,
}

impl<'a> HumanGate<'a> {
    pub fn new(prompter: &'a mut dyn Prompter, assume_yes: bool) -> Self {
        Self {
            prompter,
            assume_yes,
            asked: 0,
        }
    }

    /// Proceed on "yes"; anything else aborts the run with [`RollError::Aborted`].
    ///
    /// With `assume_yes` set the prompter is never consulted.
    pub fn confirm(&mut self, message: &str) -> Result<()> {
        if self.assume_yes {
            info!(prompt = message, "auto-confirmed");
            return Ok(());
        }
        self.asked += 1;
        if self.prompter.confirm(message).map_err(RollError::Prompt)? {
            Ok(())
        } else {
            warn!(prompt = message, "operator declined");
            Err(RollError::Aborted {
                prompt: message.to_string(),
            })
        }
    }

    /// Number of times the operator was actually asked.
    pub fn asked(&self) -> usize {
        self.asked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted {
        answers: Vec<bool>,
        seen: Vec<String>,
    }

    impl Prompter for Scripted {
        fn confirm(&mut self, message: &str) -> anyhow::Result<bool> {
            self.seen.push(message.to_string());
            if self.answers.is_empty() {
                anyhow::bail!("no scripted answer left");
            }
            Ok(self.answers.remove(0))
        }
    }

    #[test]
    fn assume_yes_never_prompts() {
        let mut prompter = Scripted {
            answers: vec![],
            seen: vec![],
        };
        let mut gate = HumanGate::new(&mut prompter, true);
        gate.confirm("drain?").unwrap();
        gate.confirm("terminate?").unwrap();
        assert_eq!(gate.asked(), 0);
        assert!(prompter.seen.is_empty());
    }

    #[test]
    fn no_aborts_with_the_prompt() {
        let mut prompter = Scripted {
            answers: vec![true, false],
            seen: vec![],
        };
        let mut gate = HumanGate::new(&mut prompter, false);
        gate.confirm("first?").unwrap();
        let err = gate.confirm("second?").unwrap_err();
        assert!(matches!(err, RollError::Aborted { ref prompt } if prompt == "second?"));
        assert_eq!(gate.asked(), 2);
    }

    #[test]
    fn prompter_failure_is_fatal() {
        let mut prompter = Scripted {
            answers: vec![],
            seen: vec![],
        };
        let mut gate = HumanGate::new(&mut prompter, false);
        assert!(matches!(
            gate.confirm("go?").unwrap_err(),
            RollError::Prompt(_)
        ));
    }
}
