use super::{SchedulerInput, SchedulerSender, UserCommand};
use crate::error::{Error, Result};

/// Cloneable front door to the scheduler task
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: SchedulerSender,
}

impl SchedulerHandle {
    pub fn new(tx: SchedulerSender) -> Self {
        Self { tx }
    }

    pub fn send(&self, command: UserCommand) -> Result<()> {
        self.input(SchedulerInput::User(command))
    }

    /// Ask the task to persist its record and stop
    pub fn shutdown(&self) -> Result<()> {
        self.input(SchedulerInput::Shutdown)
    }

    fn input(&self, input: SchedulerInput) -> Result<()> {
        self.tx
            .send(input)
            .map_err(|_| Error::InvalidState("scheduler is not running".to_string()))
    }
}
