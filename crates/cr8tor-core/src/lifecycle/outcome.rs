use crate::action::{ActionRecord, ResultRef};
use crate::error::Cr8torError;
use crate::types::{CommandType, ReturnCode};
use serde::Serialize;
use std::fmt;

// ---------------------------------------------------------------------------
// CommandError
// ---------------------------------------------------------------------------

/// Why a command body or its gate failed. Each kind maps to one exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Workflow(String),
    Validation(String),
    Execution(String),
    Unknown(String),
}

impl CommandError {
    pub fn return_code(&self) -> ReturnCode {
        match self {
            CommandError::Workflow(_) => ReturnCode::ActionWorkflowError,
            CommandError::Validation(_) => ReturnCode::ValidationError,
            CommandError::Execution(_) => ReturnCode::ActionExecutionError,
            CommandError::Unknown(_) => ReturnCode::UnknownError,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            CommandError::Workflow(m)
            | CommandError::Validation(m)
            | CommandError::Execution(m)
            | CommandError::Unknown(m) => m,
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Classifies an error raised inside a command body. Workflow failures are
/// only ever the gate's, so a body that trips over a missing field or section
/// has failed to execute.
impl From<Cr8torError> for CommandError {
    fn from(e: Cr8torError) -> Self {
        let msg = e.to_string();
        match e.return_code() {
            ReturnCode::ValidationError => CommandError::Validation(msg),
            ReturnCode::ActionWorkflowError | ReturnCode::ActionExecutionError => {
                CommandError::Execution(msg)
            }
            ReturnCode::Success | ReturnCode::UnknownError => CommandError::Unknown(msg),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What a successful command body hands back to the controller.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    pub result: Vec<ResultRef>,
    /// Replaces the default success line.
    pub message: Option<String>,
}

impl Outcome {
    pub fn with_result(result: Vec<ResultRef>) -> Self {
        Self {
            result,
            message: None,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Terminal result of one lifecycle command run.
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub command: CommandType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub return_code: ReturnCode,
    pub exit_code: i32,
    pub message: String,
    /// The record persisted by this run. `None` when the run was refused
    /// before a record could be written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<ActionRecord>,
}

impl Completion {
    pub fn new(
        command: CommandType,
        project_id: Option<String>,
        return_code: ReturnCode,
        message: impl Into<String>,
        record: Option<ActionRecord>,
    ) -> Self {
        Self {
            command,
            project_id,
            return_code,
            exit_code: return_code.code(),
            message: message.into(),
            record,
        }
    }

    /// A run that aborted before recording anything.
    pub fn aborted(command: CommandType, err: &Cr8torError) -> Self {
        Self::new(command, None, err.return_code(), err.to_string(), None)
    }

    pub fn is_success(&self) -> bool {
        self.return_code.is_success()
    }

    /// The one line a command prints when it terminates.
    pub fn final_line(&self) -> String {
        if self.is_success() {
            self.message.clone()
        } else {
            failure_line(self.command, self.return_code, &self.message)
        }
    }
}

pub fn failure_line(command: CommandType, code: ReturnCode, message: &str) -> String {
    format!(
        "'{command}' command failed with {} (code {}): {message}",
        code.name(),
        code.code()
    )
}
