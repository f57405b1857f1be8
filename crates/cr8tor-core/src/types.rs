use crate::error::Cr8torError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// CommandType
// ---------------------------------------------------------------------------

/// A lifecycle command run against a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CommandType {
    #[serde(rename = "Create")]
    Create,
    #[serde(rename = "Validate")]
    Validate,
    #[serde(rename = "Sign-Off")]
    SignOff,
    #[serde(rename = "Stage-Transfer")]
    StageTransfer,
    #[serde(rename = "Disclosure-Check")]
    DisclosureCheck,
    #[serde(rename = "Publish")]
    Publish,
}

impl CommandType {
    pub fn all() -> &'static [CommandType] {
        &[
            CommandType::Create,
            CommandType::Validate,
            CommandType::SignOff,
            CommandType::StageTransfer,
            CommandType::DisclosureCheck,
            CommandType::Publish,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CommandType::Create => "Create",
            CommandType::Validate => "Validate",
            CommandType::SignOff => "Sign-Off",
            CommandType::StageTransfer => "Stage-Transfer",
            CommandType::DisclosureCheck => "Disclosure-Check",
            CommandType::Publish => "Publish",
        }
    }

    /// Name of the CLI subcommand that runs this command.
    pub fn cli_name(self) -> &'static str {
        match self {
            CommandType::Create => "create",
            CommandType::Validate => "validate",
            CommandType::SignOff => "sign-off",
            CommandType::StageTransfer => "stage-transfer",
            CommandType::DisclosureCheck => "disclosure",
            CommandType::Publish => "publish",
        }
    }

    pub fn action_type(self) -> ActionType {
        match self {
            CommandType::Create => ActionType::CreateAction,
            _ => ActionType::AssessAction,
        }
    }

    /// Sub-classification recorded on the AssessAction this command produces.
    pub fn additional_type(self) -> Option<&'static str> {
        match self {
            CommandType::Create => None,
            CommandType::Validate => Some("Semantic Validation"),
            CommandType::SignOff => Some("Sign off"),
            CommandType::StageTransfer => Some("Stage Transfer"),
            CommandType::DisclosureCheck => Some("Disclosure Check"),
            CommandType::Publish => Some("Publish"),
        }
    }

    pub fn action_name(self) -> String {
        format!("{} Data Project Action", self.as_str())
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CommandType {
    type Err = Cr8torError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandType::all()
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s) || c.cli_name() == s)
            .ok_or_else(|| Cr8torError::UnknownCommand(s.to_string()))
    }
}

/// Deterministic identifier of the action a command records for a project.
pub fn composite_id(command: CommandType, project_id: &str) -> String {
    format!("{command}-{project_id}")
}

// ---------------------------------------------------------------------------
// ActionType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    CreateAction,
    AssessAction,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::CreateAction => "CreateAction",
            ActionType::AssessAction => "AssessAction",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ActionStatus
// ---------------------------------------------------------------------------

/// schema.org `ActionStatusType` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionStatus {
    #[serde(rename = "ActiveActionStatus")]
    Active,
    #[serde(rename = "CompletedActionStatus")]
    Completed,
    #[serde(rename = "FailedActionStatus")]
    Failed,
    #[serde(rename = "PotentialActionStatus")]
    Potential,
}

impl ActionStatus {
    pub fn all() -> &'static [ActionStatus] {
        &[
            ActionStatus::Active,
            ActionStatus::Completed,
            ActionStatus::Failed,
            ActionStatus::Potential,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionStatus::Active => "ActiveActionStatus",
            ActionStatus::Completed => "CompletedActionStatus",
            ActionStatus::Failed => "FailedActionStatus",
            ActionStatus::Potential => "PotentialActionStatus",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionStatus {
    type Err = crate::action::RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionStatus::all()
            .iter()
            .copied()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| crate::action::RecordError::UnknownStatus(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// ReturnCode
// ---------------------------------------------------------------------------

/// Process exit contract of a lifecycle command.
///
/// `ActionExecutionError` and `UnknownError` share exit code 3; they differ
/// only in the label printed on the final line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnCode {
    Success,
    ActionWorkflowError,
    ValidationError,
    ActionExecutionError,
    UnknownError,
}

impl ReturnCode {
    pub fn code(self) -> i32 {
        match self {
            ReturnCode::Success => 0,
            ReturnCode::ActionWorkflowError => 1,
            ReturnCode::ValidationError => 2,
            ReturnCode::ActionExecutionError | ReturnCode::UnknownError => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReturnCode::Success => "SUCCESS",
            ReturnCode::ActionWorkflowError => "ACTION_WORKFLOW_ERROR",
            ReturnCode::ValidationError => "VALIDATION_ERROR",
            ReturnCode::ActionExecutionError => "ACTION_EXECUTION_ERROR",
            ReturnCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    pub fn is_success(self) -> bool {
        self == ReturnCode::Success
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
