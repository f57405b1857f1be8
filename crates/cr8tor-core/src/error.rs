use crate::action::RecordError;
use crate::types::ReturnCode;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Cr8torError {
    #[error("resource file not found: {}", .0.display())]
    ResourceNotFound(PathBuf),

    #[error("missing section '{section}' in resource: {}", .path.display())]
    MissingSection { section: String, path: PathBuf },

    #[error("missing field '{field}' in section '{section}': run 'cr8tor create' first")]
    MissingField { section: String, field: String },

    #[error("cannot load provenance graph: {0}")]
    GraphLoad(String),

    #[error("'{command}' requires a completed '{prerequisite}' action for project {project_id}")]
    PrerequisiteNotMet {
        command: String,
        prerequisite: String,
        project_id: String,
    },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    InvalidRecord(#[from] RecordError),

    #[error("external service error: {0}")]
    ExternalService(String),

    #[error("project is locked by another command: {}", .0.display())]
    ProjectLocked(PathBuf),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Cr8torError {
    /// Exit code a command reports when it terminates with this error.
    pub fn return_code(&self) -> ReturnCode {
        match self {
            Cr8torError::PrerequisiteNotMet { .. }
            | Cr8torError::MissingSection { .. }
            | Cr8torError::MissingField { .. }
            | Cr8torError::ProjectLocked(_) => ReturnCode::ActionWorkflowError,
            Cr8torError::Validation(_) | Cr8torError::InvalidRecord(_) => {
                ReturnCode::ValidationError
            }
            Cr8torError::ExternalService(_) | Cr8torError::Http(_) => {
                ReturnCode::ActionExecutionError
            }
            _ => ReturnCode::UnknownError,
        }
    }
}

pub type Result<T> = std::result::Result<T, Cr8torError>;
