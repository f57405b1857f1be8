use crate::contract::{Destination, ProjectRequest};
use crate::error::{Cr8torError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format of `project_start_time`, shared with the external services.
pub const START_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// The `[project]` section of `governance/project.toml`.
///
/// `id` is assigned by the create command and never changes afterwards; it is
/// the key every action record of the project is named by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Organisation reference for the project, not its id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Whitespace-free project name used by the external services.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Destination>,
}

impl Project {
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.project_start_time.as_deref()?;
        NaiveDateTime::parse_from_str(raw, START_TIME_FORMAT)
            .ok()
            .map(|t| t.and_utc())
    }

    /// Project identity sent with every service request.
    pub fn service_request(&self) -> Result<ProjectRequest> {
        let project_name = self.project_name.clone().ok_or_else(|| missing("project_name"))?;
        let start_time = self
            .project_start_time
            .clone()
            .ok_or_else(|| missing("project_start_time"))?;
        let destination = self.destination.clone().ok_or_else(|| missing("destination"))?;
        ProjectRequest::new(project_name, start_time, destination)
    }
}

/// `[requesting_agent]`: the person the project acts for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestingAgent {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<Affiliation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Affiliation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// `[repository]`: source repository holding the project's resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "codeRepository", alias = "code_repository")]
    pub code_repository: String,
}

pub fn format_start_time(t: DateTime<Utc>) -> String {
    t.format(START_TIME_FORMAT).to_string()
}

fn missing(field: &str) -> Cr8torError {
    Cr8torError::MissingField {
        section: "project".to_string(),
        field: field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::FileFormat;
    use chrono::TimeZone;

    fn project() -> Project {
        toml::from_str(
            r#"
id = "abc-123"
name = "OMOP extract"
reference = "IG-2025-001"
project_name = "omop_extract"
project_start_time = "20250102_030405"

[destination]
type = "filestore"
name = "LSC"
format = "duckdb"
"#,
        )
        .unwrap()
    }

    #[test]
    fn parses_start_time() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(project().start_time(), Some(expected));
        assert_eq!(format_start_time(expected), "20250102_030405");
    }

    #[test]
    fn service_request_uses_destination() {
        let req = project().service_request().unwrap();
        assert_eq!(req.project_name, "omop_extract");
        assert!(matches!(
            req.destination,
            Destination::Filestore { format: FileFormat::Duckdb, .. }
        ));
    }

    #[test]
    fn repository_accepts_camel_case_key() {
        let repo: Repository = toml::from_str(
            "name = \"cr8-abc\"\ncodeRepository = \"https://github.com/lsc-sde-crates/\"\n",
        )
        .unwrap();
        assert_eq!(repo.code_repository, "https://github.com/lsc-sde-crates/");
    }

    #[test]
    fn service_request_requires_destination() {
        let mut p = project();
        p.destination = None;
        let err = p.service_request().unwrap_err();
        assert!(matches!(err, Cr8torError::MissingField { ref field, .. } if field == "destination"));
    }
}
