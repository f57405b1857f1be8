//! The `ActionRecord` value type: one terminal outcome of a lifecycle command.
//!
//! Records are immutable once built. Every construction path, including
//! deserialization from the project document, goes through
//! [`ActionRecord::try_new`], so a record in hand is always well-formed.

use crate::types::{composite_id, ActionStatus, ActionType, CommandType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// RecordError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("invalid action_status '{0}': must be one of ActiveActionStatus, CompletedActionStatus, FailedActionStatus, PotentialActionStatus")]
    UnknownStatus(String),

    #[error("action record is missing mandatory field '{0}'")]
    MissingField(&'static str),

    #[error("action '{id}' ends before it starts")]
    EndBeforeStart { id: String },

    #[error("action '{id}' carries an error but its status is {status}")]
    ErrorWithoutFailure { id: String, status: ActionStatus },

    #[error("failed action '{id}' has no error message")]
    FailureWithoutError { id: String },

    #[error("CreateAction '{id}' must not carry an additional_type")]
    AdditionalTypeOnCreate { id: String },
}

// ---------------------------------------------------------------------------
// ResultRef
// ---------------------------------------------------------------------------

/// Reference to an artifact produced by an action.
///
/// Only `@id` is mandatory. Any other properties are kept and rendered as a
/// contextual entity in the provenance document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRef {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl ResultRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: Map::new(),
        }
    }

    /// Attach an extra property. `Null` values are dropped: the project
    /// document cannot represent them.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.properties.insert(key.into(), value);
        }
        self
    }
}

// ---------------------------------------------------------------------------
// ActionDraft
// ---------------------------------------------------------------------------

/// Unvalidated form of an action record, as stored in the `actions` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDraft {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_status: Option<String>,
    #[serde(default)]
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_type: Option<String>,
    #[serde(default)]
    pub result: Vec<ResultRef>,
}

impl ActionDraft {
    /// Start a draft for `command` run against `project_id`.
    pub fn for_command(
        command: CommandType,
        project_id: &str,
        agent: impl Into<String>,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: composite_id(command, project_id),
            action_type: command.action_type(),
            name: command.action_name(),
            start_time: Some(start_time),
            end_time: None,
            action_status: None,
            agent: agent.into(),
            instrument: None,
            error: None,
            additional_type: None,
            result: Vec::new(),
        }
    }

    pub fn instrument(mut self, instrument: Option<String>) -> Self {
        self.instrument = instrument;
        self
    }

    pub fn additional_type(mut self, additional_type: Option<String>) -> Self {
        self.additional_type = additional_type;
        self
    }

    pub fn completed(
        mut self,
        end_time: DateTime<Utc>,
        result: Vec<ResultRef>,
    ) -> Result<ActionRecord, RecordError> {
        self.end_time = Some(end_time);
        self.action_status = Some(ActionStatus::Completed.as_str().to_string());
        self.error = None;
        self.result = result;
        ActionRecord::try_new(self)
    }

    pub fn failed(
        mut self,
        end_time: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Result<ActionRecord, RecordError> {
        self.end_time = Some(end_time);
        self.action_status = Some(ActionStatus::Failed.as_str().to_string());
        self.error = Some(error.into());
        ActionRecord::try_new(self)
    }
}

// ---------------------------------------------------------------------------
// ActionRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ActionDraft", into = "ActionDraft")]
pub struct ActionRecord {
    id: String,
    action_type: ActionType,
    name: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    action_status: ActionStatus,
    agent: String,
    instrument: Option<String>,
    error: Option<String>,
    additional_type: Option<String>,
    result: Vec<ResultRef>,
}

impl ActionRecord {
    pub fn try_new(draft: ActionDraft) -> Result<Self, RecordError> {
        if draft.id.trim().is_empty() {
            return Err(RecordError::MissingField("id"));
        }
        if draft.name.trim().is_empty() {
            return Err(RecordError::MissingField("name"));
        }
        if draft.agent.trim().is_empty() {
            return Err(RecordError::MissingField("agent"));
        }
        let start_time = draft.start_time.ok_or(RecordError::MissingField("start_time"))?;
        let end_time = draft.end_time.ok_or(RecordError::MissingField("end_time"))?;
        let status_str = draft
            .action_status
            .as_deref()
            .ok_or(RecordError::MissingField("action_status"))?;
        let action_status = ActionStatus::from_str(status_str)?;

        if end_time < start_time {
            return Err(RecordError::EndBeforeStart { id: draft.id });
        }
        match (action_status, &draft.error) {
            (ActionStatus::Failed, None) => {
                return Err(RecordError::FailureWithoutError { id: draft.id });
            }
            (status, Some(_)) if status != ActionStatus::Failed => {
                return Err(RecordError::ErrorWithoutFailure {
                    id: draft.id,
                    status,
                });
            }
            _ => {}
        }
        if draft.action_type == ActionType::CreateAction && draft.additional_type.is_some() {
            return Err(RecordError::AdditionalTypeOnCreate { id: draft.id });
        }

        Ok(Self {
            id: draft.id,
            action_type: draft.action_type,
            name: draft.name,
            start_time,
            end_time,
            action_status,
            agent: draft.agent,
            instrument: draft.instrument,
            error: draft.error,
            additional_type: draft.additional_type,
            result: draft.result,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn action_status(&self) -> ActionStatus {
        self.action_status
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn instrument(&self) -> Option<&str> {
        self.instrument.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn additional_type(&self) -> Option<&str> {
        self.additional_type.as_deref()
    }

    pub fn result(&self) -> &[ResultRef] {
        &self.result
    }
}

impl TryFrom<ActionDraft> for ActionRecord {
    type Error = RecordError;

    fn try_from(draft: ActionDraft) -> Result<Self, Self::Error> {
        ActionRecord::try_new(draft)
    }
}

impl From<ActionRecord> for ActionDraft {
    fn from(r: ActionRecord) -> Self {
        Self {
            id: r.id,
            action_type: r.action_type,
            name: r.name,
            start_time: Some(r.start_time),
            end_time: Some(r.end_time),
            action_status: Some(r.action_status.as_str().to_string()),
            agent: r.agent,
            instrument: r.instrument,
            error: r.error,
            additional_type: r.additional_type,
            result: r.result,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft(command: CommandType) -> ActionDraft {
        ActionDraft::for_command(command, "abc-123", "ci-bot", Utc::now())
    }

    #[test]
    fn completed_record_has_no_error() {
        let rec = draft(CommandType::Validate)
            .additional_type(Some("Semantic Validation".to_string()))
            .completed(Utc::now(), Vec::new())
            .unwrap();
        assert_eq!(rec.id(), "Validate-abc-123");
        assert_eq!(rec.name(), "Validate Data Project Action");
        assert_eq!(rec.action_status(), ActionStatus::Completed);
        assert!(rec.error().is_none());
    }

    #[test]
    fn failed_record_keeps_message() {
        let rec = draft(CommandType::SignOff)
            .failed(Utc::now(), "not validated")
            .unwrap();
        assert_eq!(rec.action_status(), ActionStatus::Failed);
        assert_eq!(rec.error(), Some("not validated"));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let mut d = draft(CommandType::Validate);
        d.end_time = d.start_time;
        d.action_status = Some("DoneActionStatus".to_string());
        assert_eq!(
            ActionRecord::try_new(d).unwrap_err(),
            RecordError::UnknownStatus("DoneActionStatus".to_string())
        );
    }

    #[test]
    fn missing_agent_is_rejected() {
        let d = ActionDraft::for_command(CommandType::Validate, "p", "", Utc::now());
        assert_eq!(
            d.completed(Utc::now(), Vec::new()).unwrap_err(),
            RecordError::MissingField("agent")
        );
    }

    #[test]
    fn end_before_start_is_rejected() {
        let start = Utc::now();
        let d = ActionDraft::for_command(CommandType::Validate, "p", "a", start);
        let err = d.completed(start - Duration::seconds(5), Vec::new()).unwrap_err();
        assert!(matches!(err, RecordError::EndBeforeStart { .. }));
    }

    #[test]
    fn create_action_cannot_carry_additional_type() {
        let err = draft(CommandType::Create)
            .additional_type(Some("Sign off".to_string()))
            .completed(Utc::now(), Vec::new())
            .unwrap_err();
        assert!(matches!(err, RecordError::AdditionalTypeOnCreate { .. }));
    }

    #[test]
    fn error_requires_failed_status() {
        let mut d = draft(CommandType::Validate);
        d.end_time = d.start_time;
        d.action_status = Some("CompletedActionStatus".to_string());
        d.error = Some("boom".to_string());
        assert!(matches!(
            ActionRecord::try_new(d).unwrap_err(),
            RecordError::ErrorWithoutFailure { .. }
        ));
    }

    #[test]
    fn toml_roundtrip_validates_on_read() {
        let rec = draft(CommandType::SignOff)
            .additional_type(Some("Sign off".to_string()))
            .instrument(Some("IG Board".to_string()))
            .completed(
                Utc::now(),
                vec![ResultRef::new("https://github.com/org/repo/pull/1")],
            )
            .unwrap();
        let text = toml::to_string(&rec).unwrap();
        assert!(text.contains("type = \"AssessAction\""));
        assert!(text.contains("\"@id\""));
        let parsed: ActionRecord = toml::from_str(&text).unwrap();
        assert_eq!(parsed, rec);

        let tampered = text.replace("CompletedActionStatus", "Finished");
        assert!(toml::from_str::<ActionRecord>(&tampered).is_err());
    }

    #[test]
    fn result_ref_keeps_extra_properties() {
        let r = ResultRef::new("/staging/person.duckdb")
            .with_property("file_path", "/staging/person.duckdb")
            .with_property("total_bytes", 2048)
            .with_property("hash_value", Value::Null);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["@id"], "/staging/person.duckdb");
        assert_eq!(json["total_bytes"], 2048);
        assert!(json.get("hash_value").is_none());
    }
}
