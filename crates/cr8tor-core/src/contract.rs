//! Request and response contracts of the external metadata and publish services.
//!
//! Payload shapes that vary by destination are modelled as enums tagged by an
//! explicit discriminator, so an unexpected `destination_type` or a payload
//! whose entries do not match it fails at deserialization.

use crate::action::ResultRef;
use crate::error::{Cr8torError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Dataset metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnMetadata>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A dataset comprising one or more tables, as described in `metadata/dataset*.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub schema_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<TableMetadata>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_path: Option<String>,
}

impl DatasetMetadata {
    pub fn tables(&self) -> &[TableMetadata] {
        self.tables.as_deref().unwrap_or(&[])
    }

    /// Display name, falling back to the schema name.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.schema_name)
    }
}

// ---------------------------------------------------------------------------
// Source connection (access.toml)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabricksCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub spn_clientid: String,
    pub spn_secret: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub username_key: String,
    pub password_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabricksSource {
    pub host_url: String,
    pub http_path: String,
    #[serde(default = "default_https_port")]
    pub port: u16,
    pub catalog: String,
    pub credentials: DatabricksCredentials,
}

fn default_https_port() -> u16 {
    443
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlSource {
    pub host_url: String,
    pub database: String,
    pub port: u16,
    pub credentials: SqlCredentials,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SourceConnection {
    #[serde(rename = "databrickssql")]
    Databricks(DatabricksSource),
    #[serde(rename = "postgresql")]
    Postgresql(SqlSource),
    #[serde(rename = "mysql")]
    Mysql(SqlSource),
    #[serde(rename = "sqlserver", alias = "mssql")]
    SqlServer(SqlSource),
}

impl SourceConnection {
    pub fn host_url(&self) -> &str {
        match self {
            SourceConnection::Databricks(s) => &s.host_url,
            SourceConnection::Postgresql(s)
            | SourceConnection::Mysql(s)
            | SourceConnection::SqlServer(s) => &s.host_url,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendEngine {
    #[default]
    Pyarrow,
    Sqlalchemy,
    Pandas,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractConfig {
    #[serde(default)]
    pub backend_engine: BackendEngine,
}

/// Contents of `access/access.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessResource {
    pub source: SourceConnection,
    #[serde(default)]
    pub extract_config: ExtractConfig,
}

// ---------------------------------------------------------------------------
// Destination (project.toml)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Duckdb,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlFormat {
    #[default]
    Sql,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Destination {
    /// `name` must match the mount point of the filestore.
    Filestore { name: String, format: FileFormat },
    Postgresql {
        #[serde(default)]
        name: String,
        #[serde(default)]
        format: SqlFormat,
    },
}

impl Destination {
    /// MIME-ish encoding recorded on staged and published dataset entities.
    pub fn encoding_format(&self) -> &'static str {
        match self {
            Destination::Filestore {
                format: FileFormat::Csv,
                ..
            } => "text/csv",
            Destination::Filestore {
                format: FileFormat::Duckdb,
                ..
            } => "application/x-duckdb",
            Destination::Postgresql { .. } => "application/sql",
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

static PROJECT_NAME_RE: OnceLock<Regex> = OnceLock::new();
static START_TIME_RE: OnceLock<Regex> = OnceLock::new();

fn project_name_re() -> &'static Regex {
    PROJECT_NAME_RE.get_or_init(|| Regex::new(r"^\S+$").expect("static regex"))
}

fn start_time_re() -> &'static Regex {
    START_TIME_RE.get_or_init(|| Regex::new(r"^\d{8}_\d{6}$").expect("static regex"))
}

/// Fields every service request carries to identify the project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRequest {
    pub project_name: String,
    pub project_start_time: String,
    pub destination: Destination,
}

impl ProjectRequest {
    pub fn new(
        project_name: impl Into<String>,
        project_start_time: impl Into<String>,
        destination: Destination,
    ) -> Result<Self> {
        let project_name = project_name.into();
        let project_start_time = project_start_time.into();
        if !project_name_re().is_match(&project_name) {
            return Err(Cr8torError::Validation(format!(
                "project_name '{project_name}' must not contain whitespace"
            )));
        }
        if !start_time_re().is_match(&project_start_time) {
            return Err(Cr8torError::Validation(format!(
                "project_start_time '{project_start_time}' must be formatted YYYYMMDD_HHMMSS"
            )));
        }
        Ok(Self {
            project_name,
            project_start_time,
            destination,
        })
    }
}

/// Body of the validate and stage-transfer requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    #[serde(flatten)]
    pub project: ProjectRequest,
    pub extract_config: ExtractConfig,
    pub source: SourceConnection,
    pub dataset: DatasetMetadata,
}

impl TransferRequest {
    pub fn new(project: ProjectRequest, access: &AccessResource, dataset: DatasetMetadata) -> Self {
        Self {
            project,
            extract_config: access.extract_config.clone(),
            source: access.source.clone(),
            dataset,
        }
    }
}

/// Body of the publish request.
pub type PublishRequest = ProjectRequest;

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Envelope of every service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse<T> {
    pub status: ResponseStatus,
    #[serde(default = "Option::default")]
    pub payload: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ServiceResponse<T> {
    pub fn into_payload(self, service: &str) -> Result<T> {
        match (self.status, self.payload) {
            (ResponseStatus::Success, Some(payload)) => Ok(payload),
            (ResponseStatus::Success, None) => Err(Cr8torError::ExternalService(format!(
                "{service} returned success without a payload"
            ))),
            (ResponseStatus::Error, _) => Err(Cr8torError::ExternalService(format!(
                "{service} returned an error: {}",
                self.message.as_deref().unwrap_or("no message")
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilestoreLocation {
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlTableLocation {
    pub table_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "destination_type", rename_all = "lowercase")]
pub enum StageTransferPayload {
    Filestore { data_retrieved: Vec<FilestoreLocation> },
    Postgresql { data_retrieved: Vec<SqlTableLocation> },
}

impl StageTransferPayload {
    pub fn result_refs(&self) -> Vec<ResultRef> {
        match self {
            StageTransferPayload::Filestore { data_retrieved } => data_retrieved
                .iter()
                .map(|l| ResultRef::new(&l.file_path).with_property("file_path", l.file_path.as_str()))
                .collect(),
            StageTransferPayload::Postgresql { data_retrieved } => data_retrieved
                .iter()
                .map(|l| ResultRef::new(&l.table_name).with_property("table_name", l.table_name.as_str()))
                .collect(),
        }
    }

    /// First staged location, recorded on the dataset document.
    pub fn primary_location(&self) -> Option<&str> {
        match self {
            StageTransferPayload::Filestore { data_retrieved } => {
                data_retrieved.first().map(|l| l.file_path.as_str())
            }
            StageTransferPayload::Postgresql { data_retrieved } => {
                data_retrieved.first().map(|l| l.table_name.as_str())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedFile {
    pub file_path: String,
    pub hash_value: String,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedTable {
    pub postgresql_table_name: String,
    pub opal_resource_name: String,
    pub opal_project_name: String,
    pub opal_group_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "destination_type", rename_all = "lowercase")]
pub enum PublishPayload {
    Filestore { data_published: Vec<PublishedFile> },
    Postgresql { data_published: Vec<PublishedTable> },
}

impl PublishPayload {
    pub fn result_refs(&self) -> Vec<ResultRef> {
        match self {
            PublishPayload::Filestore { data_published } => data_published
                .iter()
                .map(|f| {
                    ResultRef::new(&f.file_path)
                        .with_property("file_path", f.file_path.as_str())
                        .with_property("hash_value", f.hash_value.as_str())
                        .with_property("total_bytes", f.total_bytes)
                })
                .collect(),
            PublishPayload::Postgresql { data_published } => data_published
                .iter()
                .map(|t| {
                    ResultRef::new(&t.postgresql_table_name)
                        .with_property("postgresql_table_name", t.postgresql_table_name.as_str())
                        .with_property("opal_resource_name", t.opal_resource_name.as_str())
                        .with_property("opal_project_name", t.opal_project_name.as_str())
                        .with_property("opal_group_name", t.opal_group_name.as_str())
                })
                .collect(),
        }
    }

    pub fn primary_location(&self) -> Option<&str> {
        match self {
            PublishPayload::Filestore { data_published } => {
                data_published.first().map(|f| f.file_path.as_str())
            }
            PublishPayload::Postgresql { data_published } => data_published
                .first()
                .map(|t| t.postgresql_table_name.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
