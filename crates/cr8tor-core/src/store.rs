//! Project action store over the resources directory.
//!
//! ```text
//! resources/
//!   governance/project.toml   [project] + [[actions]]
//!   access/access.toml        source connection
//!   metadata/dataset*.toml    one dataset per file
//! ```

use crate::action::ActionRecord;
use crate::contract::{AccessResource, DatasetMetadata};
use crate::error::{Cr8torError, Result};
use crate::paths;
use crate::project::{format_start_time, Project, Repository, RequestingAgent};
use crate::resource::ResourceDoc;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use toml::Value;

const PROJECT_SECTION: &str = "project";
const REQUESTING_AGENT_SECTION: &str = "requesting_agent";
const REPOSITORY_SECTION: &str = "repository";
const ACTIONS_SECTION: &str = "actions";

/// Everything `governance/project.toml` holds, read in one pass.
#[derive(Debug, Clone)]
pub struct Governance {
    pub project: Project,
    pub requesting_agent: Option<RequestingAgent>,
    pub repository: Option<Repository>,
    pub actions: Vec<ActionRecord>,
}

#[derive(Debug, Clone)]
pub struct ProjectStore {
    resources_dir: PathBuf,
}

impl ProjectStore {
    pub fn new(resources_dir: impl Into<PathBuf>) -> Self {
        Self {
            resources_dir: resources_dir.into(),
        }
    }

    pub fn resources_dir(&self) -> &Path {
        &self.resources_dir
    }

    pub fn project_path(&self) -> PathBuf {
        paths::project_path(&self.resources_dir)
    }

    fn project_doc(&self) -> Result<ResourceDoc> {
        ResourceDoc::read(&self.project_path())
    }

    // -----------------------------------------------------------------------
    // Project
    // -----------------------------------------------------------------------

    /// Parse the `[project]` section. Fails with `MissingField` when `id` is
    /// absent, which means create has never run.
    pub fn read_project(&self) -> Result<Project> {
        let doc = self.project_doc()?;
        project_from(&doc)
    }

    pub fn governance(&self) -> Result<Governance> {
        let doc = self.project_doc()?;
        let project = project_from(&doc)?;
        let requesting_agent = optional_section(&doc, REQUESTING_AGENT_SECTION)?;
        let repository = optional_section(&doc, REPOSITORY_SECTION)?;
        let actions = optional_section(&doc, ACTIONS_SECTION)?.unwrap_or_default();
        Ok(Governance {
            project,
            requesting_agent,
            repository,
            actions,
        })
    }

    /// Assign the project id and start time if the document has none.
    ///
    /// `id_override` pins the id (the `PROJECT_UUID` variable); otherwise a
    /// fresh v4 uuid is used. An existing id is never changed.
    pub fn ensure_project_id(
        &self,
        id_override: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Project> {
        let mut doc = self.project_doc()?;
        let section = doc.table_section_mut(PROJECT_SECTION)?;

        let has_id = section
            .get("id")
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty());
        if !has_id {
            let id = id_override
                .map(str::to_string)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            tracing::info!(project_id = %id, "assigned project id");
            section.insert("id".to_string(), Value::String(id));
        }
        if !section.contains_key("project_start_time") {
            section.insert(
                "project_start_time".to_string(),
                Value::String(format_start_time(now)),
            );
        }

        let project = project_from(&doc)?;
        doc.write()?;
        Ok(project)
    }

    /// Create an empty `actions` list if the document has none. Existing
    /// records are kept.
    pub fn init_actions(&self) -> Result<()> {
        let mut doc = self.project_doc()?;
        if !doc.has_section(ACTIONS_SECTION) {
            doc.ensure_list_section(ACTIONS_SECTION);
            doc.write()?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Replace any action with the record's id, then append it. Fails with
    /// `MissingSection` when the `actions` list was never initialised.
    pub fn append_or_replace_action(&self, record: &ActionRecord) -> Result<()> {
        let mut doc = self.project_doc()?;
        let replaced = doc.append_or_replace(ACTIONS_SECTION, record, "id")?;
        doc.write()?;
        tracing::debug!(
            action = record.id(),
            status = %record.action_status(),
            replaced,
            "recorded action"
        );
        Ok(())
    }

    /// Fails with `MissingSection` when the `actions` list was never
    /// initialised, before any command body runs.
    pub fn check_actions(&self) -> Result<()> {
        self.project_doc()?.list_section(ACTIONS_SECTION).map(|_| ())
    }

    /// All recorded actions. A document without an `actions` list has none.
    pub fn actions(&self) -> Result<Vec<ActionRecord>> {
        let doc = self.project_doc()?;
        Ok(optional_section(&doc, ACTIONS_SECTION)?.unwrap_or_default())
    }

    pub fn action(&self, id: &str) -> Result<Option<ActionRecord>> {
        Ok(self.actions()?.into_iter().find(|a| a.id() == id))
    }

    // -----------------------------------------------------------------------
    // Access and datasets
    // -----------------------------------------------------------------------

    pub fn read_access(&self) -> Result<AccessResource> {
        let path = paths::access_path(&self.resources_dir);
        let doc = ResourceDoc::read(&path)?;
        let source = doc.section_as("source")?;
        let extract_config = optional_section(&doc, "extract_config")?.unwrap_or_default();
        Ok(AccessResource {
            source,
            extract_config,
        })
    }

    /// Dataset metadata files in name order, at most `limit` of them.
    /// A missing `metadata/` directory yields none.
    pub fn dataset_files(&self, limit: Option<usize>) -> Result<Vec<PathBuf>> {
        let dir = paths::metadata_dir(&self.resources_dir);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file() && paths::is_dataset_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        if let Some(limit) = limit {
            if files.len() > limit {
                tracing::warn!(
                    found = files.len(),
                    limit,
                    "more dataset files than configured; extra files skipped"
                );
                files.truncate(limit);
            }
        }
        Ok(files)
    }

    pub fn read_dataset(&self, file: &Path) -> Result<DatasetMetadata> {
        ResourceDoc::read(file)?.parse_as()
    }

    /// Store a top-level string key (`staging_path`, `publish_path`) on a
    /// dataset document.
    pub fn record_dataset_location(&self, file: &Path, key: &str, location: &str) -> Result<()> {
        let mut doc = ResourceDoc::read(file)?;
        doc.set_section(key, location)?;
        doc.write()
    }
}

fn optional_section<T: serde::de::DeserializeOwned>(
    doc: &ResourceDoc,
    key: &str,
) -> Result<Option<T>> {
    if doc.has_section(key) {
        doc.section_as(key).map(Some)
    } else {
        Ok(None)
    }
}

fn project_from(doc: &ResourceDoc) -> Result<Project> {
    let section = doc.table_section(PROJECT_SECTION)?;
    for field in ["id", "name"] {
        let present = section
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty());
        if !present {
            return Err(Cr8torError::MissingField {
                section: PROJECT_SECTION.to_string(),
                field: field.to_string(),
            });
        }
    }
    doc.section_as(PROJECT_SECTION)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
