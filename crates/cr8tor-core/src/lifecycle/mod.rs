//! Command lifecycle controller.
//!
//! Every command except create runs through [`Controller::run`]:
//!
//! 1. take the project lock and read the project
//! 2. check the prerequisite command is Completed in both `project.toml` and
//!    the provenance graph
//! 3. run the command body (skipped when the gate is closed)
//! 4. record a Completed or Failed action, replacing the previous one
//! 5. rebuild the provenance document
//!
//! Body and gate failures never escape as errors; they become a Failed record
//! and a non-zero [`Completion`]. Only structural problems that leave nowhere
//! to record a result (no project id, no `actions` list, a held lock) are
//! returned as `Err`. An invocation without an agent is refused before the
//! lock is taken, since no record could be written for it.

mod outcome;

pub use outcome::{failure_line, CommandError, Completion, Outcome};

use crate::action::{ActionDraft, ActionRecord};
use crate::config::{Config, PublishGate};
use crate::crate_doc::ProvenanceWriter;
use crate::error::{Cr8torError, Result};
use crate::graph;
use crate::lock::ProjectLock;
use crate::project::Project;
use crate::store::ProjectStore;
use crate::types::{composite_id, ActionStatus, CommandType, ReturnCode};
use chrono::Utc;
use std::time::Duration;

/// Command that must be Completed before `command` may complete.
pub fn prerequisite(command: CommandType, gate: PublishGate) -> Option<CommandType> {
    match command {
        CommandType::Create => None,
        CommandType::Validate => Some(CommandType::Create),
        CommandType::SignOff => Some(CommandType::Validate),
        CommandType::StageTransfer => Some(CommandType::SignOff),
        CommandType::DisclosureCheck => Some(CommandType::StageTransfer),
        CommandType::Publish => Some(gate.prerequisite()),
    }
}

/// Caller-resolved identity for one run. Nothing is read from the
/// environment once a run has started.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub agent: String,
    pub instrument: Option<String>,
    /// Overrides the command's default sub-classification.
    pub additional_type: Option<String>,
    /// Pins the id create assigns to a new project.
    pub project_id: Option<String>,
}

impl Invocation {
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            instrument: None,
            additional_type: None,
            project_id: None,
        }
    }

    pub fn instrument(mut self, instrument: impl Into<String>) -> Self {
        self.instrument = Some(instrument.into());
        self
    }

    pub fn additional_type(mut self, additional_type: impl Into<String>) -> Self {
        self.additional_type = Some(additional_type.into());
        self
    }

    pub fn project_id(mut self, id: impl Into<String>) -> Self {
        self.project_id = Some(id.into());
        self
    }
}

/// Read-only view handed to a command body.
pub struct CommandContext<'a> {
    pub store: &'a ProjectStore,
    pub project: &'a Project,
    pub config: &'a Config,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct Controller<'a> {
    store: ProjectStore,
    writer: &'a dyn ProvenanceWriter,
    config: Config,
}

impl<'a> Controller<'a> {
    pub fn new(store: ProjectStore, writer: &'a dyn ProvenanceWriter, config: Config) -> Self {
        Self {
            store,
            writer,
            config,
        }
    }

    fn lock(&self) -> Result<ProjectLock> {
        ProjectLock::acquire(
            &self.store.project_path(),
            Duration::from_secs(self.config.lifecycle.lock_stale_seconds),
        )
    }

    /// Fail-closed check that `command` is Completed for `project_id`. The
    /// record in `project.toml` and the provenance graph must both say so.
    pub fn is_complete(&self, command: CommandType, project_id: &str) -> bool {
        let recorded = match self.store.action(&composite_id(command, project_id)) {
            Ok(Some(record)) => record.action_status() == ActionStatus::Completed,
            Ok(None) => false,
            Err(e) => {
                tracing::info!(%command, error = %e, "cannot read action record; treating as not completed");
                false
            }
        };
        recorded
            && graph::is_action_complete_at(
                &self.writer.document_path(),
                &self.config.crate_meta.base_uri,
                command,
                command.action_type(),
                project_id,
            )
    }

    /// Run a gated lifecycle command.
    pub fn run<F>(&self, command: CommandType, inv: &Invocation, body: F) -> Result<Completion>
    where
        F: FnOnce(&CommandContext<'_>) -> std::result::Result<Outcome, CommandError>,
    {
        if command == CommandType::Create {
            return self.create(inv);
        }

        check_invocation(inv)?;
        let _lock = self.lock()?;
        let project = self.store.read_project()?;
        self.store.check_actions()?;
        let start = Utc::now();

        let gate = prerequisite(command, self.config.lifecycle.publish_requires);
        let outcome = match gate {
            Some(pre) if !self.is_complete(pre, &project.id) => {
                let err = Cr8torError::PrerequisiteNotMet {
                    command: command.to_string(),
                    prerequisite: pre.to_string(),
                    project_id: project.id.clone(),
                };
                tracing::info!(%command, prerequisite = %pre, project_id = %project.id, "gate closed; body skipped");
                Err(CommandError::Workflow(err.to_string()))
            }
            _ => {
                let ctx = CommandContext {
                    store: &self.store,
                    project: &project,
                    config: &self.config,
                };
                tracing::info!(%command, project_id = %project.id, "running command");
                body(&ctx)
            }
        };

        let draft = ActionDraft::for_command(command, &project.id, inv.agent.as_str(), start)
            .instrument(inv.instrument.clone())
            .additional_type(
                inv.additional_type
                    .clone()
                    .or_else(|| command.additional_type().map(str::to_string)),
            );
        let end = Utc::now();

        let (record, code, message) = match outcome {
            Ok(out) => {
                let message = out
                    .message
                    .unwrap_or_else(|| success_message(command, &project.id));
                (draft.completed(end, out.result)?, ReturnCode::Success, message)
            }
            Err(e) => {
                tracing::info!(%command, error = %e, "command failed");
                (draft.failed(end, e.message())?, e.return_code(), e.message().to_string())
            }
        };

        self.persist(&record)?;
        Ok(Completion::new(
            command,
            Some(project.id),
            code,
            message,
            Some(record),
        ))
    }

    /// Run create: assign the project id, initialise the actions list and
    /// record the CreateAction. Refused, without writing a record, when a
    /// Completed CreateAction already exists for the project.
    pub fn create(&self, inv: &Invocation) -> Result<Completion> {
        let command = CommandType::Create;
        check_invocation(inv)?;
        let _lock = self.lock()?;
        let start = Utc::now();

        if let Some(existing) = self.existing_project_id()? {
            if self.is_complete(command, &existing) {
                let msg = format!("project {existing} has already been created");
                tracing::info!(project_id = %existing, "create refused; already completed");
                return Ok(Completion::new(
                    command,
                    Some(existing),
                    ReturnCode::ActionWorkflowError,
                    msg,
                    None,
                ));
            }
        }

        let project = self
            .store
            .ensure_project_id(inv.project_id.as_deref(), start)?;
        self.store.init_actions()?;

        let record = ActionDraft::for_command(command, &project.id, inv.agent.as_str(), start)
            .instrument(inv.instrument.clone())
            .completed(Utc::now(), Vec::new())?;
        self.persist(&record)?;

        Ok(Completion::new(
            command,
            Some(project.id.clone()),
            ReturnCode::Success,
            success_message(command, &project.id),
            Some(record),
        ))
    }

    /// Project id if create has assigned one; absent document sections count
    /// as not created.
    fn existing_project_id(&self) -> Result<Option<String>> {
        match self.store.read_project() {
            Ok(p) => Ok(Some(p.id)),
            Err(Cr8torError::MissingField { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write the record, then rebuild the document. A failed rebuild removes
    /// the old document so no gate opens on a status it no longer reflects.
    fn persist(&self, record: &ActionRecord) -> Result<()> {
        self.store.append_or_replace_action(record)?;
        if let Err(e) = self.writer.rebuild(&self.store) {
            let doc = self.writer.document_path();
            match std::fs::remove_file(&doc) {
                Ok(()) => {
                    tracing::warn!(path = %doc.display(), error = %e, "rebuild failed; removed stale provenance document")
                }
                Err(io) if io.kind() == std::io::ErrorKind::NotFound => {}
                Err(io) => {
                    tracing::error!(path = %doc.display(), error = %io, "cannot remove stale provenance document")
                }
            }
            return Err(e);
        }
        Ok(())
    }
}

fn check_invocation(inv: &Invocation) -> Result<()> {
    if inv.agent.trim().is_empty() {
        return Err(Cr8torError::Validation(
            "agent must not be empty; set identity.agent or APP_NAME".to_string(),
        ));
    }
    Ok(())
}

fn success_message(command: CommandType, project_id: &str) -> String {
    format!("'{command}' command completed for project {project_id}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
