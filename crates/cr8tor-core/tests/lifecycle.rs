use chrono::Utc;
use cr8tor_core::action::{ActionDraft, ActionRecord};
use cr8tor_core::commands;
use cr8tor_core::config::{Config, PublishGate};
use cr8tor_core::contract::{
    ColumnMetadata, DatasetMetadata, FilestoreLocation, PublishPayload, PublishRequest,
    PublishedFile, StageTransferPayload, TableMetadata, TransferRequest,
};
use cr8tor_core::crate_doc::{CrateBuilder, ProvenanceWriter};
use cr8tor_core::graph::{self, term::DEFAULT_BASE};
use cr8tor_core::lifecycle::{Controller, Invocation};
use cr8tor_core::lock::ProjectLock;
use cr8tor_core::service::DataServices;
use cr8tor_core::store::ProjectStore;
use cr8tor_core::types::{ActionStatus, ActionType, CommandType, ReturnCode};
use cr8tor_core::{Cr8torError, Result};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const PROJECT_TOML: &str = r#"
[project]
name = "OMOP extract"
reference = "IG-2025-001"
project_name = "omop_extract"

[project.destination]
type = "filestore"
name = "LSC"
format = "duckdb"
"#;

const ACCESS_TOML: &str = r#"
[source]
type = "postgresql"
host_url = "db.example.org"
database = "omop"
port = 5432

[source.credentials]
username_key = "user"
password_key = "pass"
"#;

const DATASET_TOML: &str = r#"
name = "omop"
schema_name = "omop"

[[tables]]
name = "person"

[[tables.columns]]
name = "person_id"

[[tables.columns]]
name = "patient_id"
"#;

struct Fixture {
    _dir: TempDir,
    store: ProjectStore,
    builder: CrateBuilder,
}

impl Fixture {
    fn new() -> Self {
        Self::with_project(PROJECT_TOML)
    }

    fn with_project(project_toml: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let res = dir.path().join("resources");
        write(&res, "governance/project.toml", project_toml);
        write(&res, "access/access.toml", ACCESS_TOML);
        write(&res, "metadata/dataset_omop.toml", DATASET_TOML);
        let builder = CrateBuilder::new(dir.path().join("bagit"), Config::default().crate_meta);
        Self {
            store: ProjectStore::new(&res),
            builder,
            _dir: dir,
        }
    }

    fn controller(&self) -> Controller<'_> {
        self.controller_with(Config::default())
    }

    fn controller_with(&self, config: Config) -> Controller<'_> {
        Controller::new(self.store.clone(), &self.builder, config)
    }

    fn action(&self, command: CommandType) -> ActionRecord {
        self.store
            .action(&format!("{command}-abc-123"))
            .unwrap()
            .unwrap_or_else(|| panic!("no {command} record"))
    }
}

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

fn inv() -> Invocation {
    Invocation::new("ci-runner")
        .instrument("cr8tor")
        .project_id("abc-123")
}

/// In-memory stand-in for the metadata and publish services.
struct FakeServices {
    remote_columns: Vec<&'static str>,
    stage_fails: bool,
    calls: Cell<usize>,
}

impl FakeServices {
    fn with_columns(cols: &[&'static str]) -> Self {
        Self {
            remote_columns: cols.to_vec(),
            stage_fails: false,
            calls: Cell::new(0),
        }
    }

    fn superset() -> Self {
        Self::with_columns(&["person_id", "patient_id", "year_of_birth"])
    }

    fn bump(&self) {
        self.calls.set(self.calls.get() + 1);
    }
}

impl DataServices for FakeServices {
    fn validate(&self, request: &TransferRequest) -> Result<DatasetMetadata> {
        self.bump();
        let mut remote = request.dataset.clone();
        remote.tables = Some(vec![TableMetadata {
            name: "person".into(),
            columns: Some(
                self.remote_columns
                    .iter()
                    .map(|c| ColumnMetadata {
                        name: c.to_string(),
                        datatype: Some("string".into()),
                        description: None,
                    })
                    .collect(),
            ),
            description: None,
        }]);
        Ok(remote)
    }

    fn stage_transfer(&self, _request: &TransferRequest) -> Result<StageTransferPayload> {
        self.bump();
        if self.stage_fails {
            return Err(Cr8torError::ExternalService("staging cluster unreachable".into()));
        }
        Ok(StageTransferPayload::Filestore {
            data_retrieved: vec![FilestoreLocation {
                file_path: "staging/omop.duckdb".into(),
            }],
        })
    }

    fn publish(&self, _request: &PublishRequest) -> Result<PublishPayload> {
        self.bump();
        Ok(PublishPayload::Filestore {
            data_published: vec![PublishedFile {
                file_path: "outputs/omop.duckdb".into(),
                hash_value: "9f86d081".into(),
                total_bytes: 4096,
            }],
        })
    }
}

/// Points at the real document but never manages to rebuild it.
struct BrokenWriter {
    document: PathBuf,
}

impl ProvenanceWriter for BrokenWriter {
    fn document_path(&self) -> PathBuf {
        self.document.clone()
    }

    fn rebuild(&self, _store: &ProjectStore) -> Result<PathBuf> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into())
    }
}

const AGREEMENT: &str = "https://github.com/lsc-sde-crates/cr8-abc-123/pull/4";

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn missing_column_fails_validate_and_blocks_sign_off() {
    let fx = Fixture::new();
    let ctl = fx.controller();

    let created = commands::create(&ctl, &inv()).unwrap();
    assert_eq!(created.return_code, ReturnCode::Success);
    let create = fx.action(CommandType::Create);
    assert_eq!(create.action_type(), ActionType::CreateAction);
    assert_eq!(create.action_status(), ActionStatus::Completed);

    let services = FakeServices::with_columns(&["person_id"]);
    let validated = commands::validate(&ctl, &inv(), &services).unwrap();
    assert_eq!(validated.return_code, ReturnCode::ValidationError);
    assert_eq!(validated.exit_code, 2);
    let validate = fx.action(CommandType::Validate);
    assert_eq!(validate.action_type(), ActionType::AssessAction);
    assert_eq!(validate.action_status(), ActionStatus::Failed);
    assert!(validate.error().unwrap().contains("patient_id"));

    let signed = commands::sign_off(&ctl, &inv(), AGREEMENT).unwrap();
    assert_eq!(signed.return_code, ReturnCode::ActionWorkflowError);
    assert!(signed
        .final_line()
        .starts_with("'Sign-Off' command failed with ACTION_WORKFLOW_ERROR (code 1):"));
    let sign_off = fx.action(CommandType::SignOff);
    assert_eq!(sign_off.action_status(), ActionStatus::Failed);
    assert!(sign_off.result().is_empty());
}

#[test]
fn sign_off_after_successful_validate_records_agreement() {
    let fx = Fixture::new();
    let ctl = fx.controller();
    commands::create(&ctl, &inv()).unwrap();

    let validated = commands::validate(&ctl, &inv(), &FakeServices::superset()).unwrap();
    assert!(validated.is_success(), "{}", validated.final_line());

    let signer = Invocation::new("ci-runner").instrument("IG Lead");
    let signed = commands::sign_off(&ctl, &signer, AGREEMENT).unwrap();
    assert!(signed.is_success(), "{}", signed.final_line());

    let record = fx.action(CommandType::SignOff);
    assert_eq!(record.action_type(), ActionType::AssessAction);
    assert_eq!(record.action_status(), ActionStatus::Completed);
    assert_eq!(record.additional_type(), Some("Sign off"));
    assert_eq!(record.instrument(), Some("IG Lead"));
    assert_eq!(record.error(), None);
    assert_eq!(record.result().len(), 1);
    assert_eq!(record.result()[0].id, AGREEMENT);
}

#[test]
fn full_chain_through_publish() {
    let fx = Fixture::new();
    let ctl = fx.controller();
    let services = FakeServices::superset();

    commands::create(&ctl, &inv()).unwrap();
    commands::validate(&ctl, &inv(), &services).unwrap();
    commands::sign_off(&ctl, &inv(), AGREEMENT).unwrap();

    let staged = commands::stage_transfer(&ctl, &inv(), &services).unwrap();
    assert!(staged.is_success(), "{}", staged.final_line());
    let dataset_file = fx.store.dataset_files(None).unwrap().remove(0);
    let dataset = fx.store.read_dataset(&dataset_file).unwrap();
    assert_eq!(dataset.staging_path.as_deref(), Some("staging/omop.duckdb"));

    // Default policy gates publish on the disclosure check.
    let early = commands::publish(&ctl, &inv(), &services).unwrap();
    assert_eq!(early.return_code, ReturnCode::ActionWorkflowError);

    let checked = commands::disclosure_check(&ctl, &inv(), AGREEMENT).unwrap();
    assert!(checked.is_success());
    assert_eq!(
        fx.action(CommandType::DisclosureCheck).additional_type(),
        Some("Disclosure Check")
    );

    let published = commands::publish(&ctl, &inv(), &services).unwrap();
    assert!(published.is_success(), "{}", published.final_line());
    let record = fx.action(CommandType::Publish);
    assert_eq!(record.result()[0].id, "outputs/omop.duckdb");
    assert_eq!(
        record.result()[0].properties["hash_value"],
        serde_json::json!("9f86d081")
    );
    let dataset = fx.store.read_dataset(&dataset_file).unwrap();
    assert_eq!(dataset.publish_path.as_deref(), Some("outputs/omop.duckdb"));

    assert_eq!(fx.store.actions().unwrap().len(), 6);
}

#[test]
fn publish_gate_can_require_stage_transfer_only() {
    let fx = Fixture::new();
    let mut config = Config::default();
    config.lifecycle.publish_requires = PublishGate::StageTransfer;
    let ctl = fx.controller_with(config);
    let services = FakeServices::superset();

    commands::create(&ctl, &inv()).unwrap();
    commands::validate(&ctl, &inv(), &services).unwrap();
    commands::sign_off(&ctl, &inv(), AGREEMENT).unwrap();
    commands::stage_transfer(&ctl, &inv(), &services).unwrap();

    let published = commands::publish(&ctl, &inv(), &services).unwrap();
    assert!(published.is_success(), "{}", published.final_line());
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn rerunning_a_command_replaces_its_record() {
    let fx = Fixture::new();
    let ctl = fx.controller();
    commands::create(&ctl, &inv()).unwrap();

    commands::validate(&ctl, &inv(), &FakeServices::with_columns(&["person_id"])).unwrap();
    commands::validate(&ctl, &inv(), &FakeServices::superset()).unwrap();

    let actions = fx.store.actions().unwrap();
    let validates: Vec<_> = actions
        .iter()
        .filter(|a| a.id() == "Validate-abc-123")
        .collect();
    assert_eq!(validates.len(), 1);
    assert_eq!(validates[0].action_status(), ActionStatus::Completed);
}

#[test]
fn validate_before_create_is_refused_without_running_body() {
    let fx = Fixture::new();
    let ctl = fx.controller();
    let services = FakeServices::superset();

    let err = commands::validate(&ctl, &inv(), &services).unwrap_err();
    assert!(matches!(err, Cr8torError::MissingField { .. }));
    assert_eq!(err.return_code(), ReturnCode::ActionWorkflowError);
    assert_eq!(services.calls.get(), 0);
}

#[test]
fn missing_provenance_document_closes_every_gate() {
    // Project id and actions list exist, but no document was ever built.
    let fx = Fixture::with_project(&format!("actions = []\n{PROJECT_TOML}").replace(
        "[project]\n",
        "[project]\nid = \"abc-123\"\n",
    ));
    let ctl = fx.controller();
    let services = FakeServices::superset();

    let done = commands::validate(&ctl, &inv(), &services).unwrap();
    assert_eq!(done.return_code, ReturnCode::ActionWorkflowError);
    assert_eq!(services.calls.get(), 0);
    let record = fx.action(CommandType::Validate);
    assert_eq!(record.action_status(), ActionStatus::Failed);
    assert!(record.error().unwrap().contains("Create"));
}

#[test]
fn failing_body_records_failure_with_error() {
    let fx = Fixture::new();
    let ctl = fx.controller();
    let mut services = FakeServices::superset();
    commands::create(&ctl, &inv()).unwrap();
    commands::validate(&ctl, &inv(), &services).unwrap();
    commands::sign_off(&ctl, &inv(), AGREEMENT).unwrap();

    services.stage_fails = true;
    let staged = commands::stage_transfer(&ctl, &inv(), &services).unwrap();
    assert_eq!(staged.return_code, ReturnCode::ActionExecutionError);
    assert_eq!(staged.exit_code, 3);
    let record = fx.action(CommandType::StageTransfer);
    assert_eq!(record.action_status(), ActionStatus::Failed);
    assert!(record.error().unwrap().contains("staging cluster unreachable"));
}

#[test]
fn invalid_agreement_url_is_a_validation_failure() {
    let fx = Fixture::new();
    let ctl = fx.controller();
    commands::create(&ctl, &inv()).unwrap();
    commands::validate(&ctl, &inv(), &FakeServices::superset()).unwrap();

    let signed = commands::sign_off(&ctl, &inv(), "not a url").unwrap();
    assert_eq!(signed.return_code, ReturnCode::ValidationError);
    assert_eq!(
        fx.action(CommandType::SignOff).action_status(),
        ActionStatus::Failed
    );
}

#[test]
fn create_twice_is_refused_and_keeps_original_record() {
    let fx = Fixture::new();
    let ctl = fx.controller();
    commands::create(&ctl, &inv()).unwrap();
    let first = fx.action(CommandType::Create);

    let again = commands::create(&ctl, &inv()).unwrap();
    assert_eq!(again.return_code, ReturnCode::ActionWorkflowError);
    assert!(again.record.is_none());
    assert_eq!(fx.action(CommandType::Create), first);
    assert_eq!(fx.store.actions().unwrap().len(), 1);
}

#[test]
fn created_document_round_trips_through_the_graph() {
    let fx = Fixture::new();
    let ctl = fx.controller();
    commands::create(&ctl, &inv()).unwrap();
    commands::validate(&ctl, &inv(), &FakeServices::superset()).unwrap();

    let doc = fx.builder.document_path();
    let complete = |command: CommandType, project: &str| {
        graph::is_action_complete_at(&doc, DEFAULT_BASE, command, command.action_type(), project)
    };
    assert!(complete(CommandType::Create, "abc-123"));
    assert!(complete(CommandType::Validate, "abc-123"));
    assert!(!complete(CommandType::Validate, "def-456"));
    assert!(!complete(CommandType::SignOff, "abc-123"));
}

#[test]
fn concurrent_run_is_refused_while_locked() {
    let fx = Fixture::new();
    let ctl = fx.controller();
    commands::create(&ctl, &inv()).unwrap();

    let _held = ProjectLock::acquire(&fx.store.project_path(), Duration::from_secs(600)).unwrap();
    let services = FakeServices::superset();
    let err = commands::validate(&ctl, &inv(), &services).unwrap_err();
    assert!(matches!(err, Cr8torError::ProjectLocked(_)));
    assert_eq!(services.calls.get(), 0);
}

#[test]
fn zero_dataset_files_is_a_validation_failure() {
    let fx = Fixture::new();
    let ctl = fx.controller();
    commands::create(&ctl, &inv()).unwrap();
    std::fs::remove_file(fx.store.dataset_files(None).unwrap().remove(0)).unwrap();

    let services = FakeServices::superset();
    let validated = commands::validate(&ctl, &inv(), &services).unwrap();
    assert_eq!(validated.return_code, ReturnCode::ValidationError);
    assert_eq!(services.calls.get(), 0);
}

#[test]
fn failed_validate_rerun_closes_sign_off_despite_bad_dataset_file() {
    let fx = Fixture::new();
    let ctl = fx.controller();
    let services = FakeServices::superset();
    commands::create(&ctl, &inv()).unwrap();
    assert!(commands::validate(&ctl, &inv(), &services).unwrap().is_success());

    let dataset_file = fx.store.dataset_files(None).unwrap().remove(0);
    std::fs::write(&dataset_file, "name = \"omop\"\n").unwrap();

    let rerun = commands::validate(&ctl, &inv(), &services).unwrap();
    assert!(!rerun.is_success());
    assert_eq!(fx.action(CommandType::Validate).action_status(), ActionStatus::Failed);
    assert!(fx.builder.document_path().exists());

    let signed = commands::sign_off(&ctl, &inv(), AGREEMENT).unwrap();
    assert_eq!(signed.return_code, ReturnCode::ActionWorkflowError);
    assert_eq!(fx.action(CommandType::SignOff).action_status(), ActionStatus::Failed);
}

#[test]
fn failed_rebuild_removes_document_and_closes_next_gate() {
    let fx = Fixture::new();
    let ctl = fx.controller();
    commands::create(&ctl, &inv()).unwrap();
    commands::validate(&ctl, &inv(), &FakeServices::superset()).unwrap();
    let doc = fx.builder.document_path();
    assert!(doc.exists());

    let broken = BrokenWriter { document: doc.clone() };
    let broken_ctl = Controller::new(fx.store.clone(), &broken, Config::default());
    let err = commands::sign_off(&broken_ctl, &inv(), AGREEMENT).unwrap_err();
    assert!(matches!(err, Cr8torError::Io(_)));
    assert!(!doc.exists());
    assert_eq!(fx.action(CommandType::SignOff).action_status(), ActionStatus::Completed);

    let services = FakeServices::superset();
    let staged = commands::stage_transfer(&ctl, &inv(), &services).unwrap();
    assert_eq!(staged.return_code, ReturnCode::ActionWorkflowError);
    assert_eq!(services.calls.get(), 0);
}

#[test]
fn gate_requires_the_project_record_as_well_as_the_graph() {
    let fx = Fixture::new();
    let ctl = fx.controller();
    commands::create(&ctl, &inv()).unwrap();
    commands::validate(&ctl, &inv(), &FakeServices::superset()).unwrap();
    assert!(ctl.is_complete(CommandType::Validate, "abc-123"));

    // project.toml moves on without a rebuild; the graph still says Completed.
    let failed = ActionDraft::for_command(CommandType::Validate, "abc-123", "ci-runner", Utc::now())
        .failed(Utc::now(), "source unreachable")
        .unwrap();
    fx.store.append_or_replace_action(&failed).unwrap();
    assert!(!ctl.is_complete(CommandType::Validate, "abc-123"));

    let signed = commands::sign_off(&ctl, &inv(), AGREEMENT).unwrap();
    assert_eq!(signed.return_code, ReturnCode::ActionWorkflowError);
}

#[test]
fn empty_agent_is_refused_before_any_side_effect() {
    let fx = Fixture::new();
    let ctl = fx.controller();

    let err = commands::create(&ctl, &Invocation::new("").project_id("abc-123")).unwrap_err();
    assert_eq!(err.return_code(), ReturnCode::ValidationError);
    assert!(fx.store.read_project().is_err());
    assert!(fx.store.actions().unwrap().is_empty());

    let services = FakeServices::superset();
    commands::create(&ctl, &inv()).unwrap();
    commands::validate(&ctl, &inv(), &services).unwrap();
    commands::sign_off(&ctl, &inv(), AGREEMENT).unwrap();

    let staging = FakeServices::superset();
    let err = commands::stage_transfer(&ctl, &Invocation::new("").instrument("cr8tor"), &staging)
        .unwrap_err();
    assert!(matches!(err, Cr8torError::Validation(_)));
    assert_eq!(staging.calls.get(), 0);
    let dataset_file = fx.store.dataset_files(None).unwrap().remove(0);
    assert_eq!(fx.store.read_dataset(&dataset_file).unwrap().staging_path, None);
    assert!(fx.store.action("Stage-Transfer-abc-123").unwrap().is_none());
}
