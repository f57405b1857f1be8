//! RO-Crate metadata document (`ro-crate-metadata.json`) built from the
//! project resources.
//!
//! The document is regenerated whole after every recorded action; nothing in
//! it is edited in place. Packaging the surrounding BagIt archive is left to
//! the caller.

use crate::action::ActionRecord;
use crate::config::CrateConfig;
use crate::error::Result;
use crate::paths;
use crate::store::{Governance, ProjectStore};
use crate::types::ActionStatus;
use serde_json::{json, Map, Value};
use std::path::PathBuf;

const RO_CRATE_CONTEXT: &str = "https://w3id.org/ro/crate/1.1/context";
const RO_CRATE_SPEC: &str = "https://w3id.org/ro/crate/1.1";
const SCHEMA_NS: &str = "http://schema.org/";

/// Regenerates the provenance document from the current project state.
pub trait ProvenanceWriter {
    /// Where the document lives; gating queries load it from here.
    fn document_path(&self) -> PathBuf;

    fn rebuild(&self, store: &ProjectStore) -> Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct CrateBuilder {
    bagit_dir: PathBuf,
    meta: CrateConfig,
}

impl CrateBuilder {
    pub fn new(bagit_dir: impl Into<PathBuf>, meta: CrateConfig) -> Self {
        Self {
            bagit_dir: bagit_dir.into(),
            meta,
        }
    }

    /// Render the document without writing it.
    pub fn render(&self, store: &ProjectStore) -> Result<Value> {
        let gov = store.governance()?;
        let mut graph = Graph::default();

        self.describe_root(&mut graph, &gov);
        describe_people(&mut graph, &gov);
        self.describe_files(&mut graph, store, &gov)?;
        for action in &gov.actions {
            describe_action(&mut graph, action);
        }

        Ok(json!({
            "@context": RO_CRATE_CONTEXT,
            "@graph": graph.into_entities(),
        }))
    }

    fn describe_root(&self, graph: &mut Graph, gov: &Governance) {
        let project = &gov.project;
        graph.add(json!({
            "@id": paths::CRATE_METADATA_FILE,
            "@type": "CreativeWork",
            "conformsTo": {"@id": RO_CRATE_SPEC},
            "about": {"@id": "./"},
        }));

        let mut root = entity("./", "Dataset");
        root.insert("name".into(), json!(project.name));
        insert_opt(&mut root, "description", project.description.as_deref());
        root.insert(
            "datePublished".into(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
        root.insert("license".into(), json!({"@id": self.meta.license}));
        root.insert("publisher".into(), json!({"@id": self.meta.publisher_url}));
        root.insert("mainEntity".into(), json!({"@id": project.id}));
        if gov.repository.is_some() {
            root.insert("isBasedOn".into(), json!({"@id": repo_id(&project.id)}));
        }
        if !gov.actions.is_empty() {
            let ids: Vec<Value> = gov.actions.iter().map(|a| json!({"@id": a.id()})).collect();
            root.insert("mentions".into(), Value::Array(ids));
        }
        graph.add(Value::Object(root));

        graph.add(json!({
            "@id": self.meta.license,
            "@type": "CreativeWork",
            "name": self.meta.license,
        }));
        graph.add(json!({
            "@id": self.meta.publisher_url,
            "@type": "Organization",
            "name": self.meta.publisher_name,
            "url": self.meta.publisher_url,
        }));

        let mut entity_project = entity(&project.id, "Project");
        entity_project.insert("name".into(), json!(project.name));
        insert_opt(&mut entity_project, "identifier", project.reference.as_deref());
        insert_opt(&mut entity_project, "description", project.description.as_deref());
        if gov.requesting_agent.is_some() {
            entity_project.insert(
                "memberOf".into(),
                json!([{"@id": format!("requesting-agent-{}", project.id)}]),
            );
        }
        graph.add(Value::Object(entity_project));
    }

    fn describe_files(
        &self,
        graph: &mut Graph,
        store: &ProjectStore,
        gov: &Governance,
    ) -> Result<()> {
        let base = store.resources_dir();
        let mut parts = Vec::new();

        let project_file = paths::relative_id(base, &store.project_path());
        let mut file = entity(&project_file, "File");
        file.insert("name".into(), json!(gov.project.name));
        insert_opt(&mut file, "description", gov.project.description.as_deref());
        graph.add(Value::Object(file));
        parts.push(project_file);

        let access = paths::access_path(base);
        if access.exists() {
            let id = paths::relative_id(base, &access);
            let mut file = entity(&id, "File");
            file.insert("name".into(), json!("Data access descriptor"));
            graph.add(Value::Object(file));
            parts.push(id);
        }

        let encoding = gov
            .project
            .destination
            .as_ref()
            .map(|d| d.encoding_format());

        for path in store.dataset_files(None)? {
            let dataset = match store.read_dataset(&path) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable dataset file");
                    continue;
                }
            };
            let id = paths::relative_id(base, &path);
            let mut file = entity(&id, "File");
            file.insert("name".into(), json!(dataset.label()));
            insert_opt(&mut file, "description", dataset.description.as_deref());
            graph.add(Value::Object(file));
            parts.push(id);

            let label = dataset.label().to_string();
            let mut has_part = Vec::new();
            for (suffix, title, location) in [
                ("staging", "Staging", dataset.staging_path.as_deref()),
                ("publish", "Publish", dataset.publish_path.as_deref()),
            ] {
                let Some(location) = location else { continue };
                let part_id = format!("{label}-{suffix}");
                let mut part = entity(&part_id, "Dataset");
                part.insert("name".into(), json!(format!("{label} ({title})")));
                part.insert("url".into(), json!(location));
                insert_opt(&mut part, "encodingFormat", encoding);
                graph.add(Value::Object(part));
                has_part.push(json!({"@id": part_id}));
            }

            let mut ds = entity(&label, "Dataset");
            ds.insert("name".into(), json!(label));
            insert_opt(&mut ds, "description", dataset.description.as_deref());
            ds.insert("hasPart".into(), Value::Array(has_part));
            graph.add(Value::Object(ds));
        }

        graph.attach_parts("./", &parts);
        Ok(())
    }
}

impl ProvenanceWriter for CrateBuilder {
    fn document_path(&self) -> PathBuf {
        paths::crate_metadata_path(&self.bagit_dir)
    }

    fn rebuild(&self, store: &ProjectStore) -> Result<PathBuf> {
        let doc = self.render(store)?;
        let path = self.document_path();
        crate::io::write_json(&path, &doc)?;
        tracing::info!(path = %path.display(), "rebuilt provenance document");
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

fn describe_people(graph: &mut Graph, gov: &Governance) {
    let id = &gov.project.id;
    if let Some(agent) = &gov.requesting_agent {
        let person_id = format!("requesting-agent-{id}");
        let mut person = entity(&person_id, "Person");
        person.insert("name".into(), json!(agent.name));
        if let Some(org) = &agent.affiliation {
            let org_id = format!("requesting-agent-org-{id}");
            person.insert("affiliation".into(), json!({"@id": org_id}));
            let mut entity_org = entity(&org_id, "Organization");
            entity_org.insert("name".into(), json!(org.name));
            insert_opt(&mut entity_org, "url", org.url.as_deref());
            graph.add(Value::Object(entity_org));
        }
        graph.add(Value::Object(person));
    }
    if let Some(repo) = &gov.repository {
        let mut code = entity(&repo_id(id), "SoftwareSourceCode");
        code.insert("name".into(), json!(repo.name));
        insert_opt(&mut code, "description", repo.description.as_deref());
        code.insert("codeRepository".into(), json!(repo.code_repository));
        graph.add(Value::Object(code));
    }
}

fn describe_action(graph: &mut Graph, action: &ActionRecord) {
    let mut e = entity(action.id(), action.action_type().as_str());
    e.insert("name".into(), json!(action.name()));
    e.insert("startTime".into(), json!(action.start_time().to_rfc3339()));
    e.insert("endTime".into(), json!(action.end_time().to_rfc3339()));
    e.insert("actionStatus".into(), json!({"@id": status_iri(action.action_status())}));
    e.insert("agent".into(), json!(action.agent()));
    insert_opt(&mut e, "instrument", action.instrument());
    insert_opt(&mut e, "error", action.error());
    insert_opt(&mut e, "additionalType", action.additional_type());
    if !action.result().is_empty() {
        let refs: Vec<Value> = action.result().iter().map(|r| json!({"@id": r.id})).collect();
        e.insert("result".into(), Value::Array(refs));
    }
    graph.add(Value::Object(e));

    for r in action.result().iter().filter(|r| !r.properties.is_empty()) {
        let mut ctx = Map::new();
        ctx.insert("@id".into(), json!(r.id));
        ctx.insert("@type".into(), json!("Thing"));
        ctx.extend(r.properties.clone());
        graph.add(Value::Object(ctx));
    }
}

fn status_iri(status: ActionStatus) -> String {
    format!("{SCHEMA_NS}{}", status.as_str())
}

fn repo_id(project_id: &str) -> String {
    format!("repo-{project_id}")
}

fn entity(id: &str, ty: &str) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("@id".into(), json!(id));
    m.insert("@type".into(), json!(ty));
    m
}

fn insert_opt(m: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(v) = value {
        m.insert(key.to_string(), json!(v));
    }
}

/// Entity list keyed by `@id`. Adding an id twice merges the properties,
/// later values winning.
#[derive(Default)]
struct Graph {
    entities: Vec<Map<String, Value>>,
}

impl Graph {
    fn add(&mut self, entity: Value) {
        let Value::Object(entity) = entity else { return };
        let id = entity.get("@id").cloned();
        match self.entities.iter_mut().find(|e| e.get("@id") == id.as_ref()) {
            Some(existing) => existing.extend(entity),
            None => self.entities.push(entity),
        }
    }

    fn attach_parts(&mut self, id: &str, parts: &[String]) {
        let target = Some(json!(id));
        if let Some(e) = self.entities.iter_mut().find(|e| e.get("@id") == target.as_ref()) {
            let refs: Vec<Value> = parts.iter().map(|p| json!({"@id": p})).collect();
            e.insert("hasPart".into(), Value::Array(refs));
        }
    }

    fn into_entities(self) -> Vec<Value> {
        self.entities.into_iter().map(Value::Object).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
