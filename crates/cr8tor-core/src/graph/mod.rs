//! Provenance graph: the RO-Crate metadata document loaded as triples, and
//! the completion queries that gate each lifecycle command.

pub mod jsonld;
pub mod query;
pub mod term;

use crate::error::{Cr8torError, Result};
use crate::types::{composite_id, ActionStatus, ActionType, CommandType};
use query::{Filter, PatternTerm, Query, TripleStore};
use std::path::Path;
use term::{Term, DEFAULT_BASE, RDF_TYPE};

#[derive(Debug)]
pub struct ProvenanceGraph {
    store: TripleStore,
    base: String,
}

impl ProvenanceGraph {
    /// Load a provenance document, resolving relative ids against the
    /// default crate base.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_base(path, DEFAULT_BASE)
    }

    pub fn load_with_base(path: &Path, base: &str) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            Cr8torError::GraphLoad(format!("{}: {e}", path.display()))
        })?;
        let doc: serde_json::Value = serde_json::from_str(&data).map_err(|e| {
            Cr8torError::GraphLoad(format!("{}: {e}", path.display()))
        })?;
        Self::from_json(&doc, base)
    }

    pub fn from_json(doc: &serde_json::Value, base: &str) -> Result<Self> {
        let triples = jsonld::to_triples(doc, base)?;
        tracing::debug!(triples = triples.len(), "loaded provenance graph");
        Ok(Self {
            store: TripleStore::new(triples),
            base: base.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn store(&self) -> &TripleStore {
        &self.store
    }

    /// IRI of the action entity `{command}-{project_id}`.
    pub fn action_iri(&self, command: CommandType, project_id: &str) -> Term {
        Term::Iri(term::resolve(&self.base, &composite_id(command, project_id)))
    }

    /// True iff the entity `{command}-{project_id}` has type `action_type`
    /// and a Completed status.
    pub fn is_project_action_complete(
        &self,
        command: CommandType,
        action_type: ActionType,
        project_id: &str,
    ) -> bool {
        let action = self.action_iri(command, project_id);
        let q = Query::new()
            .pattern(
                action.clone(),
                Term::iri(RDF_TYPE),
                Term::Iri(term::schema(action_type.as_str())),
            )
            .pattern(action, Term::Iri(term::schema("actionStatus")), PatternTerm::var("status"))
            .filter("status", Filter::OneOf(status_terms(ActionStatus::Completed)));
        self.store.ask(&q)
    }

    /// Recorded status of `{command}-{project_id}`, if any.
    pub fn action_status_of(&self, command: CommandType, project_id: &str) -> Option<ActionStatus> {
        let q = Query::new().pattern(
            self.action_iri(command, project_id),
            Term::Iri(term::schema("actionStatus")),
            PatternTerm::var("status"),
        );
        self.store
            .select(&q)
            .into_iter()
            .filter_map(|row| row.get("status").and_then(status_from_term))
            .next()
    }
}

/// Fail-closed completion check against the document at `path`. Any load
/// failure counts as "not complete".
pub fn is_action_complete_at(
    path: &Path,
    base: &str,
    command: CommandType,
    action_type: ActionType,
    project_id: &str,
) -> bool {
    match ProvenanceGraph::load_with_base(path, base) {
        Ok(graph) => graph.is_project_action_complete(command, action_type, project_id),
        Err(e) => {
            tracing::info!(error = %e, command = %command, "provenance graph unavailable; treating prerequisite as not met");
            false
        }
    }
}

/// Both encodings of a status: the schema.org IRI and the bare literal.
fn status_terms(status: ActionStatus) -> Vec<Term> {
    vec![
        Term::Iri(term::schema(status.as_str())),
        Term::literal(status.as_str()),
    ]
}

fn status_from_term(t: &Term) -> Option<ActionStatus> {
    let raw = match t {
        Term::Iri(iri) => iri.strip_prefix(term::SCHEMA_NS)?,
        Term::Literal(s) => s.strip_prefix("schema:").unwrap_or(s),
        Term::Blank(_) => return None,
    };
    raw.parse().ok()
}
