//! JSON-LD to triples, covering the subset RO-Crate metadata documents use.
//!
//! Supported: `@graph` or a single top-level node; `@context` as a known
//! context URL, an inline object (`@vocab`, prefixes, term definitions) or an
//! array of both; node references, value objects, `@list`/`@set`, arrays and
//! nested anonymous nodes. Remote contexts are never fetched; an unknown one
//! is a load error.

use super::term::{self, Term, Triple, RDF_TYPE, SCHEMA_NS};
use crate::error::{Cr8torError, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;

const RO_CRATE_CONTEXT_PREFIX: &str = "https://w3id.org/ro/crate/";

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct TermDef {
    iri: String,
    /// `"@type": "@id"`: string values are references, not literals.
    id_valued: bool,
}

#[derive(Debug, Clone, Default)]
struct Context {
    vocab: Option<String>,
    terms: HashMap<String, TermDef>,
}

impl Context {
    fn apply(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => {
                *self = Context::default();
                Ok(())
            }
            Value::String(url) => self.apply_remote(url),
            Value::Array(items) => items.iter().try_for_each(|v| self.apply(v)),
            Value::Object(map) => self.apply_inline(map),
            other => Err(load_err(format!("invalid @context: {other}"))),
        }
    }

    fn apply_remote(&mut self, url: &str) -> Result<()> {
        let known = url.starts_with(RO_CRATE_CONTEXT_PREFIX)
            || url.trim_end_matches('/') == "http://schema.org"
            || url.trim_end_matches('/') == "https://schema.org";
        if !known {
            return Err(load_err(format!("unsupported remote @context '{url}'")));
        }
        self.vocab = Some(SCHEMA_NS.to_string());
        if url.starts_with(RO_CRATE_CONTEXT_PREFIX) {
            // RO-Crate's one non-schema.org-named alias.
            self.terms.insert(
                "File".to_string(),
                TermDef {
                    iri: term::schema("MediaObject"),
                    id_valued: false,
                },
            );
        }
        Ok(())
    }

    fn apply_inline(&mut self, map: &Map<String, Value>) -> Result<()> {
        if let Some(vocab) = map.get("@vocab") {
            self.vocab = vocab.as_str().map(term::normalize);
        }
        // Two passes so term definitions may use prefixes defined alongside them.
        for pass in 0..2 {
            for (key, def) in map {
                if key.starts_with('@') {
                    continue;
                }
                let (raw, id_valued) = match def {
                    Value::String(s) => (s.as_str(), false),
                    Value::Object(o) => {
                        let Some(id) = o.get("@id").and_then(Value::as_str) else {
                            continue;
                        };
                        let id_valued = o.get("@type").and_then(Value::as_str) == Some("@id");
                        (id, id_valued)
                    }
                    Value::Null => {
                        self.terms.remove(key);
                        continue;
                    }
                    other => {
                        return Err(load_err(format!(
                            "invalid definition for term '{key}': {other}"
                        )))
                    }
                };
                if pass == 1 || term::has_scheme(raw) {
                    let iri = self.expand_vocab(raw).unwrap_or_else(|| raw.to_string());
                    self.terms.insert(key.clone(), TermDef { iri, id_valued });
                }
            }
        }
        Ok(())
    }

    /// Expand a property name or type. `None` when it maps to no IRI.
    fn expand_vocab(&self, name: &str) -> Option<String> {
        if let Some(def) = self.terms.get(name) {
            return Some(def.iri.clone());
        }
        if let Some((prefix, suffix)) = name.split_once(':') {
            if let Some(def) = self.terms.get(prefix) {
                return Some(format!("{}{suffix}", def.iri));
            }
            if term::has_scheme(name) {
                return Some(term::normalize(name));
            }
        }
        self.vocab.as_ref().map(|v| format!("{v}{name}"))
    }

    fn is_id_valued(&self, property: &str) -> bool {
        self.terms.get(property).is_some_and(|d| d.id_valued)
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

struct Loader<'a> {
    base: &'a str,
    triples: Vec<Triple>,
    next_blank: usize,
}

/// Convert a JSON-LD document into triples. Relative `@id`s resolve against
/// `base`.
pub fn to_triples(doc: &Value, base: &str) -> Result<Vec<Triple>> {
    let root = doc
        .as_object()
        .ok_or_else(|| load_err("document root is not a JSON object"))?;

    let mut ctx = Context::default();
    if let Some(c) = root.get("@context") {
        ctx.apply(c)?;
    }

    let mut loader = Loader {
        base,
        triples: Vec::new(),
        next_blank: 0,
    };

    match root.get("@graph") {
        Some(Value::Array(nodes)) => {
            for node in nodes {
                let obj = node
                    .as_object()
                    .ok_or_else(|| load_err("@graph entries must be JSON objects"))?;
                loader.node(obj, &ctx)?;
            }
        }
        Some(Value::Object(node)) => {
            loader.node(node, &ctx)?;
        }
        Some(_) => return Err(load_err("@graph must be an array or an object")),
        None => {
            loader.node(root, &ctx)?;
        }
    }
    Ok(loader.triples)
}

impl Loader<'_> {
    fn node(&mut self, obj: &Map<String, Value>, outer: &Context) -> Result<Term> {
        let local;
        let ctx = match obj.get("@context") {
            Some(c) => {
                let mut scoped = outer.clone();
                scoped.apply(c)?;
                local = scoped;
                &local
            }
            None => outer,
        };

        let subject = match obj.get("@id") {
            Some(Value::String(id)) => self.reference(id),
            Some(other) => return Err(load_err(format!("@id must be a string, got {other}"))),
            None => self.blank(),
        };

        for (key, value) in obj {
            match key.as_str() {
                "@type" => {
                    for t in as_items(value) {
                        let name = t
                            .as_str()
                            .ok_or_else(|| load_err(format!("@type must be a string, got {t}")))?;
                        if let Some(iri) = ctx.expand_vocab(name) {
                            self.push(subject.clone(), Term::iri(RDF_TYPE), Term::Iri(iri));
                        }
                    }
                }
                k if k.starts_with('@') => {}
                property => {
                    let Some(predicate) = ctx.expand_vocab(property) else {
                        tracing::trace!(property, "dropping property with no IRI mapping");
                        continue;
                    };
                    let id_valued = ctx.is_id_valued(property);
                    for item in as_items(value) {
                        for object in self.value(item, id_valued, ctx)? {
                            self.push(subject.clone(), Term::Iri(predicate.clone()), object);
                        }
                    }
                }
            }
        }
        Ok(subject)
    }

    /// Objects for one property value; a `@list` or `@set` yields one per item.
    fn value(&mut self, v: &Value, id_valued: bool, ctx: &Context) -> Result<Vec<Term>> {
        let term = match v {
            Value::Null => return Ok(Vec::new()),
            Value::String(s) if id_valued => self.reference(s),
            Value::String(s) => Term::Literal(s.clone()),
            Value::Number(n) => Term::Literal(n.to_string()),
            Value::Bool(b) => Term::Literal(b.to_string()),
            Value::Object(o) => {
                if let Some(lit) = o.get("@value") {
                    return Ok(match lit {
                        Value::Null => Vec::new(),
                        Value::String(s) => vec![Term::Literal(s.clone())],
                        other => vec![Term::Literal(other.to_string())],
                    });
                }
                if let Some(list) = o.get("@list").or_else(|| o.get("@set")) {
                    // Order is not kept; every member becomes its own triple.
                    let mut members = Vec::new();
                    for item in as_items(list) {
                        members.extend(self.value(item, id_valued, ctx)?);
                    }
                    return Ok(members);
                }
                let is_reference = o.len() == 1 && o.contains_key("@id");
                if is_reference {
                    match o.get("@id") {
                        Some(Value::String(id)) => self.reference(id),
                        _ => return Err(load_err("@id must be a string")),
                    }
                } else {
                    self.node(o, ctx)?
                }
            }
            Value::Array(_) => return Err(load_err("nested arrays are not valid JSON-LD")),
        };
        Ok(vec![term])
    }

    fn reference(&mut self, id: &str) -> Term {
        match id.strip_prefix("_:") {
            Some(label) => Term::Blank(label.to_string()),
            None => Term::Iri(term::resolve(self.base, id)),
        }
    }

    fn blank(&mut self) -> Term {
        self.next_blank += 1;
        Term::Blank(format!("b{}", self.next_blank))
    }

    fn push(&mut self, subject: Term, predicate: Term, object: Term) {
        self.triples.push(Triple {
            subject,
            predicate,
            object,
        });
    }
}

fn as_items(v: &Value) -> Vec<&Value> {
    match v {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn load_err(msg: impl Into<String>) -> Cr8torError {
    Cr8torError::GraphLoad(msg.into())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
