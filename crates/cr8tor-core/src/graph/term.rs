use reqwest::Url;
use std::fmt;

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const SCHEMA_NS: &str = "http://schema.org/";
const SCHEMA_NS_HTTPS: &str = "https://schema.org/";

/// Base that relative `@id`s resolve against when the document gives none.
pub const DEFAULT_BASE: &str = "https://lscsde.org/crate/";

/// Full IRI of a schema.org term.
pub fn schema(local: &str) -> String {
    format!("{SCHEMA_NS}{local}")
}

/// An RDF term. Predicates are always `Iri`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    Iri(String),
    Literal(String),
    Blank(String),
}

impl Term {
    pub fn iri(s: impl Into<String>) -> Self {
        Term::Iri(s.into())
    }

    pub fn literal(s: impl Into<String>) -> Self {
        Term::Literal(s.into())
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(s) => Some(s),
            _ => None,
        }
    }

    /// Lexical value: the IRI, the literal text or the blank label.
    pub fn value(&self) -> &str {
        match self {
            Term::Iri(s) | Term::Literal(s) | Term::Blank(s) => s,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(s) => write!(f, "<{s}>"),
            Term::Literal(s) => write!(f, "\"{s}\""),
            Term::Blank(s) => write!(f, "_:{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

// ---------------------------------------------------------------------------
// IRI resolution
// ---------------------------------------------------------------------------

/// True when `s` starts with a URI scheme (`http:`, `urn:`, `mailto:` ...).
pub fn has_scheme(s: &str) -> bool {
    let Some((scheme, _)) = s.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Resolve a document-relative id against `base`. Absolute IRIs are only
/// normalised.
pub fn resolve(base: &str, id: &str) -> String {
    if has_scheme(id) {
        return normalize(id);
    }
    match Url::parse(base).and_then(|b| b.join(id)) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{base}{}", id.trim_start_matches("./")),
    }
}

/// Fold `https://schema.org/` onto the `http` namespace RO-Crate uses.
pub fn normalize(iri: &str) -> String {
    match iri.strip_prefix(SCHEMA_NS_HTTPS) {
        Some(local) => schema(local),
        None => iri.to_string(),
    }
}
