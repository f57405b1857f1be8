//! Basic graph pattern matching over an in-memory triple set.
//!
//! Patterns are evaluated left to right; each solution of one pattern is
//! substituted into the next. A pattern whose subject is bound is answered
//! from the subject index, so queries anchored on a known entity id never
//! scan the whole graph.

use super::term::{Term, Triple};
use std::collections::{BTreeMap, HashMap};

pub type Bindings = BTreeMap<String, Term>;

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternTerm {
    Var(String),
    Const(Term),
}

impl PatternTerm {
    pub fn var(name: &str) -> Self {
        PatternTerm::Var(name.to_string())
    }

    fn resolve<'a>(&'a self, bindings: &'a Bindings) -> Option<&'a Term> {
        match self {
            PatternTerm::Const(t) => Some(t),
            PatternTerm::Var(v) => bindings.get(v),
        }
    }
}

impl From<Term> for PatternTerm {
    fn from(t: Term) -> Self {
        PatternTerm::Const(t)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriplePattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

/// Restriction on the value a variable may bind to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    OneOf(Vec<Term>),
}

impl Filter {
    fn accepts(&self, term: &Term) -> bool {
        match self {
            Filter::OneOf(allowed) => allowed.contains(term),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    patterns: Vec<TriplePattern>,
    filters: Vec<(String, Filter)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pattern(
        mut self,
        subject: impl Into<PatternTerm>,
        predicate: impl Into<PatternTerm>,
        object: impl Into<PatternTerm>,
    ) -> Self {
        self.patterns.push(TriplePattern {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        });
        self
    }

    pub fn filter(mut self, var: &str, filter: Filter) -> Self {
        self.filters.push((var.to_string(), filter));
        self
    }

    fn passes(&self, bindings: &Bindings) -> bool {
        self.filters.iter().all(|(var, f)| match bindings.get(var) {
            Some(term) => f.accepts(term),
            None => true,
        })
    }
}

// ---------------------------------------------------------------------------
// TripleStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct TripleStore {
    triples: Vec<Triple>,
    by_subject: HashMap<Term, Vec<usize>>,
}

impl TripleStore {
    pub fn new(triples: Vec<Triple>) -> Self {
        let mut by_subject: HashMap<Term, Vec<usize>> = HashMap::new();
        for (i, t) in triples.iter().enumerate() {
            by_subject.entry(t.subject.clone()).or_default().push(i);
        }
        Self {
            triples,
            by_subject,
        }
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// True iff the query has at least one solution.
    pub fn ask(&self, query: &Query) -> bool {
        let mut found = false;
        self.solve(query, 0, Bindings::new(), &mut |_| {
            found = true;
            false
        });
        found
    }

    pub fn select(&self, query: &Query) -> Vec<Bindings> {
        let mut out = Vec::new();
        self.solve(query, 0, Bindings::new(), &mut |b| {
            out.push(b);
            true
        });
        out
    }

    /// Depth-first evaluation. `emit` returns false to stop the search.
    fn solve(
        &self,
        query: &Query,
        depth: usize,
        bindings: Bindings,
        emit: &mut dyn FnMut(Bindings) -> bool,
    ) -> bool {
        let Some(pattern) = query.patterns.get(depth) else {
            return emit(bindings);
        };

        for triple in self.candidates(pattern, &bindings) {
            let Some(next) = unify(pattern, triple, &bindings) else {
                continue;
            };
            if !query.passes(&next) {
                continue;
            }
            if !self.solve(query, depth + 1, next, emit) {
                return false;
            }
        }
        true
    }

    fn candidates<'a>(
        &'a self,
        pattern: &TriplePattern,
        bindings: &Bindings,
    ) -> Box<dyn Iterator<Item = &'a Triple> + 'a> {
        match pattern.subject.resolve(bindings) {
            Some(subject) => {
                let indices = self.by_subject.get(subject).map(Vec::as_slice).unwrap_or(&[]);
                Box::new(indices.iter().map(move |&i| &self.triples[i]))
            }
            None => Box::new(self.triples.iter()),
        }
    }
}

fn unify(pattern: &TriplePattern, triple: &Triple, bindings: &Bindings) -> Option<Bindings> {
    let mut next = bindings.clone();
    for (p, t) in [
        (&pattern.subject, &triple.subject),
        (&pattern.predicate, &triple.predicate),
        (&pattern.object, &triple.object),
    ] {
        match p {
            PatternTerm::Const(c) => {
                if c != t {
                    return None;
                }
            }
            PatternTerm::Var(v) => match next.get(v) {
                Some(bound) if bound != t => return None,
                Some(_) => {}
                None => {
                    next.insert(v.clone(), t.clone());
                }
            },
        }
    }
    Some(next)
}
