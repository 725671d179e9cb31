//! Listener filter language.
//!
//! A filter is a `&`-separated list of clauses that must all hold:
//!
//! ```text
//! eventType=ResourceCreated,ResourceDeleted&event.digitalIdentity.status!=archived
//! ```
//!
//! - `path=a,b` holds when the value at `path` equals `a` or `b`.
//! - `path!=a,b` holds when the value at `path` equals neither.
//!
//! `path` is a dot-separated path into the event wire document. An array
//! met along the path matches if any of its elements does. A missing path
//! equals nothing, so `!=` clauses hold for it. Scalars compare by their
//! string form (`true`, `42`, `null`).

use serde_json::Value;

/// Why a filter string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("clause '{0}' has no '=' or '!=' operator")]
    MissingOperator(String),

    #[error("clause '{0}' has an empty path")]
    EmptyPath(String),

    #[error("clause '{0}' has no values")]
    EmptyValues(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    NotEq,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Clause {
    path: Vec<String>,
    op: Op,
    values: Vec<String>,
}

/// A compiled listener filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    clauses: Vec<Clause>,
}

impl EventFilter {
    /// Compile a filter string.
    ///
    /// Returns `Ok(None)` for an empty or all-whitespace string, which
    /// means "match every event".
    pub fn parse(query: &str) -> Result<Option<Self>, FilterError> {
        let clauses = query
            .split('&')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(parse_clause)
            .collect::<Result<Vec<_>, _>>()?;

        if clauses.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Self { clauses }))
        }
    }

    /// Evaluate against an event's wire document. Pure; no shared state.
    pub fn matches(&self, document: &Value) -> bool {
        self.clauses.iter().all(|clause| {
            let mut found = Vec::new();
            collect(document, &clause.path, &mut found);
            let hit = found
                .iter()
                .filter_map(|v| scalar_text(v))
                .any(|text| clause.values.iter().any(|want| *want == text));
            match clause.op {
                Op::Eq => hit,
                Op::NotEq => !hit,
            }
        })
    }
}

fn parse_clause(raw: &str) -> Result<Clause, FilterError> {
    // The first `=` decides the operator; values may contain `=` or `!=`.
    let Some((head, values)) = raw.split_once('=') else {
        return Err(FilterError::MissingOperator(raw.to_string()));
    };
    let (path, op) = match head.strip_suffix('!') {
        Some(path) => (path, Op::NotEq),
        None => (head, Op::Eq),
    };

    let path: Vec<String> = path
        .trim()
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if path.is_empty() {
        return Err(FilterError::EmptyPath(raw.to_string()));
    }

    let values: Vec<String> = values
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if values.is_empty() {
        return Err(FilterError::EmptyValues(raw.to_string()));
    }

    Ok(Clause { path, op, values })
}

/// Gather every value reachable at `path`, flattening arrays on the way.
fn collect<'a>(value: &'a Value, path: &[String], out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect(item, path, out);
            }
        }
        _ => match path.split_first() {
            None => out.push(value),
            Some((head, rest)) => {
                if let Some(next) = value.get(head.as_str()) {
                    collect(next, rest, out);
                }
            }
        },
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some("null".to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
