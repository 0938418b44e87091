//! Query and stream filter strings
//!
//! A query is either `*` (match everything) or whitespace separated
//! `field:value` terms that must all match. Values may contain `*` and `?`
//! wildcards and may be double-quoted to include spaces. `streams:<id>`
//! matches messages routed into a stream and `_exists_:<field>` matches
//! messages carrying a field.

use super::SearchError;
use crate::data::{Message, Value};

const STREAMS_FIELD: &str = "streams";
const EXISTS_FIELD: &str = "_exists_";
const ID_FIELD: &str = "_id";

#[derive(Debug, Clone)]
enum Pattern {
    Exact(String),
    Wildcard(regex::Regex),
}

impl Pattern {
    fn parse(raw: &str) -> Result<Self, SearchError> {
        if !raw.contains(['*', '?']) {
            return Ok(Pattern::Exact(raw.to_string()));
        }
        let pattern = regex::escape(raw).replace(r"\*", ".*").replace(r"\?", ".");
        regex::Regex::new(&format!("^{}$", pattern))
            .map(Pattern::Wildcard)
            .map_err(|e| SearchError::InvalidQuery(format!("bad wildcard '{}': {}", raw, e)))
    }

    fn is_match(&self, s: &str) -> bool {
        match self {
            Pattern::Exact(expected) => expected == s,
            Pattern::Wildcard(re) => re.is_match(s),
        }
    }
}

#[derive(Debug, Clone)]
enum Term {
    Stream(Pattern),
    Exists(String),
    Id(Pattern),
    Field { field: String, pattern: Pattern },
}

impl Term {
    fn matches(&self, message: &Message) -> bool {
        match self {
            Term::Stream(pattern) => message.streams.iter().any(|s| pattern.is_match(s)),
            Term::Exists(field) => message.field(field).is_some_and(|v| !v.is_null()),
            Term::Id(pattern) => pattern.is_match(&message.id),
            Term::Field { field, pattern } => match message.field(field) {
                Some(Value::Null) | None => false,
                Some(value) => pattern.is_match(&value.to_string()),
            },
        }
    }
}

/// Parsed conjunction of query terms
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    terms: Vec<Term>,
}

impl QueryFilter {
    /// Filter matching every message
    pub fn match_all() -> Self {
        Self::default()
    }

    pub fn parse(query: &str) -> Result<Self, SearchError> {
        let query = query.trim();
        if query.is_empty() || query == "*" {
            return Ok(Self::match_all());
        }

        let terms = tokenize(query)?
            .into_iter()
            .map(|token| parse_term(&token))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { terms })
    }

    /// Parse a query and an optional stream filter into one conjunction
    pub fn combined(query: &str, filter: Option<&str>) -> Result<Self, SearchError> {
        let mut combined = Self::parse(query)?;
        if let Some(filter) = filter {
            combined.terms.extend(Self::parse(filter)?.terms);
        }
        Ok(combined)
    }

    pub fn matches(&self, message: &Message) -> bool {
        self.terms.iter().all(|t| t.matches(message))
    }

    pub fn is_match_all(&self) -> bool {
        self.terms.is_empty()
    }
}

fn parse_term(token: &str) -> Result<Term, SearchError> {
    let (field, value) = token
        .split_once(':')
        .ok_or_else(|| SearchError::InvalidQuery(format!("expected field:value, got '{}'", token)))?;

    if field.is_empty() || value.is_empty() {
        return Err(SearchError::InvalidQuery(format!(
            "expected field:value, got '{}'",
            token
        )));
    }

    let value = value.trim_matches('"');
    Ok(match field {
        STREAMS_FIELD => Term::Stream(Pattern::parse(value)?),
        EXISTS_FIELD => Term::Exists(value.to_string()),
        ID_FIELD => Term::Id(Pattern::parse(value)?),
        _ => Term::Field {
            field: field.to_string(),
            pattern: Pattern::parse(value)?,
        },
    })
}

/// Split on whitespace, keeping double-quoted sections together
fn tokenize(query: &str) -> Result<Vec<String>, SearchError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in query.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if quoted {
        return Err(SearchError::InvalidQuery(format!(
            "unterminated quote in '{}'",
            query
        )));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}
