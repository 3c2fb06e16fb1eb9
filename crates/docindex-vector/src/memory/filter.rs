//! Filter subset understood by the in-memory backend.
//!
//! Supported clauses, combined with `and` / `or` (`and` binds tighter):
//! - `field eq 'value'`, `field ne 'value'` (also numbers, booleans, null)
//! - `search.in(field, 'a,b,c')`, optionally with a delimiter argument
//!
//! Fields resolve against `id`, `text`, then top-level metadata keys.

use serde_json::Value;

use crate::backend::SearchDocument;

/// Parsed filter: a disjunction of conjunctions.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    any_of: Vec<Vec<Clause>>,
}

#[derive(Debug, Clone, PartialEq)]
enum Clause {
    Eq(String, Value),
    Ne(String, Value),
    In(String, Vec<String>),
}

impl Filter {
    pub fn parse(input: &str) -> Result<Self, String> {
        let any_of = split_top_level(input.trim(), "or")
            .into_iter()
            .map(|group| {
                split_top_level(group, "and")
                    .into_iter()
                    .map(parse_clause)
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { any_of })
    }

    pub fn matches(&self, doc: &SearchDocument) -> bool {
        let metadata: Option<serde_json::Map<String, Value>> = doc
            .metadata
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());

        let lookup = |field: &str| -> Value {
            match field {
                "id" => Value::String(doc.id.clone()),
                "text" => doc.text.clone().map(Value::String).unwrap_or(Value::Null),
                other => metadata
                    .as_ref()
                    .and_then(|m| m.get(other).cloned())
                    .unwrap_or(Value::Null),
            }
        };

        self.any_of.iter().any(|all_of| {
            all_of.iter().all(|clause| match clause {
                Clause::Eq(field, value) => values_equal(&lookup(field), value),
                Clause::Ne(field, value) => !values_equal(&lookup(field), value),
                Clause::In(field, options) => match lookup(field) {
                    Value::String(s) => options.iter().any(|o| *o == s),
                    _ => false,
                },
            })
        })
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

/// Split on a keyword surrounded by spaces, outside quotes and parentheses.
fn split_top_level<'a>(input: &'a str, keyword: &str) -> Vec<&'a str> {
    let needle = format!(" {} ", keyword);
    let bytes = input.as_bytes();
    let mut parts = Vec::new();
    let mut in_quote = false;
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_quote = !in_quote,
            b'(' if !in_quote => depth += 1,
            b')' if !in_quote => depth = depth.saturating_sub(1),
            b' ' if !in_quote && depth == 0 => {
                let rest = &input[i..];
                if rest.len() >= needle.len()
                    && rest.is_char_boundary(needle.len())
                    && rest[..needle.len()].eq_ignore_ascii_case(&needle)
                {
                    parts.push(input[start..i].trim());
                    i += needle.len();
                    start = i;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(input[start..].trim());
    parts
}

fn parse_clause(clause: &str) -> Result<Clause, String> {
    let clause = clause.trim();
    if clause.is_empty() {
        return Err("empty filter clause".to_string());
    }

    if let Some(args) = clause
        .strip_prefix("search.in(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let args = split_args(args);
        if args.len() < 2 || args.len() > 3 {
            return Err(format!("search.in expects 2 or 3 arguments: {}", clause));
        }
        let field = args[0].to_string();
        let list = parse_string(args[1])?;
        let options = match args.get(2) {
            Some(delimiters) => {
                let delimiters = parse_string(delimiters)?;
                list.split(|c: char| delimiters.contains(c))
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            None => list
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        };
        return Ok(Clause::In(field, options));
    }

    let (field, rest) = clause
        .split_once(' ')
        .ok_or_else(|| format!("invalid filter clause: {}", clause))?;
    let (op, literal) = rest
        .trim_start()
        .split_once(' ')
        .ok_or_else(|| format!("invalid filter clause: {}", clause))?;
    let value = parse_literal(literal.trim())?;

    match op.to_ascii_lowercase().as_str() {
        "eq" => Ok(Clause::Eq(field.to_string(), value)),
        "ne" => Ok(Clause::Ne(field.to_string(), value)),
        other => Err(format!("unsupported operator: {}", other)),
    }
}

/// Split function arguments on commas outside quotes.
fn split_args(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quote = false;
    let mut start = 0;
    for (i, c) in args.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            ',' if !in_quote => {
                parts.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(args[start..].trim());
    parts
}

fn parse_string(literal: &str) -> Result<String, String> {
    literal
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .map(|s| s.replace("''", "'"))
        .ok_or_else(|| format!("expected quoted string: {}", literal))
}

fn parse_literal(literal: &str) -> Result<Value, String> {
    if literal.starts_with('\'') {
        return parse_string(literal).map(Value::String);
    }
    match literal {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        "null" => Ok(Value::Null),
        number => serde_json::from_str::<serde_json::Number>(number)
            .map(Value::Number)
            .map_err(|_| format!("invalid literal: {}", number)),
    }
}
