use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde_json::{Map, Number, Value};

/// Variable token recognized inside string fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Timestamp,
    Counter,
    RandomInt { min: i64, max: i64 },
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Token(Token),
}

#[derive(Debug, Clone)]
enum Node {
    /// Pass-through scalar: numbers, bools, null, token-free strings.
    Scalar(Value),
    /// A string that is exactly one token: expands to the token's native
    /// type instead of text.
    Single(Token),
    /// A string mixing tokens with literal text: expands to text.
    Text(Vec<Segment>),
    Object(Vec<(String, Node)>),
    Array(Vec<Node>),
    /// A field whose token syntax did not parse. The result is cached so
    /// expansion fails the affected request without re-scanning.
    Invalid { path: String, detail: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid template token at `{path}`: {detail}")]
pub struct TemplateError {
    pub path: String,
    pub detail: String,
}

/// A tool-argument tree scanned once per run and evaluated per request.
/// Safe to share across workers: evaluation only reads.
#[derive(Debug, Clone)]
pub struct Template {
    root: Node,
}

impl Template {
    #[must_use]
    pub fn parse(args: &Value) -> Self {
        Self {
            root: parse_node(args, "$"),
        }
    }

    /// Expands the tree for one request. `sequence` feeds `{{counter}}`.
    pub fn expand<R: Rng>(&self, sequence: u64, rng: &mut R) -> Result<Value, TemplateError> {
        expand_node(&self.root, sequence, rng)
    }
}

fn parse_node(value: &Value, path: &str) -> Node {
    match value {
        Value::Object(map) => Node::Object(
            map.iter()
                .map(|(key, child)| {
                    let child_path = format!("{path}.{key}");
                    (key.clone(), parse_node(child, &child_path))
                })
                .collect(),
        ),
        Value::Array(items) => Node::Array(
            items
                .iter()
                .enumerate()
                .map(|(index, child)| {
                    let child_path = format!("{path}[{index}]");
                    parse_node(child, &child_path)
                })
                .collect(),
        ),
        Value::String(text) => parse_string(text, path),
        other => Node::Scalar(other.clone()),
    }
}

fn parse_string(text: &str, path: &str) -> Node {
    let mut segments = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("{{") {
        let Some(close) = rest[open + 2..].find("}}").map(|i| open + 2 + i) else {
            // No closing braces: the remainder stays literal.
            break;
        };

        if open > 0 {
            segments.push(Segment::Literal(rest[..open].to_string()));
        }
        match parse_token(&rest[open + 2..close]) {
            Ok(token) => segments.push(Segment::Token(token)),
            Err(detail) => {
                return Node::Invalid {
                    path: path.to_string(),
                    detail,
                };
            }
        }
        rest = &rest[close + 2..];
    }

    if segments.is_empty() {
        return Node::Scalar(Value::String(text.to_string()));
    }
    if rest.is_empty()
        && segments.len() == 1
        && let Some(Segment::Token(token)) = segments.first()
    {
        return Node::Single(*token);
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_string()));
    }
    Node::Text(segments)
}

fn parse_token(raw: &str) -> Result<Token, String> {
    let name = raw.trim();

    if name == "timestamp" {
        return Ok(Token::Timestamp);
    }
    if name == "counter" {
        return Ok(Token::Counter);
    }
    if let Some(args) = name
        .strip_prefix("random.randint(")
        .and_then(|s| s.strip_suffix(')'))
    {
        let Some((min, max)) = args.split_once(',') else {
            return Err(format!(
                "expected `random.randint(min,max)`, got `{{{{{name}}}}}`"
            ));
        };
        let min: i64 = min
            .trim()
            .parse()
            .map_err(|_| format!("invalid lower bound `{}`", min.trim()))?;
        let max: i64 = max
            .trim()
            .parse()
            .map_err(|_| format!("invalid upper bound `{}`", max.trim()))?;
        if min > max {
            return Err(format!("empty range {min}..={max}"));
        }
        return Ok(Token::RandomInt { min, max });
    }

    Err(format!("unknown variable `{{{{{name}}}}}`"))
}

fn expand_node<R: Rng>(node: &Node, sequence: u64, rng: &mut R) -> Result<Value, TemplateError> {
    match node {
        Node::Scalar(value) => Ok(value.clone()),
        Node::Single(token) => Ok(eval_token(*token, sequence, rng)),
        Node::Text(segments) => {
            let mut out = String::new();
            for segment in segments {
                match segment {
                    Segment::Literal(text) => out.push_str(text),
                    Segment::Token(token) => {
                        render_scalar(&mut out, &eval_token(*token, sequence, rng));
                    }
                }
            }
            Ok(Value::String(out))
        }
        Node::Object(fields) => {
            let mut map = Map::with_capacity(fields.len());
            for (key, child) in fields {
                map.insert(key.clone(), expand_node(child, sequence, rng)?);
            }
            Ok(Value::Object(map))
        }
        Node::Array(items) => items
            .iter()
            .map(|child| expand_node(child, sequence, rng))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Node::Invalid { path, detail } => Err(TemplateError {
            path: path.clone(),
            detail: detail.clone(),
        }),
    }
}

fn eval_token<R: Rng>(token: Token, sequence: u64, rng: &mut R) -> Value {
    match token {
        Token::Timestamp => {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs_f64();
            Number::from_f64(now).map_or(Value::Null, Value::Number)
        }
        Token::Counter => Value::from(sequence),
        Token::RandomInt { min, max } => Value::from(rng.random_range(min..=max)),
    }
}

fn render_scalar(out: &mut String, value: &Value) {
    match value {
        Value::String(text) => out.push_str(text),
        other => {
            let _ = write!(out, "{other}");
        }
    }
}
