//! Schema validation of decoded response bodies.
//!
//! Schemas are opaque capabilities: anything implementing [`Schema`] can check a
//! decoded JSON value and either hand back the (possibly transformed) value or a list
//! of [`Issue`]s. Two adapters are provided: [`SerdeSchema`], which validates by
//! deserializing into a Rust type, and [`FnSchema`] for closures.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

/// One segment of the location of an [`Issue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// An object key.
    Key(String),
    /// An array index.
    Index(usize),
    /// A symbol-like key (enum variants for serde-backed schemas).
    Symbol(String),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    pub message: String,
}

impl Issue {
    /// Creates an issue at the root of the value.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            path: None,
            message: message.into(),
        }
    }

    /// Creates an issue at the given location.
    pub fn at(path: Vec<PathSegment>, message: impl Into<String>) -> Self {
        Self {
            path: Some(path),
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in self.path.iter().flatten() {
            match segment {
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
                PathSegment::Symbol(name) => write!(f, "[symbol:{name}]")?,
            }
        }
        write!(f, ": {}", self.message)
    }
}

/// What a schema returns for one input.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaOutcome {
    /// The input is valid; carries the validated (possibly transformed) value.
    Valid(Value),
    /// The input is invalid.
    Invalid(Vec<Issue>),
    /// The schema could only answer asynchronously.
    Pending,
}

/// A synchronous validation capability.
///
/// # Examples
///
/// ```
/// use serde_json::{json, Value};
/// use typed_fetch::validation::{Issue, Schema, SchemaOutcome};
///
/// struct NonEmptyArray;
///
/// impl Schema for NonEmptyArray {
///     fn validate(&self, input: &Value) -> SchemaOutcome {
///         match input.as_array() {
///             Some(items) if !items.is_empty() => SchemaOutcome::Valid(input.clone()),
///             _ => SchemaOutcome::Invalid(vec![Issue::new("expected a non-empty array")]),
///         }
///     }
/// }
///
/// assert!(matches!(NonEmptyArray.validate(&json!([1])), SchemaOutcome::Valid(_)));
/// ```
pub trait Schema: Send + Sync {
    /// Validates `input`.
    fn validate(&self, input: &Value) -> SchemaOutcome;
}

/// Runs `schema` against `input`, normalizing the outcome.
///
/// A [`SchemaOutcome::Pending`] answer is reported as a single issue, since schemas
/// must resolve synchronously.
pub fn validate(schema: &dyn Schema, input: &Value) -> Result<Value, Vec<Issue>> {
    match schema.validate(input) {
        SchemaOutcome::Valid(value) => Ok(value),
        SchemaOutcome::Invalid(issues) => Err(issues),
        SchemaOutcome::Pending => Err(vec![Issue::new("Async validation is not supported")]),
    }
}

/// Renders issues as newline-separated `$.path[0]: message` lines.
///
/// ```
/// use typed_fetch::validation::{format_issues, Issue, PathSegment};
///
/// let issues = vec![
///     Issue::at(vec!["users".into(), 2.into(), "age".into()], "expected number"),
///     Issue::new("too many keys"),
/// ];
/// assert_eq!(
///     format_issues(&issues),
///     "$.users[2].age: expected number\n$: too many keys"
/// );
/// ```
pub fn format_issues(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(Issue::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Validates by deserializing into `T`, then re-serializing the result.
///
/// Defaults and renames applied by `T`'s serde implementation become part of the
/// validated value.
pub struct SerdeSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeSchema<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SerdeSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Schema for SerdeSchema<T>
where
    T: DeserializeOwned + Serialize,
{
    fn validate(&self, input: &Value) -> SchemaOutcome {
        let typed: T = match deserialize_typed(input) {
            Ok(typed) => typed,
            Err(issues) => return SchemaOutcome::Invalid(issues),
        };

        match serde_json::to_value(&typed) {
            Ok(value) => SchemaOutcome::Valid(value),
            Err(e) => SchemaOutcome::Invalid(vec![Issue::new(e.to_string())]),
        }
    }
}

/// Deserializes `input` into `T`, reporting a failure as one path-qualified issue.
pub fn deserialize_typed<T: DeserializeOwned>(input: &Value) -> Result<T, Vec<Issue>> {
    serde_path_to_error::deserialize(input).map_err(|e| {
        let path = e
            .path()
            .iter()
            .filter_map(|segment| match segment {
                serde_path_to_error::Segment::Seq { index } => Some(PathSegment::Index(*index)),
                serde_path_to_error::Segment::Map { key } => Some(PathSegment::Key(key.clone())),
                serde_path_to_error::Segment::Enum { variant } => {
                    Some(PathSegment::Symbol(variant.clone()))
                }
                serde_path_to_error::Segment::Unknown => None,
            })
            .collect();
        vec![Issue::at(path, e.inner().to_string())]
    })
}

/// Adapts a closure into a [`Schema`].
pub struct FnSchema<F>(pub F);

impl<F> Schema for FnSchema<F>
where
    F: Fn(&Value) -> SchemaOutcome + Send + Sync,
{
    fn validate(&self, input: &Value) -> SchemaOutcome {
        (self.0)(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    struct Person {
        age: u32,
        #[serde(default)]
        tags: Vec<String>,
    }

    #[test]
    fn test_deserialize_typed_reports_path() {
        let issues = deserialize_typed::<Vec<Person>>(&json!([{ "age": 1 }, { "age": "x" }]))
            .unwrap_err();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].to_string().starts_with("$[1].age: "));
    }

    #[test]
    fn test_serde_schema_transforms_value() {
        let schema = SerdeSchema::<Person>::new();
        let value = validate(&schema, &json!({ "age": 30 })).unwrap();
        assert_eq!(value, json!({ "age": 30, "tags": [] }));
    }

    #[test]
    fn test_serde_schema_reports_path() {
        let schema = SerdeSchema::<Person>::new();
        let issues = validate(&schema, &json!({ "age": "twenty" })).unwrap_err();

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, Some(vec![PathSegment::Key("age".into())]));
        assert!(format_issues(&issues).starts_with("$.age: "));
    }

    #[test]
    fn test_nested_index_path() {
        let schema = SerdeSchema::<Vec<Person>>::new();
        let issues = validate(&schema, &json!([{ "age": 1 }, { "age": -1 }])).unwrap_err();
        assert!(format_issues(&issues).starts_with("$[1].age: "));
    }

    #[test]
    fn test_pending_is_unsupported() {
        let schema = FnSchema(|_: &Value| SchemaOutcome::Pending);
        let issues = validate(&schema, &json!(null)).unwrap_err();
        assert_eq!(issues, vec![Issue::new("Async validation is not supported")]);
    }

    #[test]
    fn test_symbol_segment_rendering() {
        let issue = Issue::at(
            vec![PathSegment::Key("a".into()), PathSegment::Symbol("tag".into())],
            "bad",
        );
        assert_eq!(issue.to_string(), "$.a[symbol:tag]: bad");
    }
}
