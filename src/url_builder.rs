//! URL resolution and query-string construction.

use crate::{Result, TypedError};
use serde_json::Value;
use url::Url;

/// The target of a call: a path (relative or absolute) or a pre-built URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathOrUrl {
    Path(String),
    Url(Url),
}

impl PathOrUrl {
    /// String form used when echoing an unresolved target on an error.
    pub fn as_str(&self) -> &str {
        match self {
            PathOrUrl::Path(path) => path,
            PathOrUrl::Url(url) => url.as_str(),
        }
    }
}

impl From<&str> for PathOrUrl {
    fn from(path: &str) -> Self {
        PathOrUrl::Path(path.to_string())
    }
}

impl From<String> for PathOrUrl {
    fn from(path: String) -> Self {
        PathOrUrl::Path(path)
    }
}

impl From<&String> for PathOrUrl {
    fn from(path: &String) -> Self {
        PathOrUrl::Path(path.clone())
    }
}

impl From<Url> for PathOrUrl {
    fn from(url: Url) -> Self {
        PathOrUrl::Url(url)
    }
}

/// A JSON query parameter, serialized when the option was set.
///
/// `Ok(None)` is an undefined value and is skipped; `Err` carries the serializer's
/// message and fails the call.
pub type JsonParam = std::result::Result<Option<String>, String>;

/// Resolves `target` against `host` into one absolute URL.
///
/// A relative path requires a host; an absolute URL string must not come with one.
/// A host given alongside a pre-built [`Url`] is ignored.
pub fn resolve_url(target: &PathOrUrl, host: Option<&str>) -> Result<Url> {
    let path = match target {
        PathOrUrl::Url(url) => return Ok(url.clone()),
        PathOrUrl::Path(path) => path,
    };

    match (Url::parse(path), host) {
        (Ok(_), Some(host)) => Err(TypedError::invalid_options(format!(
            "Cannot use host '{host}' with an absolute URL '{path}'"
        ))),
        (Ok(url), None) => Ok(url),
        (Err(url::ParseError::RelativeUrlWithoutBase), Some(host)) => Url::parse(host)
            .and_then(|base| base.join(path))
            .map_err(|e| {
                TypedError::invalid_options(format!("Invalid URL '{path}' for host '{host}': {e}"))
                    .with_cause(e)
            }),
        (Err(url::ParseError::RelativeUrlWithoutBase), None) => Err(TypedError::invalid_options(
            format!("A host is required for the relative path '{path}'"),
        )),
        (Err(e), _) => Err(
            TypedError::invalid_options(format!("Invalid URL '{path}': {e}")).with_cause(e),
        ),
    }
}

/// Rejects paths with a leading or trailing `/`, or a doubled `/` once resolved.
///
/// Pre-built URLs are never checked.
pub fn validate_path_shape(target: &PathOrUrl, resolved: &Url) -> Result<()> {
    let PathOrUrl::Path(path) = target else {
        return Ok(());
    };

    if path.starts_with('/') || path.ends_with('/') {
        return Err(TypedError::invalid_options(format!(
            "Invalid path '{path}': path should not start or end with /"
        )));
    }

    if resolved.path().contains("//") {
        return Err(TypedError::invalid_options(format!(
            "Invalid path '{path}': path should not contain double slashes"
        )));
    }

    Ok(())
}

/// Sets `key` in the query string, replacing any existing value.
fn set_query_param(url: &mut Url, key: &str, value: &str) {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.push((key.to_string(), value.to_string()));

    url.query_pairs_mut().clear().extend_pairs(pairs);
}

fn stringify_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(stringify_param)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

/// Applies plain query parameters. `None` values are skipped.
pub fn apply_path_params(url: &mut Url, params: &[(String, Option<Value>)]) {
    for (key, value) in params {
        if let Some(value) = value {
            set_query_param(url, key, &stringify_param(value));
        }
    }
}

/// Applies JSON-encoded query parameters, each as a single query value.
pub fn apply_json_path_params(url: &mut Url, params: &[(String, JsonParam)]) -> Result<()> {
    for (key, param) in params {
        match param {
            Ok(Some(json)) => set_query_param(url, key, json),
            Ok(None) => {}
            Err(e) => {
                return Err(TypedError::invalid_options(format!(
                    "Invalid JSON path param '{key}': {e}"
                )))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;

    fn path(p: &str) -> PathOrUrl {
        PathOrUrl::from(p)
    }

    #[test]
    fn test_relative_path_joins_host() {
        let url = resolve_url(&path("api/users"), Some("http://test.com")).unwrap();
        assert_eq!(url.as_str(), "http://test.com/api/users");
    }

    #[test]
    fn test_host_with_path_follows_url_join() {
        let url = resolve_url(&path("users"), Some("http://test.com/v1/")).unwrap();
        assert_eq!(url.as_str(), "http://test.com/v1/users");
    }

    #[test]
    fn test_absolute_path_with_host_is_ambiguous() {
        let err = resolve_url(&path("http://a.com/x"), Some("http://b.com")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOptions);
        assert_eq!(err.status, 0);
    }

    #[test]
    fn test_relative_path_without_host() {
        let err = resolve_url(&path("users"), None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOptions);
    }

    #[test]
    fn test_malformed_host() {
        let err = resolve_url(&path("users"), Some("not a host")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOptions);
        assert!(err.cause.is_some());
    }

    #[test]
    fn test_path_shape() {
        let host = Some("http://test.com");
        for bad in ["/leading", "trailing/"] {
            let target = path(bad);
            let url = resolve_url(&target, host).unwrap();
            let err = validate_path_shape(&target, &url).unwrap_err();
            assert!(err.message.contains("should not start or end with /"));
        }

        let target = path("a//b");
        let url = resolve_url(&target, host).unwrap();
        let err = validate_path_shape(&target, &url).unwrap_err();
        assert!(err.message.contains("double slashes"));

        let target = path("a/b");
        let url = resolve_url(&target, host).unwrap();
        assert!(validate_path_shape(&target, &url).is_ok());
    }

    #[test]
    fn test_prebuilt_url_skips_shape_check() {
        let target = PathOrUrl::from(Url::parse("http://test.com/a/").unwrap());
        let url = resolve_url(&target, None).unwrap();
        assert!(validate_path_shape(&target, &url).is_ok());
    }

    #[test]
    fn test_path_params() {
        let mut url = Url::parse("http://test.com/api?page=1").unwrap();
        apply_path_params(
            &mut url,
            &[
                ("page".into(), Some(json!(2))),
                ("skip".into(), None),
                ("ids".into(), Some(json!([1, "b", true]))),
                ("q".into(), Some(json!("a b"))),
            ],
        );
        assert_eq!(url.query(), Some("page=2&ids=1%2Cb%2Ctrue&q=a+b"));
    }

    #[test]
    fn test_json_path_params_after_plain() {
        let mut url = Url::parse("http://test.com/api").unwrap();
        apply_path_params(&mut url, &[("filter".into(), Some(json!("plain")))]);
        apply_json_path_params(
            &mut url,
            &[
                ("filter".into(), Ok(Some(r#"{"a":1}"#.to_string()))),
                ("none".into(), Ok(None)),
            ],
        )
        .unwrap();

        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("filter".into(), r#"{"a":1}"#.into())]);
    }

    #[test]
    fn test_json_path_param_failure_names_key() {
        let mut url = Url::parse("http://test.com/api").unwrap();
        let err = apply_json_path_params(&mut url, &[("bad".into(), Err("cycle".into()))])
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOptions);
        assert!(err.message.contains("'bad'"));
    }
}
