use super::convert::ConfigValue;
use super::ConfigError;
use serde_yaml::Value;
use std::collections::HashMap;
use std::path::Path;

/// One layer of the lookup chain.
pub(crate) enum Source {
    /// Programmatic overrides from `set`.
    Overrides(HashMap<String, ConfigValue>),
    /// The process environment, consulted on demand.
    Environment,
    /// A parsed yaml document, navigated by dot-path per lookup.
    Document(Value),
}

impl Source {
    pub(crate) fn lookup(&self, key: &str) -> Option<ConfigValue> {
        match self {
            Source::Overrides(map) => map.get(key).cloned(),
            Source::Environment => std::env::var(environment_name(key))
                .ok()
                .map(ConfigValue::Scalar),
            Source::Document(document) => leaf(descend(document, key)?),
        }
    }
}

/// The environment spelling of a key: `server.listen_addresses` answers to
/// `SERVER_LISTEN_ADDRESSES`.
fn environment_name(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '.' | '-' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

/// Walk a dot-separated path: mappings by key, sequences by index.
fn descend<'a>(mut node: &'a Value, path: &str) -> Option<&'a Value> {
    for segment in path.split('.') {
        node = match node {
            Value::Mapping(map) => map.get(&Value::String(segment.to_owned()))?,
            Value::Sequence(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(node)
}

/// A yaml node as a configuration leaf. Nulls and mappings have no value
/// form.
fn leaf(node: &Value) -> Option<ConfigValue> {
    match node {
        Value::Bool(flag) => Some(ConfigValue::Scalar(flag.to_string())),
        Value::Number(number) => Some(ConfigValue::Scalar(number.to_string())),
        Value::String(text) => Some(ConfigValue::Scalar(text.clone())),
        Value::Sequence(items) => {
            Some(ConfigValue::List(items.iter().filter_map(leaf).collect()))
        }
        Value::Null | Value::Mapping(_) | Value::Tagged(_) => None,
    }
}

/// Parse a yaml file that is allowed to be absent.
pub(crate) fn optional_document(path: &Path) -> Result<Option<Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    required_document(path).map(Some)
}

/// Parse a yaml file that must exist.
pub(crate) fn required_document(path: &Path) -> Result<Value, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_owned(),
        source,
    })?;
    parse_document(&text, &path.display().to_string())
}

pub(crate) fn parse_document(text: &str, origin: &str) -> Result<Value, ConfigError> {
    serde_yaml::from_str(text).map_err(|err| ConfigError::Invalid {
        origin: origin.to_owned(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(text: &str) -> Value {
        parse_document(text, "<test>").unwrap()
    }

    #[test]
    fn environment_spelling() {
        assert_eq!(environment_name("server.listen"), "SERVER_LISTEN");
        assert_eq!(
            environment_name("static.cache-control"),
            "STATIC_CACHE_CONTROL"
        );
    }

    #[test]
    fn descend_walks_mappings_and_sequences() {
        let doc = document("a:\n  b:\n    - x\n    - y\n");
        assert_eq!(descend(&doc, "a.b.1"), Some(&Value::String("y".into())));
        assert_eq!(descend(&doc, "a.b.2"), None);
        assert_eq!(descend(&doc, "a.missing"), None);
    }

    #[test]
    fn leaf_skips_nulls_and_branches() {
        let doc = document("empty:\nbranch:\n  k: v\nflag: true\n");
        assert_eq!(leaf(descend(&doc, "empty").unwrap()), None);
        assert_eq!(leaf(descend(&doc, "branch").unwrap()), None);
        assert_eq!(
            leaf(descend(&doc, "flag").unwrap()),
            Some(ConfigValue::scalar("true"))
        );
    }

    #[test]
    fn sequence_leaf_drops_non_scalar_items() {
        let doc = document("mixed:\n  - 1\n  - k: v\n  - 2\n");
        assert_eq!(
            leaf(descend(&doc, "mixed").unwrap()),
            Some(ConfigValue::List(vec![
                ConfigValue::scalar("1"),
                ConfigValue::scalar("2"),
            ]))
        );
    }
}
