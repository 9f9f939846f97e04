//! Frontmatter values as the host hands them over.
//!
//! Frontmatter is duck-typed: the same key may hold a string, a list, a
//! boolean or nothing useful at all. [`MetaValue`] pins that down once so
//! consumers only ever deal with [`MetaValue::names`], [`MetaValue::is_truthy`]
//! and [`MetaValue::css_value`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "serde_json::Value")]
pub enum MetaValue {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
    /// Only the string items of a list survive.
    List(Vec<String>),
    Other,
}

impl From<serde_json::Value> for MetaValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::String(s) => Self::Text(s),
            Value::Number(n) => Self::Number(n),
            Value::Bool(b) => Self::Bool(b),
            Value::Array(items) => Self::List(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            ),
            Value::Null | Value::Object(_) => Self::Other,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl MetaValue {
    /// Trimmed, non-empty names from a scalar or a list. Any other shape
    /// means "nothing requested".
    pub fn names(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            Self::Text(s) => vec![s.as_str()],
            Self::List(items) => items.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Text(s) => !s.is_empty(),
            Self::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
            Self::Bool(b) => *b,
            Self::List(_) => true,
            Self::Other => false,
        }
    }

    /// The value as it would appear on the right-hand side of a CSS
    /// declaration, before any quoting.
    pub fn css_value(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Number(n) => Some(n.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::List(items) if !items.is_empty() => Some(items.join(", ")),
            Self::List(_) | Self::Other => None,
        }
    }
}

/// Parsed frontmatter of a single note.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Frontmatter(BTreeMap<String, MetaValue>);

impl Frontmatter {
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Names listed under `key`, normalized. Absent keys yield nothing.
    pub fn names(&self, key: &str) -> Vec<String> {
        self.get(key).map(MetaValue::names).unwrap_or_default()
    }

    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => {
                Self(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            _ => Self::default(),
        }
    }

    /// Parses the leading `---` block of a markdown note. `Ok(None)` when the
    /// note has no frontmatter at all.
    pub fn parse(content: &str) -> Result<Option<Self>> {
        let Some((yaml, _body)) = split_frontmatter(content) else {
            return Ok(None);
        };
        let value: serde_json::Value = if yaml.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_yaml::from_str(yaml)?
        };
        Ok(Some(Self::from_json(value)))
    }
}

impl<K: Into<String>, V: Into<MetaValue>> FromIterator<(K, V)> for Frontmatter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Splits `content` into its YAML frontmatter and the remaining body.
pub fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))?;

    // An empty block closes immediately.
    if let Some(body) = rest
        .strip_prefix("---\n")
        .or_else(|| rest.strip_prefix("---\r\n"))
    {
        return Some(("", body));
    }
    if rest == "---" {
        return Some(("", ""));
    }

    let (yaml_end, body_start) = rest
        .find("\n---\n")
        .map(|i| (i, i + 5))
        .or_else(|| rest.find("\n---\r\n").map(|i| (i, i + 6)))
        .or_else(|| rest.ends_with("\n---").then(|| (rest.len() - 4, rest.len())))?;
    Some((&rest[..yaml_end], &rest[body_start..]))
}

/// A note as seen in the corpus listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Vault-relative path with forward slashes, e.g. `themes/dark.md`.
    pub path: String,
    /// File name without directory and `.md` extension.
    pub basename: String,
    /// Opaque change marker; any modification yields a different value.
    #[serde(default)]
    pub modified: u64,
}

impl DocumentRef {
    pub fn new(path: impl Into<String>, modified: u64) -> Self {
        let path = path.into();
        let file = path.rsplit('/').next().unwrap_or(&path);
        let basename = strip_md(file).to_string();
        Self {
            path,
            basename,
            modified,
        }
    }

    /// Whether a frontmatter reference like `theme1` or `themes/theme1.md`
    /// points at this note.
    pub fn matches_name(&self, name: &str) -> bool {
        let name = name.trim();
        self.basename == name || self.path == name || strip_md(&self.path) == name
    }
}

fn strip_md(path: &str) -> &str {
    if path.to_ascii_lowercase().ends_with(".md") {
        &path[..path.len() - 3]
    } else {
        path
    }
}
