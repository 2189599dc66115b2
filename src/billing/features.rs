//! Feature normalization.
//!
//! Plans describe their features in whatever shape the billing provider
//! hands back: bare strings, objects with a `slug` or `name`, or junk.
//! Everything downstream works with a flat list of feature slugs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single entry of a plan's feature list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureRef {
    /// Bare slug string.
    Slug(String),
    /// Object carrying a slug and/or a display name.
    Object {
        #[serde(default)]
        slug: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
}

impl FeatureRef {
    /// Parse one raw entry. Returns `None` for values that are neither a
    /// string nor an object.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Slug(s.clone())),
            Value::Object(map) => Some(Self::Object {
                slug: map.get("slug").and_then(Value::as_str).map(str::to_string),
                name: map.get("name").and_then(Value::as_str).map(str::to_string),
            }),
            _ => None,
        }
    }

    /// The trimmed slug for this feature, if it has a non-blank one.
    ///
    /// Objects prefer `slug` and fall back to `name`.
    pub fn slug(&self) -> Option<&str> {
        let candidate = match self {
            Self::Slug(s) => Some(s.as_str()),
            Self::Object { slug, name } => slug
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .or(name.as_deref()),
        };
        candidate.map(str::trim).filter(|s| !s.is_empty())
    }
}

impl From<&str> for FeatureRef {
    fn from(slug: &str) -> Self {
        Self::Slug(slug.to_string())
    }
}

/// Flatten a raw feature list into slugs.
///
/// Order is preserved and duplicates are kept. Blank strings, objects
/// without a usable slug or name, and non-string entries are dropped.
/// Anything other than an array yields an empty list.
pub fn normalize_features(value: &Value) -> Vec<String> {
    let Value::Array(items) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(FeatureRef::from_value)
        .filter_map(|feature| feature.slug().map(str::to_string))
        .collect()
}
