use serde::{Deserialize, Serialize};

/// A flattened record: one level of `name -> value`, independent of the type
/// it came from.
pub type Record = serde_json::Map<String, serde_json::Value>;

// ─── Priority Tier ─────────────────────────────────────────────────────────

/// Which rule produced a resolution. Higher tiers win; exactly one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    /// No rule applied; the JSON key is the property name itself.
    Default = 0,
    SnakeCase = 1,
    Global = 2,
    TypeLevel = 3,
}

impl PriorityTier {
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PriorityTier::Default => "default",
            PriorityTier::SnakeCase => "snake_case",
            PriorityTier::Global => "global",
            PriorityTier::TypeLevel => "type",
        }
    }
}

// ─── Mapping Entry ─────────────────────────────────────────────────────────

/// The outcome of resolving one property. Immutable once produced; the
/// cache replaces entries rather than editing them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub json_key: String,
    pub tier: PriorityTier,
    /// Where the key came from, for diagnostics (e.g. `type:User`, `global`).
    pub source: String,
}

impl MappingEntry {
    pub fn new(json_key: impl Into<String>, tier: PriorityTier, source: impl Into<String>) -> Self {
        Self {
            json_key: json_key.into(),
            tier,
            source: source.into(),
        }
    }
}

// ─── Model Descriptor ──────────────────────────────────────────────────────

/// Statically declared shape of a model type: its name and its properties in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<String>,
}

impl ModelDescriptor {
    pub fn new<I, S>(name: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            properties: properties.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p == name)
    }
}

// ─── Model Trait ───────────────────────────────────────────────────────────

/// Implemented by model types that take part in key mapping and conversion.
///
/// ```
/// use keymapper::Model;
///
/// struct User;
///
/// impl Model for User {
///     const TYPE_NAME: &'static str = "User";
///     const PROPERTIES: &'static [&'static str] = &["id", "userName"];
///
///     fn mapping_keys() -> Vec<(&'static str, &'static str)> {
///         vec![("id", "user_id")]
///     }
/// }
///
/// assert_eq!(User::descriptor().properties, vec!["id", "userName"]);
/// ```
pub trait Model {
    const TYPE_NAME: &'static str;
    const PROPERTIES: &'static [&'static str];

    /// Type-level `property -> JSON key` overrides the type supplies itself.
    fn mapping_keys() -> Vec<(&'static str, &'static str)> {
        Vec::new()
    }

    fn descriptor() -> ModelDescriptor {
        ModelDescriptor::new(Self::TYPE_NAME, Self::PROPERTIES.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(PriorityTier::TypeLevel > PriorityTier::Global);
        assert!(PriorityTier::Global > PriorityTier::SnakeCase);
        assert!(PriorityTier::SnakeCase > PriorityTier::Default);
        assert_eq!(PriorityTier::TypeLevel.rank(), 3);
        assert_eq!(PriorityTier::Default.rank(), 0);
    }

    #[test]
    fn test_tier_serializes_snake_case() {
        let json = serde_json::to_string(&PriorityTier::TypeLevel).unwrap();
        assert_eq!(json, "\"type_level\"");
    }

    #[test]
    fn test_descriptor_deserializes_without_properties() {
        let d: ModelDescriptor = serde_json::from_str(r#"{"name": "Empty"}"#).unwrap();
        assert_eq!(d.name, "Empty");
        assert!(d.properties.is_empty());
        assert!(!d.has_property("id"));
    }
}
