use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::mapping::filter::{FilterRules, PropertyFilter};
use crate::mapping::model::ModelDescriptor;
use crate::mapping::registry::MappingRegistry;

// ─── Rule Set ──────────────────────────────────────────────────────────────

/// Mapping rules loaded from a JSON file.
///
/// ```json
/// {
///   "global": { "id": "global_id" },
///   "types": { "User": { "id": "user_id" } },
///   "snake_case": ["Event"],
///   "models": [{ "name": "User", "properties": ["id", "userName"] }],
///   "filter": { "global_deny": ["debugInfo"] },
///   "cache": { "enabled": true, "capacity": 4096 }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub global: HashMap<String, String>,
    #[serde(default)]
    pub types: HashMap<String, HashMap<String, String>>,
    #[serde(default)]
    pub snake_case: Vec<String>,
    /// Declared model shapes, used to validate type mappings and to drive
    /// conversion and warmup.
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,
    #[serde(default)]
    pub filter: FilterRules,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum entries per cache table; absent means unbounded.
    #[serde(default)]
    pub capacity: Option<usize>,
    /// Resolve every declared model's properties right after loading.
    #[serde(default)]
    pub warmup: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: None,
            warmup: false,
        }
    }
}

fn default_true() -> bool {
    true
}

impl RuleSet {
    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules from {}", path.display()))?;
        let rules: RuleSet = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse rules JSON in {}", path.display()))?;
        rules.validate()?;
        Ok(rules)
    }

    /// Load `path` if given, else `~/.keymapper/rules.json` when it exists,
    /// else an empty rule set.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_rules_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                tracing::debug!("No rules file found, starting with empty rules");
                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        for model in &self.models {
            if model.name.trim().is_empty() {
                anyhow::bail!("Model descriptor must have a name");
            }
        }
        for name in &self.snake_case {
            if name.trim().is_empty() {
                anyhow::bail!("snake_case entries must be type names");
            }
        }
        if self.cache.capacity == Some(0) {
            anyhow::bail!("cache.capacity must be at least 1");
        }
        Ok(())
    }

    /// Build a fresh registry and filter from these rules.
    pub fn build(&self) -> Result<(MappingRegistry, PropertyFilter)> {
        let registry = match self.cache.capacity {
            Some(capacity) => MappingRegistry::with_cache_capacity(capacity),
            None => MappingRegistry::new(),
        };
        self.apply(&registry)?;
        let filter = PropertyFilter::from_rules(self.filter.clone());
        Ok((registry, filter))
    }

    /// Install the rules into `registry`. Models are declared first so type
    /// mappings are checked against them.
    pub fn apply(&self, registry: &MappingRegistry) -> Result<()> {
        for model in &self.models {
            registry
                .declare_model(model.clone())
                .with_context(|| format!("Invalid model descriptor `{}`", model.name))?;
        }
        registry
            .set_global_mapping(self.global.clone())
            .context("Invalid global mapping")?;
        registry
            .register_type_mappings(self.types.clone())
            .context("Invalid type mapping")?;
        for name in &self.snake_case {
            registry.mark_snake_case(name);
        }
        registry.set_cache_enabled(self.cache.enabled);
        if self.cache.warmup {
            registry.warmup(&self.models);
        }

        tracing::info!(
            global = self.global.len(),
            types = self.types.len(),
            snake_case = self.snake_case.len(),
            models = self.models.len(),
            "Mapping rules applied"
        );
        Ok(())
    }
}

/// Returns the default rules path: `~/.keymapper/rules.json`
pub fn default_rules_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".keymapper").join("rules.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;

    fn write_temp(content: &str) -> PathBuf {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = temp_dir().join(format!("keymapper_test_{}_{}.json", std::process::id(), id));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_and_build() {
        let path = write_temp(
            r#"{
                "global": {"id": "global_id"},
                "types": {"User": {"id": "user_id"}},
                "snake_case": ["Event"],
                "models": [{"name": "User", "properties": ["id", "userName"]}],
                "filter": {"global_deny": ["debugInfo"]},
                "cache": {"capacity": 128, "warmup": true}
            }"#,
        );
        let rules = RuleSet::load(&path).unwrap();
        let (registry, filter) = rules.build().unwrap();

        assert_eq!(registry.json_key("User", "id"), "user_id");
        assert_eq!(registry.json_key("Order", "id"), "global_id");
        assert_eq!(registry.json_key("Event", "startTime"), "start_time");
        assert!(registry.cache_stats().forward_count >= 2);
        assert!(!filter.should_process("debugInfo", "User"));
    }

    #[test]
    fn test_empty_file_gives_empty_rules() {
        let path = write_temp("{}");
        let rules = RuleSet::load(&path).unwrap();
        assert!(rules.global.is_empty());
        assert!(rules.cache.enabled);
        assert!(rules.cache.capacity.is_none());
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let path = write_temp("{ not json");
        let err = RuleSet::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse rules JSON"));
    }

    #[test]
    fn test_load_rejects_zero_capacity() {
        let path = write_temp(r#"{"cache": {"capacity": 0}}"#);
        assert!(RuleSet::load(&path).is_err());
    }

    #[test]
    fn test_apply_rejects_mapping_outside_declared_model() {
        let rules: RuleSet = serde_json::from_str(
            r#"{
                "types": {"User": {"nickname": "nick"}},
                "models": [{"name": "User", "properties": ["id"]}]
            }"#,
        )
        .unwrap();
        let err = rules.build().unwrap_err();
        assert!(err.to_string().contains("Invalid type mapping"));
    }

    #[test]
    fn test_load_missing_file() {
        let missing = temp_dir().join("keymapper_definitely_missing.json");
        let err = RuleSet::load(&missing).unwrap_err();
        assert!(err.to_string().contains("Failed to read rules"));
    }
}
