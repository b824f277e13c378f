use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::debug;

use super::cache::{CacheStats, ResolutionCache};
use super::model::{MappingEntry, Model, ModelDescriptor, PriorityTier, Record};
use super::resolver::RuleTables;
use crate::error::MappingError;

/// Owns every property <-> JSON key rule plus the resolution cache.
///
/// One mutex guards the tables, the declared model descriptors and the
/// cache together, so "probe cache, consult tables, populate cache" cannot
/// interleave with a mutation, and every mutation has finished invalidating
/// before it returns. Construct one per application (or per test); there is
/// no process-global instance.
#[derive(Debug, Default)]
pub struct MappingRegistry {
    state: Mutex<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    rules: RuleTables,
    models: HashMap<String, ModelDescriptor>,
    cache: ResolutionCache,
}

impl RegistryState {
    fn resolve(&mut self, type_name: &str, property: &str) -> MappingEntry {
        if let Some(hit) = self.cache.get(type_name, property) {
            return hit;
        }
        let entry = self.rules.resolve(type_name, property);
        // Type-level tables are injective and checked first in reverse, so
        // the inverse is known without a scan.
        if entry.tier == PriorityTier::TypeLevel {
            self.cache
                .put_reverse(type_name, &entry.json_key, property.to_string());
        }
        self.cache.put(type_name, property, entry.clone());
        entry
    }

    fn reverse(&mut self, type_name: &str, json_key: &str) -> String {
        if let Some(hit) = self.cache.get_reverse(type_name, json_key) {
            return hit;
        }
        let property = self.rules.reverse(type_name, json_key);
        self.cache.put_reverse(type_name, json_key, property.clone());
        property
    }

    fn install_type_mapping(&mut self, type_name: &str, table: HashMap<String, String>) {
        debug!(type_name, mapping = ?table, "Registered type mapping");
        self.rules.types.insert(type_name.to_string(), table);
        self.cache.invalidate(type_name);
    }
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose forward and reverse caches each hold at most
    /// `capacity` entries.
    pub fn with_cache_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                cache: ResolutionCache::new(Some(capacity)),
                ..Default::default()
            }),
        }
    }

    // ─── Global Mapping ────────────────────────────────────────────────────

    /// Replace the whole global table.
    pub fn set_global_mapping<I, K, V>(&self, mapping: I) -> Result<(), MappingError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let table = collect(mapping);
        validate_table("global mapping", "global", &table, None)?;

        let mut state = self.state.lock();
        debug!(mapping = ?table, "Set global mapping");
        state.rules.global = table;
        state.cache.invalidate_all();
        Ok(())
    }

    /// Overlay entries onto the global table; incoming values win on a
    /// property collision.
    pub fn add_global_mapping<I, K, V>(&self, mapping: I) -> Result<(), MappingError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let incoming = collect(mapping);

        let mut state = self.state.lock();
        let mut merged = state.rules.global.clone();
        merged.extend(incoming.iter().map(|(k, v)| (k.clone(), v.clone())));
        validate_table("global mapping", "global", &merged, None)?;

        debug!(mapping = ?incoming, "Added global mapping");
        state.rules.global = merged;
        state.cache.invalidate_all();
        Ok(())
    }

    pub fn global_mapping(&self) -> HashMap<String, String> {
        self.state.lock().rules.global.clone()
    }

    pub fn clear_global_mapping(&self) {
        let mut state = self.state.lock();
        state.rules.global.clear();
        state.cache.invalidate_all();
        debug!("Cleared global mapping");
    }

    // ─── Type-Level Mapping ────────────────────────────────────────────────

    /// Replace `type_name`'s table wholesale.
    pub fn register_type_mapping<I, K, V>(&self, type_name: &str, mapping: I) -> Result<(), MappingError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let table = collect(mapping);

        let mut state = self.state.lock();
        validate_type_table(type_name, &table, state.models.get(type_name))?;
        state.install_type_mapping(type_name, table);
        Ok(())
    }

    /// Register several type tables at once. Every table is validated before
    /// any is applied.
    pub fn register_type_mappings<I>(&self, mappings: I) -> Result<(), MappingError>
    where
        I: IntoIterator<Item = (String, HashMap<String, String>)>,
    {
        let mappings: Vec<_> = mappings.into_iter().collect();

        let mut state = self.state.lock();
        for (type_name, table) in &mappings {
            validate_type_table(type_name, table, state.models.get(type_name))?;
        }
        let count = mappings.len();
        for (type_name, table) in mappings {
            state.install_type_mapping(&type_name, table);
        }
        debug!(count, "Registered type mappings in batch");
        Ok(())
    }

    pub fn type_mapping(&self, type_name: &str) -> Option<HashMap<String, String>> {
        self.state.lock().rules.types.get(type_name).cloned()
    }

    /// Types with a registered table, sorted.
    pub fn mapped_types(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut names: Vec<String> = state.rules.types.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns whether a table was present.
    pub fn remove_type_mapping(&self, type_name: &str) -> bool {
        let mut state = self.state.lock();
        let removed = state.rules.types.remove(type_name).is_some();
        state.cache.invalidate(type_name);
        debug!(type_name, removed, "Removed type mapping");
        removed
    }

    // ─── Snake Case ────────────────────────────────────────────────────────

    pub fn mark_snake_case(&self, type_name: &str) {
        let mut state = self.state.lock();
        state.rules.snake_case.insert(type_name.to_string());
        state.cache.invalidate(type_name);
        debug!(type_name, "Marked snake_case");
    }

    pub fn unmark_snake_case(&self, type_name: &str) -> bool {
        let mut state = self.state.lock();
        let removed = state.rules.snake_case.remove(type_name);
        state.cache.invalidate(type_name);
        removed
    }

    pub fn is_snake_case(&self, type_name: &str) -> bool {
        self.state.lock().rules.snake_case.contains(type_name)
    }

    pub fn snake_case_types(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut names: Vec<String> = state.rules.snake_case.iter().cloned().collect();
        names.sort();
        names
    }

    // ─── Model Descriptors ─────────────────────────────────────────────────

    /// Record a type's declared properties. Later type mappings are checked
    /// against them; an existing table must already fit the new descriptor.
    pub fn declare_model(&self, descriptor: ModelDescriptor) -> Result<(), MappingError> {
        validate_descriptor(&descriptor)?;

        let mut state = self.state.lock();
        if let Some(table) = state.rules.types.get(&descriptor.name) {
            validate_type_table(&descriptor.name, table, Some(&descriptor))?;
        }
        debug!(type_name = %descriptor.name, properties = descriptor.properties.len(), "Declared model");
        state.models.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn declared_properties(&self, type_name: &str) -> Option<Vec<String>> {
        self.state
            .lock()
            .models
            .get(type_name)
            .map(|d| d.properties.clone())
    }

    /// Declare `T` and install the key overrides it provides, if any.
    pub fn register_model<T: Model>(&self) -> Result<(), MappingError> {
        let descriptor = T::descriptor();
        validate_descriptor(&descriptor)?;
        let keys = T::mapping_keys();

        let mut state = self.state.lock();
        if keys.is_empty() {
            if let Some(table) = state.rules.types.get(T::TYPE_NAME) {
                validate_type_table(T::TYPE_NAME, table, Some(&descriptor))?;
            }
        } else {
            let table = collect(keys);
            validate_type_table(T::TYPE_NAME, &table, Some(&descriptor))?;
            state.install_type_mapping(T::TYPE_NAME, table);
        }
        state.models.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    // ─── Resolution ────────────────────────────────────────────────────────

    /// Full resolution result for one property, including the winning tier.
    pub fn mapping_entry(&self, type_name: &str, property: &str) -> MappingEntry {
        self.state.lock().resolve(type_name, property)
    }

    /// Effective JSON key for `property` on `type_name`. Never fails.
    pub fn json_key(&self, type_name: &str, property: &str) -> String {
        self.mapping_entry(type_name, property).json_key
    }

    /// Property that `json_key` belongs to on `type_name`, or `json_key`
    /// itself when nothing maps to it. Never fails.
    pub fn property_name(&self, type_name: &str, json_key: &str) -> String {
        self.state.lock().reverse(type_name, json_key)
    }

    /// Effective keys for the given properties, resolved under one lock.
    pub fn resolve_all<S: AsRef<str>>(&self, type_name: &str, properties: &[S]) -> Vec<String> {
        let mut state = self.state.lock();
        properties
            .iter()
            .map(|p| state.resolve(type_name, p.as_ref()).json_key)
            .collect()
    }

    /// Effective keys for every declared property of `type_name`, in
    /// declaration order. Empty when the type was never declared.
    pub fn json_keys(&self, type_name: &str) -> Vec<String> {
        let mut state = self.state.lock();
        let properties = match state.models.get(type_name) {
            Some(d) => d.properties.clone(),
            None => return Vec::new(),
        };
        properties
            .iter()
            .map(|p| state.resolve(type_name, p).json_key)
            .collect()
    }

    /// Re-key a property-named record to JSON keys (encoding direction).
    pub fn to_json_keys(&self, type_name: &str, record: &Record) -> Record {
        let mut state = self.state.lock();
        record
            .iter()
            .map(|(prop, value)| (state.resolve(type_name, prop).json_key, value.clone()))
            .collect()
    }

    /// Re-key a JSON-keyed record to property names (decoding direction).
    pub fn to_property_names(&self, type_name: &str, record: &Record) -> Record {
        let mut state = self.state.lock();
        record
            .iter()
            .map(|(key, value)| (state.reverse(type_name, key), value.clone()))
            .collect()
    }

    /// Declared properties of `type_name` whose effective keys collide once
    /// every tier is applied (e.g. a type-level key equal to a global key
    /// used by another property). One error per extra claimant.
    pub fn key_collisions(&self, type_name: &str) -> Vec<MappingError> {
        let mut state = self.state.lock();
        let properties = match state.models.get(type_name) {
            Some(d) => d.properties.clone(),
            None => return Vec::new(),
        };

        let mut owners: HashMap<String, String> = HashMap::new();
        let mut collisions = Vec::new();
        for prop in properties {
            let key = state.resolve(type_name, &prop).json_key;
            match owners.get(&key) {
                Some(first) => collisions.push(MappingError::AmbiguousReverseMapping {
                    scope: format!("type `{type_name}`"),
                    json_key: key,
                    first: first.clone(),
                    second: prop,
                }),
                None => {
                    owners.insert(key, prop);
                }
            }
        }
        collisions
    }

    // ─── Cache ─────────────────────────────────────────────────────────────

    pub fn clear_cache(&self) {
        self.state.lock().cache.invalidate_all();
    }

    pub fn clear_cache_for(&self, type_name: &str) {
        self.state.lock().cache.invalidate(type_name);
    }

    pub fn clear_cache_entry(&self, type_name: &str, property: &str) {
        self.state.lock().cache.invalidate_entry(type_name, property);
    }

    /// Resolve every listed property of each descriptor so later lookups hit
    /// the cache. Returns the number of properties resolved.
    pub fn warmup<'a, I>(&self, models: I) -> usize
    where
        I: IntoIterator<Item = &'a ModelDescriptor>,
    {
        let mut state = self.state.lock();
        let mut resolved = 0;
        for model in models {
            for prop in &model.properties {
                state.resolve(&model.name, prop);
                resolved += 1;
            }
        }
        debug!(resolved, "Warmed up resolution cache");
        resolved
    }

    /// [`warmup`](Self::warmup) using the descriptors already declared for
    /// `type_names`. Undeclared names are skipped.
    pub fn warmup_declared<S: AsRef<str>>(&self, type_names: &[S]) -> usize {
        let descriptors: Vec<ModelDescriptor> = {
            let state = self.state.lock();
            type_names
                .iter()
                .filter_map(|t| state.models.get(t.as_ref()).cloned())
                .collect()
        };
        self.warmup(&descriptors)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.state.lock().cache.stats()
    }

    pub fn reset_cache_stats(&self) {
        self.state.lock().cache.reset_stats();
    }

    pub fn set_cache_enabled(&self, enabled: bool) {
        self.state.lock().cache.set_enabled(enabled);
        debug!(enabled, "Resolution cache toggled");
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.state.lock().cache.is_enabled()
    }

    /// Drop every rule, descriptor and cached resolution.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.rules = RuleTables::default();
        state.models.clear();
        state.cache.invalidate_all();
        state.cache.reset_stats();
        debug!("Registry reset");
    }
}

fn collect<I, K, V>(mapping: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    mapping
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

fn validate_descriptor(descriptor: &ModelDescriptor) -> Result<(), MappingError> {
    if descriptor.name.trim().is_empty() {
        return Err(MappingError::invalid("", "model name must not be empty"));
    }
    let mut seen = HashSet::new();
    for prop in &descriptor.properties {
        if prop.is_empty() {
            return Err(MappingError::invalid(&descriptor.name, "property name must not be empty"));
        }
        if !seen.insert(prop.as_str()) {
            return Err(MappingError::invalid(
                &descriptor.name,
                format!("property `{prop}` is declared twice"),
            ));
        }
    }
    Ok(())
}

fn validate_type_table(
    type_name: &str,
    table: &HashMap<String, String>,
    model: Option<&ModelDescriptor>,
) -> Result<(), MappingError> {
    if type_name.trim().is_empty() {
        return Err(MappingError::invalid(type_name, "type name must not be empty"));
    }
    validate_table(&format!("type `{type_name}`"), type_name, table, model)
}

/// Reject empty names, properties the declared model lacks, and two
/// properties sharing one JSON key (reverse lookups would be ambiguous).
fn validate_table(
    scope: &str,
    type_name: &str,
    table: &HashMap<String, String>,
    model: Option<&ModelDescriptor>,
) -> Result<(), MappingError> {
    if let Some(model) = model {
        if model.properties.is_empty() && !table.is_empty() {
            return Err(MappingError::invalid(type_name, "type declares no properties"));
        }
    }

    let mut owners: HashMap<&str, &str> = HashMap::with_capacity(table.len());
    for (prop, key) in table {
        if prop.is_empty() {
            return Err(MappingError::invalid(type_name, "property name must not be empty"));
        }
        if key.is_empty() {
            return Err(MappingError::invalid(
                type_name,
                format!("JSON key for `{prop}` must not be empty"),
            ));
        }
        if let Some(model) = model {
            if !model.has_property(prop) {
                return Err(MappingError::invalid(
                    type_name,
                    format!("`{prop}` is not a declared property"),
                ));
            }
        }
        if let Some(other) = owners.insert(key.as_str(), prop.as_str()) {
            let (first, second) = if other < prop.as_str() {
                (other, prop.as_str())
            } else {
                (prop.as_str(), other)
            };
            return Err(MappingError::AmbiguousReverseMapping {
                scope: scope.to_string(),
                json_key: key.clone(),
                first: first.to_string(),
                second: second.to_string(),
            });
        }
    }
    Ok(())
}
