//! Dictionary-mediated conversion between model types.
//!
//! A source value is flattened into a [`Record`], each field is re-keyed to
//! the destination property that resolves to the same JSON key, and the
//! result is materialized as the destination type by a [`Transcoder`].

use std::collections::{HashMap, HashSet};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::filter::PropertyFilter;
use super::model::{Model, Record};
use super::registry::MappingRegistry;
use crate::error::MappingError;

/// Turns model values into flattened records and back.
pub trait Transcoder {
    /// Flatten `source` into `property -> value`, omitting null values.
    fn to_flat_record<S: Serialize>(&self, source: &S, type_name: &str) -> Result<Record, MappingError>;

    /// Build a `D` from a property-named record.
    fn from_flat_record<D: DeserializeOwned>(&self, record: Record, type_name: &str) -> Result<D, MappingError>;
}

/// [`Transcoder`] backed by `serde_json`. Field names are the serde field
/// names of the model types.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonTranscoder;

impl Transcoder for JsonTranscoder {
    fn to_flat_record<S: Serialize>(&self, source: &S, type_name: &str) -> Result<Record, MappingError> {
        match serde_json::to_value(source) {
            Ok(Value::Object(map)) => Ok(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
            Ok(other) => Err(MappingError::materialization(
                type_name,
                format!("expected an object, got {}", json_kind(&other)),
            )),
            Err(e) => Err(MappingError::materialization(type_name, e)),
        }
    }

    fn from_flat_record<D: DeserializeOwned>(&self, record: Record, type_name: &str) -> Result<D, MappingError> {
        serde_json::from_value(Value::Object(record))
            .map_err(|e| MappingError::materialization(type_name, e))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Re-keys records from one model type to another through the registry's
/// resolved JSON keys.
pub struct CrossModelConverter<'a, T = JsonTranscoder> {
    registry: &'a MappingRegistry,
    transcoder: T,
    filter: Option<&'a PropertyFilter>,
}

impl<'a> CrossModelConverter<'a, JsonTranscoder> {
    pub fn new(registry: &'a MappingRegistry) -> Self {
        Self::with_transcoder(registry, JsonTranscoder)
    }
}

impl<'a, T: Transcoder> CrossModelConverter<'a, T> {
    pub fn with_transcoder(registry: &'a MappingRegistry, transcoder: T) -> Self {
        Self {
            registry,
            transcoder,
            filter: None,
        }
    }

    /// Drop source fields the filter rejects before re-keying.
    pub fn with_filter(mut self, filter: &'a PropertyFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Re-key `source` (a `source_type` record) for `destination_type`,
    /// using the destination's declared properties from the registry. An
    /// undeclared destination passes every field through unchanged.
    pub fn convert_record(&self, source: &Record, source_type: &str, destination_type: &str) -> Record {
        let properties = self
            .registry
            .declared_properties(destination_type)
            .unwrap_or_default();
        self.remap(source, source_type, destination_type, &properties)
    }

    /// Re-key `source` for a destination with the given ordered properties.
    ///
    /// Per field: keep the name when the destination declares it; else move
    /// it to the first destination property whose JSON key equals the
    /// source property's JSON key; else keep the original name.
    pub fn remap<S: AsRef<str>>(
        &self,
        source: &Record,
        source_type: &str,
        destination_type: &str,
        destination_properties: &[S],
    ) -> Record {
        let declared: HashSet<&str> = destination_properties.iter().map(|p| p.as_ref()).collect();

        // JSON key -> first destination property that resolves to it.
        let dest_keys = self.registry.resolve_all(destination_type, destination_properties);
        let mut by_key: HashMap<String, &str> = HashMap::with_capacity(dest_keys.len());
        for (key, prop) in dest_keys.into_iter().zip(destination_properties) {
            by_key.entry(key).or_insert(prop.as_ref());
        }

        let mut result = Record::new();
        for (source_prop, value) in source {
            if let Some(filter) = self.filter {
                if !filter.should_process(source_prop, source_type) {
                    continue;
                }
            }

            if declared.contains(source_prop.as_str()) {
                result.insert(source_prop.clone(), value.clone());
                continue;
            }

            let source_key = self.registry.json_key(source_type, source_prop);
            match by_key.get(&source_key) {
                Some(dest_prop) => {
                    result.insert((*dest_prop).to_string(), value.clone());
                }
                None => {
                    result.insert(source_prop.clone(), value.clone());
                }
            }
        }
        result
    }

    /// Convert `source` into a `D`, reporting why materialization failed.
    pub fn try_convert<S, D>(&self, source: &S) -> Result<D, MappingError>
    where
        S: Model + Serialize,
        D: Model + DeserializeOwned,
    {
        let flat = self.transcoder.to_flat_record(source, S::TYPE_NAME)?;
        let mapped = self.remap(&flat, S::TYPE_NAME, D::TYPE_NAME, D::PROPERTIES);
        self.transcoder.from_flat_record(mapped, D::TYPE_NAME)
    }

    /// Convert `source` into a `D`; `None` when the destination cannot be
    /// built. There is no partially filled result.
    pub fn convert<S, D>(&self, source: &S) -> Option<D>
    where
        S: Model + Serialize,
        D: Model + DeserializeOwned,
    {
        match self.try_convert(source) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(error = %e, from = S::TYPE_NAME, to = D::TYPE_NAME, "Conversion failed");
                None
            }
        }
    }

    /// Convert each element, silently dropping the ones that fail. Compare
    /// lengths to count failures.
    pub fn convert_array<S, D>(&self, sources: &[S]) -> Vec<D>
    where
        S: Model + Serialize,
        D: Model + DeserializeOwned,
    {
        sources.iter().filter_map(|s| self.convert(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[allow(non_snake_case)]
    struct ApiUser {
        userId: String,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        nickname: Option<String>,
    }

    impl Model for ApiUser {
        const TYPE_NAME: &'static str = "ApiUser";
        const PROPERTIES: &'static [&'static str] = &["userId", "name", "nickname"];
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct AppUser {
        id: String,
        name: String,
    }

    impl Model for AppUser {
        const TYPE_NAME: &'static str = "AppUser";
        const PROPERTIES: &'static [&'static str] = &["id", "name"];
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Mirror {
        id: String,
        name: String,
    }

    impl Model for Mirror {
        const TYPE_NAME: &'static str = "Mirror";
        const PROPERTIES: &'static [&'static str] = &["id", "name"];
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Strict {
        id: String,
        age: u32,
    }

    impl Model for Strict {
        const TYPE_NAME: &'static str = "Strict";
        const PROPERTIES: &'static [&'static str] = &["id", "age"];
    }

    fn shared_key_registry() -> MappingRegistry {
        let registry = MappingRegistry::new();
        registry.register_type_mapping("ApiUser", [("userId", "user_id")]).unwrap();
        registry.register_type_mapping("AppUser", [("id", "user_id")]).unwrap();
        registry
    }

    fn record(value: serde_json::Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn test_convert_record_via_shared_json_key() {
        let registry = shared_key_registry();
        registry.register_model::<AppUser>().unwrap();
        let converter = CrossModelConverter::new(&registry);

        let out = converter.convert_record(&record(json!({"userId": "42"})), "ApiUser", "AppUser");
        assert_eq!(Value::Object(out), json!({"id": "42"}));
    }

    #[test]
    fn test_identity_conversion_without_mappings() {
        let registry = MappingRegistry::new();
        let converter = CrossModelConverter::new(&registry);

        let source = AppUser { id: "7".into(), name: "Ada".into() };
        let mirror: Mirror = converter.convert(&source).unwrap();
        assert_eq!(mirror, Mirror { id: "7".into(), name: "Ada".into() });
    }

    #[test]
    fn test_typed_convert_renames_field() {
        let registry = shared_key_registry();
        let converter = CrossModelConverter::new(&registry);

        let api = ApiUser { userId: "42".into(), name: "Ada".into(), nickname: None };
        let app: AppUser = converter.convert(&api).unwrap();
        assert_eq!(app, AppUser { id: "42".into(), name: "Ada".into() });
    }

    #[test]
    fn test_unmatched_field_passes_through() {
        let registry = MappingRegistry::new();
        let converter = CrossModelConverter::new(&registry);

        let out = converter.remap(
            &record(json!({"extra": 1, "name": "x"})),
            "ApiUser",
            "AppUser",
            AppUser::PROPERTIES,
        );
        assert_eq!(Value::Object(out), json!({"extra": 1, "name": "x"}));
    }

    #[test]
    fn test_first_declared_destination_property_wins() {
        let registry = MappingRegistry::new();
        registry.set_global_mapping([("ident", "id_key")]).unwrap();
        registry.register_type_mapping("Dest", [("primary", "id_key")]).unwrap();
        registry.register_type_mapping("Src", [("code", "id_key")]).unwrap();
        let converter = CrossModelConverter::new(&registry);

        let out = converter.remap(&record(json!({"code": 5})), "Src", "Dest", &["primary", "ident"]);
        assert_eq!(Value::Object(out), json!({"primary": 5}));
    }

    #[test]
    fn test_snake_case_types_meet_on_json_key() {
        let registry = MappingRegistry::new();
        registry.mark_snake_case("Src");
        registry.register_type_mapping("Dest", [("begins", "start_time")]).unwrap();
        let converter = CrossModelConverter::new(&registry);

        let out = converter.remap(&record(json!({"startTime": 1})), "Src", "Dest", &["begins"]);
        assert_eq!(Value::Object(out), json!({"begins": 1}));
    }

    #[test]
    fn test_materialization_failure_yields_none() {
        let registry = MappingRegistry::new();
        let converter = CrossModelConverter::new(&registry);

        let source = AppUser { id: "7".into(), name: "Ada".into() };
        let strict: Option<Strict> = converter.convert(&source);
        assert!(strict.is_none());

        let err = converter.try_convert::<AppUser, Strict>(&source).unwrap_err();
        assert!(matches!(
            err,
            MappingError::ConversionMaterializationFailed { ref type_name, .. } if type_name == "Strict"
        ));
    }

    #[test]
    fn test_convert_array_drops_failures() {
        let registry = shared_key_registry();
        let converter = CrossModelConverter::new(&registry);

        let users = vec![
            ApiUser { userId: "1".into(), name: "a".into(), nickname: None },
            ApiUser { userId: "2".into(), name: "b".into(), nickname: Some("bee".into()) },
        ];
        let apps: Vec<AppUser> = converter.convert_array(&users);
        assert_eq!(apps.len(), 2);
        assert_eq!(apps[1].id, "2");

        let stricts: Vec<Strict> = converter.convert_array(&users);
        assert!(stricts.is_empty());
    }

    #[test]
    fn test_filter_drops_denied_fields() {
        let registry = shared_key_registry();
        let filter = PropertyFilter::new();
        filter.set_ignored("ApiUser", ["nickname"]);
        let converter = CrossModelConverter::new(&registry).with_filter(&filter);

        let out = converter.remap(
            &record(json!({"userId": "1", "nickname": "n"})),
            "ApiUser",
            "AppUser",
            AppUser::PROPERTIES,
        );
        assert_eq!(Value::Object(out), json!({"id": "1"}));
    }

    #[test]
    fn test_flat_record_omits_nulls() {
        let flat = JsonTranscoder
            .to_flat_record(&json!({"a": 1, "b": null}), "Any")
            .unwrap();
        assert_eq!(Value::Object(flat), json!({"a": 1}));

        let err = JsonTranscoder.to_flat_record(&json!([1, 2]), "Any").unwrap_err();
        assert!(err.to_string().contains("an array"));
    }
}
