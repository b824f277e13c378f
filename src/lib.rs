//! Property <-> JSON key mapping for model types.
//!
//! A [`MappingRegistry`] holds global, per-type and snake_case rules and
//! resolves which JSON key a property reads and writes (type-level beats
//! global beats snake_case beats the property name itself), memoizing the
//! answers. A [`CrossModelConverter`] reuses that resolution to move a
//! record from one model type to another through their shared JSON keys.
//!
//! ```
//! use keymapper::{MappingRegistry, PriorityTier};
//!
//! let registry = MappingRegistry::new();
//! registry.set_global_mapping([("id", "global_id")]).unwrap();
//! registry.register_type_mapping("User", [("id", "type_id")]).unwrap();
//! registry.mark_snake_case("Event");
//!
//! assert_eq!(registry.json_key("User", "id"), "type_id");
//! assert_eq!(registry.json_key("Order", "id"), "global_id");
//! assert_eq!(registry.mapping_entry("Event", "startTime").tier, PriorityTier::SnakeCase);
//! assert_eq!(registry.property_name("Event", "start_time"), "startTime");
//! ```

pub mod config;
pub mod error;
pub mod mapping;
pub mod mcp;
pub mod server;

pub use error::MappingError;
pub use mapping::cache::CacheStats;
pub use mapping::convert::{CrossModelConverter, JsonTranscoder, Transcoder};
pub use mapping::filter::{FilterRules, PropertyFilter};
pub use mapping::model::{MappingEntry, Model, ModelDescriptor, PriorityTier, Record};
pub use mapping::registry::MappingRegistry;
pub use mapping::{to_camel, to_snake};
