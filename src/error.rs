use thiserror::Error;

/// Failures surfaced by the mapping engine.
///
/// A property with no configured override is not an error: it resolves to
/// its own name with [`PriorityTier::Default`](crate::PriorityTier::Default).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// A rule table was rejected before anything was applied.
    #[error("invalid mapping for `{type_name}`: {reason}")]
    InvalidRegistrationInput { type_name: String, reason: String },

    /// Two properties claim the same JSON key, so a reverse lookup could not
    /// pick one.
    #[error("JSON key `{json_key}` is claimed by both `{first}` and `{second}` in {scope}")]
    AmbiguousReverseMapping {
        scope: String,
        json_key: String,
        first: String,
        second: String,
    },

    /// The transcoder could not flatten the source or build the destination.
    #[error("could not materialize `{type_name}`: {reason}")]
    ConversionMaterializationFailed { type_name: String, reason: String },
}

impl MappingError {
    pub(crate) fn invalid(type_name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRegistrationInput {
            type_name: type_name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn materialization(type_name: &str, reason: impl ToString) -> Self {
        Self::ConversionMaterializationFailed {
            type_name: type_name.to_string(),
            reason: reason.to_string(),
        }
    }
}
