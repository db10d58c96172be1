//! Type-safe entity identifiers.
//!
//! Every entity in the platform is keyed by a positive 64-bit integer.
//! The newtypes below keep user, event, request, and category identifiers
//! from being confused with each other at call sites.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ValidationRule};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw identifier without validation.
            ///
            /// Use [`TryFrom<i64>`] for identifiers arriving from outside
            /// the service.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw integer value.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<i64> for $name {
            type Error = ServiceError;

            fn try_from(raw: i64) -> Result<Self, Self::Error> {
                if raw > 0 {
                    Ok(Self(raw))
                } else {
                    Err(ServiceError::Validation(ValidationRule::NonPositiveId {
                        field: $field,
                        value: raw,
                    }))
                }
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identifier of a registered user (requester, initiator, or owner).
    UserId,
    "userId"
);

entity_id!(
    /// Identifier of an event.
    EventId,
    "eventId"
);

entity_id!(
    /// Identifier of a participation request.
    RequestId,
    "requestId"
);

entity_id!(
    /// Identifier of an event category.
    CategoryId,
    "categoryId"
);

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn positive_ids_are_accepted() {
        let Ok(id) = EventId::try_from(42) else {
            panic!("positive id rejected");
        };
        assert_eq!(id.get(), 42);
        assert_eq!(i64::from(id), 42);
    }

    #[test]
    fn zero_and_negative_ids_are_validation_errors() {
        for raw in [0, -1, i64::MIN] {
            let result = UserId::try_from(raw);
            assert!(matches!(
                result,
                Err(ServiceError::Validation(ValidationRule::NonPositiveId {
                    field: "userId",
                    ..
                }))
            ));
        }
    }

    #[test]
    fn display_is_raw_number() {
        assert_eq!(RequestId::new(7).to_string(), "7");
    }

    #[test]
    fn serde_is_transparent() {
        let json = serde_json::to_string(&CategoryId::new(3)).unwrap_or_default();
        assert_eq!(json, "3");
        let parsed: Option<CategoryId> = serde_json::from_str("3").ok();
        assert_eq!(parsed, Some(CategoryId::new(3)));
    }
}
