//! Type-safe record identifiers.
//!
//! Events, swap requests, and users are all keyed by opaque `u64` values.
//! Each gets its own newtype so an [`EventId`] can never be passed where a
//! [`UserId`] is expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw numeric identifier.
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Returns the raw numeric value.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

numeric_id!(
    /// Identifier of an [`super::Event`]. Assigned by the event store,
    /// immutable afterwards.
    EventId
);

numeric_id!(
    /// Identifier of a [`super::SwapRequest`]. Assigned by the swap request
    /// store.
    SwapRequestId
);

numeric_id!(
    /// Identifier of an externally managed user, as supplied by the access
    /// gateway.
    UserId
);

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn display_is_raw_number() {
        assert_eq!(EventId::new(42).to_string(), "42");
        assert_eq!(UserId::new(7).to_string(), "7");
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&SwapRequestId::new(9)).unwrap_or_default();
        assert_eq!(json, "9");

        let Ok(id) = serde_json::from_str::<EventId>("15") else {
            panic!("deserialization failed");
        };
        assert_eq!(id, EventId::new(15));
    }

    #[test]
    fn ordering_follows_raw_value() {
        let mut ids = vec![EventId::new(3), EventId::new(1), EventId::new(2)];
        ids.sort();
        assert_eq!(ids, vec![EventId::new(1), EventId::new(2), EventId::new(3)]);
    }

    #[test]
    fn hash_works_in_hashmap() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(UserId::new(1), "alice");
        assert_eq!(map.get(&UserId::new(1)), Some(&"alice"));
        assert_eq!(map.get(&UserId::new(2)), None);
    }
}
