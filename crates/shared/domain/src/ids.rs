//! String identifiers, one newtype per entity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed identifier of a stored entity, rendered as `<entity>:<key>`.
pub trait EntityId: Clone + From<String> + AsRef<str> {
    /// Entity name used as the id prefix.
    const ENTITY: &'static str;
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident => $entity:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl EntityId for $name {
            const ENTITY: &'static str = $entity;
        }

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

entity_id!(
    /// Skill domain, e.g. `domain:dsa`.
    DomainId => crate::constants::DOMAIN
);
entity_id!(TierId => crate::constants::TIER);
entity_id!(CandidateId => crate::constants::CANDIDATE);
entity_id!(
    /// Idempotency key of a scored exam attempt.
    AttemptId => crate::constants::ATTEMPT
);
