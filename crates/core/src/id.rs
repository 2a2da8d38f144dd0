//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Namespace for identifiers derived from natural keys (discount code strings,
/// cart owners). Changing it re-keys every derived stream.
const DERIVED_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a8e_4b3d_4e52_9a07_31c5_d0b8_e2f4);

/// Identifier of a shop user (actor identity, the JWT subject).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

/// Identifier of an aggregate stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

impl AggregateId {
    /// Deterministic stream id for a natural key within a named scope.
    ///
    /// The same `(scope, key)` always yields the same id, so a second
    /// "create" for the same key lands on an existing stream.
    pub fn derived(scope: &str, key: &[u8]) -> Self {
        let mut name = Vec::with_capacity(scope.len() + 1 + key.len());
        name.extend_from_slice(scope.as_bytes());
        name.push(b':');
        name.extend_from_slice(key);
        Self(Uuid::new_v5(&DERIVED_ID_NAMESPACE, &name))
    }
}

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new time-ordered (UUIDv7) identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(UserId, "UserId");
impl_uuid_newtype!(AggregateId, "AggregateId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_ids_are_stable_per_scope_and_key() {
        let a = AggregateId::derived("shop.discount", b"SUMMER10");
        let b = AggregateId::derived("shop.discount", b"SUMMER10");
        let other_key = AggregateId::derived("shop.discount", b"summer10");
        let other_scope = AggregateId::derived("shop.cart", b"SUMMER10");

        assert_eq!(a, b);
        assert_ne!(a, other_key);
        assert_ne!(a, other_scope);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<UserId>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(msg) if msg.starts_with("UserId")));
    }
}
