//! Identifiers for graph entities and subscribers.
//!
//! Node and edge keys are plain strings so they stay readable in logs, in
//! persisted snapshots, and in the renderer. Node keys come from a decimal
//! counter; edge keys are derived from their endpoints. Subscriber ids are
//! UUID v7 wrappers, generated once per registered subsystem.

use core::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Separator between the two endpoint keys of an [`EdgeKey`].
pub const EDGE_KEY_SEPARATOR: char = '-';

/// Key of a node in the graph.
///
/// Allocated from a monotonically increasing counter and rendered as its
/// decimal string ("0", "1", ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NodeKey(String);

impl NodeKey {
    /// Build the key for a given counter value.
    pub fn from_counter(value: u64) -> Self {
        Self(value.to_string())
    }

    /// Borrow the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl From<String> for NodeKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Key of an edge, derived from its two endpoint keys.
///
/// The endpoints are ordered by **string** comparison, not numerically, so
/// nodes "10" and "2" produce `"10-2"`. Persisted snapshots rely on this
/// exact ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EdgeKey(String);

impl EdgeKey {
    /// Key of the edge joining `first` and `second`, in either order.
    pub fn between(first: &NodeKey, second: &NodeKey) -> Self {
        let (lesser, greater) = if second.as_str() < first.as_str() {
            (second, first)
        } else {
            (first, second)
        };
        Self(format!("{lesser}{EDGE_KEY_SEPARATOR}{greater}"))
    }

    /// Borrow the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EdgeKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

define_id! {
    /// Identity of a registered subsystem; used as the emitter of every
    /// mutation it makes through its dispatch adapter.
    SubscriberId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_key_is_symmetric() {
        let a = NodeKey::from_counter(0);
        let b = NodeKey::from_counter(1);
        assert_eq!(EdgeKey::between(&a, &b), EdgeKey::between(&b, &a));
        assert_eq!(EdgeKey::between(&a, &b).as_str(), "0-1");
    }

    #[test]
    fn edge_key_orders_as_strings() {
        let ten = NodeKey::from_counter(10);
        let two = NodeKey::from_counter(2);
        assert_eq!(EdgeKey::between(&two, &ten).as_str(), "10-2");
        assert_eq!(EdgeKey::between(&ten, &two).as_str(), "10-2");
    }

    #[test]
    fn node_key_renders_counter() {
        assert_eq!(NodeKey::from_counter(42).to_string(), "42");
        assert!(!NodeKey::from_counter(7).as_str().contains(EDGE_KEY_SEPARATOR));
    }

    #[test]
    fn subscriber_ids_are_distinct() {
        let a = SubscriberId::new();
        let b = SubscriberId::new();
        assert_ne!(a, b);
        assert_ne!(a.into_inner(), Uuid::nil());
    }

    #[test]
    fn subscriber_id_display_matches_uuid() {
        let id = SubscriberId::new();
        assert_eq!(id.to_string(), id.into_inner().to_string());
    }
}
