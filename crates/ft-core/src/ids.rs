//! Strongly typed identifier wrappers.
//!
//! Shipment and actor ids come from outside the engine (tracking numbers,
//! admin user ids), so they wrap an owned `String` rather than an index.
//! They are `Clone + Ord + Hash` and serialize transparently as the bare
//! string.

use std::fmt;

/// Generate a typed id wrapper around a `String`.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident;) => {
        $(#[$attr])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[derive(serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        $vis struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

typed_id! {
    /// Tracking identifier of a shipment; also the key of its broadcast room.
    pub struct ShipmentId;
}

typed_id! {
    /// Identity of the operator performing an intercept, clearance, or reroute.
    /// Recorded on internal rows only, never in public tracking text.
    pub struct ActorId;
}
