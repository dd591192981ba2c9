//! Identifier types for railcars, couplers and trains.
//!
//! All three are opaque, non-empty strings. Railcar and coupler identifiers
//! come from the operator (they are painted on the rolling stock); train
//! identifiers are allocated by the chain from its audit digest.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when an identifier is empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid identifier: {reason}")]
pub struct InvalidIdentifier {
    reason: &'static str,
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from a string.
            ///
            /// Returns an error if the string is empty.
            pub fn new(s: impl Into<String>) -> Result<Self, InvalidIdentifier> {
                let s = s.into();
                if s.is_empty() {
                    return Err(InvalidIdentifier {
                        reason: concat!($label, " identifier cannot be empty"),
                    });
                }
                Ok($name(s))
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidIdentifier;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Identifier of a physical railcar.
    ///
    /// # Examples
    ///
    /// ```
    /// use train_chain::domain::RailcarId;
    ///
    /// let id = RailcarId::new("re460-001").unwrap();
    /// assert_eq!(id.as_str(), "re460-001");
    ///
    /// assert!(RailcarId::new("").is_err());
    /// ```
    RailcarId,
    "railcar"
);

identifier!(
    /// Identifier of a single coupler, unique across the whole chain.
    CouplerId,
    "coupler"
);

identifier!(
    /// Identifier of a train, allocated by the chain.
    TrainId,
    "train"
);

impl TrainId {
    /// Train identifier taken from an audit digest prefix, which is never empty.
    pub(crate) fn from_digest(digest: String) -> Self {
        TrainId(digest)
    }
}
