//! Identifier newtypes for documents and blocks.
//!
//! Identifiers are opaque strings handed out by an injected
//! [`IdGenerator`](crate::core::id_gen::IdGenerator) or supplied by the caller
//! (for example `"d1"`). Wrapping them keeps document and block ids from being
//! swapped by accident.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier string
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice
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
                Self(s.to_string())
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

string_id!(
    /// Stable identifier of a document
    DocId
);

string_id!(
    /// Stable identifier of a block, independent of its version history
    BlockId
);

/// Document version number. Starts at 1 with the initialization commit.
pub type DocVer = u64;

/// Block version number. Starts at 1 when the block is created.
pub type BlockVer = u64;

/// Identity of whoever performed an operation, recorded in audit fields
pub type ActorId = String;
