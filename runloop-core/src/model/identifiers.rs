// runloop-core/src/model/identifiers.rs
// ============================================================================
// Module: Runtime Identifiers
// Description: Newtype identifiers used across the run engine and dispatcher.
// Purpose: Give every domain id its own type instead of passing bare strings.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every identifier in the runtime is a distinct newtype wrapping `String`,
//! so a `RunId` can never be passed where a `ToolName` is expected.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Declares a `String`-backed newtype identifier with the standard
/// constructor/accessor/conversion set used throughout this crate.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from anything convertible to `String`.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier, returning the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifies one run of the engine loop.
    RunId
);
string_id!(
    /// Name of a registered tool; also the key used in eligibility sets.
    ToolName
);
string_id!(
    /// Name of a named budget counter (e.g. `tool_calls`).
    BudgetName
);
string_id!(
    /// Identifies a dispatcher task.
    TaskId
);
string_id!(
    /// Identifies the holder of a distributed lock.
    HolderId
);
string_id!(
    /// Identifies a webhook endpoint.
    EndpointId
);
string_id!(
    /// Identifies a notifier event.
    EventId
);
string_id!(
    /// Groups related evidence/audit records across subsystems.
    CorrelationId
);
