//! Check events: one observed permission lookup and its three-valued result.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tristate {
    True,
    False,
    Undefined,
}

impl Tristate {
    /// Canonical lowercase name, as used in reports and exports.
    pub fn as_str(self) -> &'static str {
        match self {
            Tristate::True => "true",
            Tristate::False => "false",
            Tristate::Undefined => "undefined",
        }
    }

    /// Legacy color code the observer's styling system uses to highlight this result.
    pub fn marker(self) -> &'static str {
        match self {
            Tristate::True => "&2",
            Tristate::False => "&c",
            Tristate::Undefined => "&7",
        }
    }
}

impl fmt::Display for Tristate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One permission check as seen by the recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckEvent {
    /// Who or what was checked (user name, group name, ...).
    pub subject: String,
    /// Permission node that was looked up.
    pub permission: String,
    pub outcome: Tristate,
}

impl CheckEvent {
    pub fn new(subject: impl Into<String>, permission: impl Into<String>, outcome: Tristate) -> Self {
        Self {
            subject: subject.into(),
            permission: permission.into(),
            outcome,
        }
    }

    /// One-line notification text with color markers around each field.
    pub fn notification_line(&self) -> String {
        format!(
            "&a{}&7 -- &a{}&7 -- {}{}",
            self.subject,
            self.permission,
            self.outcome.marker(),
            self.outcome.as_str()
        )
    }
}
