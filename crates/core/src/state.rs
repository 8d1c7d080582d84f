// SPDX-License-Identifier: MIT

//! Transaction state and event tags.
//!
//! Tag values are part of the journal format and must never be renumbered.
//! Non-terminal states occupy 0..=17; terminal states start at 1000.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a transaction's lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateTag {
    Precheck,
    PrecheckWait,
    Download,
    DownloadRetry,
    Verify,
    Dependencies,
    DependenciesWait,
    Install,
    Mount,
    Load,
    StartServices,
    GenerateWrappers,
    RemoveWrappers,
    StopServices,
    Unload,
    Unmount,
    Uninstall,
    Update,
    Completed,
    Error,
    Cancelled,
}

impl StateTag {
    /// Stable numeric value used by the journal format.
    pub const fn value(self) -> u16 {
        match self {
            StateTag::Precheck => 0,
            StateTag::PrecheckWait => 1,
            StateTag::Download => 2,
            StateTag::DownloadRetry => 3,
            StateTag::Verify => 4,
            StateTag::Dependencies => 5,
            StateTag::DependenciesWait => 6,
            StateTag::Install => 7,
            StateTag::Mount => 8,
            StateTag::Load => 9,
            StateTag::StartServices => 10,
            StateTag::GenerateWrappers => 11,
            StateTag::RemoveWrappers => 12,
            StateTag::StopServices => 13,
            StateTag::Unload => 14,
            StateTag::Unmount => 15,
            StateTag::Uninstall => 16,
            StateTag::Update => 17,
            StateTag::Completed => 1000,
            StateTag::Error => 1001,
            StateTag::Cancelled => 1002,
        }
    }

    /// Inverse of [`StateTag::value`]. Unknown values are rejected so a
    /// journal written by a newer daemon fails loudly instead of silently
    /// misrouting a transaction.
    pub fn from_value(value: u16) -> Option<Self> {
        Some(match value {
            0 => StateTag::Precheck,
            1 => StateTag::PrecheckWait,
            2 => StateTag::Download,
            3 => StateTag::DownloadRetry,
            4 => StateTag::Verify,
            5 => StateTag::Dependencies,
            6 => StateTag::DependenciesWait,
            7 => StateTag::Install,
            8 => StateTag::Mount,
            9 => StateTag::Load,
            10 => StateTag::StartServices,
            11 => StateTag::GenerateWrappers,
            12 => StateTag::RemoveWrappers,
            13 => StateTag::StopServices,
            14 => StateTag::Unload,
            15 => StateTag::Unmount,
            16 => StateTag::Uninstall,
            17 => StateTag::Update,
            1000 => StateTag::Completed,
            1001 => StateTag::Error,
            1002 => StateTag::Cancelled,
            _ => return None,
        })
    }

    /// Terminal states never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StateTag::Completed | StateTag::Error | StateTag::Cancelled
        )
    }

    /// Waiting states park the transaction until an external event arrives.
    pub fn is_waiting(self) -> bool {
        matches!(
            self,
            StateTag::PrecheckWait | StateTag::DownloadRetry | StateTag::DependenciesWait
        )
    }

    /// States in the irreversible teardown sequence. Cancellation received
    /// here is downgraded: the flag is recorded but the transaction runs
    /// forward to completed or error.
    pub fn is_irreversible(self) -> bool {
        matches!(
            self,
            StateTag::StopServices
                | StateTag::Unload
                | StateTag::Unmount
                | StateTag::Uninstall
                | StateTag::Update
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            StateTag::Precheck => "precheck",
            StateTag::PrecheckWait => "precheck-wait",
            StateTag::Download => "download",
            StateTag::DownloadRetry => "download-retry",
            StateTag::Verify => "verify",
            StateTag::Dependencies => "dependencies",
            StateTag::DependenciesWait => "dependencies-wait",
            StateTag::Install => "install",
            StateTag::Mount => "mount",
            StateTag::Load => "load",
            StateTag::StartServices => "start-services",
            StateTag::GenerateWrappers => "generate-wrappers",
            StateTag::RemoveWrappers => "remove-wrappers",
            StateTag::StopServices => "stop-services",
            StateTag::Unload => "unload",
            StateTag::Unmount => "unmount",
            StateTag::Uninstall => "uninstall",
            StateTag::Update => "update",
            StateTag::Completed => "completed",
            StateTag::Error => "error",
            StateTag::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for StateTag {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.value())
    }
}

impl<'de> Deserialize<'de> for StateTag {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u16::deserialize(deserializer)?;
        StateTag::from_value(value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown state tag {value}")))
    }
}

/// Event emitted by a state action (or posted externally), driving the
/// transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Ok,
    Wait,
    Retry,
    Failed,
    Cancel,
}

impl Outcome {
    /// Stable numeric value used by the journal format.
    pub const fn value(self) -> u16 {
        match self {
            Outcome::Ok => 0,
            Outcome::Wait => 1,
            Outcome::Retry => 2,
            Outcome::Failed => 3,
            Outcome::Cancel => 4,
        }
    }

    pub fn from_value(value: u16) -> Option<Self> {
        Some(match value {
            0 => Outcome::Ok,
            1 => Outcome::Wait,
            2 => Outcome::Retry,
            3 => Outcome::Failed,
            4 => Outcome::Cancel,
            _ => return None,
        })
    }

    /// All events, in tag order. Used by totality checks.
    pub const ALL: [Outcome; 5] = [
        Outcome::Ok,
        Outcome::Wait,
        Outcome::Retry,
        Outcome::Failed,
        Outcome::Cancel,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Wait => "wait",
            Outcome::Retry => "retry",
            Outcome::Failed => "failed",
            Outcome::Cancel => "cancel",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Outcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.value())
    }
}

impl<'de> Deserialize<'de> for Outcome {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u16::deserialize(deserializer)?;
        Outcome::from_value(value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown event tag {value}")))
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
