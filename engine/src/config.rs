//! Engine-level policy knobs.
//!
//! The runtime crate fills these from the environment; tests build them
//! directly.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What to do with a priority/status/category string that names no variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InvalidEnumPolicy {
    /// Fail the whole request with `InvalidEnumValue`
    #[default]
    Reject,
    /// Ignore the malformed field and apply the rest of the change-set
    Skip,
}

impl FromStr for InvalidEnumPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "skip" => Ok(Self::Skip),
            other => Err(format!("unknown invalid-enum policy: {other}")),
        }
    }
}

/// Overdue policy for tickets with neither an estimate nor a matching SLA rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnscheduledPolicy {
    /// No deadline, never overdue
    #[default]
    Never,
    /// Zero-minute deadline: overdue as soon as any time has passed
    Immediately,
}

impl FromStr for UnscheduledPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" => Ok(Self::Never),
            "immediately" | "immediate" => Ok(Self::Immediately),
            other => Err(format!("unknown unscheduled-overdue policy: {other}")),
        }
    }
}

/// Policy configuration for [`crate::TicketEngine`] and the overdue scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Handling of malformed enum inputs
    pub invalid_enum_policy: InvalidEnumPolicy,
    /// Recipient name for the support distribution list
    pub support_distribution: String,
    /// Overdue handling when no deadline can be derived
    pub unscheduled_overdue: UnscheduledPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            invalid_enum_policy: InvalidEnumPolicy::default(),
            support_distribution: "support-team".to_string(),
            unscheduled_overdue: UnscheduledPolicy::default(),
        }
    }
}
