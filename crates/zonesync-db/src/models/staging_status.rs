//! Review status shared by the three staging tables.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-node review status in the staging tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StagingStatus {
    /// Awaiting human review.
    #[default]
    Pending,
    /// Approved for commit.
    Approved,
    /// Rejected; rows in this state are deleted by the reject cascade.
    Rejected,
    /// Promoted to production.
    Committed,
    /// Upstream name is an internal code; a human must resolve it before the
    /// containing city can be approved.
    NeedsMapping,
}

impl StagingStatus {
    /// Whether a node in this state blocks approval of its ancestors.
    #[must_use]
    pub fn blocks_approval(&self) -> bool {
        matches!(self, Self::NeedsMapping)
    }
}

impl fmt::Display for StagingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Committed => write!(f, "committed"),
            Self::NeedsMapping => write!(f, "needs_mapping"),
        }
    }
}

impl std::str::FromStr for StagingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "committed" => Ok(Self::Committed),
            "needs_mapping" => Ok(Self::NeedsMapping),
            _ => Err(format!("Unknown staging status: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_from_str_round_trip() {
        for status in [
            StagingStatus::Pending,
            StagingStatus::Approved,
            StagingStatus::Rejected,
            StagingStatus::Committed,
            StagingStatus::NeedsMapping,
        ] {
            let parsed: StagingStatus = status.to_string().parse().unwrap();
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn needs_mapping_blocks_approval() {
        assert!(StagingStatus::NeedsMapping.blocks_approval());
        assert!(!StagingStatus::Pending.blocks_approval());
    }
}
