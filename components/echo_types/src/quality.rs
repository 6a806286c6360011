//! Session quality results

use serde::{Deserialize, Serialize};
use std::fmt;

/// How bad a detected issue is
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// One detected data-quality problem
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QualityIssue {
    pub id: String,
    pub severity: Severity,
    pub description: String,
}

/// Score (0..=100) plus the issues that lowered it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QualityResult {
    pub score: u32,
    pub issues: Vec<QualityIssue>,
}

impl QualityResult {
    /// A perfect result with no issues
    pub fn perfect() -> Self {
        Self {
            score: 100,
            issues: Vec::new(),
        }
    }

    /// Append an issue; does not touch the score
    pub fn add_issue(
        &mut self,
        id: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
    ) {
        self.issues.push(QualityIssue {
            id: id.into(),
            severity,
            description: description.into(),
        });
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Whether any issue is critical
    pub fn is_critical(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Critical)
    }

    /// Look up an issue by id
    pub fn issue(&self, id: &str) -> Option<&QualityIssue> {
        self.issues.iter().find(|i| i.id == id)
    }
}

impl Default for QualityResult {
    fn default() -> Self {
        Self::perfect()
    }
}

/// Status of the host's external liveness hook
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HookStatus {
    #[default]
    Ok,
    Partial,
    Missing,
}

impl HookStatus {
    /// Heartbeats observed below which the hook counts as partial
    pub const PARTIAL_BELOW: u64 = 10;

    /// Infer hook status from the number of heartbeats it delivered
    pub fn from_heartbeat_count(count: u64) -> Self {
        match count {
            0 => HookStatus::Missing,
            n if n < Self::PARTIAL_BELOW => HookStatus::Partial,
            _ => HookStatus::Ok,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_status_from_count() {
        assert_eq!(HookStatus::from_heartbeat_count(0), HookStatus::Missing);
        assert_eq!(HookStatus::from_heartbeat_count(9), HookStatus::Partial);
        assert_eq!(HookStatus::from_heartbeat_count(10), HookStatus::Ok);
    }

    #[test]
    fn test_critical_detection() {
        let mut result = QualityResult::perfect();
        assert!(!result.has_issues());

        result.add_issue("short_session", Severity::Info, "short");
        assert!(result.has_issues());
        assert!(!result.is_critical());

        result.add_issue("no_tick_data", Severity::Critical, "none");
        assert!(result.is_critical());
        assert_eq!(result.issue("short_session").unwrap().severity, Severity::Info);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
        assert_eq!(Severity::Warning.to_string(), "warning");
    }
}
