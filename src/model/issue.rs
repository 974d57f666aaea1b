use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    Information,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Information => "information",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "information" => Some(Self::Information),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn blocks_write(&self) -> bool {
        matches!(self, Self::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueCode {
    UnknownAuthority,
    AuthorityScope,
    DuplicateIdentifier,
    AssignerMismatch,
    FormatMismatch,
    MissingSatellite,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownAuthority => "unknown-authority",
            Self::AuthorityScope => "authority-scope",
            Self::DuplicateIdentifier => "duplicate-identifier",
            Self::AssignerMismatch => "assigner-mismatch",
            Self::FormatMismatch => "format-mismatch",
            Self::MissingSatellite => "missing-satellite",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "unknown-authority" => Some(Self::UnknownAuthority),
            "authority-scope" => Some(Self::AuthorityScope),
            "duplicate-identifier" => Some(Self::DuplicateIdentifier),
            "assigner-mismatch" => Some(Self::AssignerMismatch),
            "format-mismatch" => Some(Self::FormatMismatch),
            "missing-satellite" => Some(Self::MissingSatellite),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueCategory {
    IdentifierGovernance,
    DataQuality,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdentifierGovernance => "identifier-governance",
            Self::DataQuality => "data-quality",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "identifier-governance" => Some(Self::IdentifierGovernance),
            "data-quality" => Some(Self::DataQuality),
            _ => None,
        }
    }
}

/// A severity-classified validation finding. Error-severity issues abort
/// the write; Warning-severity issues are attached to the record as
/// advisory annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedIssue {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
    pub category: IssueCategory,
}

impl DetectedIssue {
    pub fn new(
        severity: Severity,
        code: IssueCode,
        message: impl Into<String>,
        category: IssueCategory,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            category,
        }
    }

    pub fn governance(severity: Severity, code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(severity, code, message, IssueCategory::IdentifierGovernance)
    }
}

impl fmt::Display for DetectedIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.severity.as_str(),
            self.code.as_str(),
            self.message
        )
    }
}
