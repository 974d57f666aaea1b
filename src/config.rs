use crate::model::Severity;

/// How `query` reports the total result-set size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalCountMode {
    /// Count every matching row. The default.
    Exact,
    /// Stop scanning one page past the requested one and report a lower
    /// bound. Trades accuracy for speed on large result sets.
    Fuzzy,
}

/// Per-rule governance switches. A rule with a `None`/`false` setting is
/// skipped entirely; severity-carrying rules report at the configured
/// severity.
#[derive(Debug, Clone)]
pub struct GovernanceConfig {
    pub authority_existence: bool,
    pub scope: bool,
    pub uniqueness: Option<Severity>,
    pub assigning_application: bool,
    pub format: Option<Severity>,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            authority_existence: true,
            scope: true,
            uniqueness: Some(Severity::Error),
            assigning_application: true,
            format: Some(Severity::Warning),
        }
    }
}

impl GovernanceConfig {
    pub fn disabled() -> Self {
        Self {
            authority_existence: false,
            scope: false,
            uniqueness: None,
            assigning_application: false,
            format: None,
        }
    }

    pub fn uniqueness_severity(mut self, severity: Option<Severity>) -> Self {
        self.uniqueness = severity;
        self
    }

    pub fn format_severity(mut self, severity: Option<Severity>) -> Self {
        self.format = severity;
        self
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub governance: GovernanceConfig,
    pub total_count: TotalCountMode,
    /// Capacity of the read-through record cache; 0 disables caching.
    pub cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            governance: GovernanceConfig::default(),
            total_count: TotalCountMode::Exact,
            cache_capacity: 1024,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn governance(mut self, governance: GovernanceConfig) -> Self {
        self.governance = governance;
        self
    }

    pub fn total_count(mut self, mode: TotalCountMode) -> Self {
        self.total_count = mode;
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }
}
