//! Subscription plan types and the per-plan quota table

use serde::{Deserialize, Serialize};

use crate::ParseError;

/// Subscription plan levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    /// Free plan - 5 summaries per calendar month
    Free,
    /// Paid individual plan - 30 summaries per billing period
    Individual,
}

impl Plan {
    /// Every plan, cheapest first
    pub const ALL: [Plan; 2] = [Plan::Free, Plan::Individual];

    /// Default number of summaries allowed per period
    pub const fn default_quota(&self) -> u32 {
        match self {
            Self::Free => 5,
            Self::Individual => 30,
        }
    }

    /// Stored string form
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Individual => "individual",
        }
    }

    /// Parse a stored plan name, falling back to the free plan for anything unknown
    pub fn parse_or_free(s: &str) -> Self {
        s.parse().unwrap_or(Self::Free)
    }
}

impl Default for Plan {
    fn default() -> Self {
        Self::Free
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Plan {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "individual" => Ok(Self::Individual),
            _ => Err(ParseError::InvalidPlan(s.to_string())),
        }
    }
}

/// Quota-consuming actions allowed per period, keyed by plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaTable {
    /// Limit for the free plan
    pub free: u32,
    /// Limit for the individual plan
    pub individual: u32,
}

impl QuotaTable {
    /// Limit for a plan
    pub const fn limit_for(&self, plan: Plan) -> u32 {
        match plan {
            Plan::Free => self.free,
            Plan::Individual => self.individual,
        }
    }

    /// Limit for a stored plan name; unknown plans get the free limit
    pub fn limit_for_name(&self, plan: &str) -> u32 {
        self.limit_for(Plan::parse_or_free(plan))
    }

    /// Override the limit for one plan
    #[must_use]
    pub fn with_limit(mut self, plan: Plan, limit: u32) -> Self {
        match plan {
            Plan::Free => self.free = limit,
            Plan::Individual => self.individual = limit,
        }
        self
    }
}

impl Default for QuotaTable {
    fn default() -> Self {
        Self {
            free: Plan::Free.default_quota(),
            individual: Plan::Individual.default_quota(),
        }
    }
}
